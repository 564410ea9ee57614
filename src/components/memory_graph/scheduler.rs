//! Decides when the host must ask the browser for another animation frame.
//!
//! At rest no frame is pending and nothing runs. A redraw request arms one
//! frame; a frame that reports motion arms the next one.

/// Gate in front of `requestAnimationFrame`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameScheduler {
	pending: bool,
	stopped: bool,
}

impl FrameScheduler {
	/// An idle scheduler.
	pub fn new() -> Self {
		Self::default()
	}

	/// Asks for a frame. Returns `true` when the caller must actually schedule
	/// one, `false` if a frame is already pending or the scheduler is stopped.
	pub fn request_frame(&mut self) -> bool {
		if self.pending || self.stopped {
			return false;
		}
		self.pending = true;
		true
	}

	/// Called at the end of a frame. Returns `true` when another frame must be
	/// scheduled because something is still moving.
	pub fn frame_done(&mut self, moving: bool) -> bool {
		self.pending = moving && !self.stopped;
		self.pending
	}

	/// Whether a frame has been requested and not yet run.
	pub fn is_pending(&self) -> bool {
		self.pending
	}

	/// Permanently refuses further frames (teardown).
	pub fn stop(&mut self) {
		self.pending = false;
		self.stopped = true;
	}

	/// Whether `stop` has been called.
	pub fn is_stopped(&self) -> bool {
		self.stopped
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn coalesces_requests_until_the_frame_runs() {
		let mut s = FrameScheduler::new();
		assert!(s.request_frame());
		assert!(!s.request_frame());
		assert!(!s.frame_done(false));
		assert!(!s.is_pending());
		assert!(s.request_frame());
	}

	#[test]
	fn keeps_running_while_moving_then_idles() {
		let mut s = FrameScheduler::new();
		assert!(s.request_frame());
		assert!(s.frame_done(true));
		assert!(!s.request_frame());
		assert!(s.frame_done(true));
		assert!(!s.frame_done(false));
		assert!(!s.is_pending());
	}

	#[test]
	fn stop_is_final() {
		let mut s = FrameScheduler::new();
		assert!(s.request_frame());
		s.stop();
		assert!(!s.frame_done(true));
		assert!(!s.request_frame());
		assert!(s.is_stopped());
	}
}
