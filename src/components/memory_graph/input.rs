//! Gesture state machine turning raw pointer, wheel, and touch input into
//! viewport changes and host intents.
//!
//! The controller never touches the DOM; `listeners` feeds it normalized
//! [`InputEvent`]s so the whole machine can be driven from tests.

use std::collections::VecDeque;

use log::debug;

use super::config::InputConfig;
use super::spatial::SpatialIndex;
use super::types::Node;
use super::viewport::ViewportState;

/// A normalized input event in canvas-local CSS pixels. `time` is in milliseconds.
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
	/// Primary button pressed.
	PointerDown {
		/// Canvas x.
		x: f64,
		/// Canvas y.
		y: f64,
		/// Event timestamp.
		time: f64,
	},
	/// Pointer moved, pressed or not.
	PointerMove {
		/// Canvas x.
		x: f64,
		/// Canvas y.
		y: f64,
		/// Event timestamp.
		time: f64,
	},
	/// Primary button released.
	PointerUp {
		/// Canvas x.
		x: f64,
		/// Canvas y.
		y: f64,
		/// Event timestamp.
		time: f64,
	},
	/// Focus loss or an interrupted pointer; ends any gesture like a release.
	PointerCancel {
		/// Event timestamp.
		time: f64,
	},
	/// Pointer left the surface.
	PointerLeave {
		/// Event timestamp.
		time: f64,
	},
	/// Wheel scroll, deltas in pixels.
	Wheel {
		/// Canvas x of the cursor.
		x: f64,
		/// Canvas y of the cursor.
		y: f64,
		/// Horizontal scroll.
		delta_x: f64,
		/// Vertical scroll; negative zooms in.
		delta_y: f64,
	},
	/// Double click at a point.
	DoubleClick {
		/// Canvas x.
		x: f64,
		/// Canvas y.
		y: f64,
	},
	/// Touch update carrying every finger still on the surface.
	Touch {
		/// What changed.
		phase: TouchPhase,
		/// Canvas positions of the fingers still down.
		points: Vec<(f64, f64)>,
		/// Event timestamp.
		time: f64,
	},
}

/// Stage of a touch event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchPhase {
	/// A finger went down.
	Start,
	/// Fingers moved.
	Move,
	/// A finger lifted.
	End,
	/// The browser aborted the touch.
	Cancel,
}

/// Something the host application should react to.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphIntent {
	/// Hovered node changed.
	Hover(Option<String>),
	/// Click without drag; `None` means empty space.
	Click(Option<String>),
	/// A node started being dragged.
	DragStart {
		/// Dragged node id.
		id: String,
		/// The node as it was when the drag began.
		node: Node,
	},
	/// The active drag finished.
	DragEnd,
}

/// Result of feeding one event to the controller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputOutcome {
	/// Host notifications, in order.
	pub intents: Vec<GraphIntent>,
	/// The frame must be redrawn.
	pub redraw: bool,
	/// A node's position changed (the spatial index is stale).
	pub moved_nodes: bool,
}

/// Mutable engine state an event may touch.
pub struct InputTarget<'a> {
	/// Transform to pan and zoom.
	pub viewport: &'a mut ViewportState,
	/// Nodes that may be dragged.
	pub nodes: &'a mut [Node],
	/// Hit-test grid matching `nodes`.
	pub index: &'a SpatialIndex,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Sample {
	x: f64,
	y: f64,
	time: f64,
}

#[derive(Clone, Debug, PartialEq)]
enum Gesture {
	Idle,
	Panning {
		last: (f64, f64),
		origin: (f64, f64),
		did_drag: bool,
	},
	Dragging {
		index: usize,
		id: String,
		origin: (f64, f64),
		did_drag: bool,
	},
	Pinching {
		distance: f64,
		mid: (f64, f64),
	},
}

/// Per-surface gesture controller.
#[derive(Debug)]
pub struct InputController {
	config: InputConfig,
	gesture: Gesture,
	samples: VecDeque<Sample>,
	hovered: Option<String>,
	last_pointer: (f64, f64),
	last_tap: Option<Sample>,
	touch_count: usize,
}

impl InputController {
	/// An idle controller.
	pub fn new(config: InputConfig) -> Self {
		Self {
			config,
			gesture: Gesture::Idle,
			samples: VecDeque::with_capacity(config.momentum_samples.max(2)),
			hovered: None,
			last_pointer: (0.0, 0.0),
			last_tap: None,
			touch_count: 0,
		}
	}

	/// Id of the node under the pointer.
	pub fn hovered(&self) -> Option<&str> {
		self.hovered.as_deref()
	}

	/// Whether the background is being dragged.
	pub fn is_panning(&self) -> bool {
		matches!(self.gesture, Gesture::Panning { .. } | Gesture::Pinching { .. })
	}

	/// Id of the node being dragged, if any.
	pub fn dragging(&self) -> Option<&str> {
		match &self.gesture {
			Gesture::Dragging { id, .. } => Some(id),
			_ => None,
		}
	}

	/// Re-resolves the dragged node after the host replaced the node array.
	/// Returns `false` (and drops the drag) when the node is gone.
	pub fn retarget(&mut self, nodes: &[Node]) -> bool {
		let Gesture::Dragging { index, id, .. } = &mut self.gesture else {
			return true;
		};
		match nodes.iter().position(|n| n.id == *id) {
			Some(found) => {
				*index = found;
				true
			}
			None => {
				debug!("dragged node {id} left the data set");
				self.gesture = Gesture::Idle;
				false
			}
		}
	}

	/// Forgets a hovered id that is no longer present.
	pub fn forget_hover(&mut self, nodes: &[Node]) -> Option<GraphIntent> {
		let id = self.hovered.as_ref()?;
		if nodes.iter().any(|n| n.id == *id) {
			return None;
		}
		self.hovered = None;
		Some(GraphIntent::Hover(None))
	}

	/// Applies one event to the view and nodes.
	pub fn handle(&mut self, event: InputEvent, target: InputTarget<'_>) -> InputOutcome {
		let mut out = InputOutcome::default();
		match event {
			InputEvent::PointerDown { x, y, time } => self.press(x, y, time, target, &mut out),
			InputEvent::PointerMove { x, y, time } => self.pointer_move(x, y, time, target, &mut out),
			InputEvent::PointerUp { x, y, time } => self.release(x, y, time, true, target, &mut out),
			InputEvent::PointerCancel { time } => {
				let (x, y) = self.last_pointer;
				self.release(x, y, time, false, target, &mut out);
			}
			InputEvent::PointerLeave { time } => {
				let (x, y) = self.last_pointer;
				self.release(x, y, time, false, target, &mut out);
				self.set_hover(None, &mut out);
			}
			InputEvent::Wheel {
				x,
				y,
				delta_x,
				delta_y,
			} => self.wheel(x, y, delta_x, delta_y, target, &mut out),
			InputEvent::DoubleClick { x, y } => self.zoom_in_at(x, y, target.viewport, &mut out),
			InputEvent::Touch { phase, points, time } => {
				self.touch(phase, &points, time, target, &mut out)
			}
		}
		out
	}

	fn press(&mut self, x: f64, y: f64, time: f64, target: InputTarget<'_>, out: &mut InputOutcome) {
		if !x.is_finite() || !y.is_finite() {
			return;
		}
		if self.gesture != Gesture::Idle {
			// A second press without a release (lost mouseup): close the old gesture first.
			let (lx, ly) = self.last_pointer;
			self.release(
				lx,
				ly,
				time,
				false,
				InputTarget {
					viewport: &mut *target.viewport,
					nodes: &mut *target.nodes,
					index: target.index,
				},
				out,
			);
		}
		target.viewport.stop();
		self.last_pointer = (x, y);
		self.samples.clear();
		self.record(x, y, time);
		out.redraw = true;

		let Some(index) = target.index.query_point(x, y) else {
			self.gesture = Gesture::Panning {
				last: (x, y),
				origin: (x, y),
				did_drag: false,
			};
			return;
		};

		// Single active drag: release every other pin before taking this one.
		for node in target.nodes.iter_mut().filter(|n| n.is_pinned() || n.is_dragging) {
			node.unpin();
		}
		let Some(node) = target.nodes.get_mut(index) else {
			self.gesture = Gesture::Idle;
			return;
		};
		let (nx, ny) = (node.x, node.y);
		node.pin(nx, ny);
		node.is_dragging = true;
		debug!("drag start on {}", node.id);
		out.intents.push(GraphIntent::DragStart {
			id: node.id.clone(),
			node: node.clone(),
		});
		self.gesture = Gesture::Dragging {
			index,
			id: node.id.clone(),
			origin: (x, y),
			did_drag: false,
		};
	}

	fn pointer_move(&mut self, x: f64, y: f64, time: f64, target: InputTarget<'_>, out: &mut InputOutcome) {
		if !x.is_finite() || !y.is_finite() {
			return;
		}
		self.last_pointer = (x, y);
		let threshold = self.config.drag_threshold;
		match &mut self.gesture {
			Gesture::Idle => {
				let hit = target
					.index
					.query_point(x, y)
					.and_then(|i| target.nodes.get(i))
					.map(|n| n.id.clone());
				self.set_hover(hit, out);
			}
			Gesture::Panning { last, origin, did_drag } => {
				target.viewport.pan(x - last.0, y - last.1);
				*last = (x, y);
				*did_drag |= exceeds(*origin, (x, y), threshold);
				self.record(x, y, time);
				out.redraw = true;
			}
			Gesture::Dragging {
				index,
				origin,
				did_drag,
				..
			} => {
				let (wx, wy) = target.viewport.screen_to_world(x, y);
				if let Some(node) = target.nodes.get_mut(*index) {
					node.pin(wx, wy);
					out.moved_nodes = true;
				}
				*did_drag |= exceeds(*origin, (x, y), threshold);
				out.redraw = true;
			}
			Gesture::Pinching { .. } => {}
		}
	}

	fn release(
		&mut self,
		x: f64,
		y: f64,
		time: f64,
		allow_click: bool,
		target: InputTarget<'_>,
		out: &mut InputOutcome,
	) {
		match std::mem::replace(&mut self.gesture, Gesture::Idle) {
			Gesture::Idle => {}
			Gesture::Pinching { .. } => out.redraw = true,
			Gesture::Panning { did_drag, .. } => {
				if did_drag {
					let (vx, vy) = self.release_velocity(time);
					target.viewport.release_with_velocity(vx, vy);
				} else if allow_click {
					out.intents.push(GraphIntent::Click(None));
				}
				out.redraw = true;
			}
			Gesture::Dragging { index, id, did_drag, .. } => {
				if let Some(node) = target.nodes.get_mut(index).filter(|n| n.id == id) {
					node.unpin();
				}
				debug!("drag end on {id}");
				out.intents.push(GraphIntent::DragEnd);
				if !did_drag && allow_click {
					out.intents.push(GraphIntent::Click(Some(id)));
				}
				out.moved_nodes = true;
				out.redraw = true;
			}
		}
		self.samples.clear();
		if allow_click && x.is_finite() && y.is_finite() {
			let hit = target
				.index
				.query_point(x, y)
				.and_then(|i| target.nodes.get(i))
				.map(|n| n.id.clone());
			self.set_hover(hit, out);
		}
	}

	fn wheel(&mut self, x: f64, y: f64, dx: f64, dy: f64, target: InputTarget<'_>, out: &mut InputOutcome) {
		if !dx.is_finite() || !dy.is_finite() || (dx == 0.0 && dy == 0.0) {
			return;
		}
		if dy.abs() >= dx.abs() {
			let factor = if dy > 0.0 {
				self.config.wheel_zoom_out
			} else {
				self.config.wheel_zoom_in
			};
			target.viewport.zoom_immediate(factor, x, y);
		} else {
			target.viewport.pan(-dx, -dy);
		}
		out.redraw = true;
	}

	fn zoom_in_at(&mut self, x: f64, y: f64, viewport: &mut ViewportState, out: &mut InputOutcome) {
		let target = viewport.zoom * self.config.double_click_zoom;
		viewport.zoom_to(target, x, y);
		out.redraw = true;
	}

	fn touch(
		&mut self,
		phase: TouchPhase,
		points: &[(f64, f64)],
		time: f64,
		target: InputTarget<'_>,
		out: &mut InputOutcome,
	) {
		let count = points.len();
		let previous = std::mem::replace(&mut self.touch_count, count);
		let InputTarget {
			viewport,
			nodes,
			index,
		} = target;

		if phase == TouchPhase::Move && count == previous {
			if count == 1 {
				let (x, y) = points[0];
				self.pointer_move(x, y, time, InputTarget { viewport, nodes, index }, out);
			} else if let (2.., Gesture::Pinching { distance, mid }) = (count, &mut self.gesture) {
				let (d, m) = pinch(points[0], points[1]);
				viewport.pan(m.0 - mid.0, m.1 - mid.1);
				if *distance > 0.0 && d > 0.0 {
					viewport.zoom_immediate(d / *distance, m.0, m.1);
				}
				*distance = d;
				*mid = m;
				out.redraw = true;
			}
			return;
		}

		// Finger count changed: finish the old gesture and take a fresh baseline.
		match count {
			0 => {
				let was_tap = matches!(
					self.gesture,
					Gesture::Panning { did_drag: false, .. } | Gesture::Dragging { did_drag: false, .. }
				);
				let (x, y) = self.last_pointer;
				let completed = phase == TouchPhase::End;
				self.release(x, y, time, completed, InputTarget { viewport: &mut *viewport, nodes, index }, out);
				if completed && was_tap && previous == 1 {
					self.register_tap(x, y, time, viewport, out);
				}
			}
			1 => {
				let (x, y) = points[0];
				if previous == 0 {
					self.press(x, y, time, InputTarget { viewport, nodes, index }, out);
				} else {
					// Leaving a pinch: continue as a pan that can never become a click.
					self.samples.clear();
					self.record(x, y, time);
					self.last_pointer = (x, y);
					self.gesture = Gesture::Panning {
						last: (x, y),
						origin: (x, y),
						did_drag: true,
					};
				}
			}
			_ => {
				if !matches!(self.gesture, Gesture::Pinching { .. } | Gesture::Idle) {
					let (x, y) = self.last_pointer;
					self.release(x, y, time, false, InputTarget { viewport: &mut *viewport, nodes, index }, out);
				}
				viewport.stop();
				let (distance, mid) = pinch(points[0], points[1]);
				self.gesture = Gesture::Pinching { distance, mid };
				self.last_tap = None;
				out.redraw = true;
			}
		}
	}

	fn register_tap(&mut self, x: f64, y: f64, time: f64, viewport: &mut ViewportState, out: &mut InputOutcome) {
		let is_double = self.last_tap.is_some_and(|tap| {
			time - tap.time <= self.config.double_tap_ms
				&& !exceeds((tap.x, tap.y), (x, y), self.config.double_tap_slop)
		});
		if is_double {
			self.last_tap = None;
			self.zoom_in_at(x, y, viewport, out);
		} else {
			self.last_tap = Some(Sample { x, y, time });
		}
	}

	fn set_hover(&mut self, id: Option<String>, out: &mut InputOutcome) {
		if self.hovered == id {
			return;
		}
		self.hovered = id.clone();
		out.intents.push(GraphIntent::Hover(id));
		out.redraw = true;
	}

	fn record(&mut self, x: f64, y: f64, time: f64) {
		if self.samples.len() >= self.config.momentum_samples.max(2) {
			self.samples.pop_front();
		}
		self.samples.push_back(Sample { x, y, time });
	}

	/// Velocity in px per tick from the oldest to the newest sample, or zero
	/// if the pointer rested before release.
	fn release_velocity(&self, release_time: f64) -> (f64, f64) {
		let (Some(oldest), Some(newest)) = (self.samples.front(), self.samples.back()) else {
			return (0.0, 0.0);
		};
		if !release_time.is_finite() || release_time - newest.time > self.config.release_window_ms {
			return (0.0, 0.0);
		}
		let elapsed = newest.time - oldest.time;
		if elapsed <= 0.0 {
			return (0.0, 0.0);
		}
		let scale = self.config.frame_ms / elapsed;
		((newest.x - oldest.x) * scale, (newest.y - oldest.y) * scale)
	}
}

fn exceeds(a: (f64, f64), b: (f64, f64), threshold: f64) -> bool {
	let (dx, dy) = (b.0 - a.0, b.1 - a.1);
	dx * dx + dy * dy > threshold * threshold
}

fn pinch(a: (f64, f64), b: (f64, f64)) -> (f64, (f64, f64)) {
	let (dx, dy) = (b.0 - a.0, b.1 - a.1);
	((dx * dx + dy * dy).sqrt(), ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0))
}
