//! Failures while wiring the engine into a browser page.

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Browser setup failures. Runtime input never produces one.
#[derive(Debug, Error)]
pub enum GraphError {
	/// No global `window` (not running in a browser).
	#[error("no global window")]
	NoWindow,
	/// The canvas refused a 2D context.
	#[error("canvas has no 2d context: {0}")]
	NoContext(String),
	/// `addEventListener` threw.
	#[error("failed to attach {event} listener: {message}")]
	Listener {
		/// DOM event name.
		event: &'static str,
		/// What the browser threw.
		message: String,
	},
	/// `requestAnimationFrame` threw.
	#[error("requestAnimationFrame failed: {0}")]
	AnimationFrame(String),
}

impl GraphError {
	/// Listener failure for `event`.
	pub fn listener(event: &'static str, value: &JsValue) -> Self {
		Self::Listener {
			event,
			message: describe(value),
		}
	}

	/// Animation frame request failure.
	pub fn animation_frame(value: &JsValue) -> Self {
		Self::AnimationFrame(describe(value))
	}

	/// 2D context failure.
	pub fn no_context(value: &JsValue) -> Self {
		Self::NoContext(describe(value))
	}
}

/// Best-effort text for a thrown JS value.
pub fn describe(value: &JsValue) -> String {
	value.as_string().unwrap_or_else(|| format!("{value:?}"))
}
