//! DOM event wiring for one canvas.
//!
//! [`ListenerSet`] owns every registration it makes and removes all of them
//! on [`ListenerSet::destroy`] or drop. Handlers only hold a weak engine
//! handle and check a shared `alive` flag, so an event that races teardown
//! does nothing.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use log::{info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{
	AddEventListenerOptions, Event, EventTarget, HtmlCanvasElement, MouseEvent, TouchEvent, WheelEvent,
	Window,
};

use super::engine::GraphEngine;
use super::error::GraphError;
use super::input::{GraphIntent, InputEvent, TouchPhase};

/// Pixels per wheel "line" when the browser reports line deltas.
const LINE_HEIGHT: f64 = 16.0;

/// Called after every delivered event with the intents it produced.
pub type IntentSink = Rc<dyn Fn(Vec<GraphIntent>)>;

struct Registration {
	target: EventTarget,
	event: &'static str,
	callback: Closure<dyn FnMut(Event)>,
}

/// Routes translated events into the engine unless torn down.
#[derive(Clone)]
struct Dispatch {
	engine: Weak<RefCell<GraphEngine>>,
	alive: Rc<Cell<bool>>,
	sink: IntentSink,
}

impl Dispatch {
	fn send(&self, input: InputEvent) {
		if !self.alive.get() {
			return;
		}
		let Some(engine) = self.engine.upgrade() else {
			return;
		};
		let intents = match engine.try_borrow_mut() {
			Ok(mut engine) => engine.handle_input(input),
			Err(_) => return,
		};
		(self.sink)(intents);
	}
}

/// Every DOM listener attached for one canvas.
pub struct ListenerSet {
	registrations: Vec<Registration>,
	alive: Rc<Cell<bool>>,
}

impl ListenerSet {
	/// Attaches mouse, wheel, touch, and double-click listeners to the
	/// canvas and a blur listener to the window.
	pub fn attach(
		canvas: &HtmlCanvasElement,
		window: &Window,
		engine: Weak<RefCell<GraphEngine>>,
		sink: IntentSink,
	) -> Result<Self, GraphError> {
		let mut set = Self {
			registrations: Vec::new(),
			alive: Rc::new(Cell::new(true)),
		};
		let dispatch = Dispatch {
			engine,
			alive: set.alive.clone(),
			sink,
		};
		let target: &EventTarget = canvas.as_ref();

		let mouse = |kind: fn(f64, f64, f64) -> InputEvent| {
			let (dispatch, canvas) = (dispatch.clone(), canvas.clone());
			move |event: Event| {
				let Some(event) = event.dyn_ref::<MouseEvent>() else {
					return;
				};
				if event.button() != 0 && event.type_() == "mousedown" {
					return;
				}
				let (x, y) = local(&canvas, event.client_x(), event.client_y());
				dispatch.send(kind(x, y, event.time_stamp()));
			}
		};
		set.listen(target, "mousedown", true, mouse(|x, y, time| InputEvent::PointerDown { x, y, time }))?;
		set.listen(target, "mousemove", true, mouse(|x, y, time| InputEvent::PointerMove { x, y, time }))?;
		set.listen(target, "mouseup", true, mouse(|x, y, time| InputEvent::PointerUp { x, y, time }))?;
		set.listen(target, "mouseleave", true, mouse(|_, _, time| InputEvent::PointerLeave { time }))?;
		set.listen(target, "dblclick", true, mouse(|x, y, _| InputEvent::DoubleClick { x, y }))?;

		{
			let (dispatch, canvas) = (dispatch.clone(), canvas.clone());
			set.listen(target, "wheel", false, move |event: Event| {
				let Some(event) = event.dyn_ref::<WheelEvent>() else {
					return;
				};
				event.prevent_default();
				let (x, y) = local(&canvas, event.client_x(), event.client_y());
				let page = f64::from(canvas.client_height());
				let (delta_x, delta_y) = wheel_delta(event.delta_x(), event.delta_y(), event.delta_mode(), page);
				dispatch.send(InputEvent::Wheel { x, y, delta_x, delta_y });
			})?;
		}

		for (name, phase) in [
			("touchstart", TouchPhase::Start),
			("touchmove", TouchPhase::Move),
			("touchend", TouchPhase::End),
			("touchcancel", TouchPhase::Cancel),
		] {
			let (dispatch, canvas) = (dispatch.clone(), canvas.clone());
			set.listen(target, name, false, move |event: Event| {
				let Some(event) = event.dyn_ref::<TouchEvent>() else {
					return;
				};
				event.prevent_default();
				let touches = event.touches();
				let points = (0..touches.length())
					.filter_map(|i| touches.get(i))
					.map(|t| local(&canvas, t.client_x(), t.client_y()))
					.collect();
				dispatch.send(InputEvent::Touch {
					phase,
					points,
					time: event.time_stamp(),
				});
			})?;
		}

		{
			let dispatch = dispatch.clone();
			set.listen(window.as_ref(), "blur", true, move |event: Event| {
				dispatch.send(InputEvent::PointerCancel {
					time: event.time_stamp(),
				});
			})?;
		}

		info!("attached {} input listeners", set.registrations.len());
		Ok(set)
	}

	fn listen(
		&mut self,
		target: &EventTarget,
		event: &'static str,
		passive: bool,
		handler: impl FnMut(Event) + 'static,
	) -> Result<(), GraphError> {
		let callback = Closure::<dyn FnMut(Event)>::new(handler);
		let options = AddEventListenerOptions::new();
		options.set_passive(passive);
		if let Err(err) = target.add_event_listener_with_callback_and_add_event_listener_options(
			event,
			callback.as_ref().unchecked_ref(),
			&options,
		) {
			warn!("could not attach {event} listener");
			self.destroy();
			return Err(GraphError::listener(event, &err));
		}
		self.registrations.push(Registration {
			target: target.clone(),
			event,
			callback,
		});
		Ok(())
	}

	/// `false` once `destroy` has run.
	pub fn is_alive(&self) -> bool {
		self.alive.get()
	}

	/// Detaches every listener. Safe to call more than once.
	pub fn destroy(&mut self) {
		self.alive.set(false);
		if self.registrations.is_empty() {
			return;
		}
		let count = self.registrations.len();
		for reg in self.registrations.drain(..) {
			let _ = reg
				.target
				.remove_event_listener_with_callback(reg.event, reg.callback.as_ref().unchecked_ref());
		}
		info!("detached {count} input listeners");
	}
}

impl Drop for ListenerSet {
	fn drop(&mut self) {
		self.destroy();
	}
}

/// Client coordinates relative to the canvas' top-left corner.
fn local(canvas: &HtmlCanvasElement, client_x: i32, client_y: i32) -> (f64, f64) {
	let rect = canvas.get_bounding_client_rect();
	(f64::from(client_x) - rect.left(), f64::from(client_y) - rect.top())
}

/// Normalizes wheel deltas to pixels. `mode` is the DOM delta mode
/// (0 pixels, 1 lines, 2 pages).
fn wheel_delta(dx: f64, dy: f64, mode: u32, page: f64) -> (f64, f64) {
	let scale = match mode {
		1 => LINE_HEIGHT,
		2 if page > 0.0 => page,
		2 => 800.0,
		_ => 1.0,
	};
	(dx * scale, dy * scale)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::memory_graph::config::GraphConfig;
	use crate::components::memory_graph::types::{GraphData, MemoryData, Node};

	fn rig() -> (Rc<RefCell<GraphEngine>>, Rc<RefCell<Vec<GraphIntent>>>, Dispatch) {
		let mut engine = GraphEngine::new(GraphConfig::default());
		engine.resize(400.0, 300.0);
		engine.set_data(GraphData {
			nodes: vec![Node::memory("m", 50.0, 50.0, 20.0, MemoryData::default())],
			edges: Vec::new(),
		});
		let engine = Rc::new(RefCell::new(engine));
		let seen = Rc::new(RefCell::new(Vec::new()));
		let sink_seen = seen.clone();
		let dispatch = Dispatch {
			engine: Rc::downgrade(&engine),
			alive: Rc::new(Cell::new(true)),
			sink: Rc::new(move |intents: Vec<GraphIntent>| sink_seen.borrow_mut().extend(intents)),
		};
		(engine, seen, dispatch)
	}

	#[test]
	fn delivers_while_alive() {
		let (_engine, seen, dispatch) = rig();
		dispatch.send(InputEvent::PointerMove {
			x: 50.0,
			y: 50.0,
			time: 0.0,
		});
		assert_eq!(*seen.borrow(), vec![GraphIntent::Hover(Some("m".into()))]);
	}

	#[test]
	fn events_after_teardown_are_ignored() {
		let (engine, seen, dispatch) = rig();
		dispatch.alive.set(false);
		dispatch.send(InputEvent::PointerMove {
			x: 50.0,
			y: 50.0,
			time: 0.0,
		});
		assert!(seen.borrow().is_empty());

		dispatch.alive.set(true);
		drop(engine);
		dispatch.send(InputEvent::PointerDown {
			x: 50.0,
			y: 50.0,
			time: 0.0,
		});
		assert!(seen.borrow().is_empty());
	}

	#[test]
	fn reentrant_delivery_is_dropped() {
		let (engine, seen, dispatch) = rig();
		let _held = engine.borrow_mut();
		dispatch.send(InputEvent::PointerMove {
			x: 50.0,
			y: 50.0,
			time: 0.0,
		});
		assert!(seen.borrow().is_empty());
	}

	#[test]
	fn wheel_deltas_become_pixels() {
		assert_eq!(wheel_delta(0.0, 3.0, 0, 600.0), (0.0, 3.0));
		assert_eq!(wheel_delta(1.0, -2.0, 1, 600.0), (16.0, -32.0));
		assert_eq!(wheel_delta(0.0, 1.0, 2, 600.0), (0.0, 600.0));
		assert_eq!(wheel_delta(0.0, 1.0, 2, 0.0), (0.0, 800.0));
	}
}

#[cfg(all(test, target_arch = "wasm32"))]
mod dom_tests {
	use wasm_bindgen_test::wasm_bindgen_test;

	use super::*;
	use crate::components::memory_graph::config::GraphConfig;

	#[wasm_bindgen_test]
	fn destroy_detaches_every_listener() {
		let window = web_sys::window().expect("window");
		let canvas: HtmlCanvasElement = window
			.document()
			.expect("document")
			.create_element("canvas")
			.expect("canvas")
			.dyn_into()
			.expect("canvas element");
		let engine = Rc::new(RefCell::new(GraphEngine::new(GraphConfig::default())));
		let calls = Rc::new(Cell::new(0));
		let counter = calls.clone();
		let sink: IntentSink = Rc::new(move |_: Vec<GraphIntent>| counter.set(counter.get() + 1));
		let mut set = ListenerSet::attach(&canvas, &window, Rc::downgrade(&engine), sink).expect("attach");

		let fire = || {
			let moved = MouseEvent::new("mousemove").expect("mousemove");
			canvas.dispatch_event(&moved).expect("dispatch mousemove");
			let blur = Event::new("blur").expect("blur");
			window.dispatch_event(&blur).expect("dispatch blur");
		};
		fire();
		assert_eq!(calls.get(), 2);

		set.destroy();
		set.destroy();
		assert!(!set.is_alive());
		fire();
		assert_eq!(calls.get(), 2);
		drop(set);
		fire();
		assert_eq!(calls.get(), 2);
	}
}
