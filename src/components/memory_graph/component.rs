use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use leptos::prelude::*;
use log::{error, info, warn};
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, Window};

use super::config::GraphConfig;
use super::engine::GraphEngine;
use super::error::GraphError;
use super::input::GraphIntent;
use super::layout::ForceLayout;
use super::listeners::{IntentSink, ListenerSet};
use super::popover::Placement;
use super::scheduler::FrameScheduler;
use super::surface::CanvasSurface;
use super::types::{GraphData, Node, NodeKind};
use super::viewport::WorldRect;

const PANEL_WIDTH: f64 = 280.0;
const PANEL_HEIGHT: f64 = 150.0;
const LAYOUT_DT: f32 = 0.016;

/// Visible world region reported to the host after the view moves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportInfo {
	/// Visible world rectangle.
	pub bounds: WorldRect,
	/// Current zoom factor.
	pub zoom: f64,
}

#[derive(Clone, Debug, PartialEq)]
struct PopoverView {
	placement: Placement,
	node: Node,
}

#[derive(Clone, Copy)]
struct HostOptions {
	fullscreen: bool,
	layout: bool,
	popover: RwSignal<Option<PopoverView>>,
	on_intent: Option<Callback<GraphIntent>>,
	on_viewport: Option<Callback<ViewportInfo>>,
}

/// Browser-side state living from mount until cleanup.
struct CanvasHost {
	window: Window,
	canvas: HtmlCanvasElement,
	engine: Rc<RefCell<GraphEngine>>,
	surface: RefCell<CanvasSurface>,
	layout: RefCell<Option<ForceLayout>>,
	scheduler: RefCell<FrameScheduler>,
	frame_cb: RefCell<Option<Closure<dyn FnMut()>>>,
	frame_id: Cell<Option<i32>>,
	resize_cb: RefCell<Option<Closure<dyn FnMut()>>>,
	listeners: RefCell<Option<ListenerSet>>,
	options: HostOptions,
	fitted: Cell<bool>,
	last_view: Cell<Option<ViewportInfo>>,
}

impl CanvasHost {
	fn mount(canvas: HtmlCanvasElement, config: GraphConfig, options: HostOptions) -> Result<Rc<Self>, GraphError> {
		let window = web_sys::window().ok_or(GraphError::NoWindow)?;
		let ctx: CanvasRenderingContext2d = canvas
			.get_context("2d")
			.map_err(|err| GraphError::no_context(&err))?
			.ok_or_else(|| GraphError::NoContext("null".into()))?
			.dyn_into()
			.map_err(|value| GraphError::no_context(&value))?;

		let host = Rc::new_cyclic(|weak: &Weak<CanvasHost>| {
			let frame_host = weak.clone();
			Self {
				window: window.clone(),
				canvas: canvas.clone(),
				engine: Rc::new(RefCell::new(GraphEngine::new(config))),
				surface: RefCell::new(CanvasSurface::new(ctx)),
				layout: RefCell::new(None),
				scheduler: RefCell::new(FrameScheduler::new()),
				frame_cb: RefCell::new(Some(Closure::new(move || {
					if let Some(host) = frame_host.upgrade() {
						host.run_frame();
					}
				}))),
				frame_id: Cell::new(None),
				resize_cb: RefCell::new(None),
				listeners: RefCell::new(None),
				options,
				fitted: Cell::new(false),
				last_view: Cell::new(None),
			}
		});

		let weak = Rc::downgrade(&host);
		let sink: IntentSink = Rc::new(move |intents: Vec<GraphIntent>| {
			let Some(host) = weak.upgrade() else {
				return;
			};
			host.forward(intents);
			host.request_frame();
		});
		let listeners = ListenerSet::attach(&canvas, &window, Rc::downgrade(&host.engine), sink)?;
		*host.listeners.borrow_mut() = Some(listeners);

		host.fit_canvas();
		if options.fullscreen {
			let weak = Rc::downgrade(&host);
			let resize = Closure::<dyn FnMut()>::new(move || {
				if let Some(host) = weak.upgrade() {
					host.fit_canvas();
				}
			});
			window
				.add_event_listener_with_callback("resize", resize.as_ref().unchecked_ref())
				.map_err(|err| GraphError::listener("resize", &err))?;
			*host.resize_cb.borrow_mut() = Some(resize);
		}

		let (w, h) = host.engine.borrow().size();
		info!("memory graph canvas mounted at {w}x{h}");
		Ok(host)
	}

	/// Matches the backing store to the element's CSS size and pixel ratio.
	fn fit_canvas(&self) {
		let (width, height) = if self.options.fullscreen {
			let dim = |v: Result<JsValue, JsValue>, fallback: f64| v.ok().and_then(|v| v.as_f64()).unwrap_or(fallback);
			(dim(self.window.inner_width(), 800.0), dim(self.window.inner_height(), 600.0))
		} else {
			let parent = self.canvas.parent_element();
			let dim = |v: Option<i32>, fallback: f64| v.filter(|&v| v > 0).map_or(fallback, f64::from);
			(
				dim(parent.as_ref().map(|p| p.client_width()), 800.0),
				dim(parent.as_ref().map(|p| p.client_height()), 600.0),
			)
		};
		let ratio = self.window.device_pixel_ratio();
		let ratio = if ratio.is_finite() && ratio > 0.0 {
			ratio
		} else {
			warn!("device pixel ratio unavailable, drawing at 1x");
			1.0
		};
		self.surface.borrow_mut().resize(&self.canvas, width, height, ratio);
		self.engine.borrow_mut().resize(width, height);
		self.request_frame();
	}

	fn set_data(&self, data: GraphData) {
		if self.options.layout {
			*self.layout.borrow_mut() = Some(ForceLayout::new(&data));
		}
		let intents = self.engine.borrow_mut().set_data(data);
		self.forward(intents);
		{
			let mut engine = self.engine.borrow_mut();
			if !self.fitted.get() && !engine.nodes().is_empty() {
				engine.fit_to_nodes();
				self.fitted.set(true);
			}
		}
		self.request_frame();
	}

	fn select(&self, id: Option<&str>) {
		self.engine.borrow_mut().select(id);
		self.request_frame();
	}

	fn highlight(&self, ids: Vec<String>) {
		self.engine.borrow_mut().set_highlights(ids);
		self.request_frame();
	}

	fn forward(&self, intents: Vec<GraphIntent>) {
		let Some(callback) = self.options.on_intent else {
			return;
		};
		for intent in intents {
			callback.run(intent);
		}
	}

	fn layout_active(&self) -> bool {
		self.layout.borrow().as_ref().is_some_and(|l| !l.is_settled())
	}

	/// Arms a frame if anything needs drawing and none is pending.
	fn request_frame(&self) {
		if !self.engine.borrow().needs_frame() && !self.layout_active() {
			return;
		}
		if self.scheduler.borrow_mut().request_frame() {
			self.schedule();
		}
	}

	fn schedule(&self) {
		let Some(id) = self.frame_cb.borrow().as_ref().map(|cb| {
			self.window
				.request_animation_frame(cb.as_ref().unchecked_ref())
				.map_err(|err| GraphError::animation_frame(&err))
		}) else {
			return;
		};
		match id {
			Ok(id) => self.frame_id.set(Some(id)),
			Err(err) => {
				error!("{err}");
				self.scheduler.borrow_mut().frame_done(false);
			}
		}
	}

	fn run_frame(&self) {
		self.frame_id.set(None);
		let mut layout_moving = false;
		if let Some(layout) = self.layout.borrow_mut().as_mut() {
			let mut engine = self.engine.borrow_mut();
			layout_moving = layout.step(engine.nodes(), LAYOUT_DT);
			layout.write_back(&mut engine);
		}
		let report = self.engine.borrow_mut().frame(&mut *self.surface.borrow_mut());
		self.publish();
		let moving = report.moving || layout_moving || self.engine.borrow().needs_frame();
		if self.scheduler.borrow_mut().frame_done(moving) {
			self.schedule();
		}
	}

	/// Pushes the popover placement and visible region out to the page.
	fn publish(&self) {
		let (popover, view) = {
			let engine = self.engine.borrow();
			let popover = engine.render_state().selected_node_id.as_deref().and_then(|id| {
				Some(PopoverView {
					placement: engine.popover_for(id, PANEL_WIDTH, PANEL_HEIGHT)?,
					node: engine.node(id)?.clone(),
				})
			});
			let view = ViewportInfo {
				bounds: engine.world_bounds(),
				zoom: engine.zoom(),
			};
			(popover, view)
		};
		if self.options.popover.with_untracked(|current| *current != popover) {
			self.options.popover.set(popover);
		}
		if self.last_view.get() != Some(view) {
			self.last_view.set(Some(view));
			if let Some(callback) = self.options.on_viewport {
				callback.run(view);
			}
		}
	}

	/// Detaches every listener and stops the frame loop. Idempotent.
	fn teardown(&self) {
		if let Some(mut listeners) = self.listeners.borrow_mut().take() {
			listeners.destroy();
		}
		self.scheduler.borrow_mut().stop();
		if let Some(id) = self.frame_id.take() {
			let _ = self.window.cancel_animation_frame(id);
		}
		if let Some(resize) = self.resize_cb.borrow_mut().take() {
			let _ = self
				.window
				.remove_event_listener_with_callback("resize", resize.as_ref().unchecked_ref());
		}
		if self.frame_cb.borrow_mut().take().is_some() {
			info!("memory graph canvas torn down");
		}
	}
}

impl Drop for CanvasHost {
	fn drop(&mut self) {
		self.teardown();
	}
}

/// Interactive canvas for a document/memory graph.
///
/// Clicking, hovering, and dragging are reported through `on_intent`; the
/// host decides what becomes selected and passes it back via `selected`.
#[component]
pub fn MemoryGraphCanvas(
	/// Nodes and edges to show. Replacing it keeps an in-progress drag.
	#[prop(into)]
	data: Signal<GraphData>,
	/// Tuning and colours; defaults when omitted.
	#[prop(optional)]
	config: Option<GraphConfig>,
	/// Id of the node whose detail panel is open.
	#[prop(optional, into)]
	selected: Option<Signal<Option<String>>>,
	/// Ids drawn with a highlight outline.
	#[prop(optional, into)]
	highlights: Option<Signal<Vec<String>>>,
	/// Hover, click, and drag notifications.
	#[prop(optional, into)]
	on_intent: Option<Callback<GraphIntent>>,
	/// Called when the visible region changes.
	#[prop(optional, into)]
	on_viewport: Option<Callback<ViewportInfo>>,
	/// Size the canvas to the window instead of its parent.
	#[prop(default = false)]
	fullscreen: bool,
	/// Run a force layout over the data instead of using its coordinates as-is.
	#[prop(default = false)]
	layout: bool,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let host = StoredValue::new_local(None::<Rc<CanvasHost>>);
	let popover = RwSignal::new(None::<PopoverView>);
	let options = HostOptions {
		fullscreen,
		layout,
		popover,
		on_intent,
		on_viewport,
	};
	let config = config.unwrap_or_default();

	Effect::new(move |_| {
		let data = data.get();
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let mounted = host.with_value(|h| h.clone());
		let current = match mounted {
			Some(current) => current,
			None => match CanvasHost::mount(canvas.into(), config.clone(), options) {
				Ok(created) => {
					if let Some(id) = selected.and_then(|s| s.get_untracked()) {
						created.select(Some(&id));
					}
					if let Some(ids) = highlights.map(|h| h.get_untracked()) {
						created.highlight(ids);
					}
					host.set_value(Some(created.clone()));
					created
				}
				Err(err) => {
					error!("memory graph setup failed: {err}");
					return;
				}
			},
		};
		current.set_data(data);
	});

	Effect::new(move |_| {
		let Some(selected) = selected else {
			return;
		};
		let id = selected.get();
		host.with_value(|h| {
			if let Some(h) = h {
				h.select(id.as_deref());
			}
		});
	});

	Effect::new(move |_| {
		let Some(highlights) = highlights else {
			return;
		};
		let ids = highlights.get();
		host.with_value(|h| {
			if let Some(h) = h {
				h.highlight(ids);
			}
		});
	});

	on_cleanup(move || {
		let _ = host.try_update_value(|h| {
			if let Some(h) = h.take() {
				h.teardown();
			}
		});
	});

	view! {
		<div class="memory-graph" style="position: relative; width: 100%; height: 100%; overflow: hidden;">
			<canvas
				node_ref=canvas_ref
				class="memory-graph-canvas"
				style="display: block; touch-action: none; cursor: grab;"
			/>
			{move || popover.get().map(|popover| view! { <NodePopover popover=popover /> })}
		</div>
	}
}

#[component]
fn NodePopover(popover: PopoverView) -> impl IntoView {
	let Placement {
		x,
		y,
		width,
		height,
		connector,
		..
	} = popover.placement;
	let (title, body, meta) = describe(&popover.node);
	let style = format!(
		"position: absolute; left: {x}px; top: {y}px; width: {width}px; max-height: {height}px; overflow: hidden;"
	);

	view! {
		<svg
			class="graph-popover-connector"
			style="position: absolute; inset: 0; width: 100%; height: 100%; pointer-events: none; overflow: visible;"
		>
			<line
				x1=connector.from.0.to_string()
				y1=connector.from.1.to_string()
				x2=connector.to.0.to_string()
				y2=connector.to.1.to_string()
				stroke="#94a3b8"
				stroke-width="1.5"
				stroke-dasharray="4 3"
			/>
		</svg>
		<div class="graph-popover" style=style>
			<h3>{title}</h3>
			<p>{body}</p>
			<span class="graph-popover-meta">{meta}</span>
		</div>
	}
}

/// Title, body, and a one-line status for the detail panel.
fn describe(node: &Node) -> (String, String, String) {
	match &node.kind {
		NodeKind::Document(doc) => (
			doc.title.clone(),
			doc.summary.clone().unwrap_or_default(),
			doc.doc_type.clone(),
		),
		NodeKind::Memory(memory) => {
			let status = if memory.is_forgotten {
				"forgotten".to_string()
			} else if let Some(at) = &memory.forget_after {
				format!("expires {at}")
			} else if memory.is_latest {
				"latest".to_string()
			} else {
				"superseded".to_string()
			};
			(format!("Memory v{}", memory.version), memory.content.clone(), status)
		}
	}
}

#[cfg(all(test, target_arch = "wasm32"))]
mod dom_tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use wasm_bindgen_test::wasm_bindgen_test;
	use web_sys::{MouseEvent, MouseEventInit};

	use super::*;
	use crate::components::memory_graph::types::MemoryData;

	fn move_to(canvas: &HtmlCanvasElement, x: f64, y: f64) {
		let rect = canvas.get_bounding_client_rect();
		let init = MouseEventInit::new();
		init.set_client_x((rect.left() + x).round() as i32);
		init.set_client_y((rect.top() + y).round() as i32);
		let event = MouseEvent::new_with_mouse_event_init_dict("mousemove", &init).expect("mousemove");
		canvas.dispatch_event(&event).expect("dispatch");
	}

	#[wasm_bindgen_test]
	fn teardown_silences_input_and_stops_frames() {
		let document = web_sys::window().and_then(|w| w.document()).expect("document");
		let canvas: HtmlCanvasElement = document
			.create_element("canvas")
			.expect("canvas")
			.dyn_into()
			.expect("canvas element");
		document.body().expect("body").append_child(&canvas).expect("append");

		let hovers = Arc::new(AtomicUsize::new(0));
		let counter = hovers.clone();
		let options = HostOptions {
			fullscreen: false,
			layout: false,
			popover: RwSignal::new(None),
			on_intent: Some(Callback::new(move |intent: GraphIntent| {
				if matches!(intent, GraphIntent::Hover(Some(_))) {
					counter.fetch_add(1, Ordering::SeqCst);
				}
			})),
			on_viewport: None,
		};
		let host = CanvasHost::mount(canvas.clone(), GraphConfig::default(), options).expect("mount");
		host.set_data(GraphData {
			nodes: vec![Node::memory("m", 0.0, 0.0, 40.0, MemoryData::default())],
			edges: Vec::new(),
		});
		host.engine.borrow_mut().set_view(100.0, 100.0, 1.0);

		move_to(&canvas, 100.0, 100.0);
		assert_eq!(hovers.load(Ordering::SeqCst), 1);

		host.teardown();
		host.teardown();
		assert!(host.listeners.borrow().is_none());
		assert!(host.scheduler.borrow().is_stopped());
		assert!(host.frame_id.get().is_none());

		move_to(&canvas, 400.0, 400.0);
		move_to(&canvas, 100.0, 100.0);
		assert_eq!(hovers.load(Ordering::SeqCst), 1);
		canvas.remove();
	}
}
