//! Per-canvas engine: owns the graph arrays and every piece of view state,
//! and sequences each frame as input, then `tick`, then `render`.

use std::collections::HashMap;

use log::{debug, info};

use super::config::GraphConfig;
use super::input::{GraphIntent, InputController, InputEvent, InputTarget};
use super::popover::{Placement, PopoverPlacer, PopoverRequest};
use super::render::{FrameInput, FramePlan, FrameStats, Renderer};
use super::spatial::SpatialIndex;
use super::surface::Surface;
use super::types::{Edge, GraphData, Node, RenderState};
use super::viewport::{ViewportState, WorldRect};

/// Outcome of one scheduled frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameReport {
	/// Counters from the frame that was drawn.
	pub stats: FrameStats,
	/// Something is still animating; schedule another frame.
	pub moving: bool,
}

/// The whole interactive graph for one canvas, independent of the DOM.
pub struct GraphEngine {
	config: GraphConfig,
	nodes: Vec<Node>,
	edges: Vec<Edge>,
	lookup: HashMap<String, usize>,
	viewport: ViewportState,
	index: SpatialIndex,
	input: InputController,
	renderer: Renderer,
	placer: PopoverPlacer,
	state: RenderState,
	/// Bumped whenever node positions or the node set change.
	revision: u64,
	dirty: bool,
	width: f64,
	height: f64,
}

impl GraphEngine {
	/// An empty engine with a zero-sized viewport.
	pub fn new(config: GraphConfig) -> Self {
		Self {
			nodes: Vec::new(),
			edges: Vec::new(),
			lookup: HashMap::new(),
			viewport: ViewportState::new(0.0, 0.0, 1.0, config.viewport),
			index: SpatialIndex::new(config.render.grid_cell),
			input: InputController::new(config.input),
			renderer: Renderer::new(config.render, config.theme.clone()),
			placer: PopoverPlacer::new(config.popover),
			state: RenderState::default(),
			revision: 0,
			dirty: true,
			width: 0.0,
			height: 0.0,
			config,
		}
	}

	/// Settings this engine was built with.
	pub fn config(&self) -> &GraphConfig {
		&self.config
	}

	/// Nodes in paint order.
	pub fn nodes(&self) -> &[Node] {
		&self.nodes
	}

	/// Edges as supplied.
	pub fn edges(&self) -> &[Edge] {
		&self.edges
	}

	/// Looks a node up by id.
	pub fn node(&self, id: &str) -> Option<&Node> {
		self.lookup.get(id).and_then(|&i| self.nodes.get(i))
	}

	/// Current transform.
	pub fn viewport(&self) -> &ViewportState {
		&self.viewport
	}

	/// Selection, hover, highlight, and dim state.
	pub fn render_state(&self) -> &RenderState {
		&self.state
	}

	/// The plan of the last rendered frame.
	pub fn plan(&self) -> &FramePlan {
		self.renderer.plan_ref()
	}

	/// Viewport size in CSS pixels.
	pub fn size(&self) -> (f64, f64) {
		(self.width, self.height)
	}

	/// Id of the node under an active drag.
	pub fn dragging(&self) -> Option<&str> {
		self.input.dragging()
	}

	/// Replaces the node and edge arrays. A node being dragged keeps its pin
	/// if it is still present; otherwise the drag ends.
	pub fn set_data(&mut self, data: GraphData) -> Vec<GraphIntent> {
		let GraphData { mut nodes, edges } = data;
		let mut intents = Vec::new();

		let held = self
			.input
			.dragging()
			.and_then(|id| self.node(id))
			.and_then(|n| Some((n.id.clone(), n.fx?, n.fy?)));
		for node in nodes.iter_mut() {
			node.is_dragging = false;
			node.fx = None;
			node.fy = None;
		}
		if let Some((id, fx, fy)) = held {
			if let Some(node) = nodes.iter_mut().find(|n| n.id == id) {
				node.pin(fx, fy);
				node.is_dragging = true;
			}
		}
		if !self.input.retarget(&nodes) {
			intents.push(GraphIntent::DragEnd);
		}
		if let Some(intent) = self.input.forget_hover(&nodes) {
			self.state.hovered_node_id = None;
			intents.push(intent);
		}

		info!("graph data replaced: {} nodes, {} edges", nodes.len(), edges.len());
		self.lookup = nodes.iter().enumerate().map(|(i, n)| (n.id.clone(), i)).collect();
		self.nodes = nodes;
		self.edges = edges;
		self.touch_positions();
		intents
	}

	/// Writes externally computed positions back. Pinned nodes keep their pin.
	/// Returns how many nodes moved.
	pub fn set_positions<'a>(&mut self, positions: impl IntoIterator<Item = (&'a str, f64, f64)>) -> usize {
		let mut moved = 0;
		for (id, x, y) in positions {
			if !x.is_finite() || !y.is_finite() {
				continue;
			}
			let Some(node) = self.lookup.get(id).and_then(|&i| self.nodes.get_mut(i)) else {
				continue;
			};
			if node.is_pinned() || (node.x == x && node.y == y) {
				continue;
			}
			node.x = x;
			node.y = y;
			moved += 1;
		}
		if moved > 0 {
			self.touch_positions();
		}
		moved
	}

	/// Sets the viewport size. Non-finite or negative sizes become zero.
	pub fn resize(&mut self, width: f64, height: f64) {
		let clean = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
		let (width, height) = (clean(width), clean(height));
		if (width, height) == (self.width, self.height) {
			return;
		}
		self.width = width;
		self.height = height;
		self.index.invalidate();
		self.dirty = true;
	}

	/// Feeds one event through the gesture controller and returns the host intents.
	pub fn handle_input(&mut self, event: InputEvent) -> Vec<GraphIntent> {
		self.index.refresh(&self.nodes, &self.viewport, self.revision);
		let outcome = self.input.handle(
			event,
			InputTarget {
				viewport: &mut self.viewport,
				nodes: &mut self.nodes,
				index: &self.index,
			},
		);
		if outcome.moved_nodes {
			self.revision = self.revision.wrapping_add(1);
		}
		self.dirty |= outcome.redraw || outcome.moved_nodes;
		for intent in &outcome.intents {
			if let GraphIntent::Hover(id) = intent {
				self.state.hovered_node_id = id.clone();
			}
		}
		outcome.intents
	}

	/// Selects a node (or clears the selection); unknown ids clear it.
	pub fn select(&mut self, id: Option<&str>) {
		let id = id.filter(|id| self.lookup.contains_key(*id)).map(str::to_owned);
		if self.state.selected_node_id != id {
			self.state.selected_node_id = id;
			self.dirty = true;
		}
	}

	/// Replaces the set of highlighted node ids.
	pub fn set_highlights<I, S>(&mut self, ids: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.state.highlight_ids = ids.into_iter().map(Into::into).collect();
		self.dirty = true;
	}

	/// Advances viewport animation and dim easing. Returns whether anything is still moving.
	pub fn tick(&mut self) -> bool {
		let before = (self.viewport.pan_x, self.viewport.pan_y, self.viewport.zoom, self.state.dim_progress);
		let viewport_moving = self.viewport.tick();
		let dim_moving = self.state.ease_dim(self.config.render.dim_ease);
		let after = (self.viewport.pan_x, self.viewport.pan_y, self.viewport.zoom, self.state.dim_progress);
		if before != after {
			self.dirty = true;
		}
		viewport_moving || dim_moving
	}

	/// Draws the current state without advancing animations.
	pub fn render(&mut self, surface: &mut impl Surface) -> FrameStats {
		let stats = self.renderer.render(
			FrameInput {
				nodes: &self.nodes,
				edges: &self.edges,
				viewport: &self.viewport,
				state: &self.state,
				width: self.width,
				height: self.height,
			},
			surface,
		);
		self.dirty = false;
		stats
	}

	/// One scheduled frame: `tick` then `render`. Input has already been
	/// applied through `handle_input` by the time the frame runs.
	pub fn frame(&mut self, surface: &mut impl Surface) -> FrameReport {
		let moving = self.tick();
		let stats = self.render(surface);
		FrameReport { stats, moving }
	}

	/// Whether a frame is needed at all. `false` means the loop may sleep.
	pub fn needs_frame(&self) -> bool {
		let dim_target = if self.state.selected_node_id.is_some() { 1.0 } else { 0.0 };
		self.dirty || self.viewport.is_animating() || self.state.dim_progress != dim_target
	}

	/// Marks the frame stale without any other change.
	pub fn request_redraw(&mut self) {
		self.dirty = true;
	}

	/// Animates the view to show every node.
	pub fn fit_to_nodes(&mut self) {
		self.viewport.fit_to_nodes(&self.nodes, self.width, self.height);
		self.dirty = true;
	}

	/// Animates the view to centre a node. Returns `false` for unknown ids.
	pub fn center_on_node(&mut self, id: &str) -> bool {
		let Some((x, y)) = self.node(id).map(|n| (n.x, n.y)) else {
			return false;
		};
		debug!("center on {id}");
		self.viewport.center_on(x, y, self.width, self.height);
		self.dirty = true;
		true
	}

	/// Sets the transform directly, dropping any animation.
	pub fn set_view(&mut self, pan_x: f64, pan_y: f64, zoom: f64) {
		self.viewport = ViewportState::new(pan_x, pan_y, zoom, self.config.viewport);
		self.dirty = true;
	}

	/// World to screen coordinates.
	pub fn world_to_screen(&self, x: f64, y: f64) -> (f64, f64) {
		self.viewport.world_to_screen(x, y)
	}

	/// Screen to world coordinates.
	pub fn screen_to_world(&self, x: f64, y: f64) -> (f64, f64) {
		self.viewport.screen_to_world(x, y)
	}

	/// World rectangle currently on screen.
	pub fn world_bounds(&self) -> WorldRect {
		self.viewport.world_bounds(self.width, self.height)
	}

	/// Current zoom factor.
	pub fn zoom(&self) -> f64 {
		self.viewport.zoom
	}

	/// Topmost node under a screen point.
	pub fn node_at(&mut self, x: f64, y: f64) -> Option<&Node> {
		self.index.refresh(&self.nodes, &self.viewport, self.revision);
		self.index.query_node(&self.nodes, x, y)
	}

	/// Places a `width × height` detail panel next to a node.
	pub fn popover_for(&self, id: &str, width: f64, height: f64) -> Option<Placement> {
		let node = self.node(id)?;
		let (anchor_x, anchor_y) = self.viewport.world_to_screen(node.x, node.y);
		let (hw, hh) = node.footprint(self.viewport.zoom).half_extents();
		Some(self.placer.place(&PopoverRequest {
			anchor_x,
			anchor_y,
			node_radius: hw.max(hh),
			width,
			height,
			container_width: self.width,
			container_height: self.height,
		}))
	}

	fn touch_positions(&mut self) {
		self.revision = self.revision.wrapping_add(1);
		self.dirty = true;
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::components::memory_graph::surface::CommandRecorder;
	use crate::components::memory_graph::types::{DocumentData, EdgeType, MemoryData};

	fn engine_with(nodes: Vec<Node>) -> GraphEngine {
		let mut engine = GraphEngine::new(GraphConfig::default());
		engine.resize(1000.0, 800.0);
		engine.set_data(GraphData { nodes, edges: Vec::new() });
		engine
	}

	fn down(x: f64, y: f64, time: f64) -> InputEvent {
		InputEvent::PointerDown { x, y, time }
	}

	fn mv(x: f64, y: f64, time: f64) -> InputEvent {
		InputEvent::PointerMove { x, y, time }
	}

	fn up(x: f64, y: f64, time: f64) -> InputEvent {
		InputEvent::PointerUp { x, y, time }
	}

	#[test]
	fn click_drag_release_moves_node_without_momentum() {
		let mut engine = engine_with(vec![Node::memory("n", 100.0, 100.0, 20.0, MemoryData::default())]);
		assert_eq!(engine.node_at(100.0, 100.0).map(|n| n.id.clone()), Some("n".to_string()));

		let intents = engine.handle_input(down(100.0, 100.0, 0.0));
		assert!(matches!(intents.as_slice(), [GraphIntent::DragStart { id, .. }] if id == "n"));
		engine.handle_input(mv(150.0, 150.0, 16.0));
		assert_eq!(engine.dragging(), Some("n"));
		let node = engine.node("n").cloned().unwrap();
		assert_eq!((node.x, node.y), engine.screen_to_world(150.0, 150.0));
		assert_eq!((node.x, node.y), (150.0, 150.0));

		let intents = engine.handle_input(up(150.0, 150.0, 600.0));
		assert!(intents.contains(&GraphIntent::DragEnd));
		assert!(!intents.iter().any(|i| matches!(i, GraphIntent::Click(_))));
		assert_eq!(engine.viewport().velocity(), (0.0, 0.0));
		assert!(!engine.viewport().is_animating());
		let node = engine.node("n").unwrap();
		assert_eq!((node.x, node.y, node.is_pinned()), (150.0, 150.0, false));
	}

	#[test]
	fn idle_engine_stops_requesting_frames() {
		let mut engine = engine_with(vec![Node::memory("n", 10.0, 10.0, 20.0, MemoryData::default())]);
		let mut surface = CommandRecorder::new(1000.0, 800.0);
		assert!(engine.needs_frame());
		let report = engine.frame(&mut surface);
		assert!(!report.moving);
		assert!(!engine.needs_frame());

		engine.handle_input(InputEvent::Wheel {
			x: 10.0,
			y: 10.0,
			delta_x: 0.0,
			delta_y: -1.0,
		});
		assert!(engine.needs_frame());
		engine.frame(&mut surface);
		assert!(!engine.needs_frame());
	}

	#[test]
	fn selection_dim_animates_until_settled() {
		let mut engine = engine_with(vec![
			Node::memory("a", 10.0, 10.0, 20.0, MemoryData::default()),
			Node::memory("b", 90.0, 10.0, 20.0, MemoryData::default()),
		]);
		let mut surface = CommandRecorder::new(1000.0, 800.0);
		engine.frame(&mut surface);
		engine.select(Some("a"));
		let mut frames = 0;
		while engine.frame(&mut surface).moving {
			frames += 1;
			assert!(frames < 200);
		}
		assert_eq!(engine.render_state().dim_progress, 1.0);
		assert!(!engine.needs_frame());

		engine.select(Some("missing"));
		assert_eq!(engine.render_state().selected_node_id, None);
	}

	#[test]
	fn deselect_fades_out_gradually() {
		let mut engine = engine_with(vec![
			Node::memory("a", 10.0, 10.0, 20.0, MemoryData::default()),
			Node::memory("b", 90.0, 10.0, 20.0, MemoryData::default()),
		]);
		let mut surface = CommandRecorder::new(1000.0, 800.0);
		let alpha_b = |engine: &GraphEngine| engine.plan().sprites.iter().find(|s| s.index == 1).map(|s| s.alpha);
		engine.frame(&mut surface);
		let resting = alpha_b(&engine).unwrap_or(0.0);
		assert!(resting > 0.0);

		engine.select(Some("a"));
		while engine.frame(&mut surface).moving {}
		let dimmed = alpha_b(&engine).unwrap_or(resting);
		assert!(dimmed < resting * 0.2);

		engine.select(None);
		assert!(engine.frame(&mut surface).moving);
		let first = alpha_b(&engine).unwrap_or(resting);
		assert!(first > dimmed && first < resting);

		let mut previous = first;
		while engine.frame(&mut surface).moving {
			let alpha = alpha_b(&engine).unwrap_or(0.0);
			assert!(alpha >= previous);
			previous = alpha;
		}
		assert_eq!(alpha_b(&engine), Some(resting));
		assert_eq!(engine.render_state().dim_focus(), None);
		assert!(!engine.needs_frame());
	}

	#[test]
	fn replacing_data_keeps_surviving_drag() {
		let mut engine = engine_with(vec![
			Node::memory("a", 100.0, 100.0, 20.0, MemoryData::default()),
			Node::memory("b", 300.0, 100.0, 20.0, MemoryData::default()),
		]);
		engine.handle_input(down(100.0, 100.0, 0.0));
		engine.handle_input(mv(120.0, 130.0, 10.0));

		let intents = engine.set_data(GraphData {
			nodes: vec![
				Node::memory("b", 300.0, 100.0, 20.0, MemoryData::default()),
				Node::memory("a", 0.0, 0.0, 20.0, MemoryData::default()),
			],
			edges: Vec::new(),
		});
		assert!(intents.is_empty());
		assert_eq!(engine.dragging(), Some("a"));
		let a = engine.node("a").unwrap();
		assert_eq!((a.x, a.y, a.fx, a.fy), (120.0, 130.0, Some(120.0), Some(130.0)));
		assert_eq!(engine.nodes().iter().filter(|n| n.is_pinned()).count(), 1);

		engine.handle_input(mv(140.0, 140.0, 20.0));
		assert_eq!(engine.node("a").map(|n| (n.x, n.y)), Some((140.0, 140.0)));

		let intents = engine.set_data(GraphData {
			nodes: vec![Node::memory("b", 300.0, 100.0, 20.0, MemoryData::default())],
			edges: Vec::new(),
		});
		assert_eq!(intents, vec![GraphIntent::DragEnd]);
		assert_eq!(engine.dragging(), None);
	}

	#[test]
	fn layout_write_back_skips_pinned_nodes() {
		let mut engine = engine_with(vec![
			Node::memory("a", 100.0, 100.0, 20.0, MemoryData::default()),
			Node::memory("b", 300.0, 100.0, 20.0, MemoryData::default()),
		]);
		engine.handle_input(down(100.0, 100.0, 0.0));
		let moved = engine.set_positions([("a", 5.0, 5.0), ("b", 7.0, 8.0), ("zz", 1.0, 1.0), ("b", f64::NAN, 0.0)]);
		assert_eq!(moved, 1);
		assert_eq!(engine.node("a").map(|n| (n.x, n.y)), Some((100.0, 100.0)));
		assert_eq!(engine.node("b").map(|n| (n.x, n.y)), Some((7.0, 8.0)));
		assert_eq!(engine.node_at(7.0, 8.0).map(|n| n.id.clone()), Some("b".to_string()));
	}

	#[test]
	fn hover_follows_the_pointer_and_vanishing_nodes() {
		let mut engine = engine_with(vec![Node::document("d", 200.0, 200.0, 40.0, DocumentData::default())]);
		let intents = engine.handle_input(mv(200.0, 200.0, 0.0));
		assert_eq!(intents, vec![GraphIntent::Hover(Some("d".into()))]);
		assert_eq!(engine.render_state().hovered_node_id.as_deref(), Some("d"));
		assert!(engine.handle_input(mv(201.0, 200.0, 5.0)).is_empty());

		let intents = engine.set_data(GraphData::default());
		assert_eq!(intents, vec![GraphIntent::Hover(None)]);
		assert_eq!(engine.render_state().hovered_node_id, None);
	}

	#[test]
	fn center_and_fit_animate_to_rest() {
		let mut engine = engine_with(vec![
			Node::memory("a", -400.0, 0.0, 20.0, MemoryData::default()),
			Node::memory("b", 400.0, 0.0, 20.0, MemoryData::default()),
		]);
		assert!(engine.center_on_node("b"));
		assert!(!engine.center_on_node("nope"));
		let mut ticks = 0;
		while engine.tick() {
			ticks += 1;
			assert!(ticks < 500);
		}
		assert_eq!(engine.world_to_screen(400.0, 0.0), (500.0, 400.0));

		engine.fit_to_nodes();
		while engine.tick() {}
		let bounds = engine.world_bounds();
		assert!(bounds.contains(-410.0, 0.0) && bounds.contains(410.0, 0.0));
		assert!(engine.zoom() <= 1.0);
	}

	#[test]
	fn popover_sits_beside_the_node() {
		let mut engine = engine_with(vec![Node::memory("m", 100.0, 400.0, 20.0, MemoryData::default())]);
		engine.set_view(0.0, 0.0, 1.0);
		let placement = engine.popover_for("m", 240.0, 160.0).unwrap();
		assert_eq!(placement.x, 100.0 + 10.0 + 12.0);
		assert_eq!(placement.connector.from, (110.0, 400.0));
		assert!(engine.popover_for("other", 10.0, 10.0).is_none());
	}

	#[test]
	fn renders_edges_between_loaded_nodes_only() {
		let mut engine = GraphEngine::new(GraphConfig::default());
		engine.resize(400.0, 300.0);
		engine.set_data(GraphData {
			nodes: vec![
				Node::document("d", 50.0, 50.0, 40.0, DocumentData::default()),
				Node::memory("m", 250.0, 50.0, 30.0, MemoryData::default()),
			],
			edges: vec![
				Edge::new("d", "m", EdgeType::DocMemory),
				Edge::new("m", "ghost", EdgeType::Version),
			],
		});
		let mut surface = CommandRecorder::new(400.0, 300.0);
		let stats = engine.render(&mut surface);
		assert_eq!(stats.drawn_edges, 1);
		assert_eq!(stats.skipped_edges, 1);
		assert!(surface.all_finite());
		assert!(engine.plan().draws_node(0) && engine.plan().draws_node(1));
	}
}
