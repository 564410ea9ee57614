//! Force-directed layout used when the data layer ships nodes without
//! meaningful coordinates.

use std::collections::HashMap;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};
use log::debug;

use super::engine::GraphEngine;
use super::types::{EdgeType, GraphData, Node};

/// Largest per-tick node displacement (world units) still counted as at rest.
const REST_DISTANCE: f32 = 0.05;
/// Consecutive resting ticks before the layout reports settled.
const REST_TICKS: u32 = 20;
/// Hard stop so a jittering simulation cannot keep the frame loop alive.
const MAX_TICKS: u32 = 900;

/// A `force_graph` simulation keyed by node id.
pub struct ForceLayout {
	graph: ForceGraph<String, ()>,
	indices: HashMap<String, DefaultNodeIdx>,
	resting: u32,
	ticks: u32,
}

impl ForceLayout {
	/// Seeds the simulation from the nodes' current positions.
	pub fn new(data: &GraphData) -> Self {
		let mut graph = ForceGraph::new(SimulationParameters {
			force_charge: 320.0,
			force_spring: 0.04,
			force_max: 140.0,
			node_speed: 3000.0,
			damping_factor: 0.85,
		});
		let mut indices = HashMap::with_capacity(data.nodes.len());
		for node in &data.nodes {
			let (x, y) = (finite(node.x), finite(node.y));
			let idx = graph.add_node(NodeData {
				x: x as f32,
				y: y as f32,
				mass: mass_of(node),
				is_anchor: node.is_pinned(),
				user_data: node.id.clone(),
			});
			indices.insert(node.id.clone(), idx);
		}
		for edge in &data.edges {
			// Similarity links are drawn but do not pull.
			if edge.edge_type == EdgeType::Similarity {
				continue;
			}
			if let (Some(&a), Some(&b)) = (indices.get(&edge.source), indices.get(&edge.target)) {
				graph.add_edge(a, b, EdgeData::default());
			}
		}
		debug!("layout seeded with {} nodes", indices.len());
		Self {
			graph,
			indices,
			resting: 0,
			ticks: 0,
		}
	}

	/// Number of simulated nodes.
	pub fn len(&self) -> usize {
		self.indices.len()
	}

	/// Whether there is nothing to simulate.
	pub fn is_empty(&self) -> bool {
		self.indices.is_empty()
	}

	/// Whether the layout has come to rest or hit its tick cap.
	pub fn is_settled(&self) -> bool {
		self.resting >= REST_TICKS || self.ticks >= MAX_TICKS
	}

	/// Wakes a settled layout, e.g. after a drag moved a node.
	pub fn reheat(&mut self) {
		self.resting = 0;
		self.ticks = 0;
	}

	/// Advances the simulation one step. Pinned nodes in `nodes` act as
	/// anchors at their pin. Returns whether the layout is still moving.
	pub fn step(&mut self, nodes: &[Node], dt: f32) -> bool {
		let pins: HashMap<&str, (f64, f64)> = nodes
			.iter()
			.filter_map(|n| Some((n.id.as_str(), (n.fx?, n.fy?))))
			.collect();
		if !pins.is_empty() {
			self.reheat();
		}
		if self.is_settled() {
			return false;
		}

		let before = self.snapshot();
		self.graph.visit_nodes_mut(|node| match pins.get(node.data.user_data.as_str()) {
			Some(&(x, y)) => {
				node.data.x = x as f32;
				node.data.y = y as f32;
				node.data.is_anchor = true;
			}
			None => node.data.is_anchor = false,
		});
		self.graph.update(dt);
		self.ticks += 1;

		let mut largest: f32 = 0.0;
		self.graph.visit_nodes(|node| {
			if let Some(&(x, y)) = before.get(&node.index()) {
				largest = largest.max((node.x() - x).abs()).max((node.y() - y).abs());
			}
		});
		if largest.is_finite() && largest < REST_DISTANCE {
			self.resting += 1;
		} else {
			self.resting = 0;
		}
		if self.is_settled() {
			debug!("layout settled after {} ticks", self.ticks);
		}
		!self.is_settled()
	}

	/// Current position of every simulated node.
	pub fn positions(&self) -> Vec<(String, f64, f64)> {
		let mut out = Vec::with_capacity(self.indices.len());
		self.graph.visit_nodes(|node| {
			out.push((node.data.user_data.clone(), node.x() as f64, node.y() as f64));
		});
		out
	}

	/// Copies positions into the engine. Returns how many nodes moved.
	pub fn write_back(&self, engine: &mut GraphEngine) -> usize {
		let positions = self.positions();
		engine.set_positions(positions.iter().map(|(id, x, y)| (id.as_str(), *x, *y)))
	}

	fn snapshot(&self) -> HashMap<DefaultNodeIdx, (f32, f32)> {
		let mut map = HashMap::with_capacity(self.indices.len());
		self.graph.visit_nodes(|node| {
			map.insert(node.index(), (node.x(), node.y()));
		});
		map
	}
}

fn mass_of(node: &Node) -> f32 {
	let size = if node.size.is_finite() { node.size.max(1.0) } else { 1.0 };
	(size / 2.0) as f32
}

fn finite(value: f64) -> f64 {
	if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::memory_graph::config::GraphConfig;
	use crate::components::memory_graph::input::InputEvent;
	use crate::components::memory_graph::types::{DocumentData, Edge, MemoryData};

	fn small_graph() -> GraphData {
		GraphData {
			nodes: vec![
				Node::document("d", 0.0, 0.0, 30.0, DocumentData::default()),
				Node::memory("a", 40.0, 10.0, 16.0, MemoryData::default()),
				Node::memory("b", -30.0, 25.0, 16.0, MemoryData::default()),
			],
			edges: vec![
				Edge::new("d", "a", EdgeType::DocMemory),
				Edge::new("d", "b", EdgeType::DocMemory),
				Edge::similarity("a", "b", 0.9),
			],
		}
	}

	#[test]
	fn settles_within_the_tick_cap() {
		let data = small_graph();
		let mut layout = ForceLayout::new(&data);
		assert_eq!(layout.len(), 3);
		let mut steps = 0;
		while layout.step(&data.nodes, 0.016) {
			steps += 1;
			assert!(steps <= MAX_TICKS);
		}
		assert!(layout.is_settled());
		assert!(!layout.step(&data.nodes, 0.016));
		assert!(layout.positions().iter().all(|(_, x, y)| x.is_finite() && y.is_finite()));
	}

	#[test]
	fn write_back_leaves_the_dragged_node_alone() {
		let data = small_graph();
		let mut engine = GraphEngine::new(GraphConfig::default());
		engine.resize(800.0, 600.0);
		engine.set_view(400.0, 300.0, 1.0);
		engine.set_data(data.clone());
		engine.handle_input(InputEvent::PointerDown {
			x: 400.0,
			y: 300.0,
			time: 0.0,
		});
		assert_eq!(engine.dragging(), Some("d"));

		let mut layout = ForceLayout::new(&data);
		for _ in 0..10 {
			layout.step(engine.nodes(), 0.016);
		}
		layout.write_back(&mut engine);
		let d = engine.node("d").map(|n| (n.x, n.y));
		assert_eq!(d, Some((0.0, 0.0)));
		assert!(!layout.is_settled());
	}
}
