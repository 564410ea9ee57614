//! Data-layer seam: where node and edge arrays come from.

use std::collections::HashSet;

use log::debug;

use super::types::GraphData;
use super::viewport::WorldRect;

/// Supplies the graph elements relevant to a world-space region.
pub trait GraphSource {
	/// Nodes inside `bounds` plus the edges touching them.
	fn fetch_viewport(&self, bounds: &WorldRect) -> GraphData;
}

/// A fully loaded graph served region by region.
#[derive(Clone, Debug, Default)]
pub struct InMemorySource {
	data: GraphData,
}

impl InMemorySource {
	/// Serves `data`.
	pub fn new(data: GraphData) -> Self {
		Self { data }
	}

	/// Everything this source holds.
	pub fn data(&self) -> &GraphData {
		&self.data
	}
}

impl GraphSource for InMemorySource {
	/// Nodes whose centre lies inside `bounds`, plus every edge touching one
	/// of them. Edges may reference nodes outside the region.
	fn fetch_viewport(&self, bounds: &WorldRect) -> GraphData {
		let nodes: Vec<_> = self
			.data
			.nodes
			.iter()
			.filter(|n| bounds.contains(n.x, n.y))
			.cloned()
			.collect();
		let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
		let edges = self
			.data
			.edges
			.iter()
			.filter(|e| ids.contains(e.source.as_str()) || ids.contains(e.target.as_str()))
			.cloned()
			.collect();
		GraphData { nodes, edges }
	}
}

/// Decides when the visible region changed enough to fetch again.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FetchTracker {
	/// Fraction of the view added on every side of a fetched region.
	padding: f64,
	/// Zoom ratio (either direction) that forces a refetch.
	zoom_ratio: f64,
	last: Option<(WorldRect, f64)>,
}

impl Default for FetchTracker {
	fn default() -> Self {
		Self::new(0.5, 2.0)
	}
}

impl FetchTracker {
	/// A tracker padding fetches by `padding` of the view and refetching when zoom changes by more than `zoom_ratio`.
	pub fn new(padding: f64, zoom_ratio: f64) -> Self {
		Self {
			padding: padding.max(0.0),
			zoom_ratio: zoom_ratio.max(1.0),
			last: None,
		}
	}

	/// The region covered by the last fetch.
	pub fn last_region(&self) -> Option<WorldRect> {
		self.last.map(|(rect, _)| rect)
	}

	/// Whether the view has left the last fetched region or changed scale enough.
	pub fn should_fetch(&self, view: &WorldRect, zoom: f64) -> bool {
		let Some((region, last_zoom)) = self.last else {
			return true;
		};
		if !region.encloses(view) {
			return true;
		}
		let ratio = zoom / last_zoom;
		!ratio.is_finite() || ratio > self.zoom_ratio || ratio < 1.0 / self.zoom_ratio
	}

	/// Returns the padded region to fetch when a fetch is due, and records it.
	pub fn next_fetch(&mut self, view: &WorldRect, zoom: f64) -> Option<WorldRect> {
		if !self.should_fetch(view, zoom) {
			return None;
		}
		let region = view.padded(self.padding);
		debug!(
			"fetching region ({:.0}, {:.0})..({:.0}, {:.0}) at zoom {zoom:.3}",
			region.min_x, region.min_y, region.max_x, region.max_y
		);
		self.last = Some((region, zoom));
		Some(region)
	}

	/// Forgets the last fetch so the next check always fetches.
	pub fn reset(&mut self) {
		self.last = None;
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::components::memory_graph::types::{DocumentData, Edge, EdgeType, MemoryData, Node};

	fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> WorldRect {
		WorldRect {
			min_x,
			min_y,
			max_x,
			max_y,
		}
	}

	#[test]
	fn in_memory_source_filters_by_region() {
		let source = InMemorySource::new(GraphData {
			nodes: vec![
				Node::document("d", 10.0, 10.0, 20.0, DocumentData::default()),
				Node::memory("m1", 50.0, 50.0, 10.0, MemoryData::default()),
				Node::memory("m2", 500.0, 500.0, 10.0, MemoryData::default()),
				Node::memory("m3", 900.0, 900.0, 10.0, MemoryData::default()),
			],
			edges: vec![
				Edge::new("d", "m1", EdgeType::DocMemory),
				Edge::new("m1", "m2", EdgeType::Version),
				Edge::new("m2", "m3", EdgeType::Version),
			],
		});
		let page = source.fetch_viewport(&rect(0.0, 0.0, 100.0, 100.0));
		let ids: Vec<&str> = page.nodes.iter().map(|n| n.id.as_str()).collect();
		assert_eq!(ids, vec!["d", "m1"]);
		assert_eq!(page.edges.len(), 2);
		assert!(source.fetch_viewport(&rect(1000.0, 1000.0, 2000.0, 2000.0)).nodes.is_empty());
	}

	#[test]
	fn tracker_fetches_on_first_use_and_material_change() {
		let mut tracker = FetchTracker::default();
		let view = rect(0.0, 0.0, 100.0, 100.0);
		assert_eq!(tracker.next_fetch(&view, 1.0), Some(rect(-50.0, -50.0, 150.0, 150.0)));
		assert_eq!(tracker.next_fetch(&view, 1.0), None);
		// Small pan stays inside the padded region.
		assert_eq!(tracker.next_fetch(&rect(40.0, 0.0, 140.0, 100.0), 1.0), None);
		// Modest zoom change stays under the ratio.
		assert_eq!(tracker.next_fetch(&view, 1.8), None);
		assert!(tracker.should_fetch(&view, 2.5));
		assert!(tracker.should_fetch(&view, 0.4));
		assert!(tracker.should_fetch(&rect(100.0, 0.0, 200.0, 100.0), 1.0));
		tracker.reset();
		assert!(tracker.should_fetch(&view, 1.0));
		assert_eq!(tracker.last_region(), None);
	}
}
