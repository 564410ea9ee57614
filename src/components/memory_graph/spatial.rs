//! Uniform screen-space grid for pointer hit-testing.
//!
//! The grid is disposable: it is rebuilt from scratch whenever node
//! positions, pan, or zoom change, never patched incrementally.

use std::collections::HashMap;

use super::types::{Footprint, Node};
use super::viewport::ViewportState;

#[derive(Clone, Copy, Debug)]
struct Entry {
	sx: f64,
	sy: f64,
	footprint: Footprint,
}

/// Inputs the current grid was built from.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Stamp {
	revision: u64,
	pan_x: f64,
	pan_y: f64,
	zoom: f64,
	len: usize,
}

/// Grid of node indices bucketed by the cell containing their screen centre.
#[derive(Debug)]
pub struct SpatialIndex {
	cell_size: f64,
	cells: HashMap<(i64, i64), Vec<usize>>,
	entries: Vec<Entry>,
	/// Cells a footprint can reach beyond the one holding its centre.
	reach: i64,
	stamp: Option<Stamp>,
}

impl SpatialIndex {
	/// An empty grid with square cells of `cell_size` pixels.
	pub fn new(cell_size: f64) -> Self {
		Self {
			cell_size: if cell_size.is_finite() && cell_size >= 1.0 { cell_size } else { 64.0 },
			cells: HashMap::new(),
			entries: Vec::new(),
			reach: 1,
			stamp: None,
		}
	}

	/// Number of indexed nodes.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether no nodes are indexed.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Rebuilds only if positions (`revision`), pan, or zoom moved since the last build.
	/// Returns whether a rebuild happened.
	pub fn refresh(&mut self, nodes: &[Node], viewport: &ViewportState, revision: u64) -> bool {
		let stamp = Stamp {
			revision,
			pan_x: viewport.pan_x,
			pan_y: viewport.pan_y,
			zoom: viewport.zoom,
			len: nodes.len(),
		};
		if self.stamp == Some(stamp) {
			return false;
		}
		self.rebuild(nodes, viewport);
		self.stamp = Some(stamp);
		true
	}

	/// Forces the next `refresh` to rebuild.
	pub fn invalidate(&mut self) {
		self.stamp = None;
	}

	/// O(n) rebuild. Insertion order follows `nodes`, which is paint order.
	pub fn rebuild(&mut self, nodes: &[Node], viewport: &ViewportState) {
		for bucket in self.cells.values_mut() {
			bucket.clear();
		}
		self.entries.clear();
		self.entries.reserve(nodes.len());
		self.stamp = None;

		let mut max_extent: f64 = 0.0;
		for (index, node) in nodes.iter().enumerate() {
			let (sx, sy) = viewport.world_to_screen(node.x, node.y);
			let footprint = node.footprint(viewport.zoom);
			self.entries.push(Entry { sx, sy, footprint });
			if !sx.is_finite() || !sy.is_finite() {
				continue;
			}
			let (hw, hh) = footprint.half_extents();
			max_extent = max_extent.max(hw).max(hh);
			self.cells.entry(self.cell_of(sx, sy)).or_default().push(index);
		}
		self.cells.retain(|_, bucket| !bucket.is_empty());
		self.reach = ((max_extent / self.cell_size).ceil() as i64).clamp(1, 64);
	}

	/// Index of the topmost node whose footprint contains the screen point.
	pub fn query_point(&self, x: f64, y: f64) -> Option<usize> {
		if !x.is_finite() || !y.is_finite() || self.entries.is_empty() {
			return None;
		}
		let (cx, cy) = self.cell_of(x, y);
		let mut best: Option<usize> = None;
		for gx in (cx - self.reach)..=(cx + self.reach) {
			for gy in (cy - self.reach)..=(cy + self.reach) {
				let Some(bucket) = self.cells.get(&(gx, gy)) else {
					continue;
				};
				// Buckets are in insertion order; the first reverse hit is that bucket's topmost.
				let hit = bucket.iter().rev().copied().find(|&index| {
					let entry = &self.entries[index];
					entry.footprint.contains(x - entry.sx, y - entry.sy)
				});
				if let Some(index) = hit {
					best = Some(best.map_or(index, |b| b.max(index)));
				}
			}
		}
		best
	}

	/// Convenience wrapper returning the node itself.
	pub fn query_node<'a>(&self, nodes: &'a [Node], x: f64, y: f64) -> Option<&'a Node> {
		self.query_point(x, y).and_then(|index| nodes.get(index))
	}

	fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
		(
			(x / self.cell_size).floor() as i64,
			(y / self.cell_size).floor() as i64,
		)
	}
}
