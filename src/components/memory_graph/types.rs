//! Graph data model and per-frame interaction state.

use std::collections::HashSet;

/// Payload carried by a document node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentData {
	/// Display title.
	pub title: String,
	/// Short abstract, when the source has one.
	pub summary: Option<String>,
	/// Kind of source, e.g. `pdf`.
	pub doc_type: String,
}

/// Payload carried by a memory node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryData {
	/// The remembered text.
	pub content: String,
	/// Version number, starting at 1.
	pub version: u32,
	/// Newest version of this fact.
	pub is_latest: bool,
	/// Soft-deleted.
	pub is_forgotten: bool,
	/// Opaque timestamp after which the memory is scheduled to be forgotten.
	pub forget_after: Option<String>,
}

/// Node variant. Geometry and painting switch on this exhaustively.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
	/// A source document, drawn as a card.
	Document(DocumentData),
	/// A memory, drawn as a disc.
	Memory(MemoryData),
}

/// A graph node positioned in world coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
	/// Stable id, unique within a `GraphData`.
	pub id: String,
	/// World x.
	pub x: f64,
	/// World y.
	pub y: f64,
	/// World-space diameter (memories) or edge length (documents).
	pub size: f64,
	/// CSS colour for the outline.
	pub border_color: String,
	/// Kind-specific payload.
	pub kind: NodeKind,
	/// Pinned position while dragged; `None` when free.
	pub fx: Option<f64>,
	/// Pinned y while dragged.
	pub fy: Option<f64>,
	/// Currently held by the pointer.
	pub is_dragging: bool,
}

impl Node {
	/// A free document node.
	pub fn document(id: impl Into<String>, x: f64, y: f64, size: f64, data: DocumentData) -> Self {
		Self::new(id.into(), x, y, size, NodeKind::Document(data))
	}

	/// A free memory node.
	pub fn memory(id: impl Into<String>, x: f64, y: f64, size: f64, data: MemoryData) -> Self {
		Self::new(id.into(), x, y, size, NodeKind::Memory(data))
	}

	fn new(id: String, x: f64, y: f64, size: f64, kind: NodeKind) -> Self {
		Self {
			id,
			x,
			y,
			size,
			border_color: "#64748b".into(),
			kind,
			fx: None,
			fy: None,
			is_dragging: false,
		}
	}

	/// Replaces the border colour.
	pub fn with_border(mut self, color: impl Into<String>) -> Self {
		self.border_color = color.into();
		self
	}

	/// Whether this is a document card.
	pub fn is_document(&self) -> bool {
		matches!(self.kind, NodeKind::Document(_))
	}

	/// Whether a pin holds the node in place.
	pub fn is_pinned(&self) -> bool {
		self.fx.is_some() || self.fy.is_some()
	}

	/// Pins the node at a world position, keeping `x, y` in sync.
	pub fn pin(&mut self, x: f64, y: f64) {
		self.fx = Some(x);
		self.fy = Some(y);
		self.x = x;
		self.y = y;
	}

	/// Clears the pin.
	pub fn unpin(&mut self) {
		self.fx = None;
		self.fy = None;
		self.is_dragging = false;
	}

	/// Painted footprint at the given zoom, centred on the node's screen position.
	pub fn footprint(&self, zoom: f64) -> Footprint {
		let s = (self.size * zoom).max(0.0);
		match self.kind {
			NodeKind::Document(_) => Footprint::Card {
				half_w: s * 0.7,
				half_h: s * 0.45,
			},
			NodeKind::Memory(_) => Footprint::Disc { radius: s * 0.5 },
		}
	}
}

/// Screen-space shape used for both painting bounds and hit-testing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Footprint {
	/// Document card: `1.4 × size` wide, `0.9 × size` tall.
	Card { half_w: f64, half_h: f64 },
	/// Memory hexagon, tested as its circumscribed circle.
	Disc { radius: f64 },
}

impl Footprint {
	/// Whether an offset from the node centre lies inside the footprint.
	pub fn contains(&self, dx: f64, dy: f64) -> bool {
		match *self {
			Footprint::Card { half_w, half_h } => dx.abs() <= half_w && dy.abs() <= half_h,
			Footprint::Disc { radius } => dx * dx + dy * dy <= radius * radius,
		}
	}

	/// Half width and half height in pixels.
	pub fn half_extents(&self) -> (f64, f64) {
		match *self {
			Footprint::Card { half_w, half_h } => (half_w, half_h),
			Footprint::Disc { radius } => (radius, radius),
		}
	}

	/// Radius used to trim edges and place connectors.
	pub fn radius(&self) -> f64 {
		match *self {
			Footprint::Card { half_w, half_h } => half_w.min(half_h),
			Footprint::Disc { radius } => radius,
		}
	}
}

/// Edge category; decides colour, width, and arrowheads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeType {
	/// Document to memory.
	DocMemory,
	/// Memory to similar memory.
	Similarity,
	/// Older to newer version.
	Version,
}

/// A link between two nodes, referenced by id and resolved each frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
	/// Id of the source node.
	pub source: String,
	/// Id of the target node.
	pub target: String,
	/// Strength in `[0, 1]` for similarity links.
	pub similarity: Option<f64>,
	/// Relationship kind.
	pub edge_type: EdgeType,
}

impl Edge {
	/// An edge without a similarity score.
	pub fn new(source: impl Into<String>, target: impl Into<String>, edge_type: EdgeType) -> Self {
		Self {
			source: source.into(),
			target: target.into(),
			similarity: None,
			edge_type,
		}
	}

	/// A similarity edge with a 0..=1 score.
	pub fn similarity(source: impl Into<String>, target: impl Into<String>, value: f64) -> Self {
		Self {
			similarity: Some(value.clamp(0.0, 1.0)),
			..Self::new(source, target, EdgeType::Similarity)
		}
	}

	/// Whether `id` is either endpoint.
	pub fn touches(&self, id: &str) -> bool {
		self.source == id || self.target == id
	}
}

/// A page of graph elements handed over by the data layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphData {
	/// Nodes in paint order.
	pub nodes: Vec<Node>,
	/// Edges between them.
	pub edges: Vec<Edge>,
}

/// Interaction state consumed by the renderer each frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderState {
	/// Node whose detail panel is open.
	pub selected_node_id: Option<String>,
	/// Node under the pointer.
	pub hovered_node_id: Option<String>,
	/// Nodes drawn with a highlight outline.
	pub highlight_ids: HashSet<String>,
	/// Smoothed 0..=1 fade strength for elements unrelated to the selection.
	pub dim_progress: f64,
	/// Node the fade is centred on. Outlives the selection until the fade-out ends.
	pub dim_focus_id: Option<String>,
}

impl RenderState {
	/// Eases `dim_progress` toward 1 while something is selected, toward 0
	/// otherwise. Returns whether it is still moving.
	pub fn ease_dim(&mut self, rate: f64) -> bool {
		if self.selected_node_id.is_some() && self.dim_focus_id != self.selected_node_id {
			self.dim_focus_id = self.selected_node_id.clone();
		}
		let target = if self.selected_node_id.is_some() { 1.0 } else { 0.0 };
		let next = self.dim_progress + (target - self.dim_progress) * rate.clamp(0.0, 1.0);
		self.dim_progress = if (target - next).abs() < 0.01 { target } else { next };
		if self.dim_progress == 0.0 && self.selected_node_id.is_none() {
			self.dim_focus_id = None;
		}
		self.dim_progress != target
	}

	/// The node whose neighbourhood stays bright while dimming is visible.
	pub fn dim_focus(&self) -> Option<&str> {
		self.selected_node_id.as_deref().or(self.dim_focus_id.as_deref())
	}

	/// Whether `id` is the selection.
	pub fn is_selected(&self, id: &str) -> bool {
		self.selected_node_id.as_deref() == Some(id)
	}

	/// Whether `id` is hovered.
	pub fn is_hovered(&self, id: &str) -> bool {
		self.hovered_node_id.as_deref() == Some(id)
	}

	/// Whether `id` is highlighted.
	pub fn is_highlighted(&self, id: &str) -> bool {
		self.highlight_ids.contains(id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn document_footprint_is_a_wide_card() {
		let node = Node::document("d", 0.0, 0.0, 20.0, DocumentData::default());
		let fp = node.footprint(1.0);
		assert!(fp.contains(13.9, 0.0));
		assert!(!fp.contains(14.1, 0.0));
		assert!(fp.contains(0.0, 8.9));
		assert!(!fp.contains(0.0, 9.1));
	}

	#[test]
	fn memory_footprint_is_a_circle() {
		let node = Node::memory("m", 0.0, 0.0, 20.0, MemoryData::default());
		let fp = node.footprint(2.0);
		assert!(fp.contains(14.0, 14.0));
		assert!(!fp.contains(15.0, 15.0));
		assert_eq!(fp.radius(), 20.0);
	}

	#[test]
	fn pinning_keeps_position_in_sync() {
		let mut node = Node::memory("m", 1.0, 2.0, 10.0, MemoryData::default());
		node.pin(5.0, 6.0);
		assert!(node.is_pinned());
		assert_eq!((node.x, node.y), (5.0, 6.0));
		node.unpin();
		assert!(!node.is_pinned());
		assert_eq!((node.x, node.y), (5.0, 6.0));
	}

	#[test]
	fn dim_eases_and_settles() {
		let mut state = RenderState {
			selected_node_id: Some("a".into()),
			..Default::default()
		};
		let mut ticks = 0;
		while state.ease_dim(0.15) {
			ticks += 1;
			assert!(ticks < 100);
		}
		assert_eq!(state.dim_progress, 1.0);
		state.selected_node_id = None;
		assert!(state.ease_dim(0.15));
		assert_eq!(state.dim_focus(), Some("a"));
		while state.ease_dim(0.15) {}
		assert_eq!(state.dim_progress, 0.0);
		assert_eq!(state.dim_focus(), None);
	}
}
