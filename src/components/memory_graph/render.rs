//! Per-frame renderer.
//!
//! Rendering happens in two passes. [`Renderer::plan`] culls, resolves
//! edges, applies level of detail, and groups everything into style batches.
//! [`Renderer::paint`] then turns the plan into as few surface calls as the
//! batches allow.

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use super::config::{RenderConfig, Theme};
use super::surface::Surface;
use super::types::{Edge, EdgeType, Footprint, Node, NodeKind, RenderState};
use super::viewport::ViewportState;

const MIN_SEGMENT: f64 = 1.0;
const MIN_LINE_WIDTH: f64 = 1.0;

/// A screen-space line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
	/// Start x.
	pub x1: f64,
	/// Start y.
	pub y1: f64,
	/// End x.
	pub x2: f64,
	/// End y.
	pub y2: f64,
}

/// Stroke style shared by every segment of a batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeStyle {
	/// Stroke colour.
	pub color: &'static str,
	/// Line width in pixels.
	pub width: f64,
	/// Whether the dim fade applies.
	pub dimmed: bool,
}

/// Edges drawn with one stroke call.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeBatch {
	/// Shared stroke settings.
	pub style: EdgeStyle,
	/// Shared opacity.
	pub alpha: f64,
	/// Lines in this batch.
	pub segments: Vec<Segment>,
}

/// Filled triangle at the target end of a version edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arrow {
	/// Arrow point.
	pub tip: (f64, f64),
	/// Left barb.
	pub left: (f64, f64),
	/// Right barb.
	pub right: (f64, f64),
	/// Fill colour.
	pub color: &'static str,
	/// Opacity.
	pub alpha: f64,
}

/// A node drawn at full detail.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeSprite {
	/// Index into the node array.
	pub index: usize,
	/// Screen x of the centre.
	pub x: f64,
	/// Screen y of the centre.
	pub y: f64,
	/// On-screen size in pixels.
	pub size: f64,
	/// Final opacity.
	pub alpha: f64,
	/// Under the pointer.
	pub hovered: bool,
	/// The selected node.
	pub selected: bool,
	/// In the highlight set.
	pub highlighted: bool,
}

/// Dashed outline around a selected or highlighted node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Glow {
	/// Index into the node array.
	pub index: usize,
	/// Screen x of the centre.
	pub x: f64,
	/// Screen y of the centre.
	pub y: f64,
	/// Shape and size being outlined.
	pub footprint: Footprint,
	/// Outline colour.
	pub color: &'static str,
}

/// Shape used for low-detail nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DotShape {
	/// Documents, filled only.
	Square,
	/// Memories, filled and stroked with their border colour.
	Circle,
}

/// One low-detail node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dot {
	/// Index into the node array.
	pub index: usize,
	/// Screen x.
	pub x: f64,
	/// Screen y.
	pub y: f64,
	/// Half side for squares, radius for circles.
	pub radius: f64,
}

/// Low-detail nodes sharing one fill (and stroke) call.
#[derive(Clone, Debug, PartialEq)]
pub struct DotBatch {
	/// Dot shape.
	pub shape: DotShape,
	/// Fill colour.
	pub color: String,
	/// Shared opacity.
	pub alpha: f64,
	/// Dots in this batch.
	pub dots: Vec<Dot>,
}

/// Counters describing the last planned frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
	/// Nodes inside the culling bounds.
	pub visible_nodes: usize,
	/// Nodes outside them.
	pub culled_nodes: usize,
	/// Nodes drawn with full detail.
	pub detailed_nodes: usize,
	/// Nodes drawn as dots.
	pub dot_nodes: usize,
	/// Edges drawn.
	pub drawn_edges: usize,
	/// Edges outside the culling bounds.
	pub culled_edges: usize,
	/// Missing endpoints, degenerate geometry, or sub-floor memory links.
	pub skipped_edges: usize,
}

/// Everything one frame will draw, grouped for batching.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePlan {
	/// Edge strokes, grouped by style.
	pub edge_batches: Vec<EdgeBatch>,
	/// Version-chain arrowheads.
	pub arrows: Vec<Arrow>,
	/// Fully drawn nodes.
	pub sprites: Vec<NodeSprite>,
	/// Selection and highlight outlines.
	pub glows: Vec<Glow>,
	/// Low-detail nodes, grouped by style.
	pub dots: Vec<DotBatch>,
	/// Nearest-document links.
	pub neighbor_links: Vec<Segment>,
	/// Frame counters.
	pub stats: FrameStats,
}

impl FramePlan {
	fn clear(&mut self) {
		self.edge_batches.clear();
		self.arrows.clear();
		self.sprites.clear();
		self.glows.clear();
		self.dots.clear();
		self.neighbor_links.clear();
		self.stats = FrameStats::default();
	}

	/// Whether the node at `index` is drawn in any form this frame.
	pub fn draws_node(&self, index: usize) -> bool {
		self.sprites.iter().any(|s| s.index == index)
			|| self.dots.iter().any(|b| b.dots.iter().any(|d| d.index == index))
	}

	/// Number of nodes drawn as dots.
	pub fn dot_count(&self) -> usize {
		self.dots.iter().map(|b| b.dots.len()).sum()
	}
}

/// Borrowed inputs for one frame.
#[derive(Clone, Copy)]
pub struct FrameInput<'a> {
	/// Nodes in paint order.
	pub nodes: &'a [Node],
	/// Edges to draw.
	pub edges: &'a [Edge],
	/// Current transform.
	pub viewport: &'a ViewportState,
	/// Selection, hover, and dim state.
	pub state: &'a RenderState,
	/// Viewport width in CSS pixels.
	pub width: f64,
	/// Viewport height in CSS pixels.
	pub height: f64,
}

#[derive(Clone, Copy, Debug)]
struct Bounds {
	left: f64,
	top: f64,
	right: f64,
	bottom: f64,
}

impl Bounds {
	fn overlaps_box(&self, x: f64, y: f64, hw: f64, hh: f64) -> bool {
		x.is_finite()
			&& y.is_finite()
			&& x + hw >= self.left
			&& x - hw <= self.right
			&& y + hh >= self.top
			&& y - hh <= self.bottom
	}

	fn contains(&self, x: f64, y: f64) -> bool {
		x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
	}

	fn touches_segment(&self, a: (f64, f64), b: (f64, f64)) -> bool {
		if a.0.max(b.0) < self.left
			|| a.0.min(b.0) > self.right
			|| a.1.max(b.1) < self.top
			|| a.1.min(b.1) > self.bottom
		{
			return false;
		}
		if self.contains(a.0, a.1) || self.contains(b.0, b.1) {
			return true;
		}
		let corners = [
			(self.left, self.top),
			(self.right, self.top),
			(self.right, self.bottom),
			(self.left, self.bottom),
		];
		(0..4).any(|i| segments_intersect(a, b, corners[i], corners[(i + 1) % 4]))
	}
}

fn segments_intersect(a1: (f64, f64), a2: (f64, f64), b1: (f64, f64), b2: (f64, f64)) -> bool {
	fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
		(a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
	}
	let (c1, c2) = (cross(a1, a2, b1), cross(a1, a2, b2));
	let (c3, c4) = (cross(b1, b2, a1), cross(b1, b2, a2));
	(c1 <= 0.0 && c2 >= 0.0 || c1 >= 0.0 && c2 <= 0.0) && (c3 <= 0.0 && c4 >= 0.0 || c3 >= 0.0 && c4 <= 0.0)
}

/// Turns graph state into drawing commands, reusing its buffers across frames.
#[derive(Debug)]
pub struct Renderer {
	config: RenderConfig,
	theme: Theme,
	plan: FramePlan,
}

impl Renderer {
	/// A renderer with empty buffers.
	pub fn new(config: RenderConfig, theme: Theme) -> Self {
		Self {
			config,
			theme,
			plan: FramePlan::default(),
		}
	}

	/// The most recently planned frame.
	pub fn plan_ref(&self) -> &FramePlan {
		&self.plan
	}

	/// Plans and paints one frame.
	pub fn render(&mut self, input: FrameInput<'_>, surface: &mut impl Surface) -> FrameStats {
		self.plan(input);
		self.paint(input.nodes, surface);
		self.plan.stats
	}

	/// Builds the frame plan: culling, edge batching, and level of detail.
	pub fn plan(&mut self, input: FrameInput<'_>) -> &FramePlan {
		self.plan.clear();
		let cfg = self.config;
		let margin = cfg.cull_margin.max(0.0);
		let bounds = Bounds {
			left: -margin,
			top: -margin,
			right: input.width.max(0.0) + margin,
			bottom: input.height.max(0.0) + margin,
		};
		let zoom = input.viewport.zoom;

		let lookup: HashMap<&str, usize> = input
			.nodes
			.iter()
			.enumerate()
			.map(|(i, n)| (n.id.as_str(), i))
			.collect();

		let selected = input
			.state
			.selected_node_id
			.as_deref()
			.and_then(|id| lookup.get(id).copied());
		// Fading out after a deselect still dims around the old focus.
		let focus = input.state.dim_focus().and_then(|id| lookup.get(id).copied());
		let dimming = focus.is_some() && input.state.dim_progress > 0.0;
		let dim_alpha = 1.0 - (1.0 - cfg.dim_floor.clamp(0.0, 1.0)) * input.state.dim_progress.clamp(0.0, 1.0);

		let mut connected: HashSet<usize> = HashSet::new();
		if let Some(focus) = focus {
			connected.insert(focus);
			for edge in input.edges {
				if let (Some(&s), Some(&t)) = (lookup.get(edge.source.as_str()), lookup.get(edge.target.as_str())) {
					if s == focus {
						connected.insert(t);
					} else if t == focus {
						connected.insert(s);
					}
				}
			}
		}

		self.plan_edges(&input, &lookup, &bounds, focus, dimming, dim_alpha);

		let mut documents: Vec<(f64, f64)> = Vec::new();
		let mut dot_slots: HashMap<(DotShape, &str, u32), usize> = HashMap::new();
		for (index, node) in input.nodes.iter().enumerate() {
			let (x, y) = input.viewport.world_to_screen(node.x, node.y);
			let footprint = node.footprint(zoom);
			let (hw, hh) = footprint.half_extents();
			if !bounds.overlaps_box(x, y, hw, hh) {
				self.plan.stats.culled_nodes += 1;
				continue;
			}
			self.plan.stats.visible_nodes += 1;
			if node.is_document() {
				documents.push((x, y));
			}

			let state = input.state;
			let (hovered, is_selected, highlighted) = (
				state.is_hovered(&node.id),
				selected == Some(index),
				state.is_highlighted(&node.id),
			);
			let dimmed = dimming && !connected.contains(&index) && !highlighted;
			let alpha = (if dimmed { dim_alpha } else { 1.0 } * intrinsic_alpha(node)).clamp(0.0, 1.0);
			let size = node.size * zoom;

			if size < cfg.lod_threshold && !(hovered || is_selected || highlighted) {
				let (shape, color, radius) = match node.kind {
					NodeKind::Document(_) => (DotShape::Square, self.theme.document_dot, (size / 2.0).max(0.5)),
					NodeKind::Memory(_) => (DotShape::Circle, node.border_color.as_str(), (size / 2.0).max(0.5)),
				};
				let key = (shape, color, (alpha * 100.0).round() as u32);
				let slot = *dot_slots.entry(key).or_insert_with(|| {
					self.plan.dots.push(DotBatch {
						shape,
						color: color.to_string(),
						alpha,
						dots: Vec::new(),
					});
					self.plan.dots.len() - 1
				});
				self.plan.dots[slot].dots.push(Dot { index, x, y, radius });
				self.plan.stats.dot_nodes += 1;
				continue;
			}

			self.plan.sprites.push(NodeSprite {
				index,
				x,
				y,
				size,
				alpha,
				hovered,
				selected: is_selected,
				highlighted,
			});
			self.plan.stats.detailed_nodes += 1;
			if is_selected || highlighted {
				let scale = cfg.glow_scale.max(1.0);
				let footprint = match footprint {
					Footprint::Card { half_w, half_h } => Footprint::Card {
						half_w: half_w * scale,
						half_h: half_h * scale,
					},
					Footprint::Disc { radius } => Footprint::Disc { radius: radius * scale },
				};
				self.plan.glows.push(Glow {
					index,
					x,
					y,
					footprint,
					color: if is_selected { self.theme.selected } else { self.theme.highlight },
				});
			}
		}

		self.plan_neighbor_links(&documents);
		&self.plan
	}

	fn plan_edges(
		&mut self,
		input: &FrameInput<'_>,
		lookup: &HashMap<&str, usize>,
		bounds: &Bounds,
		focus: Option<usize>,
		dimming: bool,
		dim_alpha: f64,
	) {
		let zoom = input.viewport.zoom;
		let mut slots: HashMap<(&'static str, u32, bool), usize> = HashMap::new();

		for edge in input.edges {
			let (Some(&si), Some(&ti)) = (lookup.get(edge.source.as_str()), lookup.get(edge.target.as_str())) else {
				self.plan.stats.skipped_edges += 1;
				continue;
			};
			let (source, target) = (&input.nodes[si], &input.nodes[ti]);

			if edge.edge_type == EdgeType::DocMemory {
				let memory_size = [source, target]
					.iter()
					.filter(|n| !n.is_document())
					.map(|n| n.size * zoom)
					.fold(f64::INFINITY, f64::min);
				if memory_size < self.config.edge_visibility_floor {
					self.plan.stats.skipped_edges += 1;
					continue;
				}
			}

			let a = input.viewport.world_to_screen(source.x, source.y);
			let b = input.viewport.world_to_screen(target.x, target.y);
			if !(a.0.is_finite() && a.1.is_finite() && b.0.is_finite() && b.1.is_finite()) {
				self.plan.stats.skipped_edges += 1;
				continue;
			}
			if !bounds.touches_segment(a, b) {
				self.plan.stats.culled_edges += 1;
				continue;
			}

			let (dx, dy) = (b.0 - a.0, b.1 - a.1);
			let length = (dx * dx + dy * dy).sqrt();
			let (r1, r2) = (source.footprint(zoom).radius(), target.footprint(zoom).radius());
			if length < MIN_SEGMENT || length - r1 - r2 < MIN_SEGMENT {
				self.plan.stats.skipped_edges += 1;
				continue;
			}
			let (ux, uy) = (dx / length, dy / length);
			let segment = Segment {
				x1: a.0 + ux * r1,
				y1: a.1 + uy * r1,
				x2: b.0 - ux * r2,
				y2: b.1 - uy * r2,
			};

			let (color, base_width, base_alpha) = match edge.edge_type {
				EdgeType::DocMemory => (self.theme.edge_doc_memory, 1.0, 0.6),
				EdgeType::Similarity => (
					self.theme.edge_similarity,
					0.5 + 2.0 * edge.similarity.unwrap_or(0.5).clamp(0.0, 1.0),
					0.45,
				),
				EdgeType::Version => (self.theme.edge_version, 1.5, 0.8),
			};
			let width = quantize_width((base_width * zoom).clamp(MIN_LINE_WIDTH, base_width * 4.0));
			let dimmed = dimming && focus.is_none_or(|f| si != f && ti != f);
			let alpha = if dimmed { base_alpha * dim_alpha } else { base_alpha };
			let key = (color, (width * 2.0).round() as u32, dimmed);
			let slot = *slots.entry(key).or_insert_with(|| {
				self.plan.edge_batches.push(EdgeBatch {
					style: EdgeStyle { color, width, dimmed },
					alpha,
					segments: Vec::new(),
				});
				self.plan.edge_batches.len() - 1
			});
			self.plan.edge_batches[slot].segments.push(segment);
			self.plan.stats.drawn_edges += 1;

			if edge.edge_type == EdgeType::Version {
				let head = (6.0 * zoom).clamp(4.0, 10.0);
				if length - r1 - r2 > head {
					let (bx, by) = (segment.x2 - ux * head, segment.y2 - uy * head);
					let (px, py) = (-uy * head * 0.5, ux * head * 0.5);
					self.plan.arrows.push(Arrow {
						tip: (segment.x2, segment.y2),
						left: (bx + px, by + py),
						right: (bx - px, by - py),
						color,
						alpha,
					});
				}
			}
		}
	}

	/// Links each visible document to its nearest visible documents. A pair is
	/// kept only when the lower-ordered document finds the higher-ordered one.
	fn plan_neighbor_links(&mut self, documents: &[(f64, f64)]) {
		let k = self.config.neighbor_links;
		if k == 0 || documents.len() < 2 || documents.len() > self.config.neighbor_cap {
			return;
		}
		let mut nearest: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
		for (i, &(ax, ay)) in documents.iter().enumerate() {
			nearest.clear();
			for (j, &(bx, by)) in documents.iter().enumerate() {
				if i == j {
					continue;
				}
				let d = (bx - ax).powi(2) + (by - ay).powi(2);
				if nearest.len() < k || d < nearest[nearest.len() - 1].0 {
					let at = nearest.partition_point(|&(nd, _)| nd <= d);
					nearest.insert(at, (d, j));
					nearest.truncate(k);
				}
			}
			for &(d, j) in &nearest {
				if j > i && d >= MIN_SEGMENT {
					let (bx, by) = documents[j];
					self.plan.neighbor_links.push(Segment {
						x1: ax,
						y1: ay,
						x2: bx,
						y2: by,
					});
				}
			}
		}
	}

	/// Paints the current plan. Dot batches go last.
	pub fn paint(&self, nodes: &[Node], surface: &mut impl Surface) {
		let plan = &self.plan;
		surface.set_alpha(1.0);
		surface.set_line_dash(&[]);
		surface.clear(self.theme.background);

		if !plan.neighbor_links.is_empty() {
			surface.set_alpha(0.35);
			surface.set_stroke(self.theme.neighbor_link);
			surface.set_line_width(MIN_LINE_WIDTH);
			surface.set_line_dash(&[4.0, 4.0]);
			surface.begin_path();
			for s in &plan.neighbor_links {
				surface.move_to(s.x1, s.y1);
				surface.line_to(s.x2, s.y2);
			}
			surface.stroke();
			surface.set_line_dash(&[]);
		}

		for batch in &plan.edge_batches {
			surface.set_alpha(batch.alpha.max(0.0));
			surface.set_stroke(batch.style.color);
			surface.set_line_width(batch.style.width.max(MIN_LINE_WIDTH));
			surface.begin_path();
			for s in &batch.segments {
				surface.move_to(s.x1, s.y1);
				surface.line_to(s.x2, s.y2);
			}
			surface.stroke();
		}

		for arrow in &plan.arrows {
			surface.set_alpha(arrow.alpha.max(0.0));
			surface.set_fill(arrow.color);
			surface.begin_path();
			surface.move_to(arrow.tip.0, arrow.tip.1);
			surface.line_to(arrow.left.0, arrow.left.1);
			surface.line_to(arrow.right.0, arrow.right.1);
			surface.close_path();
			surface.fill();
		}

		for sprite in &plan.sprites {
			let Some(node) = nodes.get(sprite.index) else {
				continue;
			};
			surface.set_alpha(sprite.alpha);
			match &node.kind {
				NodeKind::Document(_) => self.paint_document(surface, node, sprite),
				NodeKind::Memory(memory) => {
					let expiring = memory.forget_after.is_some() && !memory.is_forgotten;
					self.paint_memory(surface, node, sprite, expiring);
				}
			}
		}

		if !plan.glows.is_empty() {
			surface.set_alpha(1.0);
			surface.set_line_width(2.0);
			surface.set_line_dash(&[4.0, 3.0]);
			for glow in &plan.glows {
				surface.set_stroke(glow.color);
				surface.begin_path();
				match glow.footprint {
					Footprint::Card { half_w, half_h } => surface.round_rect(
						glow.x - half_w,
						glow.y - half_h,
						half_w * 2.0,
						half_h * 2.0,
						half_h * 0.3,
					),
					Footprint::Disc { radius } => {
						surface.move_to(glow.x + radius, glow.y);
						surface.arc(glow.x, glow.y, radius, 0.0, 2.0 * PI);
					}
				}
				surface.stroke();
			}
			surface.set_line_dash(&[]);
		}

		for batch in &plan.dots {
			surface.set_alpha(batch.alpha.max(0.0));
			surface.begin_path();
			match batch.shape {
				DotShape::Square => {
					surface.set_fill(&batch.color);
					for d in &batch.dots {
						surface.rect(d.x - d.radius, d.y - d.radius, d.radius * 2.0, d.radius * 2.0);
					}
					surface.fill();
				}
				DotShape::Circle => {
					surface.set_fill(self.theme.memory_fill);
					surface.set_stroke(&batch.color);
					surface.set_line_width(MIN_LINE_WIDTH);
					for d in &batch.dots {
						surface.move_to(d.x + d.radius, d.y);
						surface.arc(d.x, d.y, d.radius, 0.0, 2.0 * PI);
					}
					surface.fill();
					surface.stroke();
				}
			}
		}
		surface.set_alpha(1.0);
	}

	/// Stroke override for hovered, selected, or highlighted nodes.
	fn emphasis(&self, sprite: &NodeSprite) -> Option<(&'static str, f64)> {
		if sprite.selected {
			Some((self.theme.selected, 2.5))
		} else if sprite.hovered {
			Some((self.theme.hover, 2.0))
		} else if sprite.highlighted {
			Some((self.theme.highlight, 1.5))
		} else {
			None
		}
	}

	fn paint_document(&self, surface: &mut impl Surface, node: &Node, sprite: &NodeSprite) {
		let s = sprite.size;
		let (w, h) = (s * 1.4, s * 0.9);
		let (x, y) = (sprite.x - w / 2.0, sprite.y - h / 2.0);
		let radius = s * 0.12;

		surface.begin_path();
		surface.round_rect(x, y, w, h, radius);
		surface.set_fill(self.theme.document_frame);
		surface.fill();
		match self.emphasis(sprite) {
			Some((color, width)) => {
				surface.set_stroke(color);
				surface.set_line_width(width);
			}
			None => {
				surface.set_stroke(&node.border_color);
				surface.set_line_width(MIN_LINE_WIDTH);
			}
		}
		surface.stroke();

		let inset = (s * 0.08).max(1.0);
		if w > inset * 4.0 && h > inset * 4.0 {
			surface.begin_path();
			surface.round_rect(x + inset, y + inset, w - inset * 2.0, h - inset * 2.0, radius * 0.6);
			surface.set_fill(self.theme.document_panel);
			surface.fill();
		}

		if s >= 16.0 {
			let (iw, ih) = (s * 0.28, s * 0.36);
			let (ix, iy) = (sprite.x - iw / 2.0, sprite.y - ih / 2.0);
			let fold = iw * 0.3;
			surface.begin_path();
			surface.move_to(ix, iy);
			surface.line_to(ix + iw - fold, iy);
			surface.line_to(ix + iw, iy + fold);
			surface.line_to(ix + iw, iy + ih);
			surface.line_to(ix, iy + ih);
			surface.close_path();
			for row in 1..=2 {
				let ly = iy + fold + (ih - fold) * row as f64 / 3.0;
				surface.move_to(ix + iw * 0.2, ly);
				surface.line_to(ix + iw * 0.8, ly);
			}
			surface.set_stroke(self.theme.document_icon);
			surface.set_line_width(MIN_LINE_WIDTH);
			surface.stroke();
		}
	}

	fn paint_memory(&self, surface: &mut impl Surface, node: &Node, sprite: &NodeSprite, expiring: bool) {
		let r = sprite.size / 2.0;
		surface.begin_path();
		for k in 0..6 {
			let angle = PI / 6.0 + k as f64 * PI / 3.0;
			let (px, py) = (sprite.x + r * angle.cos(), sprite.y + r * angle.sin());
			if k == 0 {
				surface.move_to(px, py);
			} else {
				surface.line_to(px, py);
			}
		}
		surface.close_path();
		surface.set_fill(self.theme.memory_fill);
		surface.fill();

		match self.emphasis(sprite) {
			Some((color, width)) => {
				surface.set_stroke(color);
				surface.set_line_width(width);
			}
			None => {
				surface.set_stroke(&node.border_color);
				surface.set_line_width(1.5);
			}
		}
		if expiring {
			surface.set_line_dash(&[3.0, 2.0]);
		}
		surface.stroke();
		if expiring {
			surface.set_line_dash(&[]);
		}
	}
}

/// Opacity a node has before dimming.
fn intrinsic_alpha(node: &Node) -> f64 {
	match &node.kind {
		NodeKind::Memory(m) if m.is_forgotten => 0.4,
		NodeKind::Memory(m) if !m.is_latest => 0.75,
		_ => 1.0,
	}
}

fn quantize_width(width: f64) -> f64 {
	((width * 2.0).round() / 2.0).max(MIN_LINE_WIDTH)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::components::memory_graph::config::ViewportConfig;
	use crate::components::memory_graph::surface::CommandRecorder;
	use crate::components::memory_graph::types::{DocumentData, MemoryData};

	fn memory(id: &str, x: f64, y: f64, size: f64) -> Node {
		Node::memory(id, x, y, size, MemoryData {
			is_latest: true,
			..Default::default()
		})
	}

	fn document(id: &str, x: f64, y: f64, size: f64) -> Node {
		Node::document(id, x, y, size, DocumentData::default())
	}

	fn renderer() -> Renderer {
		Renderer::new(RenderConfig::default(), Theme::default())
	}

	fn plan_for<'a>(
		renderer: &'a mut Renderer,
		nodes: &[Node],
		edges: &[Edge],
		viewport: &ViewportState,
		state: &RenderState,
		size: (f64, f64),
	) -> &'a FramePlan {
		renderer.plan(FrameInput {
			nodes,
			edges,
			viewport,
			state,
			width: size.0,
			height: size.1,
		})
	}

	fn identity() -> ViewportState {
		ViewportState::new(0.0, 0.0, 1.0, ViewportConfig::default())
	}

	#[test]
	fn culls_nodes_outside_margin() {
		let nodes = vec![
			memory("inside", 500.0, 400.0, 20.0),
			memory("margin", -95.0, 400.0, 20.0),
			memory("outside", -130.0, 400.0, 20.0),
			document("far", 5000.0, 5000.0, 20.0),
		];
		let mut r = renderer();
		let plan = plan_for(&mut r, &nodes, &[], &identity(), &RenderState::default(), (1000.0, 800.0));
		assert!(plan.draws_node(0));
		assert!(plan.draws_node(1));
		assert!(!plan.draws_node(2));
		assert!(!plan.draws_node(3));
		assert_eq!(plan.stats.culled_nodes, 2);
		assert_eq!(plan.stats.visible_nodes, 2);
	}

	#[test]
	fn zoomed_out_scatter_is_culled_and_batched() {
		let nodes: Vec<Node> = (0..10_000u64)
			.map(|i| {
				let x = (i.wrapping_mul(7919) % 5000) as f64;
				let y = (i.wrapping_mul(104_729) % 5000) as f64;
				if i % 2 == 0 {
					document(&i.to_string(), x, y, 20.0)
				} else {
					memory(&i.to_string(), x, y, 20.0).with_border(["#f00", "#0f0", "#00f"][(i % 3) as usize])
				}
			})
			.collect();
		let viewport = ViewportState::new(0.0, 0.0, 0.2, ViewportConfig::default());
		let mut r = renderer();
		let plan = plan_for(&mut r, &nodes, &[], &viewport, &RenderState::default(), (1000.0, 800.0));

		assert!(plan.sprites.is_empty());
		assert_eq!(plan.stats.detailed_nodes, 0);
		assert_eq!(plan.stats.dot_nodes, plan.stats.visible_nodes);
		assert!(plan.dots.len() <= 4);
		for (i, node) in nodes.iter().enumerate() {
			let (sx, sy) = viewport.world_to_screen(node.x, node.y);
			let (hw, hh) = node.footprint(viewport.zoom).half_extents();
			let intersects = sx + hw >= -100.0 && sx - hw <= 1100.0 && sy + hh >= -100.0 && sy - hh <= 900.0;
			assert_eq!(plan.draws_node(i), intersects, "node {i} at ({sx}, {sy})");
		}
		assert!(plan.stats.culled_nodes > 0);

		let mut surface = CommandRecorder::new(1000.0, 800.0);
		r.paint(&nodes, &mut surface);
		assert!(surface.draw_calls() <= 8);
		assert!(surface.all_finite());
	}

	#[test]
	fn edges_with_missing_endpoints_are_skipped() {
		let nodes = vec![memory("a", 100.0, 100.0, 20.0), memory("b", 300.0, 100.0, 20.0)];
		let edges = vec![
			Edge::similarity("a", "b", 0.5),
			Edge::similarity("a", "ghost", 0.5),
		];
		let mut r = renderer();
		let plan = plan_for(&mut r, &nodes, &edges, &identity(), &RenderState::default(), (800.0, 600.0));
		assert_eq!(plan.stats.drawn_edges, 1);
		assert_eq!(plan.stats.skipped_edges, 1);
		let segment = plan.edge_batches[0].segments[0];
		assert_eq!(segment, Segment {
			x1: 110.0,
			y1: 100.0,
			x2: 290.0,
			y2: 100.0,
		});
	}

	#[test]
	fn tiny_memory_hides_document_link() {
		let nodes = vec![document("d", 100.0, 100.0, 40.0), memory("m", 300.0, 100.0, 2.0)];
		let edges = vec![Edge::new("d", "m", EdgeType::DocMemory)];
		let mut r = renderer();
		let plan = plan_for(&mut r, &nodes, &edges, &identity(), &RenderState::default(), (800.0, 600.0));
		assert_eq!(plan.stats.drawn_edges, 0);
		assert!(plan.edge_batches.is_empty());
	}

	#[test]
	fn edges_batch_by_style() {
		let nodes: Vec<Node> = (0..50).map(|i| memory(&i.to_string(), i as f64 * 15.0, (i % 5) as f64 * 90.0, 10.0)).collect();
		let edges: Vec<Edge> = (1..50)
			.map(|i| {
				let mut e = Edge::similarity((i - 1).to_string(), i.to_string(), 0.5);
				if i % 10 == 0 {
					e.edge_type = EdgeType::Version;
				}
				e
			})
			.collect();
		let mut r = renderer();
		let plan = plan_for(&mut r, &nodes, &edges, &identity(), &RenderState::default(), (1000.0, 800.0));
		assert_eq!(plan.edge_batches.len(), 2);
		assert_eq!(plan.stats.drawn_edges, 49);
		assert_eq!(plan.arrows.len(), 4);

		let mut surface = CommandRecorder::new(1000.0, 800.0);
		r.paint(&nodes, &mut surface);
		let strokes = surface
			.commands
			.iter()
			.filter(|c| **c == crate::components::memory_graph::surface::DrawCommand::StrokePath)
			.count();
		// neighbour layer is documents-only; 2 edge batches + 50 memory outlines
		assert_eq!(strokes, 2 + 50);
	}

	#[test]
	fn degenerate_geometry_is_skipped() {
		let nodes = vec![
			memory("a", 100.0, 100.0, 20.0),
			memory("b", 100.0, 100.0, 20.0),
			memory("c", 105.0, 100.0, 20.0),
			memory("nan", f64::NAN, 0.0, 20.0),
		];
		let edges = vec![
			Edge::similarity("a", "b", 0.9),
			Edge::similarity("a", "c", 0.9),
			Edge::similarity("a", "nan", 0.9),
		];
		let mut r = renderer();
		let plan = plan_for(&mut r, &nodes, &edges, &identity(), &RenderState::default(), (0.0, 0.0));
		assert_eq!(plan.stats.drawn_edges, 0);
		assert_eq!(plan.stats.skipped_edges, 3);
		assert!(!plan.draws_node(3));
		let mut surface = CommandRecorder::new(0.0, 0.0);
		r.paint(&nodes, &mut surface);
		assert!(surface.all_finite());
	}

	#[test]
	fn selection_dims_unrelated_elements() {
		let nodes = vec![
			memory("a", 100.0, 100.0, 20.0),
			memory("b", 300.0, 100.0, 20.0),
			memory("c", 100.0, 300.0, 20.0),
			memory("d", 300.0, 300.0, 20.0),
		];
		let edges = vec![Edge::similarity("a", "b", 0.5), Edge::similarity("c", "d", 0.5)];
		let state = RenderState {
			selected_node_id: Some("a".into()),
			dim_progress: 1.0,
			..Default::default()
		};
		let mut r = renderer();
		let plan = plan_for(&mut r, &nodes, &edges, &identity(), &state, (800.0, 600.0));
		let dimmed: Vec<bool> = plan.edge_batches.iter().map(|b| b.style.dimmed).collect();
		assert_eq!(dimmed, vec![false, true]);
		let faded = plan.edge_batches[1].alpha;
		assert!(faded > 0.0 && faded < plan.edge_batches[0].alpha);

		let alpha = |i: usize| plan.sprites.iter().find(|s| s.index == i).map(|s| s.alpha);
		assert_eq!(alpha(0), Some(1.0));
		assert_eq!(alpha(1), Some(1.0));
		assert!((alpha(2).unwrap_or(0.0) - 0.15).abs() < 1e-12);
		assert_eq!(plan.glows.len(), 1);
		assert_eq!(plan.glows[0].index, 0);
	}

	#[test]
	fn small_selected_node_keeps_full_detail() {
		let nodes = vec![memory("a", 100.0, 100.0, 4.0), memory("b", 200.0, 100.0, 4.0)];
		let state = RenderState {
			hovered_node_id: Some("a".into()),
			highlight_ids: ["b".to_string()].into_iter().collect(),
			..Default::default()
		};
		let mut r = renderer();
		let plan = plan_for(&mut r, &nodes, &[], &identity(), &state, (800.0, 600.0));
		assert_eq!(plan.sprites.len(), 2);
		assert_eq!(plan.dot_count(), 0);
		assert_eq!(plan.glows.len(), 1);
	}

	#[test]
	fn neighbor_links_are_deduplicated() {
		let nodes = vec![
			document("a", 0.0, 0.0, 10.0),
			document("b", 100.0, 0.0, 10.0),
			document("c", 200.0, 0.0, 10.0),
			memory("m", 50.0, 50.0, 10.0),
		];
		let mut r = Renderer::new(
			RenderConfig {
				neighbor_links: 1,
				..Default::default()
			},
			Theme::default(),
		);
		let plan = plan_for(&mut r, &nodes, &[], &identity(), &RenderState::default(), (800.0, 600.0));
		// a→b found by a; b→a ignored (b is higher); c→b ignored (c is higher).
		assert_eq!(plan.neighbor_links, vec![Segment {
			x1: 0.0,
			y1: 0.0,
			x2: 100.0,
			y2: 0.0,
		}]);
	}
}
