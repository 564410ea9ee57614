//! Tuning constants for the viewport, input, renderer, and popover.
//!
//! Animation constants are applied once per tick and assume a roughly
//! constant ~60Hz cadence.

/// Pan/zoom bounds and animation rates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportConfig {
	/// Smallest allowed zoom.
	pub min_zoom: f64,
	/// Largest allowed zoom.
	pub max_zoom: f64,
	/// Momentum velocity multiplier per tick.
	pub friction: f64,
	/// Velocity below which momentum snaps to zero (px per tick).
	pub momentum_stop: f64,
	/// Fraction of remaining zoom distance covered per tick.
	pub zoom_spring: f64,
	/// Fraction of remaining pan distance covered per tick.
	pub pan_lerp: f64,
	/// Pan distance (px) below which an animated pan snaps to its target.
	pub pan_snap: f64,
	/// Margin added on each side of the fitted bounding box, as a fraction of its extent.
	pub fit_margin: f64,
	/// Zoom ceiling for `fit_to_nodes`, so tiny graphs are not blown up.
	pub fit_max_zoom: f64,
}

impl Default for ViewportConfig {
	fn default() -> Self {
		Self {
			min_zoom: 0.05,
			max_zoom: 5.0,
			friction: 0.92,
			momentum_stop: 0.5,
			zoom_spring: 0.15,
			pan_lerp: 0.12,
			pan_snap: 0.5,
			fit_margin: 0.1,
			fit_max_zoom: 1.0,
		}
	}
}

/// Gesture interpretation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputConfig {
	/// Zoom factor per wheel notch scrolling up.
	pub wheel_zoom_in: f64,
	/// Zoom factor per wheel notch scrolling down.
	pub wheel_zoom_out: f64,
	/// Zoom factor applied on double-click or double-tap.
	pub double_click_zoom: f64,
	/// Size of the pointer history used to estimate release velocity.
	pub momentum_samples: usize,
	/// A release later than this after the last move carries no momentum.
	pub release_window_ms: f64,
	/// Duration of one animation tick, used to express velocity per tick.
	pub frame_ms: f64,
	/// Movement (px) after which a press no longer counts as a click.
	pub drag_threshold: f64,
	/// Longest gap (ms) between taps that still counts as a double tap.
	pub double_tap_ms: f64,
	/// Farthest (px) the second tap may land from the first.
	pub double_tap_slop: f64,
}

impl Default for InputConfig {
	fn default() -> Self {
		Self {
			wheel_zoom_in: 1.03,
			wheel_zoom_out: 0.97,
			double_click_zoom: 1.5,
			momentum_samples: 4,
			release_window_ms: 200.0,
			frame_ms: 1000.0 / 60.0,
			drag_threshold: 4.0,
			double_tap_ms: 300.0,
			double_tap_slop: 24.0,
		}
	}
}

/// Culling, level-of-detail, and dimming.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderConfig {
	/// Spatial grid cell size in screen pixels.
	pub grid_cell: f64,
	/// Extra screen-space border kept when culling.
	pub cull_margin: f64,
	/// Memory endpoints smaller than this (px) hide their document links.
	pub edge_visibility_floor: f64,
	/// Nodes smaller than this (px) are drawn as batched dots.
	pub lod_threshold: f64,
	/// Glow outline size relative to the node footprint.
	pub glow_scale: f64,
	/// Opacity reached by unrelated elements at full dim.
	pub dim_floor: f64,
	/// Per-frame easing rate for the dim fade.
	pub dim_ease: f64,
	/// Nearest visible documents linked by the decorative layer; 0 disables it.
	pub neighbor_links: usize,
	/// The decorative layer is skipped above this many visible documents.
	pub neighbor_cap: usize,
}

impl Default for RenderConfig {
	fn default() -> Self {
		Self {
			grid_cell: 64.0,
			cull_margin: 100.0,
			edge_visibility_floor: 3.0,
			lod_threshold: 8.0,
			glow_scale: 1.15,
			dim_floor: 0.15,
			dim_ease: 0.15,
			neighbor_links: 2,
			neighbor_cap: 400,
		}
	}
}

/// Floating detail panel placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PopoverConfig {
	/// Gap between the node boundary and the panel.
	pub margin: f64,
	/// Minimum distance kept from every container edge.
	pub edge_guard: f64,
}

impl Default for PopoverConfig {
	fn default() -> Self {
		Self {
			margin: 12.0,
			edge_guard: 8.0,
		}
	}
}

/// CSS colours used by the renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct Theme {
	/// Canvas fill behind everything.
	pub background: &'static str,
	/// Document card outline.
	pub document_frame: &'static str,
	/// Document card fill.
	pub document_panel: &'static str,
	/// Document type glyph.
	pub document_icon: &'static str,
	/// Document colour when drawn as a dot.
	pub document_dot: &'static str,
	/// Memory disc fill.
	pub memory_fill: &'static str,
	/// Document to memory links.
	pub edge_doc_memory: &'static str,
	/// Similarity links.
	pub edge_similarity: &'static str,
	/// Version chain links.
	pub edge_version: &'static str,
	/// Nearest-document links.
	pub neighbor_link: &'static str,
	/// Hovered node stroke.
	pub hover: &'static str,
	/// Selected node stroke and glow.
	pub selected: &'static str,
	/// Highlighted node glow.
	pub highlight: &'static str,
}

impl Default for Theme {
	fn default() -> Self {
		Self {
			background: "#0f1115",
			document_frame: "#1f2937",
			document_panel: "#111827",
			document_icon: "#9ca3af",
			document_dot: "#6b7280",
			memory_fill: "#0b1220",
			edge_doc_memory: "#475569",
			edge_similarity: "#60a5fa",
			edge_version: "#a78bfa",
			neighbor_link: "#334155",
			hover: "#e5e7eb",
			selected: "#facc15",
			highlight: "#34d399",
		}
	}
}

/// Complete engine configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphConfig {
	/// Pan/zoom limits and animation rates.
	pub viewport: ViewportConfig,
	/// Gesture thresholds.
	pub input: InputConfig,
	/// Culling, detail, and dimming.
	pub render: RenderConfig,
	/// Detail panel spacing.
	pub popover: PopoverConfig,
	/// Colours.
	pub theme: Theme,
}
