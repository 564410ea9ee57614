//! Pan/zoom transform and its animations.
//!
//! `screen = world * zoom + pan`. All mutators are total: inputs are clamped
//! or ignored, never rejected, and no path divides by a zero zoom because the
//! zoom floor is positive.

use log::debug;

use super::config::ViewportConfig;
use super::types::Node;

/// Release speeds beyond this (px per tick) are treated as this.
const MAX_VELOCITY: f64 = 10_000.0;

/// Axis-aligned rectangle in world coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorldRect {
	/// Left edge.
	pub min_x: f64,
	/// Top edge.
	pub min_y: f64,
	/// Right edge.
	pub max_x: f64,
	/// Bottom edge.
	pub max_y: f64,
}

impl WorldRect {
	/// Horizontal extent.
	pub fn width(&self) -> f64 {
		self.max_x - self.min_x
	}

	/// Vertical extent.
	pub fn height(&self) -> f64 {
		self.max_y - self.min_y
	}

	/// Whether the point lies inside, edges included.
	pub fn contains(&self, x: f64, y: f64) -> bool {
		x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
	}

	/// Whether `other` lies entirely within `self`.
	pub fn encloses(&self, other: &WorldRect) -> bool {
		other.min_x >= self.min_x
			&& other.max_x <= self.max_x
			&& other.min_y >= self.min_y
			&& other.max_y <= self.max_y
	}

	/// Grows every side by `fraction` of the corresponding extent.
	pub fn padded(&self, fraction: f64) -> WorldRect {
		let (px, py) = (self.width() * fraction, self.height() * fraction);
		WorldRect {
			min_x: self.min_x - px,
			min_y: self.min_y - py,
			max_x: self.max_x + px,
			max_y: self.max_y + py,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ZoomTarget {
	zoom: f64,
	/// Screen point kept fixed while easing; `None` when pan animates separately.
	anchor: Option<(f64, f64)>,
}

/// Current transform plus in-flight animations. Never serialized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportState {
	/// Screen x of the world origin.
	pub pan_x: f64,
	/// Screen y of the world origin.
	pub pan_y: f64,
	/// Screen pixels per world unit.
	pub zoom: f64,
	velocity: (f64, f64),
	zoom_target: Option<ZoomTarget>,
	pan_target: Option<(f64, f64)>,
	config: ViewportConfig,
}

impl ViewportState {
	/// A resting viewport. Non-finite pan becomes 0 and zoom is clamped.
	pub fn new(pan_x: f64, pan_y: f64, zoom: f64, config: ViewportConfig) -> Self {
		let mut state = Self {
			pan_x: finite_or(pan_x, 0.0),
			pan_y: finite_or(pan_y, 0.0),
			zoom: 1.0,
			velocity: (0.0, 0.0),
			zoom_target: None,
			pan_target: None,
			config,
		};
		state.zoom = state.clamp_zoom(zoom);
		state
	}

	/// Limits and rates in use.
	pub fn config(&self) -> &ViewportConfig {
		&self.config
	}

	/// World to screen coordinates.
	pub fn world_to_screen(&self, x: f64, y: f64) -> (f64, f64) {
		(x * self.zoom + self.pan_x, y * self.zoom + self.pan_y)
	}

	/// Screen to world coordinates.
	pub fn screen_to_world(&self, sx: f64, sy: f64) -> (f64, f64) {
		((sx - self.pan_x) / self.zoom, (sy - self.pan_y) / self.zoom)
	}

	/// World rectangle visible in a `width × height` viewport.
	pub fn world_bounds(&self, width: f64, height: f64) -> WorldRect {
		let (min_x, min_y) = self.screen_to_world(0.0, 0.0);
		let (max_x, max_y) = self.screen_to_world(width.max(0.0), height.max(0.0));
		WorldRect {
			min_x,
			min_y,
			max_x,
			max_y,
		}
	}

	/// Momentum in pixels per tick.
	pub fn velocity(&self) -> (f64, f64) {
		self.velocity
	}

	/// Immediate translation. Cancels a pending `center_on` and the zoom half
	/// of a `fit_to_nodes`, which only stays centred together with its pan.
	pub fn pan(&mut self, dx: f64, dy: f64) {
		if !dx.is_finite() || !dy.is_finite() {
			return;
		}
		self.pan_x += dx;
		self.pan_y += dy;
		self.pan_target = None;
		if self.zoom_target.is_some_and(|t| t.anchor.is_none()) {
			self.zoom_target = None;
		}
	}

	/// Arms momentum; `tick` decays it to a hard stop.
	pub fn release_with_velocity(&mut self, vx: f64, vy: f64) {
		let (vx, vy) = (
			finite_or(vx, 0.0).clamp(-MAX_VELOCITY, MAX_VELOCITY),
			finite_or(vy, 0.0).clamp(-MAX_VELOCITY, MAX_VELOCITY),
		);
		let stop = self.config.momentum_stop;
		self.velocity = if vx.abs() < stop && vy.abs() < stop {
			(0.0, 0.0)
		} else {
			debug!("momentum armed at ({vx:.1}, {vy:.1})");
			(vx, vy)
		};
	}

	/// Stops momentum and any animated pan/zoom.
	pub fn stop(&mut self) {
		self.velocity = (0.0, 0.0);
		self.zoom_target = None;
		self.pan_target = None;
	}

	/// Multiplies zoom by `factor` keeping the world point under the anchor fixed.
	pub fn zoom_immediate(&mut self, factor: f64, anchor_x: f64, anchor_y: f64) {
		if !factor.is_finite() || factor <= 0.0 || !anchor_x.is_finite() || !anchor_y.is_finite() {
			return;
		}
		self.zoom_target = None;
		self.pan_target = None;
		let zoom = self.clamp_zoom(self.zoom * factor);
		self.set_zoom_anchored(zoom, anchor_x, anchor_y);
	}

	/// Eases zoom toward `target` around a fixed screen anchor.
	pub fn zoom_to(&mut self, target: f64, anchor_x: f64, anchor_y: f64) {
		if !anchor_x.is_finite() || !anchor_y.is_finite() {
			return;
		}
		self.zoom_target = Some(ZoomTarget {
			zoom: self.clamp_zoom(target),
			anchor: Some((anchor_x, anchor_y)),
		});
	}

	/// Animates to show every node with a margin, never zooming past the fit cap.
	pub fn fit_to_nodes(&mut self, nodes: &[Node], width: f64, height: f64) {
		if nodes.is_empty() || width <= 0.0 || height <= 0.0 {
			return;
		}
		let mut bounds = WorldRect {
			min_x: f64::INFINITY,
			min_y: f64::INFINITY,
			max_x: f64::NEG_INFINITY,
			max_y: f64::NEG_INFINITY,
		};
		for node in nodes.iter().filter(|n| n.x.is_finite() && n.y.is_finite()) {
			let (hw, hh) = node.footprint(1.0).half_extents();
			bounds.min_x = bounds.min_x.min(node.x - hw);
			bounds.min_y = bounds.min_y.min(node.y - hh);
			bounds.max_x = bounds.max_x.max(node.x + hw);
			bounds.max_y = bounds.max_y.max(node.y + hh);
		}
		if !bounds.min_x.is_finite() {
			return;
		}
		let bounds = bounds.padded(self.config.fit_margin);
		let fit = (width / bounds.width().max(1.0))
			.min(height / bounds.height().max(1.0))
			.min(self.config.fit_max_zoom);
		let zoom = self.clamp_zoom(fit);
		let (cx, cy) = (
			(bounds.min_x + bounds.max_x) / 2.0,
			(bounds.min_y + bounds.max_y) / 2.0,
		);
		debug!("fit {} nodes at zoom {zoom:.3}", nodes.len());
		self.velocity = (0.0, 0.0);
		self.zoom_target = Some(ZoomTarget { zoom, anchor: None });
		self.pan_target = Some((width / 2.0 - cx * zoom, height / 2.0 - cy * zoom));
	}

	/// Animates pan so the world point lands in the middle of the viewport.
	pub fn center_on(&mut self, world_x: f64, world_y: f64, width: f64, height: f64) {
		if !world_x.is_finite() || !world_y.is_finite() {
			return;
		}
		let zoom = self.zoom_target.map_or(self.zoom, |t| t.zoom);
		self.velocity = (0.0, 0.0);
		self.pan_target = Some((
			width.max(0.0) / 2.0 - world_x * zoom,
			height.max(0.0) / 2.0 - world_y * zoom,
		));
	}

	/// Whether `tick` would change anything.
	pub fn is_animating(&self) -> bool {
		self.velocity != (0.0, 0.0) || self.zoom_target.is_some() || self.pan_target.is_some()
	}

	/// Pure animation step: the state one tick later.
	pub fn step(&self) -> Self {
		let mut next = *self;
		let cfg = self.config;

		if next.velocity != (0.0, 0.0) {
			next.pan_x += next.velocity.0;
			next.pan_y += next.velocity.1;
			next.velocity.0 *= cfg.friction;
			next.velocity.1 *= cfg.friction;
			if next.velocity.0.abs() < cfg.momentum_stop && next.velocity.1.abs() < cfg.momentum_stop {
				next.velocity = (0.0, 0.0);
			}
		}

		if let Some(target) = next.zoom_target {
			let mut zoom = next.zoom + (target.zoom - next.zoom) * cfg.zoom_spring;
			if (target.zoom - zoom).abs() <= target.zoom * 1e-3 {
				zoom = target.zoom;
				next.zoom_target = None;
			}
			match target.anchor {
				Some((ax, ay)) => next.set_zoom_anchored(zoom, ax, ay),
				None => next.zoom = zoom,
			}
		}

		if let Some((tx, ty)) = next.pan_target {
			next.pan_x += (tx - next.pan_x) * cfg.pan_lerp;
			next.pan_y += (ty - next.pan_y) * cfg.pan_lerp;
			if (tx - next.pan_x).abs() < cfg.pan_snap && (ty - next.pan_y).abs() < cfg.pan_snap {
				next.pan_x = tx;
				next.pan_y = ty;
				next.pan_target = None;
			}
		}

		next
	}

	/// Advances one step in place; returns whether anything is still animating.
	pub fn tick(&mut self) -> bool {
		*self = self.step();
		self.is_animating()
	}

	fn set_zoom_anchored(&mut self, zoom: f64, anchor_x: f64, anchor_y: f64) {
		let (wx, wy) = self.screen_to_world(anchor_x, anchor_y);
		self.zoom = zoom;
		self.pan_x = anchor_x - wx * zoom;
		self.pan_y = anchor_y - wy * zoom;
	}

	fn clamp_zoom(&self, zoom: f64) -> f64 {
		if zoom.is_nan() {
			return self.zoom.clamp(self.config.min_zoom, self.config.max_zoom);
		}
		zoom.clamp(self.config.min_zoom, self.config.max_zoom)
	}
}

fn finite_or(value: f64, fallback: f64) -> f64 {
	if value.is_finite() { value } else { fallback }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::memory_graph::types::MemoryData;

	fn viewport(pan_x: f64, pan_y: f64, zoom: f64) -> ViewportState {
		ViewportState::new(pan_x, pan_y, zoom, ViewportConfig::default())
	}

	fn close(a: (f64, f64), b: (f64, f64)) -> bool {
		(a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
	}

	#[test]
	fn transform_round_trips() {
		for &(px, py, z) in &[(0.0, 0.0, 1.0), (-320.5, 48.25, 0.05), (1e4, -7.0, 5.0), (3.3, 9.1, 0.73)] {
			let vp = viewport(px, py, z);
			for &(x, y) in &[(0.0, 0.0), (100.0, -250.0), (-1e5, 3e4), (0.125, 7.75)] {
				let (sx, sy) = vp.world_to_screen(x, y);
				assert!(close(vp.screen_to_world(sx, sy), (x, y)));
				let (wx, wy) = vp.screen_to_world(x, y);
				let back = vp.world_to_screen(wx, wy);
				assert!((back.0 - x).abs() < 1e-6 && (back.1 - y).abs() < 1e-6);
			}
		}
	}

	#[test]
	fn zoom_stays_within_bounds() {
		let mut vp = viewport(0.0, 0.0, 1.0);
		for _ in 0..500 {
			vp.zoom_immediate(1.5, 10.0, 10.0);
		}
		assert_eq!(vp.zoom, 5.0);
		for _ in 0..500 {
			vp.zoom_immediate(0.5, 10.0, 10.0);
		}
		assert_eq!(vp.zoom, 0.05);
		vp.zoom_to(1e9, 0.0, 0.0);
		while vp.tick() {
			assert!(vp.zoom <= 5.0 && vp.zoom >= 0.05);
		}
		assert_eq!(vp.zoom, 5.0);
		vp.zoom_immediate(f64::NAN, 0.0, 0.0);
		vp.zoom_immediate(0.0, 0.0, 0.0);
		vp.zoom_to(f64::NAN, 0.0, 0.0);
		while vp.tick() {}
		assert!(vp.zoom.is_finite() && vp.zoom >= 0.05 && vp.zoom <= 5.0);
	}

	#[test]
	fn anchored_zoom_keeps_point_under_cursor() {
		let mut vp = viewport(37.0, -12.0, 0.8);
		let before = vp.screen_to_world(400.0, 300.0);
		vp.zoom_immediate(1.03, 400.0, 300.0);
		assert!(close(vp.screen_to_world(400.0, 300.0), before));
		vp.zoom_immediate(0.97, 400.0, 300.0);
		assert!(close(vp.screen_to_world(400.0, 300.0), before));
	}

	#[test]
	fn animated_zoom_keeps_anchor_each_tick() {
		let mut vp = viewport(0.0, 0.0, 1.0);
		let before = vp.screen_to_world(120.0, 80.0);
		vp.zoom_to(1.5, 120.0, 80.0);
		let mut ticks = 0;
		while vp.tick() {
			let now = vp.screen_to_world(120.0, 80.0);
			assert!((now.0 - before.0).abs() < 1e-9 && (now.1 - before.1).abs() < 1e-9);
			ticks += 1;
			assert!(ticks < 200);
		}
		assert_eq!(vp.zoom, 1.5);
	}

	#[test]
	fn momentum_terminates() {
		for &(vx, vy) in &[(40.0, -12.0), (1e6, 1e6), (-0.6, 0.0), (f64::MAX / 4.0, 1.0)] {
			let mut vp = viewport(0.0, 0.0, 1.0);
			vp.release_with_velocity(vx, vy);
			let mut ticks = 0;
			while vp.tick() {
				ticks += 1;
				assert!(ticks < 10_000, "momentum did not stop for ({vx}, {vy})");
			}
			assert_eq!(vp.velocity(), (0.0, 0.0));
		}
	}

	#[test]
	fn small_release_does_not_animate() {
		let mut vp = viewport(0.0, 0.0, 1.0);
		vp.release_with_velocity(0.2, -0.3);
		assert!(!vp.is_animating());
		vp.release_with_velocity(f64::INFINITY, f64::NAN);
		assert!(!vp.is_animating());
	}

	#[test]
	fn pan_cancels_center_animation() {
		let mut vp = viewport(0.0, 0.0, 1.0);
		vp.center_on(500.0, 500.0, 800.0, 600.0);
		assert!(vp.is_animating());
		vp.pan(10.0, 0.0);
		assert!(!vp.is_animating());
		assert_eq!((vp.pan_x, vp.pan_y), (10.0, 0.0));
	}

	#[test]
	fn pan_during_fit_keeps_the_view_in_place() {
		let nodes = vec![
			Node::memory("a", 0.0, 0.0, 10.0, MemoryData::default()),
			Node::memory("b", 4000.0, 3000.0, 10.0, MemoryData::default()),
		];
		let mut vp = viewport(0.0, 0.0, 1.0);
		vp.fit_to_nodes(&nodes, 1000.0, 800.0);
		vp.tick();
		vp.tick();
		let centre = vp.screen_to_world(500.0, 400.0);
		let zoom = vp.zoom;

		vp.pan(-5.0, 0.0);
		while vp.tick() {}
		assert_eq!(vp.zoom, zoom);
		let moved = vp.screen_to_world(500.0, 400.0);
		assert!(close(moved, (centre.0 + 5.0 / zoom, centre.1)));
	}

	#[test]
	fn center_on_converges_and_snaps() {
		let mut vp = viewport(0.0, 0.0, 2.0);
		vp.center_on(100.0, 50.0, 800.0, 600.0);
		while vp.tick() {}
		assert_eq!(vp.world_to_screen(100.0, 50.0), (400.0, 300.0));
	}

	#[test]
	fn fit_caps_zoom_and_centers_bounds() {
		let nodes = vec![
			Node::memory("a", -10.0, -10.0, 4.0, MemoryData::default()),
			Node::memory("b", 10.0, 10.0, 4.0, MemoryData::default()),
		];
		let mut vp = viewport(0.0, 0.0, 0.3);
		vp.fit_to_nodes(&nodes, 800.0, 600.0);
		while vp.tick() {}
		assert_eq!(vp.zoom, 1.0);
		let (sx, sy) = vp.world_to_screen(0.0, 0.0);
		assert!((sx - 400.0).abs() < 1e-9 && (sy - 300.0).abs() < 1e-9);
	}

	#[test]
	fn fit_zooms_out_for_wide_layouts() {
		let nodes = vec![
			Node::memory("a", 0.0, 0.0, 10.0, MemoryData::default()),
			Node::memory("b", 4000.0, 0.0, 10.0, MemoryData::default()),
		];
		let mut vp = viewport(0.0, 0.0, 1.0);
		vp.fit_to_nodes(&nodes, 1000.0, 800.0);
		while vp.tick() {}
		let left = vp.world_to_screen(-5.0, 0.0).0;
		let right = vp.world_to_screen(4005.0, 0.0).0;
		assert!(left >= 0.0 && right <= 1000.0);
		assert!(vp.zoom < 0.25);
	}

	#[test]
	fn fit_ignores_empty_input() {
		let mut vp = viewport(1.0, 2.0, 1.0);
		vp.fit_to_nodes(&[], 800.0, 600.0);
		vp.fit_to_nodes(&[Node::memory("a", 0.0, 0.0, 1.0, MemoryData::default())], 0.0, 600.0);
		assert!(!vp.is_animating());
	}

	#[test]
	fn step_is_pure() {
		let mut vp = viewport(0.0, 0.0, 1.0);
		vp.release_with_velocity(10.0, 0.0);
		let next = vp.step();
		assert_eq!(vp.pan_x, 0.0);
		assert_eq!(next.pan_x, 10.0);
		assert!((next.velocity().0 - 9.2).abs() < 1e-12);
	}

	#[test]
	fn world_bounds_match_viewport() {
		let vp = viewport(100.0, 50.0, 2.0);
		let rect = vp.world_bounds(800.0, 600.0);
		assert_eq!(rect, WorldRect {
			min_x: -50.0,
			min_y: -25.0,
			max_x: 350.0,
			max_y: 275.0,
		});
	}
}
