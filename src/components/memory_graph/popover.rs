//! Placement of the floating node detail panel.

use super::config::PopoverConfig;

/// Side of the node the panel is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
	/// To the right of the node.
	Right,
	/// To the left of the node.
	Left,
	/// Under the node.
	Below,
	/// Over the node.
	Above,
}

impl Side {
	/// Tried in this order; the first side with enough room wins.
	pub const PREFERENCE: [Side; 4] = [Side::Right, Side::Left, Side::Below, Side::Above];

	fn is_horizontal(self) -> bool {
		matches!(self, Side::Right | Side::Left)
	}
}

/// Everything needed to place one panel, in container pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PopoverRequest {
	/// Node centre, screen x.
	pub anchor_x: f64,
	/// Node centre, screen y.
	pub anchor_y: f64,
	/// On-screen radius of the node.
	pub node_radius: f64,
	/// Requested panel width.
	pub width: f64,
	/// Requested panel height.
	pub height: f64,
	/// Container width.
	pub container_width: f64,
	/// Container height.
	pub container_height: f64,
}

/// Line from the node boundary to the panel centre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Connector {
	/// Point on the node boundary.
	pub from: (f64, f64),
	/// Centre of the panel.
	pub to: (f64, f64),
}

/// Where the panel goes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
	/// Side of the node the panel sits on.
	pub side: Side,
	/// Left edge in container pixels.
	pub x: f64,
	/// Top edge in container pixels.
	pub y: f64,
	/// Panel size after shrinking to fit the container.
	pub width: f64,
	/// Panel height after shrinking to fit.
	pub height: f64,
	/// Line from node to panel.
	pub connector: Connector,
}

/// Chooses panel sides and positions.
#[derive(Clone, Copy, Debug, Default)]
pub struct PopoverPlacer {
	config: PopoverConfig,
}

impl PopoverPlacer {
	/// A placer with the given spacing.
	pub fn new(config: PopoverConfig) -> Self {
		Self { config }
	}

	/// Free room on each side between the node edge plus margin and the container edge.
	pub fn available_space(&self, req: &PopoverRequest) -> [(Side, f64); 4] {
		let reach = sanitize(req.node_radius) + self.config.margin;
		let (ax, ay) = (finite(req.anchor_x), finite(req.anchor_y));
		let (cw, ch) = (sanitize(req.container_width), sanitize(req.container_height));
		Side::PREFERENCE.map(|side| {
			let space = match side {
				Side::Right => cw - (ax + reach),
				Side::Left => ax - reach,
				Side::Below => ch - (ay + reach),
				Side::Above => ay - reach,
			};
			(side, space)
		})
	}

	/// Picks a side for the panel and positions it. The returned rectangle
	/// always lies within `[guard, container - guard]` whenever the container
	/// is larger than twice the guard.
	pub fn place(&self, req: &PopoverRequest) -> Placement {
		let guard = self.config.edge_guard.max(0.0);
		let (cw, ch) = (sanitize(req.container_width), sanitize(req.container_height));
		let width = sanitize(req.width).min((cw - 2.0 * guard).max(0.0));
		let height = sanitize(req.height).min((ch - 2.0 * guard).max(0.0));

		// Sides are judged by the requested extent; a panel shrunk to the
		// container would only ever fit by covering the node.
		let (wanted_w, wanted_h) = (sanitize(req.width), sanitize(req.height));
		let spaces = self.available_space(req);
		let side = spaces
			.iter()
			.find(|(side, space)| *space >= if side.is_horizontal() { wanted_w } else { wanted_h })
			.or_else(|| {
				// Earliest side wins ties.
				spaces.iter().fold(None, |best: Option<&(Side, f64)>, candidate| match best {
					Some(b) if b.1 >= candidate.1 => Some(b),
					_ => Some(candidate),
				})
			})
			.map_or(Side::Right, |(side, _)| *side);

		let radius = sanitize(req.node_radius);
		let reach = radius + self.config.margin;
		let (ax, ay) = (finite(req.anchor_x), finite(req.anchor_y));
		let (x, y) = match side {
			Side::Right => (ax + reach, ay - height / 2.0),
			Side::Left => (ax - reach - width, ay - height / 2.0),
			Side::Below => (ax - width / 2.0, ay + reach),
			Side::Above => (ax - width / 2.0, ay - reach - height),
		};
		let x = clamp_into(x, width, cw, guard);
		let y = clamp_into(y, height, ch, guard);

		let from = match side {
			Side::Right => (ax + radius, ay),
			Side::Left => (ax - radius, ay),
			Side::Below => (ax, ay + radius),
			Side::Above => (ax, ay - radius),
		};
		Placement {
			side,
			x,
			y,
			width,
			height,
			connector: Connector {
				from,
				to: (x + width / 2.0, y + height / 2.0),
			},
		}
	}
}

fn finite(value: f64) -> f64 {
	if value.is_finite() { value } else { 0.0 }
}

fn sanitize(value: f64) -> f64 {
	finite(value).max(0.0)
}

fn clamp_into(position: f64, extent: f64, container: f64, guard: f64) -> f64 {
	let hi = (container - extent - guard).max(guard);
	position.clamp(guard, hi)
}
