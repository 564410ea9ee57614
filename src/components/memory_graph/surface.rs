//! Immediate-mode 2D drawing surface.
//!
//! The renderer only needs paths, fill/stroke with colour, width, dash, and
//! alpha, and a clear. Any backend offering that set can implement
//! [`Surface`].

use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

/// Primitive drawing operations in CSS pixels.
pub trait Surface {
	/// Drawable size in CSS pixels.
	fn size(&self) -> (f64, f64);
	/// Paints the whole surface with `color`.
	fn clear(&mut self, color: &str);
	/// Colour for `fill`.
	fn set_fill(&mut self, color: &str);
	/// Colour for `stroke`.
	fn set_stroke(&mut self, color: &str);
	/// Stroke width in CSS pixels.
	fn set_line_width(&mut self, width: f64);
	/// Empty slice for solid lines.
	fn set_line_dash(&mut self, segments: &[f64]);
	/// Global opacity, 0..=1.
	fn set_alpha(&mut self, alpha: f64);
	/// Starts a new path.
	fn begin_path(&mut self);
	/// Starts a subpath.
	fn move_to(&mut self, x: f64, y: f64);
	/// Straight segment to the point.
	fn line_to(&mut self, x: f64, y: f64);
	/// Circular arc, angles in radians.
	fn arc(&mut self, x: f64, y: f64, radius: f64, start: f64, end: f64);
	/// Quadratic Bézier to `(x, y)` via `(cx, cy)`.
	fn quadratic_curve_to(&mut self, cx: f64, cy: f64, x: f64, y: f64);
	/// Rectangle subpath.
	fn rect(&mut self, x: f64, y: f64, w: f64, h: f64);
	/// Closes the current subpath.
	fn close_path(&mut self);
	/// Fills the current path.
	fn fill(&mut self);
	/// Strokes the current path.
	fn stroke(&mut self);

	/// Adds a rounded rectangle subpath.
	fn round_rect(&mut self, x: f64, y: f64, w: f64, h: f64, radius: f64) {
		let r = radius.clamp(0.0, w.min(h) / 2.0);
		self.move_to(x + r, y);
		self.line_to(x + w - r, y);
		self.quadratic_curve_to(x + w, y, x + w, y + r);
		self.line_to(x + w, y + h - r);
		self.quadratic_curve_to(x + w, y + h, x + w - r, y + h);
		self.line_to(x + r, y + h);
		self.quadratic_curve_to(x, y + h, x, y + h - r);
		self.line_to(x, y + r);
		self.quadratic_curve_to(x, y, x + r, y);
		self.close_path();
	}
}

/// `<canvas>` 2D context backend.
pub struct CanvasSurface {
	ctx: CanvasRenderingContext2d,
	width: f64,
	height: f64,
	pixel_ratio: f64,
}

impl CanvasSurface {
	/// Wraps a 2D context. Call `resize` before drawing.
	pub fn new(ctx: CanvasRenderingContext2d) -> Self {
		Self {
			ctx,
			width: 0.0,
			height: 0.0,
			pixel_ratio: 1.0,
		}
	}

	/// Sizes the backing store to `css × ratio` device pixels and scales the
	/// context so drawing stays in CSS pixels and strokes stay crisp.
	pub fn resize(&mut self, canvas: &HtmlCanvasElement, width: f64, height: f64, pixel_ratio: f64) {
		let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 { pixel_ratio } else { 1.0 };
		let (width, height) = (width.max(0.0), height.max(0.0));
		canvas.set_width((width * ratio).round() as u32);
		canvas.set_height((height * ratio).round() as u32);
		let style = canvas.style();
		let _ = style.set_property("width", &format!("{width}px"));
		let _ = style.set_property("height", &format!("{height}px"));
		let _ = self.ctx.set_transform(ratio, 0.0, 0.0, ratio, 0.0, 0.0);
		self.width = width;
		self.height = height;
		self.pixel_ratio = ratio;
	}

	/// Device pixels per CSS pixel.
	pub fn pixel_ratio(&self) -> f64 {
		self.pixel_ratio
	}
}

impl Surface for CanvasSurface {
	fn size(&self) -> (f64, f64) {
		(self.width, self.height)
	}

	fn clear(&mut self, color: &str) {
		self.ctx.set_global_alpha(1.0);
		self.ctx.set_fill_style_str(color);
		self.ctx.fill_rect(0.0, 0.0, self.width, self.height);
	}

	fn set_fill(&mut self, color: &str) {
		self.ctx.set_fill_style_str(color);
	}

	fn set_stroke(&mut self, color: &str) {
		self.ctx.set_stroke_style_str(color);
	}

	fn set_line_width(&mut self, width: f64) {
		self.ctx.set_line_width(width);
	}

	fn set_line_dash(&mut self, segments: &[f64]) {
		let array = js_sys::Array::new();
		for &segment in segments {
			array.push(&JsValue::from_f64(segment));
		}
		let _ = self.ctx.set_line_dash(&array);
	}

	fn set_alpha(&mut self, alpha: f64) {
		self.ctx.set_global_alpha(alpha);
	}

	fn begin_path(&mut self) {
		self.ctx.begin_path();
	}

	fn move_to(&mut self, x: f64, y: f64) {
		self.ctx.move_to(x, y);
	}

	fn line_to(&mut self, x: f64, y: f64) {
		self.ctx.line_to(x, y);
	}

	fn arc(&mut self, x: f64, y: f64, radius: f64, start: f64, end: f64) {
		let _ = self.ctx.arc(x, y, radius.max(0.0), start, end);
	}

	fn quadratic_curve_to(&mut self, cx: f64, cy: f64, x: f64, y: f64) {
		self.ctx.quadratic_curve_to(cx, cy, x, y);
	}

	fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
		self.ctx.rect(x, y, w, h);
	}

	fn close_path(&mut self) {
		self.ctx.close_path();
	}

	fn fill(&mut self) {
		self.ctx.fill();
	}

	fn stroke(&mut self) {
		self.ctx.stroke();
	}
}

/// One recorded surface call.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
	/// `clear` with a colour.
	Clear(String),
	/// `set_fill`.
	Fill(String),
	/// `set_stroke`.
	Stroke(String),
	/// `set_line_width`.
	LineWidth(f64),
	/// `set_line_dash`.
	LineDash(Vec<f64>),
	/// `set_alpha`.
	Alpha(f64),
	/// `begin_path`.
	BeginPath,
	/// `move_to`.
	MoveTo(f64, f64),
	/// `line_to`.
	LineTo(f64, f64),
	/// `arc`, centre and radius.
	Arc(f64, f64, f64),
	/// `quadratic_curve_to`.
	Quadratic(f64, f64, f64, f64),
	/// `rect`.
	Rect(f64, f64, f64, f64),
	/// `close_path`.
	ClosePath,
	/// `fill`.
	FillPath,
	/// `stroke`.
	StrokePath,
}

/// Headless surface that records every call.
#[derive(Clone, Debug, Default)]
pub struct CommandRecorder {
	/// Reported width.
	pub width: f64,
	/// Reported height.
	pub height: f64,
	/// Every call, in order.
	pub commands: Vec<DrawCommand>,
}

impl CommandRecorder {
	/// An empty recorder of the given size.
	pub fn new(width: f64, height: f64) -> Self {
		Self {
			width,
			height,
			commands: Vec::new(),
		}
	}

	/// Number of `fill` plus `stroke` calls.
	pub fn draw_calls(&self) -> usize {
		self.commands
			.iter()
			.filter(|c| matches!(c, DrawCommand::FillPath | DrawCommand::StrokePath))
			.count()
	}

	/// Every coordinate passed to a path call is finite.
	pub fn all_finite(&self) -> bool {
		self.commands.iter().all(|c| match *c {
			DrawCommand::MoveTo(a, b) | DrawCommand::LineTo(a, b) => a.is_finite() && b.is_finite(),
			DrawCommand::Arc(a, b, c) => a.is_finite() && b.is_finite() && c.is_finite(),
			DrawCommand::Quadratic(a, b, c, d) | DrawCommand::Rect(a, b, c, d) => {
				a.is_finite() && b.is_finite() && c.is_finite() && d.is_finite()
			}
			DrawCommand::LineWidth(w) | DrawCommand::Alpha(w) => w.is_finite(),
			_ => true,
		})
	}

	/// Forgets the recorded calls.
	pub fn clear_log(&mut self) {
		self.commands.clear();
	}
}

impl Surface for CommandRecorder {
	fn size(&self) -> (f64, f64) {
		(self.width, self.height)
	}

	fn clear(&mut self, color: &str) {
		self.commands.push(DrawCommand::Clear(color.into()));
	}

	fn set_fill(&mut self, color: &str) {
		self.commands.push(DrawCommand::Fill(color.into()));
	}

	fn set_stroke(&mut self, color: &str) {
		self.commands.push(DrawCommand::Stroke(color.into()));
	}

	fn set_line_width(&mut self, width: f64) {
		self.commands.push(DrawCommand::LineWidth(width));
	}

	fn set_line_dash(&mut self, segments: &[f64]) {
		self.commands.push(DrawCommand::LineDash(segments.to_vec()));
	}

	fn set_alpha(&mut self, alpha: f64) {
		self.commands.push(DrawCommand::Alpha(alpha));
	}

	fn begin_path(&mut self) {
		self.commands.push(DrawCommand::BeginPath);
	}

	fn move_to(&mut self, x: f64, y: f64) {
		self.commands.push(DrawCommand::MoveTo(x, y));
	}

	fn line_to(&mut self, x: f64, y: f64) {
		self.commands.push(DrawCommand::LineTo(x, y));
	}

	fn arc(&mut self, x: f64, y: f64, radius: f64, _start: f64, _end: f64) {
		self.commands.push(DrawCommand::Arc(x, y, radius));
	}

	fn quadratic_curve_to(&mut self, cx: f64, cy: f64, x: f64, y: f64) {
		self.commands.push(DrawCommand::Quadratic(cx, cy, x, y));
	}

	fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
		self.commands.push(DrawCommand::Rect(x, y, w, h));
	}

	fn close_path(&mut self) {
		self.commands.push(DrawCommand::ClosePath);
	}

	fn fill(&mut self) {
		self.commands.push(DrawCommand::FillPath);
	}

	fn stroke(&mut self) {
		self.commands.push(DrawCommand::StrokePath);
	}
}
