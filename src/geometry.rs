//! Coordinate mapping between screen pixels and canvas (document) pixels.
//!
//! Three spaces are involved:
//!   * **screen**: raw pointer coordinates reported by the host window
//!   * **view**: the canvas frame after the fit-to-viewport display scale,
//!     centred in the viewport, then zoomed about its own centre and panned
//!   * **canvas**: logical document pixels, `total_width × total_height`
//!
//! Everything here is a pure function of its arguments; the viewport size is
//! always passed in by the caller and never read from the environment.

use std::ops::{Add, Div, Mul, Sub};

/// Viewports narrower than this are laid out without side chrome.
pub const COMPACT_BREAKPOINT: f64 = 1024.0;
/// Width reserved for the sidebar and its gutter on wide viewports.
pub const SIDEBAR_WIDTH: f64 = 320.0 + 48.0;
/// Height reserved for the header on wide viewports.
pub const HEADER_HEIGHT: f64 = 50.0;
/// Margin kept free around the fitted canvas frame.
pub const FRAME_PADDING: f64 = 40.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Point {
    type Output = Point;
    fn div(self, rhs: f64) -> Point {
        Point::new(self.x / rhs, self.y / rhs)
    }
}

/// Size of the host viewport in screen pixels. Recomputed by the caller on
/// resize and handed to every mapping call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn is_compact(&self) -> bool {
        self.width < COMPACT_BREAKPOINT
    }

    /// Area left for the canvas frame once chrome and padding are removed.
    pub fn available_area(&self) -> (f64, f64) {
        let (w, h) = if self.is_compact() {
            (self.width, self.height)
        } else {
            (self.width - SIDEBAR_WIDTH, self.height - HEADER_HEIGHT)
        };
        (w - FRAME_PADDING, h - FRAME_PADDING)
    }
}

/// Scale that fits the whole `total_width × total_height` canvas into the
/// viewport, preserving aspect ratio. Returns `1.0` for an empty canvas.
pub fn display_scale(total_width: u32, total_height: u32, viewport: ViewportSize) -> f64 {
    if total_width == 0 || total_height == 0 {
        return 1.0;
    }
    let (avail_w, avail_h) = viewport.available_area();
    (avail_w / total_width as f64).min(avail_h / total_height as f64)
}

/// Full canvas → screen transform for one frame: document scale, user zoom
/// and pan, anchored at the viewport centre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub display_scale: f64,
    pub zoom: f64,
    pub translate: Point,
    pub viewport_center: Point,
    /// Canvas size in document pixels.
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl ViewTransform {
    /// Size of the canvas frame on screen before zoom is applied.
    pub fn frame_size(&self) -> (f64, f64) {
        (
            self.canvas_width * self.display_scale,
            self.canvas_height * self.display_scale,
        )
    }

    /// Combined canvas-pixel → screen-pixel factor.
    pub fn pixels_per_canvas_unit(&self) -> f64 {
        self.display_scale * self.zoom
    }

    /// Screen position of the (zoomed) frame's centre.
    fn frame_center(&self) -> Point {
        self.viewport_center + self.translate
    }

    pub fn canvas_to_screen(&self, p: Point) -> Point {
        let (fw, fh) = self.frame_size();
        let in_frame = p * self.display_scale - Point::new(fw / 2.0, fh / 2.0);
        self.frame_center() + in_frame * self.zoom
    }

    pub fn screen_to_canvas(&self, s: Point) -> Point {
        let (fw, fh) = self.frame_size();
        let in_frame = (s - self.frame_center()) / self.zoom + Point::new(fw / 2.0, fh / 2.0);
        in_frame / self.display_scale
    }

    /// Converts a screen-space displacement to canvas space.
    pub fn screen_delta_to_canvas(&self, delta: Point) -> Point {
        delta / self.pixels_per_canvas_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform() -> ViewTransform {
        ViewTransform {
            display_scale: 0.25,
            zoom: 1.5,
            translate: Point::new(-30.0, 12.0),
            viewport_center: Point::new(640.0, 360.0),
            canvas_width: 2160.0,
            canvas_height: 1080.0,
        }
    }

    #[test]
    fn display_scale_fits_the_limiting_axis() {
        // Wide viewport: 1920-368-40 = 1512 wide, 1080-50-40 = 990 tall.
        let s = display_scale(2160, 1080, ViewportSize::new(1920.0, 1080.0));
        assert!((s - 1512.0 / 2160.0).abs() < 1e-12);

        // Compact viewport: no chrome, only padding.
        let s = display_scale(1080, 1080, ViewportSize::new(400.0, 800.0));
        assert!((s - 360.0 / 1080.0).abs() < 1e-12);
    }

    #[test]
    fn display_scale_on_empty_canvas_is_neutral() {
        assert_eq!(display_scale(0, 1080, ViewportSize::new(1920.0, 1080.0)), 1.0);
        assert_eq!(display_scale(1080, 0, ViewportSize::new(1920.0, 1080.0)), 1.0);
    }

    #[test]
    fn canvas_center_lands_on_viewport_center_plus_pan() {
        let t = transform();
        let s = t.canvas_to_screen(Point::new(1080.0, 540.0));
        assert!((s.x - 610.0).abs() < 1e-9);
        assert!((s.y - 372.0).abs() < 1e-9);
    }

    #[test]
    fn screen_to_canvas_inverts_canvas_to_screen() {
        let t = transform();
        for p in [Point::ZERO, Point::new(2160.0, 1080.0), Point::new(-300.5, 77.25)] {
            let back = t.screen_to_canvas(t.canvas_to_screen(p));
            assert!((back.x - p.x).abs() < 1e-9 && (back.y - p.y).abs() < 1e-9);
        }
    }

    #[test]
    fn screen_delta_divides_by_combined_scale() {
        let t = transform();
        let d = t.screen_delta_to_canvas(Point::new(37.5, -75.0));
        assert!((d.x - 100.0).abs() < 1e-9);
        assert!((d.y + 200.0).abs() < 1e-9);
    }
}
