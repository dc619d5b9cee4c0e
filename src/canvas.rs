// ============================================================================
// CANVAS MODEL — layers, grid, view, background
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use uuid::Uuid;

use crate::error::InputError;
use crate::geometry::Point;

/// Column/row count bounds.
pub const GRID_MIN: u32 = 1;
pub const GRID_MAX: u32 = 10;

/// View zoom bounds.
pub const ZOOM_MIN: f64 = 0.1;
pub const ZOOM_MAX: f64 = 2.0;

/// Layer scale bounds for pinch and slider input.
pub const LAYER_SCALE_MIN: f64 = 0.05;
pub const LAYER_SCALE_MAX: f64 = 5.0;

// ============================================================================
// LAYERS
// ============================================================================

/// Opaque, immutable layer identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerId(Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell layers apart in logs.
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// One placed image. Position and size are in canvas pixels.
#[derive(Clone, Debug)]
pub struct ImageLayer {
    pub id: LayerId,
    /// Decoded source pixels; shared so that replacing the layer list never
    /// copies image data.
    pub pixels: Arc<RgbaImage>,
    /// File name the image was loaded from (with extension).
    pub source_name: String,
    pub x: f64,
    pub y: f64,
    /// Always > 0.
    pub scale: f64,
    pub z_index: i64,
}

impl ImageLayer {
    pub fn source_width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn source_height(&self) -> u32 {
        self.pixels.height()
    }

    /// Rendered width in canvas pixels.
    pub fn width(&self) -> f64 {
        self.source_width() as f64 * self.scale
    }

    /// Rendered height in canvas pixels.
    pub fn height(&self) -> f64 {
        self.source_height() as f64 * self.scale
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.x + self.width() && p.y >= self.y && p.y < self.y + self.height()
    }
}

/// Partial update for [`crate::store::LayerStore::update_layer`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayerPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub scale: Option<f64>,
    pub z_index: Option<i64>,
}

impl LayerPatch {
    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::default() }
    }

    pub fn scale(scale: f64) -> Self {
        Self { scale: Some(scale), ..Self::default() }
    }

    pub(crate) fn apply(&self, layer: &ImageLayer) -> ImageLayer {
        let mut next = layer.clone();
        // Non-finite coordinates and non-positive or non-finite scales are dropped.
        if let Some(x) = self.x.filter(|v| v.is_finite()) {
            next.x = x;
        }
        if let Some(y) = self.y.filter(|v| v.is_finite()) {
            next.y = y;
        }
        if let Some(scale) = self.scale.filter(|s| s.is_finite() && *s > 0.0) {
            next.scale = scale;
        }
        if let Some(z) = self.z_index {
            next.z_index = z;
        }
        next
    }
}

// ============================================================================
// GRID
// ============================================================================

/// Cell aspect ratio lock.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum AspectRatio {
    #[default]
    Square,
    Portrait2x3,
    Landscape3x2,
    Portrait3x4,
    Landscape4x3,
    Portrait4x5,
    Story9x16,
    Wide16x9,
    /// User-entered `w:h`, both > 0.
    Custom { w: f64, h: f64 },
    /// No lock; width and height are independent.
    Free,
}

impl AspectRatio {
    pub fn presets() -> &'static [AspectRatio] {
        &[
            AspectRatio::Square,
            AspectRatio::Portrait2x3,
            AspectRatio::Landscape3x2,
            AspectRatio::Portrait3x4,
            AspectRatio::Landscape4x3,
            AspectRatio::Portrait4x5,
            AspectRatio::Story9x16,
            AspectRatio::Wide16x9,
            AspectRatio::Free,
        ]
    }

    /// `(w, h)` of the lock, or `None` when unlocked.
    pub fn dims(&self) -> Option<(f64, f64)> {
        let (w, h) = match *self {
            AspectRatio::Square => (1.0, 1.0),
            AspectRatio::Portrait2x3 => (2.0, 3.0),
            AspectRatio::Landscape3x2 => (3.0, 2.0),
            AspectRatio::Portrait3x4 => (3.0, 4.0),
            AspectRatio::Landscape4x3 => (4.0, 3.0),
            AspectRatio::Portrait4x5 => (4.0, 5.0),
            AspectRatio::Story9x16 => (9.0, 16.0),
            AspectRatio::Wide16x9 => (16.0, 9.0),
            AspectRatio::Custom { w, h } => (w, h),
            AspectRatio::Free => return None,
        };
        (w > 0.0 && h > 0.0).then_some((w, h))
    }

    /// Width divided by height, when locked.
    pub fn value(&self) -> Option<f64> {
        self.dims().map(|(w, h)| w / h)
    }

    pub fn label(&self) -> String {
        match self.dims() {
            Some((w, h)) => format!("{}:{}", w, h),
            None => "free".to_string(),
        }
    }
}

impl FromStr for AspectRatio {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("free") || s.eq_ignore_ascii_case("custom") {
            return Ok(AspectRatio::Free);
        }
        let err = || InputError::AspectRatio(s.to_string());
        let (w, h) = s.split_once(':').ok_or_else(err)?;
        let w: f64 = w.trim().parse().map_err(|_| err())?;
        let h: f64 = h.trim().parse().map_err(|_| err())?;
        if !(w > 0.0 && h > 0.0) {
            return Err(err());
        }
        Ok(AspectRatio::presets()
            .iter()
            .copied()
            .find(|p| p.dims() == Some((w, h)))
            .unwrap_or(AspectRatio::Custom { w, h }))
    }
}

/// Grid of output cells. `total_width × total_height` is the canvas space
/// that layer coordinates live in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridConfig {
    pub cols: u32,
    pub rows: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub ratio: AspectRatio,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cols: 2,
            rows: 1,
            cell_width: 1080,
            cell_height: 1080,
            ratio: AspectRatio::Square,
        }
    }
}

impl GridConfig {
    pub fn total_width(&self) -> u32 {
        self.cell_width.saturating_mul(self.cols)
    }

    pub fn total_height(&self) -> u32 {
        self.cell_height.saturating_mul(self.rows)
    }

    pub fn cell_count(&self) -> usize {
        (self.cols * self.rows) as usize
    }

    /// `[x, y, w, h]` of cell `(row, col)` in canvas pixels.
    pub fn cell_rect(&self, row: u32, col: u32) -> (u32, u32, u32, u32) {
        (
            col * self.cell_width,
            row * self.cell_height,
            self.cell_width,
            self.cell_height,
        )
    }

    /// Internal vertical grid lines, left to right.
    pub fn column_lines(&self) -> impl Iterator<Item = f64> + '_ {
        let total = self.total_width() as f64;
        (1..self.cols).map(move |i| i as f64 / self.cols as f64 * total)
    }

    /// Internal horizontal grid lines, top to bottom.
    pub fn row_lines(&self) -> impl Iterator<Item = f64> + '_ {
        let total = self.total_height() as f64;
        (1..self.rows).map(move |j| j as f64 / self.rows as f64 * total)
    }
}

// ============================================================================
// VIEW / BACKGROUND / SNAP FEEDBACK
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    /// Clamped to [`ZOOM_MIN`, `ZOOM_MAX`].
    pub zoom: f64,
    /// Pan offset in screen pixels, unclamped.
    pub translate: Point,
}

impl Default for ViewState {
    fn default() -> Self {
        Self { zoom: 1.0, translate: Point::ZERO }
    }
}

pub fn clamp_zoom(zoom: f64) -> f64 {
    zoom.clamp(ZOOM_MIN, ZOOM_MAX)
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackgroundConfig {
    pub is_transparent: bool,
    /// `#rrggbb` (or `#rgb`); only used when not transparent.
    pub color: String,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            is_transparent: true,
            color: "#ffffff".to_string(),
        }
    }
}

impl BackgroundConfig {
    /// Fill colour for the master raster, `None` when transparent.
    pub fn fill(&self) -> Result<Option<Rgba<u8>>, InputError> {
        if self.is_transparent {
            return Ok(None);
        }
        parse_hex_color(&self.color).map(Some)
    }
}

/// Parse `#rgb` / `#rrggbb` (leading `#` optional) into an opaque colour.
pub fn parse_hex_color(s: &str) -> Result<Rgba<u8>, InputError> {
    let err = || InputError::Colour(s.to_string());
    let hex = s.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return Err(err());
    }
    let channel = |i: usize, len: usize| u8::from_str_radix(&hex[i..i + len], 16).map_err(|_| err());
    match hex.len() {
        6 => Ok(Rgba([channel(0, 2)?, channel(2, 2)?, channel(4, 2)?, 255])),
        3 => {
            let expand = |v: u8| v * 17;
            Ok(Rgba([
                expand(channel(0, 1)?),
                expand(channel(1, 1)?),
                expand(channel(2, 1)?),
                255,
            ]))
        }
        _ => Err(err()),
    }
}

/// Which grid/edge line a gesture is currently locked to, per axis.
/// Pure UI feedback; cleared when the gesture ends.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SnapFeedback {
    /// Vertical line (an x coordinate) the layer snapped to.
    pub x: Option<f64>,
    /// Horizontal line (a y coordinate) the layer snapped to.
    pub y: Option<f64>,
}

impl SnapFeedback {
    pub fn is_snapping(&self) -> bool {
        self.x.is_some() || self.y.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_are_cell_size_times_count() {
        let grid = GridConfig { cols: 3, rows: 2, cell_width: 100, cell_height: 50, ..GridConfig::default() };
        assert_eq!(grid.total_width(), 300);
        assert_eq!(grid.total_height(), 100);
        assert_eq!(grid.cell_rect(1, 2), (200, 50, 100, 50));
        assert_eq!(grid.column_lines().collect::<Vec<_>>(), vec![100.0, 200.0]);
        assert_eq!(grid.row_lines().collect::<Vec<_>>(), vec![50.0]);
    }

    #[test]
    fn aspect_ratio_parsing() {
        assert_eq!("4:5".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait4x5);
        assert_eq!("free".parse::<AspectRatio>().unwrap(), AspectRatio::Free);
        assert_eq!(
            "5:2".parse::<AspectRatio>().unwrap(),
            AspectRatio::Custom { w: 5.0, h: 2.0 }
        );
        assert!("0:2".parse::<AspectRatio>().is_err());
        assert!("wide".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn hex_colours() {
        assert_eq!(parse_hex_color("#ff8000").unwrap(), Rgba([255, 128, 0, 255]));
        assert_eq!(parse_hex_color("#fff").unwrap(), Rgba([255, 255, 255, 255]));
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#gg0000").is_err());
    }

    #[test]
    fn transparent_background_has_no_fill() {
        let bg = BackgroundConfig { is_transparent: true, color: "not a colour".into() };
        assert_eq!(bg.fill().unwrap(), None);
    }

    #[test]
    fn patch_ignores_non_positive_scale() {
        let layer = ImageLayer {
            id: LayerId::new(),
            pixels: Arc::new(RgbaImage::new(4, 4)),
            source_name: "a.png".into(),
            x: 0.0,
            y: 0.0,
            scale: 2.0,
            z_index: 1,
        };
        let next = LayerPatch { scale: Some(0.0), x: Some(5.0), ..LayerPatch::default() }.apply(&layer);
        assert_eq!(next.scale, 2.0);
        assert_eq!(next.x, 5.0);
    }

    #[test]
    fn patch_ignores_non_finite_values() {
        let layer = ImageLayer {
            id: LayerId::new(),
            pixels: Arc::new(RgbaImage::new(4, 4)),
            source_name: "a.png".into(),
            x: 3.0,
            y: 4.0,
            scale: 2.0,
            z_index: 1,
        };
        let patch = LayerPatch { x: Some(f64::NAN), y: Some(f64::NEG_INFINITY), scale: Some(f64::INFINITY), z_index: None };
        let next = patch.apply(&layer);
        assert_eq!((next.x, next.y, next.scale), (3.0, 4.0, 2.0));

        let next = LayerPatch { x: Some(f64::INFINITY), y: Some(-7.5), ..LayerPatch::default() }.apply(&layer);
        assert_eq!((next.x, next.y), (3.0, -7.5));
    }
}
