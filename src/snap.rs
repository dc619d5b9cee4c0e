//! Edge and grid-line snapping for layer moves and layer scaling.
//!
//! Both entry points are pure: the same inputs always give the same result,
//! and a miss simply hands the candidate back unchanged.

use crate::canvas::{GridConfig, ImageLayer};

/// Default capture distance in canvas pixels.
pub const SNAP_THRESHOLD: f64 = 15.0;

/// Lines a layer edge can lock onto, per axis, in scan order.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapTargets {
    /// Vertical lines (x coordinates).
    pub xs: Vec<f64>,
    /// Horizontal lines (y coordinates).
    pub ys: Vec<f64>,
}

impl SnapTargets {
    /// Canvas edges first, then internal grid boundaries left-to-right /
    /// top-to-bottom.
    pub fn for_grid(grid: &GridConfig) -> Self {
        let mut xs = vec![0.0, grid.total_width() as f64];
        xs.extend(grid.column_lines());
        let mut ys = vec![0.0, grid.total_height() as f64];
        ys.extend(grid.row_lines());
        Self { xs, ys }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionSnap {
    pub x: f64,
    pub y: f64,
    pub snapped_x: bool,
    pub snapped_y: bool,
    pub line_x: Option<f64>,
    pub line_y: Option<f64>,
}

/// Snap one axis of a span `[start, start + len]`. Every target is tried with
/// leading edge, trailing edge and centre, in that order; the first hit wins.
fn snap_axis(start: f64, len: f64, targets: &[f64], threshold: f64) -> Option<(f64, f64)> {
    for &t in targets {
        if (start - t).abs() < threshold {
            return Some((t, t));
        }
        if (start + len - t).abs() < threshold {
            return Some((t - len, t));
        }
        if (start + len / 2.0 - t).abs() < threshold {
            return Some((t - len / 2.0, t));
        }
    }
    None
}

/// Adjust a candidate top-left position for a `width × height` layer so that
/// an edge or its centre lands on a target line within `threshold`.
pub fn try_snap_position(
    width: f64,
    height: f64,
    candidate_x: f64,
    candidate_y: f64,
    targets: &SnapTargets,
    threshold: f64,
) -> PositionSnap {
    let sx = snap_axis(candidate_x, width, &targets.xs, threshold);
    let sy = snap_axis(candidate_y, height, &targets.ys, threshold);
    PositionSnap {
        x: sx.map_or(candidate_x, |(x, _)| x),
        y: sy.map_or(candidate_y, |(y, _)| y),
        snapped_x: sx.is_some(),
        snapped_y: sy.is_some(),
        line_x: sx.map(|(_, line)| line),
        line_y: sy.map(|(_, line)| line),
    }
}

/// Line used by a scale snap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SnapLine {
    /// Right edge locked to x = value.
    Vertical(f64),
    /// Bottom edge locked to y = value.
    Horizontal(f64),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleSnap {
    pub scale: f64,
    pub line: Option<SnapLine>,
}

/// Scale at which the trailing edge of a span starting at `origin` with
/// unscaled length `source_len` hits one of `targets`, if that edge moves at
/// most `tolerance` pixels from where `candidate` would put it.
fn scale_for_axis(origin: f64, source_len: f64, candidate: f64, targets: &[f64], tolerance: f64) -> Option<(f64, f64)> {
    if source_len <= 0.0 {
        return None;
    }
    let edge = origin + source_len * candidate;
    targets.iter().find_map(|&t| {
        let scale = (t - origin) / source_len;
        (scale > 0.0 && (t - edge).abs() < tolerance).then_some((scale, t))
    })
}

/// Snap a layer's right or bottom edge onto a target line by solving for the
/// scale that puts it exactly there. Only one axis is applied per call; the
/// vertical (bottom edge) solution wins when both qualify.
pub fn try_snap_scale(
    layer: &ImageLayer,
    candidate_scale: f64,
    targets: &SnapTargets,
    tolerance: f64,
) -> ScaleSnap {
    let by_x = scale_for_axis(layer.x, layer.source_width() as f64, candidate_scale, &targets.xs, tolerance);
    let by_y = scale_for_axis(layer.y, layer.source_height() as f64, candidate_scale, &targets.ys, tolerance);

    match (by_y, by_x) {
        (Some((scale, line)), _) => ScaleSnap { scale, line: Some(SnapLine::Horizontal(line)) },
        (None, Some((scale, line))) => ScaleSnap { scale, line: Some(SnapLine::Vertical(line)) },
        (None, None) => ScaleSnap { scale: candidate_scale, line: None },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use image::RgbaImage;

    use super::*;
    use crate::canvas::LayerId;

    fn grid_2x1() -> SnapTargets {
        SnapTargets::for_grid(&GridConfig::default())
    }

    fn layer(x: f64, y: f64, w: u32, h: u32, scale: f64) -> ImageLayer {
        ImageLayer {
            id: LayerId::new(),
            pixels: Arc::new(RgbaImage::new(w, h)),
            source_name: "t.png".into(),
            x,
            y,
            scale,
            z_index: 1,
        }
    }

    #[test]
    fn targets_are_edges_then_grid_lines() {
        let t = SnapTargets::for_grid(&GridConfig { cols: 4, rows: 1, ..GridConfig::default() });
        assert_eq!(t.xs, vec![0.0, 4320.0, 1080.0, 2160.0, 3240.0]);
        assert_eq!(t.ys, vec![0.0, 1080.0]);
    }

    #[test]
    fn left_edge_within_threshold_snaps_to_zero() {
        let r = try_snap_position(400.0, 300.0, 10.0, 500.0, &grid_2x1(), SNAP_THRESHOLD);
        assert_eq!(r.x, 0.0);
        assert!(r.snapped_x);
        assert_eq!(r.line_x, Some(0.0));
        assert!(!r.snapped_y);
        assert_eq!(r.y, 500.0);
    }

    #[test]
    fn trailing_edge_snaps_to_grid_line() {
        // Right edge at 1075 is 5px from the 1080 column boundary.
        let r = try_snap_position(400.0, 300.0, 675.0, 400.0, &grid_2x1(), SNAP_THRESHOLD);
        assert_eq!(r.x, 680.0);
        assert_eq!(r.line_x, Some(1080.0));
    }

    #[test]
    fn centre_snaps_when_no_edge_is_close() {
        // Centre at 1085, edges far from every line.
        let r = try_snap_position(200.0, 300.0, 985.0, 400.0, &grid_2x1(), SNAP_THRESHOLD);
        assert_eq!(r.x, 980.0);
        assert_eq!(r.line_x, Some(1080.0));
    }

    #[test]
    fn edge_beats_centre_on_the_same_target() {
        // Width 20: left edge 8px from 0 and centre 18px away -> edge wins.
        let r = try_snap_position(20.0, 20.0, 8.0, 500.0, &grid_2x1(), SNAP_THRESHOLD);
        assert_eq!(r.x, 0.0);
        // Width 10 at -12: left edge 12px away, centre 7px away; edge still scanned first and in range.
        let r = try_snap_position(10.0, 20.0, -12.0, 500.0, &grid_2x1(), SNAP_THRESHOLD);
        assert_eq!(r.x, 0.0);
    }

    #[test]
    fn exact_threshold_distance_does_not_snap() {
        let r = try_snap_position(100.0, 100.0, 15.0, 500.0, &grid_2x1(), SNAP_THRESHOLD);
        assert!(!r.snapped_x);
        assert_eq!(r.x, 15.0);
    }

    #[test]
    fn scale_snaps_right_edge_onto_line() {
        // 100px wide source at x=0; scale 10.75 puts the right edge at 1075.
        let l = layer(0.0, 500.0, 100, 10, 1.0);
        let r = try_snap_scale(&l, 10.75, &grid_2x1(), SNAP_THRESHOLD);
        assert_eq!(r.line, Some(SnapLine::Vertical(1080.0)));
        assert!((r.scale - 10.8).abs() < 1e-12);
    }

    #[test]
    fn bottom_edge_wins_over_right_edge() {
        // Both edges within tolerance: right at 1078, bottom at 1078.
        let l = layer(0.0, 0.0, 100, 100, 1.0);
        let r = try_snap_scale(&l, 10.78, &grid_2x1(), SNAP_THRESHOLD);
        assert_eq!(r.line, Some(SnapLine::Horizontal(1080.0)));
        assert!((r.scale - 10.8).abs() < 1e-12);
    }

    #[test]
    fn scale_miss_returns_candidate() {
        let l = layer(0.0, 0.0, 100, 100, 1.0);
        let r = try_snap_scale(&l, 3.0, &grid_2x1(), SNAP_THRESHOLD);
        assert_eq!(r, ScaleSnap { scale: 3.0, line: None });
    }
}
