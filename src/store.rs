// ============================================================================
// LAYER STORE — authoritative editor state
// ============================================================================
//
// Every mutation replaces the affected value wholesale (never edits a layer in
// place) and is published through the matching `Signal`. Operations on ids
// that no longer exist are silent no-ops.

use crate::canvas::{
    AspectRatio, BackgroundConfig, GRID_MAX, GRID_MIN, GridConfig, ImageLayer, LayerId, LayerPatch,
    ViewState, clamp_zoom, parse_hex_color,
};
use crate::error::InputError;
use crate::geometry::{Point, ViewTransform, ViewportSize, display_scale};
use crate::intake::DecodedImage;
use crate::raster::GeneratedSlices;
use crate::signal::{Signal, SubscriptionId};
use crate::snap::SnapTargets;
use crate::{log_info, log_warn};

/// New layers are sized to this fraction of the largest fit.
pub const INITIAL_FIT_FRACTION: f64 = 0.6;
/// Per-insertion offset so a batch does not stack perfectly.
pub const BATCH_STAGGER: f64 = 30.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellAxis {
    Width,
    Height,
}

#[derive(Debug)]
pub struct LayerStore {
    layers: Signal<Vec<ImageLayer>>,
    active_layer: Signal<Option<LayerId>>,
    grid: Signal<GridConfig>,
    background: Signal<BackgroundConfig>,
    view: Signal<ViewState>,
    results: Signal<Option<GeneratedSlices>>,
}

impl Default for LayerStore {
    fn default() -> Self {
        Self::new(GridConfig::default(), BackgroundConfig::default())
    }
}

impl LayerStore {
    pub fn new(grid: GridConfig, background: BackgroundConfig) -> Self {
        Self {
            layers: Signal::new(Vec::new()),
            active_layer: Signal::new(None),
            grid: Signal::new(grid),
            background: Signal::new(background),
            view: Signal::new(ViewState::default()),
            results: Signal::new(None),
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Layers in insertion order.
    pub fn layers(&self) -> &[ImageLayer] {
        self.layers.get()
    }

    /// Layers sorted bottom-to-top by `z_index`.
    pub fn layers_by_z(&self) -> Vec<&ImageLayer> {
        let mut sorted: Vec<&ImageLayer> = self.layers.get().iter().collect();
        sorted.sort_by_key(|l| l.z_index);
        sorted
    }

    pub fn layer(&self, id: LayerId) -> Option<&ImageLayer> {
        self.layers.get().iter().find(|l| l.id == id)
    }

    pub fn active_layer_id(&self) -> Option<LayerId> {
        *self.active_layer.get()
    }

    pub fn active_layer(&self) -> Option<&ImageLayer> {
        self.active_layer_id().and_then(|id| self.layer(id))
    }

    pub fn grid(&self) -> &GridConfig {
        self.grid.get()
    }

    pub fn background(&self) -> &BackgroundConfig {
        self.background.get()
    }

    pub fn view(&self) -> &ViewState {
        self.view.get()
    }

    pub fn results(&self) -> Option<&GeneratedSlices> {
        self.results.get().as_ref()
    }

    /// Top-most layer under a canvas point.
    pub fn layer_at(&self, p: Point) -> Option<LayerId> {
        self.layers
            .get()
            .iter()
            .filter(|l| l.contains(p))
            .max_by_key(|l| l.z_index)
            .map(|l| l.id)
    }

    /// A layer is drawn dimmed while some other layer is active.
    pub fn is_dimmed(&self, id: LayerId) -> bool {
        matches!(self.active_layer_id(), Some(active) if active != id)
    }

    pub fn snap_targets(&self) -> SnapTargets {
        SnapTargets::for_grid(self.grid())
    }

    /// Canvas → screen transform for the current view in `viewport`.
    pub fn view_transform(&self, viewport: ViewportSize) -> ViewTransform {
        let grid = self.grid();
        let view = self.view();
        ViewTransform {
            display_scale: display_scale(grid.total_width(), grid.total_height(), viewport),
            zoom: view.zoom,
            translate: view.translate,
            viewport_center: viewport.center(),
            canvas_width: grid.total_width() as f64,
            canvas_height: grid.total_height() as f64,
        }
    }

    // ------------------------------------------------------------------
    // Layers
    // ------------------------------------------------------------------

    /// Add a single decoded image as a new, active layer.
    pub fn add_layer(&mut self, image: DecodedImage) -> LayerId {
        let ids = self.add_layers(vec![image]);
        ids[0]
    }

    /// Add a whole decoded batch in one replacement. Placement stagger and
    /// stacking follow the order of `images`; the last one becomes active.
    pub fn add_layers(&mut self, images: Vec<DecodedImage>) -> Vec<LayerId> {
        if images.is_empty() {
            return Vec::new();
        }
        let grid = *self.grid();
        let cw = grid.total_width() as f64;
        let ch = grid.total_height() as f64;
        let mut next_z = self.layers.get().iter().map(|l| l.z_index).max().unwrap_or(0) + 1;

        let mut next = self.layers.get().clone();
        let mut ids = Vec::with_capacity(images.len());
        for (index, image) in images.into_iter().enumerate() {
            let iw = image.pixels.width() as f64;
            let ih = image.pixels.height() as f64;
            let scale = (cw / iw).min(ch / ih) * INITIAL_FIT_FRACTION;
            let offset = index as f64 * BATCH_STAGGER;
            let layer = ImageLayer {
                id: LayerId::new(),
                pixels: image.pixels,
                source_name: image.source_name,
                x: (cw - iw * scale) / 2.0 + offset,
                y: (ch - ih * scale) / 2.0 + offset,
                scale,
                z_index: next_z,
            };
            next_z += 1;
            ids.push(layer.id);
            next.push(layer);
        }
        log_info!("Added {} layer(s), {} total", ids.len(), next.len());

        self.layers.set(next);
        self.active_layer.set(ids.last().copied());
        ids
    }

    pub fn update_layer(&mut self, id: LayerId, patch: LayerPatch) {
        if self.layer(id).is_none() {
            return;
        }
        self.layers.update(|ls| {
            ls.iter()
                .map(|l| if l.id == id { patch.apply(l) } else { l.clone() })
                .collect()
        });
    }

    pub fn remove_layer(&mut self, id: LayerId) {
        if self.layer(id).is_none() {
            return;
        }
        self.layers.update(|ls| ls.iter().filter(|l| l.id != id).cloned().collect());
        if self.active_layer_id() == Some(id) {
            self.active_layer.set(None);
        }
    }

    pub fn set_active(&mut self, id: Option<LayerId>) {
        // Only accept ids that still exist.
        let id = id.filter(|id| self.layer(*id).is_some());
        if self.active_layer_id() != id {
            self.active_layer.set(id);
        }
    }

    pub fn bring_to_front(&mut self, id: LayerId) {
        let Some(max) = self.layers.get().iter().map(|l| l.z_index).max() else { return };
        self.update_layer(id, LayerPatch { z_index: Some(max + 1), ..LayerPatch::default() });
    }

    pub fn send_to_back(&mut self, id: LayerId) {
        let Some(min) = self.layers.get().iter().map(|l| l.z_index).min() else { return };
        self.update_layer(id, LayerPatch { z_index: Some(min - 1), ..LayerPatch::default() });
    }

    // ------------------------------------------------------------------
    // Grid
    // ------------------------------------------------------------------

    pub fn update_grid(&mut self, cols_delta: i32, rows_delta: i32) {
        let clamp = |v: u32, d: i32| (v as i64 + d as i64).clamp(GRID_MIN as i64, GRID_MAX as i64) as u32;
        self.grid.update(|g| GridConfig {
            cols: clamp(g.cols, cols_delta),
            rows: clamp(g.rows, rows_delta),
            ..*g
        });
    }

    /// Select a ratio lock. With a locked ratio the height follows the width.
    pub fn set_aspect_ratio(&mut self, ratio: AspectRatio) {
        self.grid.update(|g| {
            let mut next = GridConfig { ratio, ..*g };
            if let Some(r) = ratio.value() {
                next.cell_height = round_dimension(g.cell_width as f64 / r);
            }
            next
        });
    }

    /// Set one cell dimension from raw user input. With a ratio lock the paired
    /// dimension is recomputed from the same ratio.
    pub fn update_cell_dimension(&mut self, axis: CellAxis, value: f64) -> Result<(), InputError> {
        let field = match axis {
            CellAxis::Width => "cell width",
            CellAxis::Height => "cell height",
        };
        if !(value > 0.0) || value.round() < 1.0 || !value.is_finite() {
            log_warn!("Rejected {} = {}", field, value);
            return Err(InputError::NonPositive { field, value });
        }
        let v = value.round() as u32;
        self.grid.update(|g| {
            let ratio = g.ratio.value();
            match axis {
                CellAxis::Width => GridConfig {
                    cell_width: v,
                    cell_height: ratio.map_or(g.cell_height, |r| round_dimension(v as f64 / r)),
                    ..*g
                },
                CellAxis::Height => GridConfig {
                    cell_height: v,
                    cell_width: ratio.map_or(g.cell_width, |r| round_dimension(v as f64 * r)),
                    ..*g
                },
            }
        });
        Ok(())
    }

    pub fn set_grid(&mut self, grid: GridConfig) {
        self.grid.set(GridConfig {
            cols: grid.cols.clamp(GRID_MIN, GRID_MAX),
            rows: grid.rows.clamp(GRID_MIN, GRID_MAX),
            cell_width: grid.cell_width.max(1),
            cell_height: grid.cell_height.max(1),
            ratio: grid.ratio,
        });
    }

    // ------------------------------------------------------------------
    // Background / view
    // ------------------------------------------------------------------

    pub fn set_transparent(&mut self, transparent: bool) {
        self.background.update(|b| BackgroundConfig { is_transparent: transparent, ..b.clone() });
    }

    pub fn set_background_color(&mut self, color: &str) -> Result<(), InputError> {
        parse_hex_color(color)?;
        self.background.update(|b| BackgroundConfig { color: color.trim().to_string(), ..b.clone() });
        Ok(())
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_nan() {
            return;
        }
        self.view.update(|v| ViewState { zoom: clamp_zoom(zoom), ..*v });
    }

    pub fn set_translate(&mut self, translate: Point) {
        self.view.update(|v| ViewState { translate, ..*v });
    }

    pub fn reset_view(&mut self) {
        self.view.set(ViewState::default());
    }

    // ------------------------------------------------------------------
    // Results / session
    // ------------------------------------------------------------------

    pub fn set_results(&mut self, slices: GeneratedSlices) {
        self.results.set(Some(slices));
    }

    /// "Continue editing": drop generated output, keep the composition.
    pub fn clear_results(&mut self) {
        if self.results.get().is_some() {
            self.results.set(None);
        }
    }

    /// Drop every layer and result and reset the view.
    pub fn reset(&mut self) {
        self.layers.set(Vec::new());
        self.active_layer.set(None);
        self.results.set(None);
        self.reset_view();
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn subscribe_layers(&mut self, f: impl FnMut(&Vec<ImageLayer>) + 'static) -> SubscriptionId {
        self.layers.subscribe(f)
    }

    pub fn subscribe_active(&mut self, f: impl FnMut(&Option<LayerId>) + 'static) -> SubscriptionId {
        self.active_layer.subscribe(f)
    }

    pub fn subscribe_grid(&mut self, f: impl FnMut(&GridConfig) + 'static) -> SubscriptionId {
        self.grid.subscribe(f)
    }

    pub fn subscribe_background(&mut self, f: impl FnMut(&BackgroundConfig) + 'static) -> SubscriptionId {
        self.background.subscribe(f)
    }

    pub fn subscribe_view(&mut self, f: impl FnMut(&ViewState) + 'static) -> SubscriptionId {
        self.view.subscribe(f)
    }

    pub fn subscribe_results(&mut self, f: impl FnMut(&Option<GeneratedSlices>) + 'static) -> SubscriptionId {
        self.results.subscribe(f)
    }
}

fn round_dimension(v: f64) -> u32 {
    (v.round() as u32).max(1)
}
