// ============================================================================
// GESTURE CONTROLLER — pointer/touch state machine over the layer store
// ============================================================================
//
// Events carry screen-space contact positions. The controller converts them
// to canvas space with the store's current view transform, runs snapping and
// writes the outcome back into the store. The store is passed in per event;
// the controller never keeps a reference to it between events.

use crate::canvas::{LAYER_SCALE_MAX, LAYER_SCALE_MIN, LayerId, LayerPatch, SnapFeedback};
use crate::geometry::{Point, ViewportSize};
use crate::snap::{SNAP_THRESHOLD, SnapLine, try_snap_position, try_snap_scale};
use crate::store::LayerStore;

/// Wheel delta → zoom delta factor.
pub const WHEEL_SENSITIVITY: f64 = 0.001;

/// Pinch distances below this are treated as a single point.
const MIN_PINCH_DISTANCE: f64 = 1e-6;

/// What the first contact of a gesture landed on. Decided by the caller
/// (typically via [`LayerStore::layer_at`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitTarget {
    Layer(LayerId),
    Background,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureState {
    Idle,
    DraggingLayer {
        layer: LayerId,
        pointer_start: Point,
        layer_start: Point,
    },
    PanningView {
        /// Pointer start minus the translate at gesture start.
        anchor: Point,
    },
    ZoomingView {
        start_distance: f64,
        start_zoom: f64,
    },
    ZoomingLayer {
        layer: LayerId,
        start_distance: f64,
        start_scale: f64,
        start_origin: Point,
        /// Pinch centroid in canvas space at gesture start.
        start_center: Point,
    },
}

impl GestureState {
    pub fn name(&self) -> &'static str {
        match self {
            GestureState::Idle => "idle",
            GestureState::DraggingLayer { .. } => "dragging-layer",
            GestureState::PanningView { .. } => "panning-view",
            GestureState::ZoomingView { .. } => "zooming-view",
            GestureState::ZoomingLayer { .. } => "zooming-layer",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureConfig {
    /// Position snap capture distance, canvas pixels.
    pub snap_threshold: f64,
    /// Scale snap tolerance on the moving edge, canvas pixels.
    pub scale_snap_tolerance: f64,
    pub wheel_sensitivity: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            snap_threshold: SNAP_THRESHOLD,
            scale_snap_tolerance: SNAP_THRESHOLD,
            wheel_sensitivity: WHEEL_SENSITIVITY,
        }
    }
}

/// Input event in screen coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum GestureEvent {
    /// New contacts went down; `contacts` lists every active contact.
    PointerDown { contacts: Vec<Point>, target: HitTarget },
    PointerMove { contacts: Vec<Point> },
    /// A contact was lifted; `remaining` contacts stay down.
    PointerUp { remaining: usize },
    Wheel { delta_y: f64 },
}

#[derive(Debug)]
pub struct GestureController {
    state: GestureState,
    viewport: ViewportSize,
    config: GestureConfig,
    feedback: SnapFeedback,
}

impl GestureController {
    pub fn new(viewport: ViewportSize) -> Self {
        Self::with_config(viewport, GestureConfig::default())
    }

    pub fn with_config(viewport: ViewportSize, config: GestureConfig) -> Self {
        Self {
            state: GestureState::Idle,
            viewport,
            config,
            feedback: SnapFeedback::default(),
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn snap_feedback(&self) -> SnapFeedback {
        self.feedback
    }

    pub fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    /// Call on window resize.
    pub fn set_viewport(&mut self, viewport: ViewportSize) {
        self.viewport = viewport;
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn handle(&mut self, store: &mut LayerStore, event: GestureEvent) {
        match event {
            GestureEvent::PointerDown { contacts, target } => self.pointer_down(store, &contacts, target),
            GestureEvent::PointerMove { contacts } => self.pointer_move(store, &contacts),
            GestureEvent::PointerUp { remaining } => self.pointer_up(remaining),
            GestureEvent::Wheel { delta_y } => self.wheel(store, delta_y),
        }
    }

    pub fn pointer_down(&mut self, store: &mut LayerStore, contacts: &[Point], target: HitTarget) {
        match contacts {
            [] => {}
            [p] => self.start_single(store, *p, target),
            [a, b, ..] => self.start_pinch(store, *a, *b, target),
        }
    }

    fn start_single(&mut self, store: &mut LayerStore, p: Point, target: HitTarget) {
        self.feedback = SnapFeedback::default();
        match target {
            HitTarget::Layer(id) => {
                let Some(layer) = store.layer(id) else {
                    self.state = GestureState::Idle;
                    return;
                };
                let layer_start = layer.origin();
                store.set_active(Some(id));
                self.state = GestureState::DraggingLayer { layer: id, pointer_start: p, layer_start };
            }
            HitTarget::Background => {
                store.set_active(None);
                self.state = GestureState::PanningView { anchor: p - store.view().translate };
            }
        }
    }

    fn start_pinch(&mut self, store: &mut LayerStore, a: Point, b: Point, target: HitTarget) {
        self.feedback = SnapFeedback::default();
        let start_distance = a.distance(b);
        if start_distance < MIN_PINCH_DISTANCE {
            // Coincident fingers give no usable ratio; drop whatever ran before.
            self.state = GestureState::Idle;
            return;
        }

        // A second finger joining a layer drag keeps that layer as the target.
        let layer = match (target, self.state) {
            (HitTarget::Layer(id), _) => Some(id),
            (HitTarget::Background, GestureState::DraggingLayer { layer, .. }) => Some(layer),
            _ => None,
        };

        let transform = store.view_transform(self.viewport);
        self.state = match layer.and_then(|id| store.layer(id)) {
            Some(l) => GestureState::ZoomingLayer {
                layer: l.id,
                start_distance,
                start_scale: l.scale,
                start_origin: l.origin(),
                start_center: transform.screen_to_canvas(a.midpoint(b)),
            },
            None => GestureState::ZoomingView { start_distance, start_zoom: store.view().zoom },
        };
        if let GestureState::ZoomingLayer { layer, .. } = self.state {
            store.set_active(Some(layer));
        }
    }

    pub fn pointer_move(&mut self, store: &mut LayerStore, contacts: &[Point]) {
        match self.state {
            GestureState::Idle => {}
            GestureState::DraggingLayer { layer, pointer_start, layer_start } => {
                let Some(&p) = contacts.first() else { return };
                self.drag_layer(store, layer, p - pointer_start, layer_start);
            }
            GestureState::PanningView { anchor } => {
                let Some(&p) = contacts.first() else { return };
                store.set_translate(p - anchor);
            }
            GestureState::ZoomingView { start_distance, start_zoom } => {
                let [a, b, ..] = contacts else { return };
                store.set_zoom(start_zoom * (a.distance(*b) / start_distance));
            }
            GestureState::ZoomingLayer { layer, start_distance, start_scale, start_origin, start_center } => {
                let [a, b, ..] = contacts else { return };
                let scale = (start_scale * (a.distance(*b) / start_distance)).clamp(LAYER_SCALE_MIN, LAYER_SCALE_MAX);
                let center = store.view_transform(self.viewport).screen_to_canvas(a.midpoint(*b));
                // Keep the image point under the pinch centroid under it.
                let origin = center - (start_center - start_origin) * (scale / start_scale);
                if store.layer(layer).is_none() {
                    self.state = GestureState::Idle;
                    return;
                }
                store.update_layer(
                    layer,
                    LayerPatch { x: Some(origin.x), y: Some(origin.y), scale: Some(scale), z_index: None },
                );
            }
        }
    }

    fn drag_layer(&mut self, store: &mut LayerStore, id: LayerId, screen_delta: Point, layer_start: Point) {
        let Some(layer) = store.layer(id) else {
            self.state = GestureState::Idle;
            self.feedback = SnapFeedback::default();
            return;
        };
        let delta = store.view_transform(self.viewport).screen_delta_to_canvas(screen_delta);
        let candidate = layer_start + delta;
        let snap = try_snap_position(
            layer.width(),
            layer.height(),
            candidate.x,
            candidate.y,
            &store.snap_targets(),
            self.config.snap_threshold,
        );
        self.feedback = SnapFeedback { x: snap.line_x, y: snap.line_y };
        store.update_layer(id, LayerPatch::position(snap.x, snap.y));
    }

    /// Lifting the last contact always ends the gesture.
    pub fn pointer_up(&mut self, remaining: usize) {
        if remaining == 0 {
            self.state = GestureState::Idle;
            self.feedback = SnapFeedback::default();
        }
    }

    /// Wheel zoom; works in any state and needs no modifier.
    pub fn wheel(&mut self, store: &mut LayerStore, delta_y: f64) {
        if !delta_y.is_finite() {
            return;
        }
        let zoom = store.view().zoom + delta_y * -self.config.wheel_sensitivity;
        store.set_zoom(zoom);
    }

    /// Slider-style direct scale for one layer, with scale snapping. Returns
    /// the scale actually applied.
    pub fn scale_layer(&mut self, store: &mut LayerStore, id: LayerId, scale: f64) -> Option<f64> {
        if scale.is_nan() {
            return None;
        }
        let layer = store.layer(id)?;
        let candidate = scale.clamp(LAYER_SCALE_MIN, LAYER_SCALE_MAX);
        let snap = try_snap_scale(layer, candidate, &store.snap_targets(), self.config.scale_snap_tolerance);
        self.feedback = match snap.line {
            Some(SnapLine::Vertical(x)) => SnapFeedback { x: Some(x), y: None },
            Some(SnapLine::Horizontal(y)) => SnapFeedback { x: None, y: Some(y) },
            None => SnapFeedback::default(),
        };
        store.update_layer(id, LayerPatch::scale(snap.scale));
        Some(snap.scale)
    }

    /// Drop slider feedback once the slider is released.
    pub fn end_scale(&mut self) {
        if self.state == GestureState::Idle {
            self.feedback = SnapFeedback::default();
        }
    }
}
