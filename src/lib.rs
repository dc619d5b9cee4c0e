//! SliceGrid: place images as layers on a fixed-size canvas, overlay a
//! row/column grid and cut the composition into one image per cell.
//!
//! The core is front-end agnostic. A host feeds pointer events into a
//! [`gesture::GestureController`], reads display values from the
//! [`store::LayerStore`] and asks a [`raster::Rasterizer`] for the slices,
//! which [`export`] turns into files or a zip archive.

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod error;
pub mod export;
pub mod geometry;
pub mod gesture;
pub mod intake;
pub mod raster;
pub mod settings;
pub mod signal;
pub mod snap;
pub mod store;

pub use canvas::{AspectRatio, BackgroundConfig, GridConfig, ImageLayer, LayerId, LayerPatch, SnapFeedback, ViewState};
pub use error::{ExportError, InputError, IntakeError, RasterError};
pub use export::ExportPackager;
pub use geometry::{Point, ViewportSize};
pub use gesture::{GestureController, GestureEvent, GestureState, HitTarget};
pub use raster::{GeneratedSlices, Rasterizer};
pub use store::LayerStore;
