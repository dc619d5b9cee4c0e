// ============================================================================
// ERROR TAXONOMY — input rejection, intake, rasterization, export
// ============================================================================

use std::path::PathBuf;

/// A user-entered value that cannot be applied. The store is left untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("{field} must be a positive number (got {value})")]
    NonPositive { field: &'static str, value: f64 },
    #[error("invalid colour '{0}', expected #rgb or #rrggbb")]
    Colour(String),
    #[error("invalid aspect ratio '{0}', expected W:H or 'free'")]
    AspectRatio(String),
}

/// Why a single file was not turned into a layer.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("unsupported file type {mime}; only PNG and JPEG images are accepted")]
    UnsupportedType { mime: String },
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("could not read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Generation aborted as a whole; no slices were produced.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("cannot allocate a {width}x{height} raster buffer")]
    Allocation { width: u32, height: u32 },
    #[error(transparent)]
    Background(#[from] InputError),
    #[error("slice {index} failed to encode: {source}")]
    Encode {
        index: usize,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export, generate the slices first")]
    NothingGenerated,
    #[error("no slice {index}, only {count} generated")]
    NoSuchSlice { index: usize, count: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}
