// ============================================================================
// RASTERIZER — composite layers at document resolution, slice into cells
// ============================================================================
//
// The master buffer is always exactly `total_width × total_height`; nothing
// here depends on the on-screen display scale. Generation is all-or-nothing:
// any allocation or encoding failure aborts before a result is returned.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageEncoder, Rgba, RgbaImage};

use crate::canvas::{BackgroundConfig, GridConfig, ImageLayer};
use crate::error::RasterError;
use crate::store::LayerStore;
use crate::{log_err, log_info};

/// JPEG quality for opaque output (the 0.95 of a canvas encoder).
pub const JPEG_QUALITY: u8 = 95;

/// Refuse master buffers above this many bytes.
const MAX_RASTER_BYTES: usize = 1 << 31;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceFormat {
    /// Lossless with alpha; used whenever the background is transparent.
    Png,
    /// Lossy; used with an opaque background.
    Jpeg,
}

impl SliceFormat {
    pub fn for_background(background: &BackgroundConfig) -> Self {
        if background.is_transparent { SliceFormat::Png } else { SliceFormat::Jpeg }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SliceFormat::Png => "png",
            SliceFormat::Jpeg => "jpg",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            SliceFormat::Png => "image/png",
            SliceFormat::Jpeg => "image/jpeg",
        }
    }
}

/// One encoded grid cell.
#[derive(Clone, PartialEq)]
pub struct EncodedSlice {
    /// Row-major position, `row * cols + col`.
    pub index: usize,
    pub row: u32,
    pub col: u32,
    pub width: u32,
    pub height: u32,
    pub format: SliceFormat,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for EncodedSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedSlice")
            .field("index", &self.index)
            .field("row", &self.row)
            .field("col", &self.col)
            .field("size", &(self.width, self.height))
            .field("format", &self.format)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl EncodedSlice {
    /// `data:<mime>;base64,...` form for inline display.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.format.mime(), BASE64.encode(&self.bytes))
    }
}

/// Output of one "generate" action, with the grid it was cut from.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedSlices {
    /// Row-major.
    pub slices: Vec<EncodedSlice>,
    pub cols: u32,
    pub rows: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub format: SliceFormat,
    pub generated_at: DateTime<Utc>,
    /// File name of the first layer at generation time, if any.
    pub source_name: Option<String>,
}

impl GeneratedSlices {
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

/// Borrows the store for the duration of one generation.
pub struct Rasterizer<'a> {
    store: &'a LayerStore,
    jpeg_quality: u8,
}

impl<'a> Rasterizer<'a> {
    pub fn new(store: &'a LayerStore) -> Self {
        Self { store, jpeg_quality: JPEG_QUALITY }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn compose_master(&self) -> Result<RgbaImage, RasterError> {
        compose(self.store.layers(), self.store.grid(), self.store.background())
    }

    pub fn generate(&self) -> Result<GeneratedSlices, RasterError> {
        generate_slices_with_quality(
            self.store.layers(),
            self.store.grid(),
            self.store.background(),
            self.jpeg_quality,
        )
    }
}

pub fn generate_slices(
    layers: &[ImageLayer],
    grid: &GridConfig,
    background: &BackgroundConfig,
) -> Result<GeneratedSlices, RasterError> {
    generate_slices_with_quality(layers, grid, background, JPEG_QUALITY)
}

pub fn generate_slices_with_quality(
    layers: &[ImageLayer],
    grid: &GridConfig,
    background: &BackgroundConfig,
    jpeg_quality: u8,
) -> Result<GeneratedSlices, RasterError> {
    log_info!(
        "Generating {}x{} slices of {}x{} from {} layer(s)",
        grid.cols, grid.rows, grid.cell_width, grid.cell_height, layers.len()
    );
    let result = build_slices(layers, grid, background, jpeg_quality);
    match &result {
        Ok(out) => {
            log_info!("Generated {} {} slice(s)", out.len(), out.format.extension());
        }
        Err(e) => {
            log_err!("Generation aborted: {}", e);
        }
    }
    result
}

fn build_slices(
    layers: &[ImageLayer],
    grid: &GridConfig,
    background: &BackgroundConfig,
    jpeg_quality: u8,
) -> Result<GeneratedSlices, RasterError> {
    let master = compose(layers, grid, background)?;
    let format = SliceFormat::for_background(background);
    let cells = slice_master(&master, grid)?;
    let slices = cells
        .into_iter()
        .enumerate()
        .map(|(index, cell)| {
            encode(&cell, format, jpeg_quality)
                .map(|bytes| EncodedSlice {
                    index,
                    row: index as u32 / grid.cols,
                    col: index as u32 % grid.cols,
                    width: cell.width(),
                    height: cell.height(),
                    format,
                    bytes,
                })
                .map_err(|source| RasterError::Encode { index, source })
        })
        .collect::<Result<Vec<_>, RasterError>>()?;
    Ok(GeneratedSlices {
        slices,
        cols: grid.cols,
        rows: grid.rows,
        cell_width: grid.cell_width,
        cell_height: grid.cell_height,
        format,
        generated_at: Utc::now(),
        source_name: layers.first().map(|l| l.source_name.clone()),
    })
}

/// Allocate a zeroed (fully transparent) buffer, reporting failure instead
/// of aborting the process.
fn allocate(width: u32, height: u32) -> Result<RgbaImage, RasterError> {
    let err = || RasterError::Allocation { width, height };
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .filter(|n| *n > 0 && *n <= MAX_RASTER_BYTES)
        .ok_or_else(err)?;
    let mut buf: Vec<u8> = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| err())?;
    buf.resize(len, 0);
    RgbaImage::from_raw(width, height, buf).ok_or_else(err)
}

/// Build the master raster: background fill, then layers by ascending `z_index`.
pub fn compose(
    layers: &[ImageLayer],
    grid: &GridConfig,
    background: &BackgroundConfig,
) -> Result<RgbaImage, RasterError> {
    let fill = background.fill()?;
    let mut master = allocate(grid.total_width(), grid.total_height())?;
    if let Some(color) = fill {
        for px in master.pixels_mut() {
            *px = color;
        }
    }

    let mut sorted: Vec<&ImageLayer> = layers.iter().collect();
    sorted.sort_by_key(|l| l.z_index);
    for layer in sorted {
        draw_layer(&mut master, layer);
    }
    Ok(master)
}

/// Pixel span `[start, end)` whose centres fall inside `[origin, origin + len)`,
/// clipped to `[0, limit)`.
fn covered_span(origin: f64, len: f64, limit: u32) -> Option<(u32, u32)> {
    let start = (origin - 0.5).ceil().max(0.0);
    let end = (origin + len - 0.5).ceil().min(limit as f64);
    (end > start).then(|| (start as u32, end as u32))
}

/// Draw one layer at `(x, y)` with size `source × scale`, sampling the source
/// bilinearly and compositing source-over.
fn draw_layer(master: &mut RgbaImage, layer: &ImageLayer) {
    let dest_w = layer.width();
    let dest_h = layer.height();
    if !(dest_w > 0.0 && dest_h > 0.0 && dest_w.is_finite() && dest_h.is_finite()) {
        return;
    }
    if !(layer.x.is_finite() && layer.y.is_finite()) {
        return;
    }
    let Some((x0, x1)) = covered_span(layer.x, dest_w, master.width()) else { return };
    let Some((y0, y1)) = covered_span(layer.y, dest_h, master.height()) else { return };

    // Bilinear sampling aliases badly when shrinking, so pre-filter the
    // source down to roughly the drawn size first.
    let reduced;
    let source: &RgbaImage = if layer.scale < 1.0 {
        let rw = (dest_w.ceil() as u32).max(1);
        let rh = (dest_h.ceil() as u32).max(1);
        reduced = imageops::resize(layer.pixels.as_ref(), rw, rh, FilterType::Triangle);
        &reduced
    } else {
        layer.pixels.as_ref()
    };
    let sx_scale = source.width() as f64 / dest_w;
    let sy_scale = source.height() as f64 / dest_h;

    for py in y0..y1 {
        let sy = (py as f64 + 0.5 - layer.y) * sy_scale - 0.5;
        for px in x0..x1 {
            let sx = (px as f64 + 0.5 - layer.x) * sx_scale - 0.5;
            let top = bilinear_sample_clamped(source, sx, sy);
            let base = *master.get_pixel(px, py);
            master.put_pixel(px, py, blend_over(base, top));
        }
    }
}

/// Bilinear interpolation with edge clamping, so layer borders do not fade
/// into transparency.
fn bilinear_sample_clamped(img: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let max_x = img.width() as f64 - 1.0;
    let max_y = img.height() as f64 - 1.0;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as u32, y0 as u32);
    let x1 = (x0 + 1).min(max_x as u32);
    let y1 = (y0 + 1).min(max_y as u32);

    let tl = img.get_pixel(x0, y0);
    let tr = img.get_pixel(x1, y0);
    let bl = img.get_pixel(x0, y1);
    let br = img.get_pixel(x1, y1);

    let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = lerp(tl[c] as f64, tr[c] as f64, fx);
        let bot = lerp(bl[c] as f64, br[c] as f64, fx);
        out[c] = lerp(top, bot, fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Normal (source-over) blend of straight-alpha pixels.
fn blend_over(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    if top[3] == 0 {
        return base;
    }
    if top[3] == 255 {
        return top;
    }

    let top_a = top[3] as f32 / 255.0;
    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |c: usize| {
        let t = top[c] as f32 / 255.0;
        let b = base[c] as f32 / 255.0;
        let v = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Cut the master into row-major cell buffers of `cell_width × cell_height`.
pub fn slice_master(master: &RgbaImage, grid: &GridConfig) -> Result<Vec<RgbaImage>, RasterError> {
    let mut cells = Vec::with_capacity(grid.cell_count());
    let src = master.as_raw();
    let src_stride = master.width() as usize * 4;
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let (x, y, w, h) = grid.cell_rect(row, col);
            let mut cell = allocate(w, h)?;
            let row_bytes = w as usize * 4;
            let dst = cell.as_mut();
            for ly in 0..h as usize {
                let s = (y as usize + ly) * src_stride + x as usize * 4;
                dst[ly * row_bytes..(ly + 1) * row_bytes].copy_from_slice(&src[s..s + row_bytes]);
            }
            cells.push(cell);
        }
    }
    Ok(cells)
}

pub fn encode(cell: &RgbaImage, format: SliceFormat, jpeg_quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Vec::new();
    match format {
        SliceFormat::Png => {
            PngEncoder::new(&mut out).write_image(cell.as_raw(), cell.width(), cell.height(), ColorType::Rgba8)?;
        }
        SliceFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(cell.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut out, jpeg_quality);
            encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
        }
    }
    Ok(out)
}
