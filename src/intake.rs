// ============================================================================
// IMAGE INTAKE — type filtering and order-preserving batch decode
// ============================================================================

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::{ImageFormat, RgbaImage};

use crate::canvas::LayerId;
use crate::error::IntakeError;
use crate::store::LayerStore;
use crate::{log_info, log_warn};

/// Accepted MIME types.
pub const ACCEPTED_MIME: &[&str] = &["image/png", "image/jpeg", "image/jpg"];

/// What happens to the valid files of a batch that also contains rejects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IntakePolicy {
    /// Valid files proceed; each reject produces a notice.
    #[default]
    BestEffort,
    /// Any reject discards the whole batch.
    AllOrNothing,
}

impl IntakePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "best-effort" | "best_effort" | "besteffort" => Some(Self::BestEffort),
            "all-or-nothing" | "all_or_nothing" | "allornothing" => Some(Self::AllOrNothing),
            _ => None,
        }
    }
}

/// A file-like blob handed over by the host.
#[derive(Clone)]
pub struct SourceFile {
    pub name: String,
    /// Declared MIME type, if the host knows it. When absent the type is
    /// sniffed from the content.
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.map(str::to_string),
            bytes,
        }
    }

    /// Read a file from disk, declaring its MIME type from the extension.
    pub fn read(path: &Path) -> Result<Self, IntakeError> {
        let bytes = std::fs::read(path).map_err(|source| IntakeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let mime = path
            .extension()
            .and_then(|e| e.to_str())
            .map(mime_for_extension);
        Ok(Self { name, mime, bytes })
    }
}

fn mime_for_extension(ext: &str) -> String {
    match ext.to_lowercase().as_str() {
        "png" => "image/png".to_string(),
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "gif" => "image/gif".to_string(),
        "webp" => "image/webp".to_string(),
        "bmp" => "image/bmp".to_string(),
        other => format!("application/x-{}", other),
    }
}

/// A successfully decoded image, ready to become a layer.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub pixels: Arc<RgbaImage>,
    pub source_name: String,
}

/// Reject everything that is not PNG or JPEG.
pub fn check_type(file: &SourceFile) -> Result<ImageFormat, IntakeError> {
    if let Some(mime) = &file.mime {
        let mime = mime.to_lowercase();
        if !ACCEPTED_MIME.contains(&mime.as_str()) {
            return Err(IntakeError::UnsupportedType { mime });
        }
    }
    match image::guess_format(&file.bytes) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => Ok(format),
        Ok(other) => Err(IntakeError::UnsupportedType {
            mime: format!("image/{:?}", other).to_lowercase(),
        }),
        Err(e) => Err(IntakeError::Decode(e)),
    }
}

pub fn decode(file: &SourceFile) -> Result<DecodedImage, IntakeError> {
    let format = check_type(file)?;
    let img = image::load_from_memory_with_format(&file.bytes, format)?.to_rgba8();
    Ok(DecodedImage {
        pixels: Arc::new(img),
        source_name: file.name.clone(),
    })
}

/// User-facing message about one file that was not added.
#[derive(Clone, Debug, PartialEq)]
pub struct IntakeNotice {
    pub file: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntakeReport {
    /// New layer ids in input order.
    pub added: Vec<LayerId>,
    pub notices: Vec<IntakeNotice>,
}

/// Collects decode results that may arrive in any order and commits them to
/// the store only once every slot is filled, in input order.
pub struct DecodeBatch {
    names: Vec<String>,
    slots: Vec<Option<Result<DecodedImage, IntakeError>>>,
    policy: IntakePolicy,
}

impl DecodeBatch {
    pub fn new(names: Vec<String>, policy: IntakePolicy) -> Self {
        let slots = names.iter().map(|_| None).collect();
        Self { names, slots, policy }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Record the outcome for input `index`. Out-of-range or repeated
    /// completions are ignored.
    pub fn complete(&mut self, index: usize, result: Result<DecodedImage, IntakeError>) {
        if let Some(slot) = self.slots.get_mut(index)
            && slot.is_none()
        {
            *slot = Some(result);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Insert the batch. Returns `Err(self)` while decodes are still pending.
    pub fn commit(self, store: &mut LayerStore) -> Result<IntakeReport, DecodeBatch> {
        if !self.is_ready() {
            return Err(self);
        }
        let mut report = IntakeReport::default();
        let mut images = Vec::with_capacity(self.slots.len());
        // Every slot is filled at this point.
        for (name, result) in self.names.into_iter().zip(self.slots.into_iter().flatten()) {
            match result {
                Ok(image) => images.push(image),
                Err(e) => report.notices.push(notice(&name, &e)),
            }
        }
        if self.policy == IntakePolicy::AllOrNothing && !report.notices.is_empty() {
            log_warn!("Discarded batch of {} image(s): {} failed", images.len() + report.notices.len(), report.notices.len());
            return Ok(report);
        }
        report.added = store.add_layers(images);
        Ok(report)
    }
}

fn notice(name: &str, e: &IntakeError) -> IntakeNotice {
    log_warn!("Rejected '{}': {}", name, e);
    IntakeNotice {
        file: name.to_string(),
        message: e.to_string(),
    }
}

/// Filter, decode and insert a batch of files.
pub fn ingest(store: &mut LayerStore, files: &[SourceFile], policy: IntakePolicy) -> IntakeReport {
    let mut rejected = Vec::new();
    let mut accepted = Vec::new();
    for file in files {
        match check_type(file) {
            Ok(_) => accepted.push(file),
            Err(e) => rejected.push(notice(&file.name, &e)),
        }
    }

    if accepted.is_empty() || (policy == IntakePolicy::AllOrNothing && !rejected.is_empty()) {
        return IntakeReport { added: Vec::new(), notices: rejected };
    }

    let mut batch = DecodeBatch::new(accepted.iter().map(|f| f.name.clone()).collect(), policy);
    for (index, file) in accepted.iter().enumerate() {
        batch.complete(index, decode(file));
    }
    let mut report = batch.commit(store).unwrap_or_default();
    log_info!("Intake: {} added, {} rejected", report.added.len(), rejected.len() + report.notices.len());
    rejected.append(&mut report.notices);
    report.notices = rejected;
    report
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, Rgba};

    use super::*;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img).write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn png(name: &str) -> SourceFile {
        SourceFile::new(name, Some("image/png"), png_bytes(8, 4))
    }

    #[test]
    fn rejects_wrong_declared_type() {
        let file = SourceFile::new("a.gif", Some("image/gif"), png_bytes(2, 2));
        assert!(matches!(check_type(&file), Err(IntakeError::UnsupportedType { .. })));
    }

    #[test]
    fn sniffs_type_when_undeclared() {
        let file = SourceFile::new("noext", None, png_bytes(2, 2));
        assert_eq!(check_type(&file).unwrap(), ImageFormat::Png);
        let junk = SourceFile::new("junk", None, b"hello world".to_vec());
        assert!(check_type(&junk).is_err());
    }

    #[test]
    fn best_effort_keeps_valid_subset() {
        let mut store = LayerStore::default();
        let files = vec![png("a.png"), SourceFile::new("b.txt", Some("text/plain"), b"x".to_vec()), png("c.png")];
        let report = ingest(&mut store, &files, IntakePolicy::BestEffort);
        assert_eq!(report.added.len(), 2);
        assert_eq!(report.notices.len(), 1);
        assert_eq!(report.notices[0].file, "b.txt");
        assert_eq!(store.layers()[0].source_name, "a.png");
        assert_eq!(store.layers()[1].source_name, "c.png");
    }

    #[test]
    fn all_or_nothing_drops_whole_batch() {
        let mut store = LayerStore::default();
        let files = vec![png("a.png"), SourceFile::new("b.txt", Some("text/plain"), b"x".to_vec())];
        let report = ingest(&mut store, &files, IntakePolicy::AllOrNothing);
        assert!(report.added.is_empty());
        assert_eq!(report.notices.len(), 1);
        assert!(store.layers().is_empty());
    }

    #[test]
    fn corrupt_png_becomes_notice() {
        let mut store = LayerStore::default();
        let mut bytes = png_bytes(4, 4);
        bytes.truncate(20);
        let files = vec![SourceFile::new("broken.png", Some("image/png"), bytes), png("ok.png")];
        let report = ingest(&mut store, &files, IntakePolicy::BestEffort);
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.notices[0].file, "broken.png");
    }

    #[test]
    fn batch_waits_for_every_decode() {
        let mut store = LayerStore::default();
        let files = [png("1.png"), png("2.png")];
        let mut batch = DecodeBatch::new(files.iter().map(|f| f.name.clone()).collect(), IntakePolicy::BestEffort);
        batch.complete(1, decode(&files[1]));
        let mut batch = batch.commit(&mut store).err().expect("still pending");
        assert!(store.layers().is_empty());
        batch.complete(0, decode(&files[0]));
        let report = batch.commit(&mut store).ok().expect("ready");
        assert_eq!(report.added.len(), 2);
    }
}
