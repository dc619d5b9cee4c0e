// ============================================================================
// EXPORT PACKAGER — file naming, zip archive, per-slice files
// ============================================================================

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::ExportError;
use crate::raster::{EncodedSlice, GeneratedSlices};
use crate::store::LayerStore;
use crate::{log_err, log_info};

/// Prefix used when nothing names the composition.
pub const FALLBACK_PREFIX: &str = "collage";
/// Folder inside the archive holding every slice.
pub const ARCHIVE_FOLDER: &str = "slices";

/// Strip the last extension: `"holiday.final.jpg"` → `"holiday.final"`.
fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() && !ext.contains(['/', '\\']) => stem,
        _ => name,
    }
}

/// `<stem>_<YYYYMMDD-HHmmss>`, with the time in UTC.
pub fn filename_prefix(source_name: Option<&str>, generated_at: DateTime<Utc>) -> String {
    let stem = source_name.map(strip_extension).filter(|s| !s.is_empty()).unwrap_or(FALLBACK_PREFIX);
    format!("{}_{}", stem, generated_at.format("%Y%m%d-%H%M%S"))
}

/// `<prefix>_slice_<n>.<ext>` with a 1-based `n`.
pub fn slice_file_name(prefix: &str, slice: &EncodedSlice) -> String {
    format!("{}_slice_{}.{}", prefix, slice.index + 1, slice.format.extension())
}

pub fn archive_name(prefix: &str) -> String {
    format!("{}_grid_slices.zip", prefix)
}

impl GeneratedSlices {
    pub fn filename_prefix(&self) -> String {
        filename_prefix(self.source_name.as_deref(), self.generated_at)
    }
}

/// Write every slice into a zip under [`ARCHIVE_FOLDER`]. Returns the
/// finished writer.
pub fn write_archive<W: Write + Seek>(results: &GeneratedSlices, writer: W) -> Result<W, ExportError> {
    if results.is_empty() {
        return Err(ExportError::NothingGenerated);
    }
    let prefix = results.filename_prefix();
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(writer);
    zip.add_directory(format!("{}/", ARCHIVE_FOLDER), options)?;
    for slice in &results.slices {
        zip.start_file(format!("{}/{}", ARCHIVE_FOLDER, slice_file_name(&prefix, slice)), options)?;
        zip.write_all(&slice.bytes)?;
    }
    Ok(zip.finish()?)
}

/// Write `<prefix>_grid_slices.zip` into `dir`.
pub fn save_archive(results: &GeneratedSlices, dir: &Path) -> Result<PathBuf, ExportError> {
    let path = dir.join(archive_name(&results.filename_prefix()));
    let result = File::create(&path)
        .map_err(ExportError::from)
        .and_then(|file| write_archive(results, BufWriter::new(file)))
        .and_then(|mut writer| writer.flush().map_err(ExportError::from));
    match result {
        Ok(()) => {
            log_info!("Wrote archive {} ({} slices)", path.display(), results.len());
            Ok(path)
        }
        Err(e) => {
            log_err!("Archive export to {} failed: {}", path.display(), e);
            Err(e)
        }
    }
}

/// Write a single slice (0-based `index`) into `dir`.
pub fn save_slice(results: &GeneratedSlices, index: usize, dir: &Path) -> Result<PathBuf, ExportError> {
    let slice = results.slices.get(index).ok_or(ExportError::NoSuchSlice {
        index,
        count: results.len(),
    })?;
    let path = dir.join(slice_file_name(&results.filename_prefix(), slice));
    let mut writer = BufWriter::new(File::create(&path)?);
    writer.write_all(&slice.bytes)?;
    writer.flush()?;
    log_info!("Wrote slice {}", path.display());
    Ok(path)
}

pub fn save_all_slices(results: &GeneratedSlices, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    if results.is_empty() {
        return Err(ExportError::NothingGenerated);
    }
    (0..results.len()).map(|i| save_slice(results, i, dir)).collect()
}

/// Export front for the store's current results.
pub struct ExportPackager<'a> {
    store: &'a LayerStore,
}

impl<'a> ExportPackager<'a> {
    pub fn new(store: &'a LayerStore) -> Self {
        Self { store }
    }

    fn results(&self) -> Result<&'a GeneratedSlices, ExportError> {
        self.store
            .results()
            .filter(|r| !r.is_empty())
            .ok_or(ExportError::NothingGenerated)
    }

    pub fn archive_bytes(&self) -> Result<Vec<u8>, ExportError> {
        let cursor = write_archive(self.results()?, std::io::Cursor::new(Vec::new()))?;
        Ok(cursor.into_inner())
    }

    pub fn save_archive(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        save_archive(self.results()?, dir)
    }

    pub fn save_slice(&self, index: usize, dir: &Path) -> Result<PathBuf, ExportError> {
        save_slice(self.results()?, index, dir)
    }

    pub fn save_all_slices(&self, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
        save_all_slices(self.results()?, dir)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use chrono::TimeZone;

    use super::*;
    use crate::canvas::{BackgroundConfig, GridConfig};
    use crate::raster::{SliceFormat, generate_slices};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    fn results(source: Option<&str>, transparent: bool) -> GeneratedSlices {
        let grid = GridConfig { cols: 3, rows: 2, cell_width: 4, cell_height: 4, ..GridConfig::default() };
        let bg = BackgroundConfig { is_transparent: transparent, color: "#ff0000".into() };
        let mut out = generate_slices(&[], &grid, &bg).unwrap();
        out.generated_at = at();
        out.source_name = source.map(str::to_string);
        out
    }

    #[test]
    fn prefix_strips_last_extension_and_stamps_utc() {
        assert_eq!(filename_prefix(Some("beach.final.JPG"), at()), "beach.final_20240309-070501");
        assert_eq!(filename_prefix(Some("noext"), at()), "noext_20240309-070501");
        assert_eq!(filename_prefix(None, at()), "collage_20240309-070501");
    }

    #[test]
    fn slice_names_are_one_based_with_format_extension() {
        let r = results(Some("a.png"), false);
        assert_eq!(r.format, SliceFormat::Jpeg);
        let prefix = r.filename_prefix();
        assert_eq!(slice_file_name(&prefix, &r.slices[0]), "a_20240309-070501_slice_1.jpg");
        assert_eq!(slice_file_name(&prefix, &r.slices[5]), "a_20240309-070501_slice_6.jpg");
        assert_eq!(archive_name(&prefix), "a_20240309-070501_grid_slices.zip");
    }

    #[test]
    fn archive_holds_raw_bytes_under_one_folder() {
        let r = results(Some("a.png"), true);
        let bytes = write_archive(&r, Cursor::new(Vec::new())).unwrap().into_inner();
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut files: Vec<String> = zip.file_names().filter(|n| !n.ends_with('/')).map(str::to_string).collect();
        files.sort();
        assert_eq!(files.len(), 6);
        assert!(files.iter().all(|n| n.starts_with("slices/a_20240309-070501_slice_") && n.ends_with(".png")));

        let mut member = zip.by_name("slices/a_20240309-070501_slice_2.png").unwrap();
        let mut data = Vec::new();
        member.read_to_end(&mut data).unwrap();
        assert_eq!(data, r.slices[1].bytes);
    }

    #[test]
    fn saves_archive_and_slices_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let r = results(None, true);
        let archive = save_archive(&r, dir.path()).unwrap();
        assert_eq!(archive.file_name().unwrap(), "collage_20240309-070501_grid_slices.zip");
        assert!(archive.exists());

        let paths = save_all_slices(&r, dir.path()).unwrap();
        assert_eq!(paths.len(), 6);
        assert_eq!(std::fs::read(&paths[3]).unwrap(), r.slices[3].bytes);
        assert!(matches!(save_slice(&r, 6, dir.path()), Err(ExportError::NoSuchSlice { index: 6, count: 6 })));
    }

    #[test]
    fn packager_requires_generated_results() {
        let mut store = LayerStore::default();
        assert!(matches!(ExportPackager::new(&store).archive_bytes(), Err(ExportError::NothingGenerated)));
        store.set_results(results(Some("x.png"), true));
        let bytes = ExportPackager::new(&store).archive_bytes().unwrap();
        assert!(bytes.starts_with(b"PK"));
        store.clear_results();
        assert!(store.results().is_none());
    }
}
