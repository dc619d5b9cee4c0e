// ============================================================================
// EDITOR SETTINGS — startup defaults from a key=value file
// ============================================================================
//
// Read-only: nothing is ever written back, so no state survives a session.

use std::path::{Path, PathBuf};

use crate::canvas::{AspectRatio, BackgroundConfig, GRID_MAX, GRID_MIN, GridConfig, parse_hex_color};
use crate::gesture::GestureConfig;
use crate::intake::IntakePolicy;
use crate::raster::JPEG_QUALITY;
use crate::store::LayerStore;
use crate::log_warn;

#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    pub grid: GridConfig,
    pub background: BackgroundConfig,
    pub gesture: GestureConfig,
    pub jpeg_quality: u8,
    pub intake_policy: IntakePolicy,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            background: BackgroundConfig::default(),
            gesture: GestureConfig::default(),
            jpeg_quality: JPEG_QUALITY,
            intake_policy: IntakePolicy::default(),
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/slicegrid/slicegrid_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\SliceGrid\slicegrid_settings.cfg
    /// On macOS:   ~/Library/Application Support/SliceGrid/slicegrid_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("SliceGrid").join("slicegrid_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("SliceGrid")
                    .join("slicegrid_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")))
                .ok()?;
            Some(config_dir.join("slicegrid").join("slicegrid_settings.cfg"))
        }
    }

    /// Load from the default location (defaults if missing or unreadable).
    pub fn load() -> Self {
        Self::settings_path().map(|p| Self::load_from(&p)).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else { return Self::default() };
        Self::parse(&content)
    }

    /// Parse `key=value` lines. Unknown keys and bad values are skipped.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            let applied = match key {
                "cols" => val.parse::<u32>().ok().map(|v| s.grid.cols = v.clamp(GRID_MIN, GRID_MAX)),
                "rows" => val.parse::<u32>().ok().map(|v| s.grid.rows = v.clamp(GRID_MIN, GRID_MAX)),
                "cell_width" => positive(val).map(|v| s.grid.cell_width = v),
                "cell_height" => positive(val).map(|v| s.grid.cell_height = v),
                "aspect_ratio" => val.parse::<AspectRatio>().ok().map(|r| s.grid.ratio = r),
                "transparent" => parse_bool(val).map(|b| s.background.is_transparent = b),
                "background" => parse_hex_color(val).ok().map(|_| s.background.color = val.to_string()),
                "snap_threshold" => non_negative(val).map(|v| s.gesture.snap_threshold = v),
                "scale_snap_tolerance" => non_negative(val).map(|v| s.gesture.scale_snap_tolerance = v),
                "wheel_sensitivity" => non_negative(val).map(|v| s.gesture.wheel_sensitivity = v),
                "jpeg_quality" => val.parse::<u8>().ok().filter(|q| (1..=100).contains(q)).map(|q| s.jpeg_quality = q),
                "intake_policy" => IntakePolicy::parse(val).map(|p| s.intake_policy = p),
                _ => Some(()),
            };
            if applied.is_none() {
                log_warn!("Ignoring settings value {}={}", key, val);
            }
        }
        s
    }

    /// A fresh store seeded with these defaults. A locked ratio wins over an
    /// explicit cell height.
    pub fn new_store(&self) -> LayerStore {
        let mut store = LayerStore::new(self.grid, self.background.clone());
        if self.grid.ratio.value().is_some() {
            store.set_aspect_ratio(self.grid.ratio);
        }
        store
    }
}

fn positive(val: &str) -> Option<u32> {
    val.parse::<u32>().ok().filter(|v| *v > 0)
}

fn non_negative(val: &str) -> Option<f64> {
    val.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = EditorSettings::load_from(&dir.path().join("nope.cfg"));
        assert_eq!(s, EditorSettings::default());
        assert_eq!((s.grid.cols, s.grid.rows), (2, 1));
        assert!(s.background.is_transparent);
    }

    #[test]
    fn parses_known_keys_and_skips_junk() {
        let s = EditorSettings::parse(
            "# comment\ncols = 3\nrows=40\ncell_width=600\naspect_ratio=4:5\ntransparent=false\n\
             background=#101010\nsnap_threshold=8\njpeg_quality=80\nintake_policy=all-or-nothing\n\
             cell_height=-3\nbogus=1\nnot a pair\n",
        );
        assert_eq!(s.grid.cols, 3);
        assert_eq!(s.grid.rows, GRID_MAX);
        assert_eq!(s.grid.cell_width, 600);
        assert_eq!(s.grid.cell_height, 1080);
        assert_eq!(s.grid.ratio, AspectRatio::Portrait4x5);
        assert!(!s.background.is_transparent);
        assert_eq!(s.background.color, "#101010");
        assert_eq!(s.gesture.snap_threshold, 8.0);
        assert_eq!(s.jpeg_quality, 80);
        assert_eq!(s.intake_policy, IntakePolicy::AllOrNothing);
    }

    #[test]
    fn locked_ratio_drives_store_cell_height() {
        let s = EditorSettings::parse("cell_width=600\ncell_height=100\naspect_ratio=4:5\n");
        let store = s.new_store();
        assert_eq!((store.grid().cell_width, store.grid().cell_height), (600, 750));
        let free = EditorSettings::parse("cell_width=600\ncell_height=100\naspect_ratio=free\n").new_store();
        assert_eq!(free.grid().cell_height, 100);
    }

    #[test]
    fn bad_background_is_ignored() {
        let s = EditorSettings::parse("background=chartreuse\n");
        assert_eq!(s.background.color, "#ffffff");
    }
}
