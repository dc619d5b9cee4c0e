// ============================================================================
// SliceGrid CLI — headless slicing via command-line arguments
// ============================================================================
//
// Usage examples:
//   SliceGrid -i photo.png                                  (2×1 grid, zip in ./)
//   SliceGrid -i a.png b.jpg --cols 3 --rows 2 --output-dir out/
//   SliceGrid -i shots/*.jpg --ratio 4:5 --background "#000000" --no-zip
//   SliceGrid -i a.png b.png --place 1:0,0,0.5 --place 2:1070,10 --snap --front 1
//
// Inputs become layers in the order given; the usual stagger placement
// applies unless `--place` overrides it. Everything runs synchronously on the
// current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

use clap::Parser;

use crate::canvas::{AspectRatio, GRID_MAX, GRID_MIN, LAYER_SCALE_MAX, LAYER_SCALE_MIN, LayerId, LayerPatch};
use crate::export::ExportPackager;
use crate::intake::{IntakeNotice, IntakePolicy, SourceFile, ingest};
use crate::raster::Rasterizer;
use crate::settings::EditorSettings;
use crate::snap::try_snap_position;
use crate::store::{CellAxis, LayerStore};
use crate::{log_info, log_warn};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// SliceGrid headless grid slicer.
///
/// Place images on a canvas, cut it along a grid and write every cell as its
/// own image.
#[derive(Parser, Debug)]
#[command(
    name = "SliceGrid",
    version,
    about = "Slice images into a grid of equally sized tiles",
    long_about = "Place one or more PNG/JPEG images as layers on a canvas of\n\
                  cols×cell_width by rows×cell_height pixels, then export every\n\
                  grid cell as its own image, zipped or as loose files.\n\n\
                  Example:\n  \
                  SliceGrid -i a.png b.jpg --cols 3 --rows 1 --output-dir out/\n  \
                  SliceGrid -i *.jpg --ratio 4:5 --background \"#ffffff\" --no-zip"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    /// Layers are stacked in the order given, first at the bottom.
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Number of grid columns (1–10).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(GRID_MIN as i64..=GRID_MAX as i64))]
    pub cols: Option<u32>,

    /// Number of grid rows (1–10).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(GRID_MIN as i64..=GRID_MAX as i64))]
    pub rows: Option<u32>,

    /// Aspect ratio lock for a cell: "W:H" (e.g. 4:5) or "free".
    #[arg(long, value_name = "W:H")]
    pub ratio: Option<AspectRatio>,

    /// Cell width in pixels. With a ratio lock the height follows.
    #[arg(long, value_name = "PX")]
    pub cell_width: Option<f64>,

    /// Cell height in pixels. With a ratio lock the width follows.
    #[arg(long, value_name = "PX")]
    pub cell_height: Option<f64>,

    /// Opaque background colour (#rgb or #rrggbb). Output becomes JPEG.
    #[arg(long, value_name = "COLOR", conflicts_with = "transparent")]
    pub background: Option<String>,

    /// Force a transparent background (PNG output).
    #[arg(long)]
    pub transparent: bool,

    /// Explicit layer placement, 1-based layer number: N:X,Y[,SCALE].
    #[arg(long, value_name = "N:X,Y[,SCALE]")]
    pub place: Vec<Placement>,

    /// Snap placed layers to canvas edges and grid lines.
    #[arg(long)]
    pub snap: bool,

    /// Bring layer N (1-based) to the front. Repeatable, applied in order.
    #[arg(long, value_name = "N")]
    pub front: Vec<usize>,

    /// Send layer N (1-based) to the back. Repeatable, applied after --front.
    #[arg(long, value_name = "N")]
    pub back: Vec<usize>,

    /// Write loose slice files instead of one zip archive.
    #[arg(long)]
    pub no_zip: bool,

    /// Destination directory (created if missing).
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// JPEG quality for opaque output (1–100).
    #[arg(short, long, value_name = "1-100", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Abort the whole batch if any input is rejected.
    #[arg(long)]
    pub all_or_nothing: bool,

    /// Settings file to read defaults from instead of the standard location.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Print per-step information.
    #[arg(short, long)]
    pub verbose: bool,
}

/// `--place` value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// 1-based layer number in input order.
    pub layer: usize,
    pub x: f64,
    pub y: f64,
    pub scale: Option<f64>,
}

impl FromStr for Placement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || format!("expected N:X,Y[,SCALE], got '{}'", s);
        let (n, rest) = s.split_once(':').ok_or_else(bad)?;
        let layer: usize = n.trim().parse().map_err(|_| bad())?;
        if layer == 0 {
            return Err("layer numbers start at 1".to_string());
        }
        let parts: Vec<f64> = rest
            .split(',')
            .map(|p| p.trim().parse::<f64>().map_err(|_| bad()))
            .collect::<Result<_, _>>()?;
        match parts[..] {
            [x, y] => Ok(Self { layer, x, y, scale: None }),
            [x, y, scale] if scale > 0.0 => Ok(Self { layer, x, y, scale: Some(scale) }),
            [_, _, _] => Err(format!("scale must be positive in '{}'", s)),
            _ => Err(bad()),
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI and return an OS exit code.
/// `0` = slices written, `1` = nothing usable or an export failure.
pub fn run(args: CliArgs) -> ExitCode {
    let start = Instant::now();
    let settings = match &args.settings {
        Some(path) => EditorSettings::load_from(path),
        None => EditorSettings::load(),
    };
    match slice_inputs(&args, &settings) {
        Ok(written) => {
            for path in &written {
                println!("{}", path.display());
            }
            if args.verbose {
                println!("done in {:.0}ms", start.elapsed().as_secs_f64() * 1000.0);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Full pipeline: load, place, generate, export. Returns the written paths.
pub fn slice_inputs(args: &CliArgs, settings: &EditorSettings) -> Result<Vec<PathBuf>, String> {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        return Err("no input files matched the given pattern(s).".to_string());
    }

    let mut store = build_store(args, settings)?;

    // -- Load ------------------------------------------------------------
    let policy = if args.all_or_nothing { IntakePolicy::AllOrNothing } else { settings.intake_policy };
    let mut notices = Vec::new();
    let mut files = Vec::with_capacity(inputs.len());
    for path in &inputs {
        match SourceFile::read(path) {
            Ok(f) => files.push(f),
            Err(e) => notices.push(IntakeNotice { file: path.display().to_string(), message: e.to_string() }),
        }
    }
    if policy == IntakePolicy::AllOrNothing && !notices.is_empty() {
        print_notices(&notices);
        return Err("input rejected, nothing was sliced.".to_string());
    }
    let report = ingest(&mut store, &files, policy);
    notices.extend(report.notices);
    print_notices(&notices);
    if report.added.is_empty() {
        return Err("no usable PNG or JPEG input.".to_string());
    }
    if args.verbose {
        println!("loaded {} layer(s)", report.added.len());
    }

    // -- Arrange ---------------------------------------------------------
    apply_placements(&mut store, &report.added, &args.place, args.snap.then_some(settings.gesture.snap_threshold))?;
    for n in &args.front {
        store.bring_to_front(layer_number(&report.added, *n)?);
    }
    for n in &args.back {
        store.send_to_back(layer_number(&report.added, *n)?);
    }

    // -- Generate --------------------------------------------------------
    let quality = args.quality.unwrap_or(settings.jpeg_quality);
    let slices = Rasterizer::new(&store)
        .with_quality(quality)
        .generate()
        .map_err(|e| format!("generation failed: {}", e))?;
    if args.verbose {
        println!(
            "generated {} {} slice(s) of {}x{}",
            slices.len(),
            slices.format.extension(),
            slices.cell_width,
            slices.cell_height
        );
    }
    store.set_results(slices);

    // -- Export ----------------------------------------------------------
    std::fs::create_dir_all(&args.output_dir)
        .map_err(|e| format!("could not create output directory '{}': {}", args.output_dir.display(), e))?;
    let packager = ExportPackager::new(&store);
    let written = if args.no_zip {
        packager.save_all_slices(&args.output_dir)
    } else {
        packager.save_archive(&args.output_dir).map(|p| vec![p])
    };
    written.map_err(|e| format!("export failed: {}", e))
}

// ============================================================================
// Helpers
// ============================================================================

/// Settings file first, then command-line overrides.
fn build_store(args: &CliArgs, settings: &EditorSettings) -> Result<LayerStore, String> {
    let mut store = settings.new_store();

    let grid = *store.grid();
    let delta = |want: Option<u32>, have: u32| {
        want.map_or(0, |w| (w.clamp(GRID_MIN, GRID_MAX) as i64 - have as i64) as i32)
    };
    store.update_grid(delta(args.cols, grid.cols), delta(args.rows, grid.rows));

    if let Some(ratio) = args.ratio {
        store.set_aspect_ratio(ratio);
    }
    if let Some(w) = args.cell_width {
        store.update_cell_dimension(CellAxis::Width, w).map_err(|e| e.to_string())?;
    }
    if let Some(h) = args.cell_height {
        store.update_cell_dimension(CellAxis::Height, h).map_err(|e| e.to_string())?;
    }

    if let Some(color) = &args.background {
        store.set_background_color(color).map_err(|e| e.to_string())?;
        store.set_transparent(false);
    } else if args.transparent {
        store.set_transparent(true);
    }

    let g = store.grid();
    log_info!(
        "CLI grid {}x{} cells of {}x{} ({}), {}",
        g.cols,
        g.rows,
        g.cell_width,
        g.cell_height,
        g.ratio.label(),
        if store.background().is_transparent { "transparent" } else { "opaque" }
    );
    Ok(store)
}

fn layer_number(added: &[LayerId], n: usize) -> Result<LayerId, String> {
    n.checked_sub(1)
        .and_then(|i| added.get(i))
        .copied()
        .ok_or_else(|| format!("layer {} does not exist (loaded {})", n, added.len()))
}

/// Apply `--place` values in order, snapping the final position when a
/// threshold is given.
fn apply_placements(
    store: &mut LayerStore,
    added: &[LayerId],
    placements: &[Placement],
    snap_threshold: Option<f64>,
) -> Result<(), String> {
    for p in placements {
        let id = layer_number(added, p.layer)?;
        if let Some(scale) = p.scale {
            store.update_layer(id, LayerPatch::scale(scale.clamp(LAYER_SCALE_MIN, LAYER_SCALE_MAX)));
        }
        let Some(layer) = store.layer(id) else { continue };
        let (x, y) = match snap_threshold {
            Some(threshold) => {
                let snap = try_snap_position(layer.width(), layer.height(), p.x, p.y, &store.snap_targets(), threshold);
                (snap.x, snap.y)
            }
            None => (p.x, p.y),
        };
        store.update_layer(id, LayerPatch::position(x, y));
    }
    Ok(())
}

fn print_notices(notices: &[IntakeNotice]) {
    for n in notices {
        log_warn!("Skipped {}: {}", n.file, n.message);
        eprintln!("warning: skipped '{}': {}", n.file, n.message);
    }
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}
