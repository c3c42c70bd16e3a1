use std::fs::{self, File};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use image::ImageFormat;
use log::{LevelFilter, error, info};
use simplelog::{Config, WriteLogger};

use pdfstamp::event_source::{PointerEvent, ScriptedEventSource, parse_point};
use pdfstamp::panic_handler;
use pdfstamp::settings;
use pdfstamp::{DirAssetSource, StampWidget};

/// Stamp an image onto the first page of a PDF by replaying pointer events
#[derive(Parser, Debug)]
#[command(name = "pdfstamp", version, about)]
struct Args {
    /// Pointer events: enter:X,Y move:X,Y leave click:X,Y (client coordinates)
    events: Vec<String>,

    /// Read further events from a file, one per line
    #[arg(long)]
    events_file: Option<PathBuf>,

    /// Directory holding the document and stamp assets
    #[arg(short, long)]
    assets: Option<PathBuf>,

    /// Settings file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Client coordinates of the canvas origin, as X,Y
    #[arg(long, default_value = "0,0")]
    origin: String,

    /// Write the final document here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the final canvas (with the stamp preview, if shown) as PNG
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Canvas pixels per PDF point
    #[arg(long)]
    scale: Option<f32>,

    /// Stamp edge length in PDF points
    #[arg(long)]
    stamp_size: Option<u32>,

    #[arg(long, default_value = "pdfstamp.log")]
    log_file: PathBuf,

    /// off, error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,

    /// Seconds to wait for each render or stamp
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

fn read_events(args: &Args) -> Result<ScriptedEventSource> {
    let mut lines = args.events.clone();
    if let Some(path) = &args.events_file {
        let script = fs::read_to_string(path)
            .with_context(|| format!("reading event script {}", path.display()))?;
        lines.extend(
            script
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(String::from),
        );
    }

    let events = lines
        .iter()
        .map(|l| {
            l.parse::<PointerEvent>()
                .with_context(|| format!("bad event `{l}`"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ScriptedEventSource::new(events))
}

fn main() -> Result<()> {
    panic_handler::initialize_panic_handler();
    let args = Args::parse();

    // Trace until the configured level is known, so settings loading is logged
    WriteLogger::init(
        LevelFilter::Trace,
        Config::default(),
        File::create(&args.log_file)
            .with_context(|| format!("creating log file {}", args.log_file.display()))?,
    )?;

    match &args.config {
        Some(path) => settings::load_settings_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => settings::load_settings().context("loading settings")?,
    }
    settings::update(|s| {
        if let Some(dir) = &args.assets {
            s.asset_dir = dir.clone();
        }
        if let Some(scale) = args.scale {
            s.render_scale = scale;
        }
        if let Some(size) = args.stamp_size {
            s.stamp_size = size;
        }
        if let Some(level) = &args.log_level {
            s.log_level = level.clone();
        }
    });
    log::set_max_level(settings::get_log_level());

    info!("Starting pdfstamp");

    let Some((origin_x, origin_y)) = parse_point(&args.origin) else {
        bail!("--origin must look like X,Y, got `{}`", args.origin);
    };
    let mut events = read_events(&args)?;
    let timeout = Duration::from_secs(args.timeout_secs);

    let asset_dir = settings::get_asset_dir();
    let mut widget = StampWidget::new(settings::stamp_config());
    widget.set_canvas_origin(origin_x, origin_y);
    widget
        .load(&DirAssetSource::new(&asset_dir))
        .with_context(|| format!("loading assets from {}", asset_dir.display()))?;
    widget.settle(timeout).context("initial render")?;

    let summary = widget.replay(&mut events, timeout)?;
    info!("Replayed {summary:?}");

    if let Some(e) = widget.last_error() {
        error!("Last error: {e}");
        eprintln!("warning: {e}");
    }

    let document = widget
        .document()
        .context("no document after loading")?;
    let generation = document.generation();
    if let Some(path) = &args.output {
        fs::write(path, document.bytes())
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &args.snapshot {
        widget
            .compose_frame()
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
    }

    println!(
        "{} events, {} stamps, {} clicks dropped; generation {}",
        summary.events,
        summary.accepted_clicks,
        summary.dropped_clicks,
        generation
    );
    if let Some(handle) = widget.display_handle() {
        println!("display: {}", handle.url());
    }

    info!("Exiting pdfstamp");
    Ok(())
}
