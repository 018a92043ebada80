//! markerdrive CLI: offline rectification, command derivation and config scaffolding.

use clap::{Args, Parser, Subcommand};
use markerdrive::channel::LineChannel;
use markerdrive::control::{
    CommandDeriver, DeriveInput, Derivation, GateOutcome, InputShape, ModelError, ModelInput,
    SteeringModel, TransmissionGate,
};
use markerdrive::controller::{FrameGeometry, GeometryOutcome, MarkerOverlay};
use markerdrive::core::Raster;
use markerdrive::image_io;
use markerdrive::io::DriveConfig;
use markerdrive::markers::Marker;
use nalgebra::Point2;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "markerdrive")]
#[command(about = "Rectify marker-framed screens and derive vehicle commands")]
#[command(version)]
struct Cli {
    /// Emit tracing spans instead of plain log lines (needs the `tracing` feature).
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rectify the marker-framed region of an image.
    Rectify(RectifyArgs),

    /// Print the command the deriver would send for the given state.
    Derive(DeriveArgs),

    /// Write the default configuration as JSON.
    InitConfig {
        /// Output path; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct RectifyArgs {
    /// Input image (any format the `image` crate decodes).
    #[arg(long)]
    image: PathBuf,

    /// JSON list of detected markers: `[{"id": 819, "corners": [[x, y], ...]}, ...]`.
    #[arg(long)]
    markers: PathBuf,

    /// Drive configuration (JSON); defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the rectified image.
    #[arg(long, default_value = "rectified.png")]
    out: PathBuf,

    /// Optional copy of the input with markers and outline drawn on it.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Where to write the JSON report; stdout when omitted.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct DeriveArgs {
    /// Last reported vehicle speed.
    #[arg(long)]
    speed: f32,

    /// Derive as if auto-drive were enabled.
    #[arg(long)]
    auto_drive: bool,

    /// Steering the stand-in model predicts when auto-drive is enabled.
    #[arg(long, allow_hyphen_values = true)]
    steering: Option<f32>,

    /// Drive configuration (JSON); defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct RectifyReport {
    image: String,
    rectified: Option<String>,
    markers: Vec<MarkerOverlay>,
    outline: Option<[Point2<f32>; 4]>,
    outcome: GeometryOutcome,
    diagnostic: Option<String>,
    /// Source image -> rectified image, row-major.
    homography: Option<[[f64; 3]; 3]>,
}

/// Model that always predicts the same steering value.
struct ConstantSteering(f32);

impl SteeringModel for ConstantSteering {
    fn input_shape(&self) -> InputShape {
        InputShape {
            width: 1,
            height: 1,
            channels: 3,
        }
    }

    fn predict(&mut self, _input: &ModelInput) -> Result<Vec<f32>, ModelError> {
        Ok(vec![self.0])
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.trace)?;
    match cli.command {
        Commands::Rectify(args) => run_rectify(&args),
        Commands::Derive(args) => run_derive(&args),
        Commands::InitConfig { out } => run_init_config(out.as_deref()),
    }
}

#[cfg(feature = "tracing")]
fn init_logging(trace: bool) -> CliResult<()> {
    if trace {
        markerdrive::init_tracing(false);
        return Ok(());
    }
    Ok(markerdrive::core::init_from_env()?)
}

#[cfg(not(feature = "tracing"))]
fn init_logging(trace: bool) -> CliResult<()> {
    markerdrive::core::init_from_env()?;
    if trace {
        log::warn!("--trace ignored: built without the `tracing` feature");
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> CliResult<DriveConfig> {
    match path {
        Some(path) => Ok(DriveConfig::load_json(path)?),
        None => Ok(DriveConfig::default()),
    }
}

fn run_rectify(args: &RectifyArgs) -> CliResult<()> {
    let cfg = load_config(args.config.as_deref())?;
    let pipeline = cfg.build_pipeline()?;
    let frame = image_io::load_raster(&args.image)?;
    let markers: Vec<Marker> = serde_json::from_str(&std::fs::read_to_string(&args.markers)?)?;
    log::info!(
        "{}: {}x{} with {} markers",
        args.image.display(),
        frame.width,
        frame.height,
        markers.len()
    );

    let geometry = pipeline.process(&frame.view(), &markers);

    if let Some(path) = args.overlay.as_ref() {
        write_overlay(path, &frame, &geometry)?;
    }

    let mut rectified_path = None;
    let mut homography = None;
    if let Some(rectified) = geometry.rectified.as_ref() {
        image_io::save_raster(&args.out, &rectified.image)?;
        log::info!("wrote {}", args.out.display());
        rectified_path = Some(args.out.display().to_string());
        homography = Some(rectified.h_rect_from_img.to_array());
    }

    let diagnostic = geometry.outcome.diagnostic();
    let report = RectifyReport {
        image: args.image.display().to_string(),
        rectified: rectified_path,
        markers: geometry.markers,
        outline: geometry.outline,
        outcome: geometry.outcome,
        diagnostic: diagnostic.clone(),
        homography,
    };
    let json = serde_json::to_string_pretty(&report)?;
    match args.report.as_ref() {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }

    match diagnostic {
        Some(msg) => Err(msg.into()),
        None => Ok(()),
    }
}

fn write_overlay(path: &Path, frame: &Raster, geometry: &FrameGeometry) -> CliResult<()> {
    let mut img = image_io::raster_to_dynamic(frame)?.to_rgb8();
    image_io::draw_overlay(&mut img, geometry);
    img.save(path)?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn run_derive(args: &DeriveArgs) -> CliResult<()> {
    let cfg = load_config(args.config.as_deref())?;
    let deriver = CommandDeriver::new(cfg.deriver.clone());
    let mut model = args.steering.map(ConstantSteering);
    // the stand-in model ignores pixels; any raster of the output size will do
    let rectified = Raster::new(cfg.rectifier.width, cfg.rectifier.height, 3);

    let derivation = deriver.derive(DeriveInput {
        auto_drive: args.auto_drive,
        speed: args.speed,
        rectified: Some(rectified.view()),
        model: model.as_mut().map(|m| m as &mut dyn SteeringModel),
    })?;

    let Some(cmd) = derivation.command() else {
        log::info!("idle: nothing to send at speed {}", args.speed);
        return Ok(());
    };
    if let Derivation::Decelerate(_) = derivation {
        log::info!("auto-drive off and vehicle moving; braking");
    }

    let mut gate = TransmissionGate::new(cfg.gate.clone());
    let mut channel = LineChannel::new(std::io::stdout().lock());
    match gate.send_command(&mut channel, cmd, Instant::now()) {
        GateOutcome::Sent => Ok(()),
        other => Err(format!("command not sent: {other:?}").into()),
    }
}

fn run_init_config(out: Option<&Path>) -> CliResult<()> {
    let cfg = DriveConfig::default();
    match out {
        Some(path) => {
            cfg.write_json(path)?;
            log::info!("wrote {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&cfg)?),
    }
    Ok(())
}
