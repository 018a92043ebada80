//! High-level facade crate for the `markerdrive-*` workspace.
//!
//! markerdrive watches a screen through a camera, finds the four fiducial
//! markers placed at the screen corners, rectifies the enclosed region into a
//! fixed-size image and turns it (together with vehicle telemetry and an
//! optional steering model) into drive commands sent to a peer.
//!
//! This crate provides:
//! - re-exports of the underlying crates,
//! - the async [`controller::LoopController`] that drives the detection loop,
//! - JSON configuration IO ([`io::DriveConfig`]),
//! - a line-oriented [`channel::LineChannel`] transport,
//! - (feature `image`) conversions between `image` buffers and rasters.
//!
//! ## Quickstart
//!
//! ```no_run
//! use markerdrive::core::Raster;
//! use markerdrive::io::DriveConfig;
//! use markerdrive::markers::Marker;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = DriveConfig::default();
//! let pipeline = cfg.build_pipeline()?;
//! let frame = Raster::new(1280, 720, 3);
//! let markers: Vec<Marker> = Vec::new();
//! let geometry = pipeline.process(&frame.view(), &markers);
//! println!("rectified: {}", geometry.rectified.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `markerdrive::core`: rasters, homographies, the rectifier, logging.
//! - `markerdrive::markers`: marker type, detector trait, bindings, resolver.
//! - `markerdrive::control`: commands, telemetry, model contract, deriver, gate.
//! - `markerdrive::controller`: the frame loop and its session handle.
//! - `markerdrive::image_io` (feature `image`): `image` crate conversions.

pub use markerdrive_control as control;
pub use markerdrive_core as core;
pub use markerdrive_markers as markers;

pub use markerdrive_control::{Command, ManualCommand, WireMessage};
pub use markerdrive_core::{Raster, RasterView, Rectifier, RectifierParams};
pub use markerdrive_markers::{BindingTable, Marker, MarkerDetector, Role};

pub mod channel;
pub mod controller;
pub mod io;

#[cfg(feature = "image")]
pub mod image_io;

/// Install a `tracing` subscriber that also captures `log` records.
///
/// Verbosity follows `RUST_LOG`, defaulting to `info`.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let _ = tracing_log::LogTracer::init();
    markerdrive_core::init_tracing(json);
}
