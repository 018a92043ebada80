//! Core raster and geometry utilities for markerdrive.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! know about markers, vehicles or transports: it provides interleaved 8-bit
//! rasters, bilinear sampling, four-point homographies with degeneracy
//! guards, and the fixed-size perspective [`Rectifier`].

mod homography;
mod image;
mod logger;
mod rectify;

pub use homography::{homography_from_4pt, quad_degeneracy, Homography, QuadDegeneracy};
pub use image::{sample_bilinear, sample_bilinear_u8, Raster, RasterView};
pub use rectify::{Quad, Rectified, Rectifier, RectifierParams, RectifyError};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, parse_level, LOG_ENV};
