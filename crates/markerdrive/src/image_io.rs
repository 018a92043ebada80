//! Conversions between `image` buffers and [`Raster`], plus overlay drawing.

use crate::controller::FrameGeometry;
use image::{DynamicImage, GrayImage, Rgb, RgbImage, RgbaImage};
use markerdrive_core::Raster;
use nalgebra::Point2;
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum ImageIoError {
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("raster is empty ({width}x{height})")]
    Empty { width: usize, height: usize },
    #[error("unsupported channel count {0} (expected 1, 3 or 4)")]
    Channels(usize),
}

const MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const FIRST_CORNER_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Copy an RGB image into an interleaved 3-channel raster.
pub fn raster_from_rgb(img: &RgbImage) -> Raster {
    Raster {
        width: img.width() as usize,
        height: img.height() as usize,
        channels: 3,
        data: img.as_raw().clone(),
    }
}

/// Convert any decoded image to 3-channel RGB.
pub fn raster_from_dynamic(img: &DynamicImage) -> Raster {
    raster_from_rgb(&img.to_rgb8())
}

/// Wrap a raster as an `image` buffer. 1, 3 and 4 channels are supported.
pub fn raster_to_dynamic(raster: &Raster) -> Result<DynamicImage, ImageIoError> {
    if raster.width == 0 || raster.height == 0 {
        return Err(ImageIoError::Empty {
            width: raster.width,
            height: raster.height,
        });
    }
    let (w, h) = (raster.width as u32, raster.height as u32);
    let data = raster.data.clone();
    let img = match raster.channels {
        1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        other => return Err(ImageIoError::Channels(other)),
    };
    img.ok_or(ImageIoError::Empty {
        width: raster.width,
        height: raster.height,
    })
}

#[cfg_attr(feature = "tracing", instrument(level = "info", skip(path)))]
pub fn load_raster(path: impl AsRef<Path>) -> Result<Raster, ImageIoError> {
    let img = image::open(path)?;
    Ok(raster_from_dynamic(&img))
}

pub fn save_raster(path: impl AsRef<Path>, raster: &Raster) -> Result<(), ImageIoError> {
    raster_to_dynamic(raster)?.save(path)?;
    Ok(())
}

/// Draw marker outlines, label anchors and the resolved screen outline.
///
/// Each marker's `corners[0]` is highlighted so the detector's winding order
/// can be checked against the corner bindings.
pub fn draw_overlay(img: &mut RgbImage, geometry: &FrameGeometry) {
    for marker in &geometry.markers {
        draw_polygon(img, &marker.corners, MARKER_COLOR);
        draw_dot(img, marker.label_anchor, MARKER_COLOR);
        draw_dot(img, marker.corners[0], FIRST_CORNER_COLOR);
    }
    if let Some(outline) = geometry.outline.as_ref() {
        draw_polygon(img, outline, OUTLINE_COLOR);
    }
}

fn draw_polygon(img: &mut RgbImage, pts: &[Point2<f32>], color: Rgb<u8>) {
    for (i, a) in pts.iter().enumerate() {
        let b = pts[(i + 1) % pts.len()];
        draw_line(img, *a, b, color);
    }
}

fn draw_line(img: &mut RgbImage, a: Point2<f32>, b: Point2<f32>, color: Rgb<u8>) {
    let lo = Point2::new(-0.5, -0.5);
    let hi = Point2::new(img.width() as f32 - 0.5, img.height() as f32 - 0.5);
    let Some((a, b)) = clip_segment(a, b, lo, hi) else {
        return;
    };
    let steps = (b.x - a.x).abs().max((b.y - a.y).abs()).ceil().max(1.0) as usize;
    for s in 0..=steps {
        let t = s as f32 / steps as f32;
        put(img, a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t, color);
    }
}

/// Liang-Barsky clip of `a..b` to the box `[lo, hi]`. Segments with
/// non-finite coordinates are dropped.
fn clip_segment(
    a: Point2<f32>,
    b: Point2<f32>,
    lo: Point2<f32>,
    hi: Point2<f32>,
) -> Option<(Point2<f32>, Point2<f32>)> {
    let d = b - a;
    if !(a.x.is_finite() && a.y.is_finite() && d.x.is_finite() && d.y.is_finite()) {
        return None;
    }
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    let edges = [
        (-d.x, a.x - lo.x),
        (d.x, hi.x - a.x),
        (-d.y, a.y - lo.y),
        (d.y, hi.y - a.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((a + d * t0, a + d * t1))
}

fn draw_dot(img: &mut RgbImage, p: Point2<f32>, color: Rgb<u8>) {
    for dy in -1..=1 {
        for dx in -1..=1 {
            put(img, p.x + dx as f32, p.y + dy as f32, color);
        }
    }
}

fn put(img: &mut RgbImage, x: f32, y: f32, color: Rgb<u8>) {
    let (x, y) = (x.round(), y.round());
    // NaN fails both range checks
    if !(0.0..img.width() as f32).contains(&x) || !(0.0..img.height() as f32).contains(&y) {
        return;
    }
    img.put_pixel(x as u32, y as u32, color);
}
