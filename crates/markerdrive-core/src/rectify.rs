//! Perspective rectification of a marked quadrilateral into a fixed square.

use crate::homography::{homography_from_4pt, quad_degeneracy, QuadDegeneracy};
use crate::{sample_bilinear_u8, Homography, Raster, RasterView};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Source quadrilateral in image pixels, ordered TL, TR, BL, BR.
pub type Quad = [Point2<f32>; 4];

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RectifyError {
    #[error("invalid output size {width}x{height}")]
    InvalidOutputSize { width: usize, height: usize },
    #[error("source raster buffer does not match {width}x{height}x{channels}")]
    InvalidSource {
        width: usize,
        height: usize,
        channels: usize,
    },
    #[error("degenerate marker geometry: {0:?}")]
    DegenerateGeometry(QuadDegeneracy),
    #[error("homography is singular (|det| = {det:e})")]
    SingularHomography { det: f64 },
}

/// Output geometry and numeric guards for the rectifier.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RectifierParams {
    pub width: usize,
    pub height: usize,
    /// Value written for every channel when a sample falls outside the frame.
    pub border_value: u8,
    /// Coincidence / collinearity tolerance relative to the quad's squared diameter.
    pub degeneracy_eps: f64,
    /// Minimum |det(H)| accepted for the image -> rectified transform.
    pub min_abs_det: f64,
}

impl Default for RectifierParams {
    fn default() -> Self {
        Self {
            width: 700,
            height: 700,
            border_value: 0,
            degeneracy_eps: 1e-4,
            min_abs_det: 1e-9,
        }
    }
}

/// Rectified output of one cycle.
#[derive(Clone, Debug)]
pub struct Rectified {
    pub image: Raster,
    /// Maps source-image pixels into the rectified square.
    pub h_rect_from_img: Homography,
    /// Maps rectified pixels back into the source image (used for sampling).
    pub h_img_from_rect: Homography,
}

/// Stateless warp of a marked quad into a `width x height` raster.
#[derive(Clone, Debug)]
pub struct Rectifier {
    params: RectifierParams,
    dst: Quad,
}

impl Rectifier {
    pub fn new(params: RectifierParams) -> Result<Self, RectifyError> {
        if params.width == 0 || params.height == 0 {
            return Err(RectifyError::InvalidOutputSize {
                width: params.width,
                height: params.height,
            });
        }
        let (w, h) = (params.width as f32, params.height as f32);
        let dst = [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(0.0, h),
            Point2::new(w, h),
        ];
        Ok(Self { params, dst })
    }

    #[inline]
    pub fn params(&self) -> &RectifierParams {
        &self.params
    }

    /// Destination corners (TL, TR, BL, BR) in rectified pixels.
    #[inline]
    pub fn destination(&self) -> &Quad {
        &self.dst
    }

    /// Homography mapping `quad` onto the output square, with degeneracy guards.
    pub fn homography(&self, quad: &Quad) -> Result<Homography, RectifyError> {
        if let Some(reason) = quad_degeneracy(quad, self.params.degeneracy_eps) {
            return Err(RectifyError::DegenerateGeometry(reason));
        }

        let h = homography_from_4pt(quad, &self.dst)
            .ok_or(RectifyError::SingularHomography { det: 0.0 })?;
        let det = h.determinant();
        if !det.is_finite() || det.abs() < self.params.min_abs_det {
            return Err(RectifyError::SingularHomography { det });
        }
        Ok(h)
    }

    /// Warp `src` through the homography defined by `quad`.
    ///
    /// Every output pixel `(x, y)` samples the source at `H^-1 (x, y)` with
    /// bilinear interpolation; taps outside the source read `border_value`.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, src, quad),
            fields(src_w = src.width, src_h = src.height, out_w = self.params.width)
        )
    )]
    pub fn rectify(&self, src: &RasterView<'_>, quad: &Quad) -> Result<Rectified, RectifyError> {
        if !src.is_consistent() {
            return Err(RectifyError::InvalidSource {
                width: src.width,
                height: src.height,
                channels: src.channels,
            });
        }

        let h_rect_from_img = self.homography(quad)?;
        let h_img_from_rect = h_rect_from_img
            .inverse()
            .ok_or(RectifyError::SingularHomography {
                det: h_rect_from_img.determinant(),
            })?;

        let (out_w, out_h, ch) = (self.params.width, self.params.height, src.channels);
        let mut image = Raster::new(out_w, out_h, ch);
        for y in 0..out_h {
            for x in 0..out_w {
                let p = h_img_from_rect.apply(Point2::new(x as f32, y as f32));
                let base = (y * out_w + x) * ch;
                for c in 0..ch {
                    image.data[base + c] =
                        sample_bilinear_u8(src, p.x, p.y, c, self.params.border_value);
                }
            }
        }

        Ok(Rectified {
            image,
            h_rect_from_img,
            h_img_from_rect,
        })
    }
}
