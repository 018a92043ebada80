//! Steering model contract.
//!
//! The inference runtime is external; this module defines what it consumes
//! (a normalized `[0, 1]` tensor of fixed shape) and produces (one or more
//! scalars, the first of which is steering).

use markerdrive_core::{sample_bilinear, RasterView};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("no steering model is loaded")]
    Unavailable,
    #[error("failed to load model from {origin}: {reason}")]
    Load { origin: String, reason: String },
    #[error("cannot convert a {got}-channel image into a {want}-channel model input")]
    ChannelMismatch { got: usize, want: usize },
    #[error("model input shape {width}x{height}x{channels} is empty")]
    EmptyShape {
        width: usize,
        height: usize,
        channels: usize,
    },
    #[error("model returned no outputs")]
    EmptyOutput,
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Where a model comes from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    /// Remote model description (topology plus sharded weights).
    Url(String),
    /// User-supplied topology and weights files.
    Files { topology: PathBuf, weights: PathBuf },
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Url(url) => f.write_str(url),
            ModelSource::Files { topology, weights } => {
                write!(f, "{} + {}", topology.display(), weights.display())
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

/// Row-major, channel-interleaved `f32` tensor in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelInput {
    pub shape: InputShape,
    pub data: Vec<f32>,
}

impl ModelInput {
    /// Resize `image` to `shape` (bilinear, pixel-centre aligned) and scale to `[0, 1]`.
    ///
    /// Channel conversion: extra source channels are dropped (RGBA -> RGB),
    /// a 1-channel model averages the first three source channels, and a
    /// 1-channel source is replicated for multi-channel models.
    pub fn from_raster(image: &RasterView<'_>, shape: InputShape) -> Result<Self, ModelError> {
        let InputShape {
            width,
            height,
            channels,
        } = shape;
        if width == 0 || height == 0 || channels == 0 {
            return Err(ModelError::EmptyShape {
                width,
                height,
                channels,
            });
        }

        let src_c = image.channels;
        let gray_from_color = channels == 1 && src_c >= 3;
        if !(src_c >= channels || src_c == 1 || gray_from_color) {
            return Err(ModelError::ChannelMismatch {
                got: src_c,
                want: channels,
            });
        }

        let sx = image.width as f32 / width as f32;
        let sy = image.height as f32 / height as f32;
        let mut data = Vec::with_capacity(width * height * channels);
        for y in 0..height {
            let fy = (y as f32 + 0.5) * sy - 0.5;
            for x in 0..width {
                let fx = (x as f32 + 0.5) * sx - 0.5;
                let fx = fx.clamp(0.0, (image.width.max(1) - 1) as f32);
                let fy = fy.clamp(0.0, (image.height.max(1) - 1) as f32);
                if gray_from_color {
                    let sum: f32 = (0..3).map(|c| sample_bilinear(image, fx, fy, c, 0)).sum();
                    data.push(sum / (3.0 * 255.0));
                    continue;
                }
                for c in 0..channels {
                    let src = if src_c == 1 { 0 } else { c };
                    data.push(sample_bilinear(image, fx, fy, src, 0) / 255.0);
                }
            }
        }

        Ok(Self { shape, data })
    }
}

/// A loaded image-to-steering model.
pub trait SteeringModel: Send {
    fn input_shape(&self) -> InputShape;

    fn predict(&mut self, input: &ModelInput) -> Result<Vec<f32>, ModelError>;

    /// Steering prediction for a rectified image: the first model output.
    fn steer(&mut self, image: &RasterView<'_>) -> Result<f32, ModelError> {
        let input = ModelInput::from_raster(image, self.input_shape())?;
        self.predict(&input)?
            .first()
            .copied()
            .ok_or(ModelError::EmptyOutput)
    }
}

/// Builds models from a [`ModelSource`].
pub trait ModelLoader: Send {
    fn load(&self, source: &ModelSource) -> Result<Box<dyn SteeringModel>, ModelError>;
}
