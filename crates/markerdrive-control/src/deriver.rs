//! Per-cycle command derivation.

use crate::{Command, ModelError, SteeringModel};
use markerdrive_core::RasterView;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Throttle shaping constants.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeriverParams {
    /// Auto-drive throttle is `1 - speed / speed_scale`.
    pub speed_scale: f32,
    /// Braking throttle is `-speed / decel_scale`.
    pub decel_scale: f32,
    /// Speeds strictly above this count as moving.
    pub moving_threshold: f32,
    /// Steering sent while braking.
    pub neutral_steering: f32,
}

impl Default for DeriverParams {
    fn default() -> Self {
        Self {
            speed_scale: 15.0,
            decel_scale: 30.0,
            moving_threshold: 0.1,
            neutral_steering: 0.01,
        }
    }
}

/// Outcome of one derivation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Derivation {
    /// Model-driven steering with speed-shaped throttle.
    AutoDrive(Command),
    /// Auto-drive is off but the vehicle is still rolling.
    Decelerate(Command),
    /// Nothing to send.
    Idle,
}

impl Derivation {
    pub fn command(&self) -> Option<Command> {
        match *self {
            Derivation::AutoDrive(cmd) | Derivation::Decelerate(cmd) => Some(cmd),
            Derivation::Idle => None,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DeriveError {
    #[error("auto-drive skipped: no rectified image this cycle")]
    NoRectifiedImage,
    #[error("auto-drive skipped: {0}")]
    Model(#[from] ModelError),
}

/// Per-cycle inputs, gathered by the loop controller.
pub struct DeriveInput<'a> {
    pub auto_drive: bool,
    pub speed: f32,
    pub rectified: Option<RasterView<'a>>,
    pub model: Option<&'a mut dyn SteeringModel>,
}

#[derive(Clone, Debug, Default)]
pub struct CommandDeriver {
    params: DeriverParams,
}

impl CommandDeriver {
    pub fn new(params: DeriverParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &DeriverParams {
        &self.params
    }

    /// Auto-drive throttle; deliberately unclamped.
    #[inline]
    pub fn drive_throttle(&self, speed: f32) -> f32 {
        1.0 - speed / self.params.speed_scale
    }

    /// Braking command if `speed` counts as moving.
    pub fn decelerate(&self, speed: f32) -> Option<Command> {
        (speed > self.params.moving_threshold).then(|| {
            Command::new(
                self.params.neutral_steering,
                -speed / self.params.decel_scale,
            )
        })
    }

    /// Pick exactly one outcome: auto-drive, then braking, then idle.
    ///
    /// With auto-drive enabled the result is either a drive command or an
    /// error explaining why inference was skipped; braking only applies when
    /// auto-drive is off.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, input), fields(auto = input.auto_drive, speed = input.speed))
    )]
    pub fn derive(&self, input: DeriveInput<'_>) -> Result<Derivation, DeriveError> {
        if input.auto_drive {
            let model = input.model.ok_or(ModelError::Unavailable)?;
            let image = input.rectified.ok_or(DeriveError::NoRectifiedImage)?;
            let steering = model.steer(&image)?;
            return Ok(Derivation::AutoDrive(Command::new(
                steering,
                self.drive_throttle(input.speed),
            )));
        }

        Ok(self
            .decelerate(input.speed)
            .map_or(Derivation::Idle, Derivation::Decelerate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InputShape, ModelInput};
    use approx::assert_abs_diff_eq;
    use markerdrive_core::Raster;

    struct Fixed(f32);

    impl SteeringModel for Fixed {
        fn input_shape(&self) -> InputShape {
            InputShape {
                width: 4,
                height: 4,
                channels: 3,
            }
        }

        fn predict(&mut self, _input: &ModelInput) -> Result<Vec<f32>, ModelError> {
            Ok(vec![self.0])
        }
    }

    fn idle_input(speed: f32) -> DeriveInput<'static> {
        DeriveInput {
            auto_drive: false,
            speed,
            rectified: None,
            model: None,
        }
    }

    #[test]
    fn moving_without_auto_drive_brakes() {
        let d = CommandDeriver::default();
        let out = d.derive(idle_input(5.0)).expect("derive");
        let Derivation::Decelerate(cmd) = out else {
            panic!("expected deceleration, got {out:?}");
        };
        assert_abs_diff_eq!(cmd.steering, 0.01);
        assert_abs_diff_eq!(cmd.throttle, -5.0 / 30.0, epsilon = 1e-6);
    }

    #[test]
    fn stopped_without_auto_drive_is_idle() {
        let d = CommandDeriver::default();
        assert_eq!(d.derive(idle_input(0.05)).expect("derive"), Derivation::Idle);
        assert_eq!(d.derive(idle_input(0.1)).expect("derive"), Derivation::Idle);
        assert_eq!(d.derive(idle_input(0.0)).expect("derive").command(), None);
    }

    #[test]
    fn auto_drive_uses_model_and_speed_shaped_throttle() {
        let d = CommandDeriver::default();
        let img = Raster::new(8, 8, 3);
        let mut model = Fixed(0.3);
        let out = d
            .derive(DeriveInput {
                auto_drive: true,
                speed: 15.0,
                rectified: Some(img.view()),
                model: Some(&mut model),
            })
            .expect("derive");
        assert_eq!(out, Derivation::AutoDrive(Command::new(0.3, 0.0)));
    }

    #[test]
    fn auto_drive_throttle_is_not_clamped() {
        let d = CommandDeriver::default();
        assert_abs_diff_eq!(d.drive_throttle(30.0), -1.0);
        assert_abs_diff_eq!(d.drive_throttle(-15.0), 2.0);
    }

    #[test]
    fn auto_drive_takes_precedence_over_braking() {
        let d = CommandDeriver::default();
        let img = Raster::new(8, 8, 3);
        let mut model = Fixed(-0.2);
        let out = d
            .derive(DeriveInput {
                auto_drive: true,
                speed: 6.0,
                rectified: Some(img.view()),
                model: Some(&mut model),
            })
            .expect("derive");
        assert!(matches!(out, Derivation::AutoDrive(_)));
    }

    #[test]
    fn auto_drive_without_model_or_image_is_skipped() {
        let d = CommandDeriver::default();
        let img = Raster::new(8, 8, 3);
        let err = d
            .derive(DeriveInput {
                auto_drive: true,
                speed: 6.0,
                rectified: Some(img.view()),
                model: None,
            })
            .unwrap_err();
        assert_eq!(err, DeriveError::Model(ModelError::Unavailable));

        let mut model = Fixed(0.1);
        let err = d
            .derive(DeriveInput {
                auto_drive: true,
                speed: 6.0,
                rectified: None,
                model: Some(&mut model),
            })
            .unwrap_err();
        assert_eq!(err, DeriveError::NoRectifiedImage);
    }
}
