//! Operator session: toggles, telemetry and the loaded model.

use crate::{SteeringModel, Telemetry};

/// Flags changed only by explicit operator actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionState {
    pub connected: bool,
    pub detection_running: bool,
    pub auto_drive: bool,
    /// UI visibility of the rectified image.
    pub show_rectified: bool,
    /// UI visibility of the manual buttons.
    pub show_manual_controls: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            connected: false,
            detection_running: false,
            auto_drive: false,
            show_rectified: true,
            show_manual_controls: true,
        }
    }
}

/// Everything the pipeline reads between cycles.
///
/// Owned by the loop controller; message handlers mutate it between cycles
/// and the command deriver reads it during a cycle.
#[derive(Default)]
pub struct Session {
    pub state: SessionState,
    pub telemetry: Telemetry,
    model: Option<Box<dyn SteeringModel>>,
}

impl Session {
    pub fn new(state: SessionState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    #[inline]
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Replace the loaded model.
    pub fn install_model(&mut self, model: Box<dyn SteeringModel>) {
        if self.model.replace(model).is_some() {
            log::info!("steering model replaced");
        } else {
            log::info!("steering model loaded");
        }
    }

    pub fn model_mut(&mut self) -> Option<&mut (dyn SteeringModel + 'static)> {
        self.model.as_deref_mut()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("telemetry", &self.telemetry)
            .field("has_model", &self.has_model())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InputShape, ModelError, ModelInput};

    struct Zero;

    impl SteeringModel for Zero {
        fn input_shape(&self) -> InputShape {
            InputShape {
                width: 1,
                height: 1,
                channels: 1,
            }
        }

        fn predict(&mut self, _input: &ModelInput) -> Result<Vec<f32>, ModelError> {
            Ok(vec![0.0])
        }
    }

    #[test]
    fn defaults_show_ui_and_disable_driving() {
        let s = Session::default();
        assert!(!s.state.connected && !s.state.detection_running && !s.state.auto_drive);
        assert!(s.state.show_rectified && s.state.show_manual_controls);
        assert!(!s.has_model());
        assert_eq!(s.telemetry.speed(), 0.0);
    }

    #[test]
    fn installing_a_model_makes_it_available() {
        let mut s = Session::default();
        s.install_model(Box::new(Zero));
        assert!(s.has_model());
        assert!(s.model_mut().is_some());
        assert!(format!("{s:?}").contains("has_model: true"));
    }
}
