//! JSON configuration for the whole drive loop.

use crate::controller::{ControllerParams, Pipeline};
use markerdrive_control::{CommandDeriver, DeriverParams, GateParams, TransmissionGate};
use markerdrive_core::{Rectifier, RectifierParams, RectifyError};
use markerdrive_markers::{BindingError, CornerResolver, CornerSelection, ResolverParams};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Rectifier(#[from] RectifyError),
}

/// Every tunable of the loop. Missing sections fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub resolver: ResolverParams,
    /// Overrides the corner selection of every binding when set.
    pub corner_selection: Option<CornerSelection>,
    pub rectifier: RectifierParams,
    pub deriver: DeriverParams,
    pub gate: GateParams,
    pub controller: ControllerParams,
}

impl DriveConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolver parameters with the selection override applied.
    pub fn build_resolver_params(&self) -> Result<ResolverParams, ConfigError> {
        let mut params = self.resolver.clone();
        if let Some(sel) = self.corner_selection {
            params.bindings = params.bindings.with_selection(sel)?;
        }
        Ok(params)
    }

    pub fn build_rectifier(&self) -> Result<Rectifier, ConfigError> {
        Ok(Rectifier::new(self.rectifier.clone())?)
    }

    /// Build the per-frame pipeline from this config.
    pub fn build_pipeline(&self) -> Result<Pipeline, ConfigError> {
        Ok(Pipeline::new(
            CornerResolver::new(self.build_resolver_params()?),
            self.build_rectifier()?,
            CommandDeriver::new(self.deriver.clone()),
            TransmissionGate::new(self.gate.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markerdrive_markers::Role;

    #[test]
    fn partial_json_fills_in_defaults() {
        let cfg: DriveConfig =
            serde_json::from_str(r#"{ "controller": { "cycle_delay_ms": 250 } }"#).unwrap();
        assert_eq!(cfg.controller.cycle_delay_ms, 250);
        assert_eq!(cfg.controller.startup_poll_ms, 10);
        assert_eq!(cfg.rectifier, RectifierParams::default());
        assert_eq!(cfg.resolver, ResolverParams::default());
    }

    #[test]
    fn selection_override_applies_to_every_binding() {
        let cfg = DriveConfig {
            corner_selection: Some(CornerSelection::Centroid),
            ..DriveConfig::default()
        };
        let params = cfg.build_resolver_params().unwrap();
        for role in Role::ALL {
            assert_eq!(params.bindings.binding(role).selection, CornerSelection::Centroid);
        }
    }

    #[test]
    fn zero_sized_output_is_rejected() {
        let mut cfg = DriveConfig::default();
        cfg.rectifier.width = 0;
        assert!(matches!(
            cfg.build_pipeline(),
            Err(ConfigError::Rectifier(RectifyError::InvalidOutputSize { .. }))
        ));
    }
}
