//! Command derivation and transmission for markerdrive.
//!
//! - [`CommandDeriver`] turns the session state, telemetry and (optionally) a
//!   steering model's prediction into one [`Derivation`] per cycle.
//! - [`TransmissionGate`] forwards commands and manual tokens onto an
//!   [`OutboundChannel`] only while it is open, dropping everything else.
//! - [`Telemetry`] keeps the last reported vehicle speed.
//! - [`Session`] bundles operator toggles, telemetry and the loaded model.

mod command;
mod deriver;
mod gate;
mod model;
mod session;
mod telemetry;

pub use command::{Command, ManualCommand, UnknownManualCommand, WireMessage};
pub use deriver::{CommandDeriver, DeriveError, DeriveInput, Derivation, DeriverParams};
pub use gate::{ChannelError, GateOutcome, GateParams, OutboundChannel, TransmissionGate};
pub use model::{InputShape, ModelError, ModelInput, ModelLoader, ModelSource, SteeringModel};
pub use session::{Session, SessionState};
pub use telemetry::{Telemetry, TelemetryError};
