use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Loop timing and connection behaviour.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ControllerParams {
    /// Pause between the end of one cycle and the start of the next.
    pub cycle_delay_ms: u64,
    /// Poll interval while waiting for the first frame.
    pub startup_poll_ms: u64,
    /// Give up waiting for frames after this many polls; `None` waits forever.
    pub max_startup_polls: Option<u32>,
    /// Keep polling at startup until a steering model is installed.
    pub require_model: bool,
    /// Sent once when the peer connection opens.
    pub handshake: String,
}

impl Default for ControllerParams {
    fn default() -> Self {
        Self {
            cycle_delay_ms: 500,
            startup_poll_ms: 10,
            max_startup_polls: None,
            require_model: false,
            handshake: "Mobile phone connected.".to_owned(),
        }
    }
}

impl ControllerParams {
    #[inline]
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }

    #[inline]
    pub fn startup_poll(&self) -> Duration {
        Duration::from_millis(self.startup_poll_ms)
    }
}
