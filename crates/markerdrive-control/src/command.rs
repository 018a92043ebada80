//! Vehicle commands and their wire encoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Continuous drive command. Values are not clamped here; the vehicle
/// firmware owns the final range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub steering: f32,
    pub throttle: f32,
}

impl Command {
    pub const fn new(steering: f32, throttle: f32) -> Self {
        Self { steering, throttle }
    }
}

/// Discrete operator command from the manual controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManualCommand {
    Forward,
    Back,
    Left,
    Right,
}

impl ManualCommand {
    pub const ALL: [ManualCommand; 4] = [
        ManualCommand::Forward,
        ManualCommand::Back,
        ManualCommand::Left,
        ManualCommand::Right,
    ];

    /// Token sent verbatim on the wire.
    pub fn token(self) -> &'static str {
        match self {
            ManualCommand::Forward => "forward",
            ManualCommand::Back => "back",
            ManualCommand::Left => "left",
            ManualCommand::Right => "right",
        }
    }
}

impl fmt::Display for ManualCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown manual command {0:?} (expected forward, back, left or right)")]
pub struct UnknownManualCommand(pub String);

impl FromStr for ManualCommand {
    type Err = UnknownManualCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.token() == s)
            .ok_or_else(|| UnknownManualCommand(s.to_owned()))
    }
}

/// Everything that can go out on the control channel.
#[derive(Clone, Debug, PartialEq)]
pub enum WireMessage {
    /// Structured `{"steering": .., "throttle": ..}` record.
    Command(Command),
    /// Bare manual token.
    Manual(ManualCommand),
    /// Greeting sent once when the channel opens.
    Handshake(String),
}

impl WireMessage {
    /// Text payload for transports that carry strings.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            WireMessage::Command(cmd) => serde_json::to_string(cmd),
            WireMessage::Manual(m) => Ok(m.token().to_owned()),
            WireMessage::Handshake(text) => Ok(text.clone()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Command(_) => "command",
            WireMessage::Manual(_) => "manual",
            WireMessage::Handshake(_) => "handshake",
        }
    }
}
