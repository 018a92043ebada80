//! Ready-state gate in front of the outbound control channel.

use crate::{Command, ManualCommand, WireMessage};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(thiserror::Error, Debug)]
pub enum ChannelError {
    #[error("channel is not open")]
    NotOpen,
    #[error("failed to encode {kind} message: {source}")]
    Encode {
        kind: &'static str,
        source: serde_json::Error,
    },
    #[error("transport error: {0}")]
    Transport(String),
}

/// Outbound half of the peer link.
pub trait OutboundChannel {
    fn is_open(&self) -> bool;

    fn send(&mut self, message: &WireMessage) -> Result<(), ChannelError>;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GateParams {
    /// Minimum spacing between derived commands; manual tokens are exempt.
    pub min_command_interval_ms: u64,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            min_command_interval_ms: 100,
        }
    }
}

impl GateParams {
    #[inline]
    pub fn min_command_interval(&self) -> Duration {
        Duration::from_millis(self.min_command_interval_ms)
    }
}

/// What happened to a message offered to the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    Sent,
    /// Channel closed; message dropped without retry.
    NotReady,
    /// Derived command arrived sooner than the minimum interval.
    Throttled,
    /// The transport rejected the message.
    Failed,
}

/// Fire-and-forget forwarding: no queueing, no retries, no acknowledgements.
#[derive(Clone, Debug, Default)]
pub struct TransmissionGate {
    params: GateParams,
    last_command_at: Option<Instant>,
    sent: u64,
    dropped: u64,
}

impl TransmissionGate {
    pub fn new(params: GateParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    #[inline]
    pub fn params(&self) -> &GateParams {
        &self.params
    }

    /// Messages handed to the transport so far.
    #[inline]
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Messages dropped because the channel was closed, throttled or failing.
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Offer a derived command observed at `now`.
    pub fn send_command<C: OutboundChannel + ?Sized>(
        &mut self,
        channel: &mut C,
        command: Command,
        now: Instant,
    ) -> GateOutcome {
        if let Some(last) = self.last_command_at {
            if now.saturating_duration_since(last) < self.params.min_command_interval() {
                self.dropped += 1;
                log::debug!("command throttled: {command:?}");
                return GateOutcome::Throttled;
            }
        }
        let outcome = self.forward(channel, &WireMessage::Command(command));
        if outcome == GateOutcome::Sent {
            self.last_command_at = Some(now);
        }
        outcome
    }

    /// Forward a manual token immediately.
    pub fn send_manual<C: OutboundChannel + ?Sized>(
        &mut self,
        channel: &mut C,
        command: ManualCommand,
    ) -> GateOutcome {
        self.forward(channel, &WireMessage::Manual(command))
    }

    pub fn send_handshake<C: OutboundChannel + ?Sized>(
        &mut self,
        channel: &mut C,
        greeting: &str,
    ) -> GateOutcome {
        self.forward(channel, &WireMessage::Handshake(greeting.to_owned()))
    }

    fn forward<C: OutboundChannel + ?Sized>(
        &mut self,
        channel: &mut C,
        message: &WireMessage,
    ) -> GateOutcome {
        if !channel.is_open() {
            self.dropped += 1;
            log::debug!("channel not ready; dropped {} message", message.kind());
            return GateOutcome::NotReady;
        }
        match channel.send(message) {
            Ok(()) => {
                self.sent += 1;
                GateOutcome::Sent
            }
            Err(err) => {
                self.dropped += 1;
                log::warn!("send of {} message failed: {err}", message.kind());
                GateOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        open: bool,
        fail: bool,
        sent: Vec<WireMessage>,
    }

    impl OutboundChannel for Recorder {
        fn is_open(&self) -> bool {
            self.open
        }

        fn send(&mut self, message: &WireMessage) -> Result<(), ChannelError> {
            if self.fail {
                return Err(ChannelError::Transport("peer gone".into()));
            }
            self.sent.push(message.clone());
            Ok(())
        }
    }

    #[test]
    fn closed_channel_never_sees_send() {
        let mut ch = Recorder::default();
        let mut gate = TransmissionGate::default();
        let now = Instant::now();
        assert_eq!(
            gate.send_command(&mut ch, Command::new(0.1, 0.5), now),
            GateOutcome::NotReady
        );
        assert_eq!(
            gate.send_manual(&mut ch, ManualCommand::Left),
            GateOutcome::NotReady
        );
        assert!(ch.sent.is_empty());
        assert_eq!((gate.sent(), gate.dropped()), (0, 2));
    }

    #[test]
    fn open_channel_receives_messages_in_order() {
        let mut ch = Recorder {
            open: true,
            ..Recorder::default()
        };
        let mut gate = TransmissionGate::default();
        gate.send_handshake(&mut ch, "hello");
        gate.send_manual(&mut ch, ManualCommand::Forward);
        gate.send_command(&mut ch, Command::new(0.0, 1.0), Instant::now());
        assert_eq!(
            ch.sent,
            vec![
                WireMessage::Handshake("hello".into()),
                WireMessage::Manual(ManualCommand::Forward),
                WireMessage::Command(Command::new(0.0, 1.0)),
            ]
        );
    }

    #[test]
    fn derived_commands_are_rate_limited_but_manual_is_not() {
        let mut ch = Recorder {
            open: true,
            ..Recorder::default()
        };
        let mut gate = TransmissionGate::new(GateParams {
            min_command_interval_ms: 100,
        });
        let t0 = Instant::now();
        let cmd = Command::new(0.0, 0.5);
        assert_eq!(gate.send_command(&mut ch, cmd, t0), GateOutcome::Sent);
        assert_eq!(
            gate.send_command(&mut ch, cmd, t0 + Duration::from_millis(40)),
            GateOutcome::Throttled
        );
        assert_eq!(
            gate.send_manual(&mut ch, ManualCommand::Right),
            GateOutcome::Sent
        );
        assert_eq!(
            gate.send_command(&mut ch, cmd, t0 + Duration::from_millis(100)),
            GateOutcome::Sent
        );
        assert_eq!(ch.sent.len(), 3);
    }

    #[test]
    fn transport_failure_is_reported_and_not_retried() {
        let mut ch = Recorder {
            open: true,
            fail: true,
            ..Recorder::default()
        };
        let mut gate = TransmissionGate::default();
        let t0 = Instant::now();
        assert_eq!(
            gate.send_command(&mut ch, Command::new(0.0, 0.5), t0),
            GateOutcome::Failed
        );
        // a failed send does not start the throttle window
        ch.fail = false;
        assert_eq!(
            gate.send_command(&mut ch, Command::new(0.0, 0.5), t0),
            GateOutcome::Sent
        );
        assert_eq!(ch.sent.len(), 1);
    }
}
