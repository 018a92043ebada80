//! Newline-delimited outbound transport over any [`std::io::Write`].

use markerdrive_control::{ChannelError, OutboundChannel, WireMessage};
use std::io::Write;

/// Writes one encoded message per line and flushes after each.
///
/// The channel starts open; [`LineChannel::close`] (or a write error) closes
/// it, after which the gate drops everything offered to it.
#[derive(Debug)]
pub struct LineChannel<W: Write> {
    writer: W,
    open: bool,
}

impl<W: Write> LineChannel<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, open: true }
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn reopen(&mut self) {
        self.open = true;
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutboundChannel for LineChannel<W> {
    fn is_open(&self) -> bool {
        self.open
    }

    fn send(&mut self, message: &WireMessage) -> Result<(), ChannelError> {
        if !self.open {
            return Err(ChannelError::NotOpen);
        }
        let line = message.encode().map_err(|source| ChannelError::Encode {
            kind: message.kind(),
            source,
        })?;
        let written = writeln!(self.writer, "{line}").and_then(|_| self.writer.flush());
        if let Err(err) = written {
            self.open = false;
            return Err(ChannelError::Transport(err.to_string()));
        }
        Ok(())
    }
}
