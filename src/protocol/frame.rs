//! Inbound frame pairing.
//!
//! Each inbound logical message is two physical socket frames: a text
//! command tag (`"message"` or `"error"`) followed by a binary payload in
//! codec format. Outbound messages are a single binary frame with no
//! command tag.
//!
//! ```text
//! [text:"message"|"error"] [binary: encoded Value] [text] [binary] ...
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use crate::codec::{self, Value};
use crate::error::{Error, Result};

// ============================================================================
// Command
// ============================================================================

/// Inbound command tag carried by the first frame of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Payload is delivered to message listeners.
    Message,
    /// Payload is delivered to error listeners.
    Error,
}

impl Command {
    /// Returns the wire text.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "message" => Ok(Self::Message),
            "error" => Ok(Self::Error),
            other => Err(Error::protocol_state(format!(
                "unknown command frame {other:?}"
            ))),
        }
    }
}

// ============================================================================
// Frame
// ============================================================================

/// One physical socket frame, as far as pairing is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Which listeners receive it.
    pub command: Command,
    /// Decoded payload.
    pub value: Value,
}

// ============================================================================
// FramePairer
// ============================================================================

/// Pairing sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairingState {
    /// Next frame must be a text command tag.
    #[default]
    AwaitingCommand,
    /// Next frame must be the binary payload for this command.
    AwaitingPayload(Command),
}

/// Turns alternating command/payload frames into [`InboundMessage`]s.
///
/// Any frame arriving out of turn is a protocol violation: it is
/// reported, discarded, and pairing restarts from
/// [`PairingState::AwaitingCommand`].
#[derive(Debug, Default)]
pub struct FramePairer {
    state: PairingState,
}

impl FramePairer {
    /// Creates a pairer awaiting a command frame.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current sub-state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> PairingState {
        self.state
    }

    /// Feeds one frame.
    ///
    /// Returns `Ok(None)` after a command frame and `Ok(Some(_))` once its
    /// payload arrives.
    ///
    /// # Errors
    ///
    /// - [`Error::ProtocolState`] for out-of-order or unknown frames
    /// - [`Error::Codec`] if the payload does not decode; the message is
    ///   dropped
    ///
    /// In every error case the pairer is back to awaiting a command.
    pub fn push(&mut self, frame: Frame) -> Result<Option<InboundMessage>> {
        match (self.state, frame) {
            (PairingState::AwaitingCommand, Frame::Text(text)) => {
                let command = text.parse()?;
                self.state = PairingState::AwaitingPayload(command);
                Ok(None)
            }
            (PairingState::AwaitingCommand, Frame::Binary(bytes)) => Err(Error::protocol_state(
                format!("payload frame of {} bytes without a command", bytes.len()),
            )),
            (PairingState::AwaitingPayload(command), Frame::Text(text)) => {
                self.state = PairingState::AwaitingCommand;
                Err(Error::protocol_state(format!(
                    "command frame {text:?} while awaiting {command} payload"
                )))
            }
            (PairingState::AwaitingPayload(command), Frame::Binary(bytes)) => {
                self.state = PairingState::AwaitingCommand;
                let value = codec::decode(&bytes)?;
                Ok(Some(InboundMessage { command, value }))
            }
        }
    }

    /// Forgets any half-received pair.
    #[inline]
    pub fn reset(&mut self) {
        self.state = PairingState::AwaitingCommand;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::codec::encode;

    fn text(s: &str) -> Frame {
        Frame::Text(s.to_string())
    }

    fn payload(value: &Value) -> Frame {
        Frame::Binary(encode(value).unwrap())
    }

    #[test]
    fn test_command_parse() {
        assert_eq!("message".parse::<Command>().unwrap(), Command::Message);
        assert_eq!("error".parse::<Command>().unwrap(), Command::Error);
        assert!("ping".parse::<Command>().is_err());
        assert_eq!(Command::Error.to_string(), "error");
    }

    #[test]
    fn test_message_pair() {
        let mut pairer = FramePairer::new();

        assert_eq!(pairer.push(text("message")).unwrap(), None);
        assert_eq!(
            pairer.state(),
            PairingState::AwaitingPayload(Command::Message)
        );

        let msg = pairer.push(payload(&Value::from("hello"))).unwrap().unwrap();
        assert_eq!(msg.command, Command::Message);
        assert_eq!(msg.value, Value::from("hello"));
        assert_eq!(pairer.state(), PairingState::AwaitingCommand);
    }

    #[test]
    fn test_error_pair() {
        let mut pairer = FramePairer::new();
        let value: Value = [("code", Value::from(1))].into_iter().collect();

        pairer.push(text("error")).unwrap();
        let msg = pairer.push(payload(&value)).unwrap().unwrap();
        assert_eq!(msg.command, Command::Error);
        assert_eq!(msg.value, value);
    }

    #[test]
    fn test_two_commands_in_a_row_recovers() {
        let mut pairer = FramePairer::new();

        pairer.push(text("message")).unwrap();
        let err = pairer.push(text("message")).unwrap_err();
        assert!(matches!(err, Error::ProtocolState { .. }));
        assert_eq!(pairer.state(), PairingState::AwaitingCommand);

        pairer.push(text("message")).unwrap();
        let msg = pairer.push(payload(&Value::from("next"))).unwrap().unwrap();
        assert_eq!(msg.value, Value::from("next"));
    }

    #[test]
    fn test_payload_without_command() {
        let mut pairer = FramePairer::new();
        let err = pairer.push(payload(&Value::Null)).unwrap_err();
        assert!(matches!(err, Error::ProtocolState { .. }));
        assert_eq!(pairer.state(), PairingState::AwaitingCommand);
    }

    #[test]
    fn test_unknown_command_stays_awaiting_command() {
        let mut pairer = FramePairer::new();
        assert!(pairer.push(text("hello")).is_err());
        assert_eq!(pairer.state(), PairingState::AwaitingCommand);
    }

    #[test]
    fn test_undecodable_payload_is_dropped() {
        let mut pairer = FramePairer::new();
        pairer.push(text("message")).unwrap();

        let err = pairer.push(Frame::Binary(vec![0x10, 0, 0])).unwrap_err();
        assert!(err.is_codec_error());
        assert_eq!(pairer.state(), PairingState::AwaitingCommand);
    }
}
