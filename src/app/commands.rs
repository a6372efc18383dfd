//! Remote commands for the reject output.
//!
//! These arrive as MQTT payloads on the remote-command topic and are
//! matched case-insensitively.

use core::str::FromStr;

use crate::error::CommandError;
use crate::topics::{CMD_ACTIVATE, CMD_DEACTIVATE};

/// Commands other stations (or this one) can send to the reject output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Energise the reject output for the configured pulse length.
    Activate,
    /// De-energise now and cancel the pending pulse end.
    Deactivate,
}

impl RemoteCommand {
    /// Parse a raw payload.  Surrounding whitespace is ignored.
    pub fn parse(payload: &[u8]) -> Result<Self, CommandError> {
        let text = String::from_utf8_lossy(payload);
        text.parse()
    }

    pub const fn as_payload(self) -> &'static str {
        match self {
            Self::Activate => CMD_ACTIVATE,
            Self::Deactivate => CMD_DEACTIVATE,
        }
    }
}

impl FromStr for RemoteCommand {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cmd = s.trim();
        if cmd.eq_ignore_ascii_case(CMD_ACTIVATE) {
            Ok(Self::Activate)
        } else if cmd.eq_ignore_ascii_case(CMD_DEACTIVATE) {
            Ok(Self::Deactivate)
        } else {
            Err(CommandError::InvalidRemoteCommand(cmd.to_owned()))
        }
    }
}
