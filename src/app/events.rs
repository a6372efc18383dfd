//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to the console, drive a display,
//! forward to a supervisor, etc.  They are display updates only; no
//! adapter may feed them back as state.

use crate::error::LinkError;
use crate::fsm::StateId;
use crate::fsm::context::ConnectivityState;
use crate::validator::ScanResult;

/// Structured events emitted by the control core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The core has started (carries initial state).
    Started(StateId),

    /// The lifecycle FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// The messaging link changed state.
    ConnectivityChanged(ConnectivityState),

    /// A scan was validated.
    ScanVerified { barcode: String, result: ScanResult },

    /// A scan arrived while presence gating blocked it.
    ScanIgnored { barcode: String },

    /// The presence sensor changed.
    PresenceChanged(bool),

    /// The reject output was energised for `duration_ms`.
    RejectActivated { duration_ms: u32 },

    /// The reject output was de-energised.
    RejectDeactivated,

    /// The reject output reported a fault; its state is unknown.
    ActuatorFault(String),

    /// A payload on the command topic was not a known command.
    RemoteCommandRejected(String),

    /// A best-effort publish did not go out.
    PublishFailed { topic: String, error: LinkError },

    /// Shutdown sequence finished.
    ShutdownComplete,
}
