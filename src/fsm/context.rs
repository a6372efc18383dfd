//! Shared mutable context threaded through every FSM handler.
//!
//! `CoreContext` is the single struct that state handlers read from and
//! write to: the session state, the reject timer bookkeeping, the
//! configuration, and an outbox of [`Effect`]s.  Handlers never touch a
//! port; they queue effects and the [`AppService`](crate::app::service::AppService)
//! applies them after the handler returns.

use core::fmt;

use crate::app::events::AppEvent;
use crate::config::VerifierConfig;
use crate::events::{TimerSlot, TimerToken};
use crate::reject::RejectTimer;
use crate::validator::ScanResult;

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

/// State of the messaging link as last reported by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Connection attempt failed.  Refusals carry the CONNACK return code
    /// (1–5); transport failures carry [`ConnectivityState::TRANSPORT_FAILURE`].
    Errored(i32),
}

impl ConnectivityState {
    /// Code used when the broker could not be reached at all.
    pub const TRANSPORT_FAILURE: i32 = -1;

    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("Disconnected"),
            Self::Connecting => f.write_str("Connecting..."),
            Self::Connected => f.write_str("Connected"),
            Self::Errored(code) => write!(f, "Error: {code}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Process-wide session state.  Created with defaults at start, discarded at
/// shutdown, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub connectivity: ConnectivityState,
    /// Last debounced presence reading.
    pub presence: bool,
    pub last_barcode: Option<String>,
    pub last_result: Option<ScanResult>,
}

// ---------------------------------------------------------------------------
// Effects (written by handlers, applied by the service)
// ---------------------------------------------------------------------------

/// Side effects requested by state handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start (or restart) the broker connection.
    Connect,
    /// Flush and close the broker connection.
    Disconnect,
    /// Best-effort publish; failures are logged.
    Publish {
        topic: String,
        payload: &'static str,
    },
    /// Drive the reject output.
    SetReject(bool),
    /// Schedule a deferred callback.
    Schedule { token: TimerToken, delay_ms: u32 },
    /// Drop a pending deferred callback.
    CancelTimer(TimerSlot),
    /// Release the actuator port (drive safe level, stop using the pin).
    ReleaseActuator,
    /// Forward an application event to the event sink.
    Emit(AppEvent),
}

// ---------------------------------------------------------------------------
// CoreContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct CoreContext {
    /// Station configuration (read-only during a session).
    pub config: VerifierConfig,
    pub session: Session,
    /// Reject output bookkeeping.
    pub reject: RejectTimer,
    /// Effects queued by the handler currently running.
    pub outbox: Vec<Effect>,
    /// Consecutive failed connection attempts since the last success.
    pub connect_failures: u32,
    /// `ACTIVATE` requests this station published that the broker has not
    /// delivered back yet.
    pub pending_echoes: u32,
}

impl CoreContext {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            session: Session::default(),
            reject: RejectTimer::new(),
            outbox: Vec::new(),
            connect_failures: 0,
            pending_echoes: 0,
        }
    }

    pub fn push(&mut self, effect: Effect) {
        self.outbox.push(effect);
    }

    pub fn emit(&mut self, event: AppEvent) {
        self.outbox.push(Effect::Emit(event));
    }

    pub fn publish(&mut self, topic: impl Into<String>, payload: &'static str) {
        self.outbox.push(Effect::Publish {
            topic: topic.into(),
            payload,
        });
    }

    /// Energise the reject output for the configured pulse length.
    pub fn arm_reject(&mut self) {
        let duration_ms = self.config.reject_delay_ms;
        let arming = self.reject.arm(duration_ms);
        self.push(Effect::SetReject(true));
        self.push(Effect::Schedule {
            token: TimerToken::RejectOff {
                generation: arming.generation,
            },
            delay_ms: arming.duration_ms,
        });
        self.emit(AppEvent::RejectActivated { duration_ms });
    }

    /// De-energise the reject output now.  No-op when already inactive.
    pub fn cancel_reject(&mut self) {
        if self.reject.cancel() {
            self.push(Effect::CancelTimer(TimerSlot::RejectOff));
            self.push(Effect::SetReject(false));
            self.emit(AppEvent::RejectDeactivated);
        }
    }

    pub fn take_outbox(&mut self) -> Vec<Effect> {
        core::mem::take(&mut self.outbox)
    }
}
