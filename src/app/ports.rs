//! Port traits: the hexagonal boundary between the control core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (MQTT link, reject output, timer thread, event sinks,
//! settings storage) implement these traits.  The
//! [`AppService`](super::service::AppService) consumes them via generics,
//! so the core never touches a socket, a pin, or a clock directly.
//!
//! Driving adapters (scanner, presence sensor, signals) do not need a port:
//! they only hold an [`EventSender`](crate::events::EventSender).
//!
//! No port call may block.  Outcomes that take time (connection result,
//! timer expiry) come back later as [`Event`](crate::events::Event)s.

use core::time::Duration;

use crate::config::VerifierConfig;
use crate::error::{ActuatorError, ConfigError, LinkError, TimerError};
use crate::events::{TimerSlot, TimerToken};

// ───────────────────────────────────────────────────────────────
// Messaging port (driven adapter: domain ↔ broker)
// ───────────────────────────────────────────────────────────────

/// Connection parameters handed to [`MessagingPort::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    pub broker: String,
    pub port: u16,
    pub client_id: String,
    pub keepalive_secs: u16,
}

impl LinkSettings {
    pub fn from_config(config: &VerifierConfig) -> Self {
        Self {
            broker: config.broker_address.clone(),
            port: config.broker_port,
            client_id: config.client_id.clone(),
            keepalive_secs: config.keepalive_secs,
        }
    }
}

/// Publish/subscribe link to the plant broker.
pub trait MessagingPort {
    /// Start a connection attempt.  Returns once the attempt is under way;
    /// the outcome arrives as an `Event::Connectivity`.  On success the
    /// adapter subscribes to the remote-command topic by itself.  On failure
    /// it reports `Errored` and does not retry.
    fn connect(&mut self, settings: &LinkSettings) -> Result<(), LinkError>;

    /// Queue a message for delivery.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), LinkError>;

    /// Flush and close the connection.  Safe to call when not connected.
    fn disconnect(&mut self) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → reject output)
// ───────────────────────────────────────────────────────────────

/// The reject output.
pub trait ActuatorPort {
    /// Energise (`true`) or de-energise (`false`) the reject output.
    fn set_reject(&mut self, active: bool) -> Result<(), ActuatorError>;

    /// Drive the safe (inactive) level and stop using the output.
    fn release(&mut self) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Timer port (driven adapter: domain → deferred callbacks)
// ───────────────────────────────────────────────────────────────

/// Deferred callbacks that re-enter the event queue as
/// `Event::TimerFired(token)`.
pub trait TimerPort {
    /// Fire `token` after `delay`, replacing any pending callback in the
    /// same [`TimerSlot`].  An error means the callback will never fire.
    fn schedule(&mut self, token: TimerToken, delay: Duration) -> Result<(), TimerError>;

    /// Drop the pending callback in `slot`, if any.  Best effort: a
    /// callback that fires anyway is discarded by its generation check.
    fn cancel(&mut self, slot: TimerSlot);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / display)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ settings file)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the station configuration.
pub trait ConfigPort {
    /// Load configuration, merged field by field with defaults.
    /// Returns [`ConfigError::NotFound`] if nothing is stored yet.
    fn load(&self) -> Result<VerifierConfig, ConfigError>;

    /// Persist configuration.
    fn save(&self, config: &VerifierConfig) -> Result<(), ConfigError>;
}
