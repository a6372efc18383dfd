//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the process logger (stderr via `tracing-subscriber`).  This is the
//! station's status display: operators read the current connectivity,
//! last scan and reject state from these lines.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink {
    scans: u64,
    failures: u64,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scans(&self) -> u64 {
        self.scans
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::ConnectivityChanged(state) => {
                info!("MQTT  | {}", state);
            }
            AppEvent::ScanVerified { barcode, result } => {
                self.scans += 1;
                if !result.is_pass() {
                    self.failures += 1;
                }
                info!(
                    "SCAN  | {} => {} ({} scanned, {} failed)",
                    barcode, result, self.scans, self.failures
                );
            }
            AppEvent::ScanIgnored { barcode } => {
                info!("SCAN  | {} (Ignored)", barcode);
            }
            AppEvent::PresenceChanged(present) => {
                info!(
                    "SENSR | {}",
                    if *present { "detected" } else { "not detected" }
                );
            }
            AppEvent::RejectActivated { duration_ms } => {
                info!("REJCT | Active for {} ms", duration_ms);
            }
            AppEvent::RejectDeactivated => {
                info!("REJCT | Inactive");
            }
            AppEvent::ActuatorFault(reason) => {
                warn!("REJCT | Unknown, actuator fault: {}", reason);
            }
            AppEvent::RemoteCommandRejected(payload) => {
                warn!("REJCT | unrecognised command {:?}", payload);
            }
            AppEvent::PublishFailed { topic, error } => {
                warn!("MQTT  | publish to {} failed: {}", topic, error);
            }
            AppEvent::ShutdownComplete => {
                info!("STOP  | shutdown complete");
            }
        }
    }
}
