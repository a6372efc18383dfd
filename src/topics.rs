//! MQTT topic names and payload tokens for the F6 line.
//!
//! Single source of truth: every adapter and the control core reference
//! this module rather than hard-coding strings.  The result topic is the
//! only one that can be changed from the settings file.

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// Default result topic (PASS / FAIL per scan).
pub const DEFAULT_RESULT_TOPIC: &str = "Tekpak/F6/BarcodeVerifier";

/// Presence sensor state (`detected` / `not detected`).
pub const SENSOR_STATE_TOPIC: &str = "Tekpak/F6/ProductSensor/State";

/// Reject output commands (`ACTIVATE` / `DEACTIVATE`).
/// The verifier both publishes to and subscribes on this topic.
pub const REJECT_COMMAND_TOPIC: &str = "Tekpak/F6/RejectOutput/Command";

// ---------------------------------------------------------------------------
// Payload tokens
// ---------------------------------------------------------------------------

pub const CMD_ACTIVATE: &str = "ACTIVATE";
pub const CMD_DEACTIVATE: &str = "DEACTIVATE";

pub const SENSOR_DETECTED: &str = "detected";
pub const SENSOR_NOT_DETECTED: &str = "not detected";

/// Sensor-state payload for a presence reading.
pub const fn sensor_payload(present: bool) -> &'static str {
    if present {
        SENSOR_DETECTED
    } else {
        SENSOR_NOT_DETECTED
    }
}
