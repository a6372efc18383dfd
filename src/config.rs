//! Station configuration.
//!
//! Loaded once at startup from the settings file (see
//! [`adapters::settings`](crate::adapters::settings)) and immutable for
//! the rest of the session.
//!
//! Every field has a built-in default.  A persisted file is merged into
//! the defaults **field by field**: a missing, mistyped or out-of-range
//! field falls back to its default on its own, the rest of the file still
//! applies.  Keys written by the earlier station software (`mqttBroker`,
//! `rejectDelay`, `productSensorPin`, ...) are accepted as aliases.

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::topics::DEFAULT_RESULT_TOPIC;

/// Shortest keepalive the MQTT client accepts.
const MIN_KEEPALIVE_SECS: u16 = 5;
/// Longest reject pulse we are willing to hold the diverter for.
const MAX_REJECT_DELAY_MS: u32 = 60_000;
/// Longest sensor debounce window.
const MAX_DEBOUNCE_MS: u32 = 1_000;

/// Core station configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifierConfig {
    // --- Broker ---
    /// MQTT broker host name or address.
    pub broker_address: String,
    /// MQTT broker TCP port.
    pub broker_port: u16,
    /// Topic that receives PASS / FAIL per scan.
    pub result_topic: String,
    /// MQTT client identifier.
    pub client_id: String,
    /// MQTT keepalive interval (seconds).
    pub keepalive_secs: u16,
    /// Delay before the core retries a failed connection (ms). 0 = never.
    pub reconnect_delay_ms: u32,

    // --- Reject output ---
    /// Reject pulse length (milliseconds).
    pub reject_delay_ms: u32,
    /// Actuator port identifier (BCM GPIO number).
    pub actuator_port: u8,

    // --- Presence sensor ---
    /// Sensor port identifier (BCM GPIO number).
    pub sensor_port: u8,
    /// Logic level that means "item present".
    pub sensor_active_high: bool,
    /// Sensor debounce window (milliseconds).
    pub sensor_debounce_ms: u32,
    /// Ignore scans while no item is in front of the scanner.
    pub require_presence: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            // Broker
            broker_address: "192.168.5.5".into(),
            broker_port: 1883,
            result_topic: DEFAULT_RESULT_TOPIC.into(),
            client_id: "PiLocalApp".into(),
            keepalive_secs: 60,
            reconnect_delay_ms: 0,

            // Reject output
            reject_delay_ms: 3000,
            actuator_port: 27,

            // Presence sensor
            sensor_port: 17,
            sensor_active_high: true,
            sensor_debounce_ms: 10,
            require_presence: false,
        }
    }
}

impl VerifierConfig {
    /// Merge a parsed settings object into the defaults.
    pub fn from_json_object(map: &Map<String, Value>) -> Self {
        let d = Self::default();
        let m = FieldMerge { map };

        let merged = Self {
            broker_address: m.field(&["brokerAddress", "mqttBroker"], d.broker_address),
            broker_port: m.field(&["brokerPort", "mqttPort"], d.broker_port),
            result_topic: m.field(&["resultTopic", "mqttVerifyTopic"], d.result_topic),
            client_id: m.field(&["clientId", "mqttClientId"], d.client_id),
            keepalive_secs: m.field(&["keepaliveSecs"], d.keepalive_secs),
            reconnect_delay_ms: m.field(&["reconnectDelayMs"], d.reconnect_delay_ms),
            reject_delay_ms: m.field(&["rejectDelayMs", "rejectDelay"], d.reject_delay_ms),
            actuator_port: m.field(&["actuatorPort", "rejectOutputPin"], d.actuator_port),
            sensor_port: m.field(&["sensorPort", "productSensorPin"], d.sensor_port),
            sensor_active_high: m.field(&["sensorActiveHigh"], d.sensor_active_high),
            sensor_debounce_ms: m.field(&["sensorDebounceMs"], d.sensor_debounce_ms),
            require_presence: m.field(&["requirePresence"], d.require_presence),
        };

        merged.sanitized()
    }

    /// Replace every out-of-range field with its default.
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();

        if self.broker_address.trim().is_empty() {
            warn!("CONFIG: brokerAddress is empty, using {}", d.broker_address);
            self.broker_address = d.broker_address;
        }
        if self.broker_port == 0 {
            warn!("CONFIG: brokerPort 0 is invalid, using {}", d.broker_port);
            self.broker_port = d.broker_port;
        }
        if !is_publishable_topic(&self.result_topic) {
            warn!(
                "CONFIG: resultTopic {:?} is not a publishable topic, using {}",
                self.result_topic, d.result_topic
            );
            self.result_topic = d.result_topic;
        }
        if self.client_id.trim().is_empty() {
            warn!("CONFIG: clientId is empty, using {}", d.client_id);
            self.client_id = d.client_id;
        }
        if self.keepalive_secs < MIN_KEEPALIVE_SECS {
            warn!(
                "CONFIG: keepaliveSecs must be >= {}, using {}",
                MIN_KEEPALIVE_SECS, d.keepalive_secs
            );
            self.keepalive_secs = d.keepalive_secs;
        }
        if !(1..=MAX_REJECT_DELAY_MS).contains(&self.reject_delay_ms) {
            warn!(
                "CONFIG: rejectDelayMs must be 1–{}, using {}",
                MAX_REJECT_DELAY_MS, d.reject_delay_ms
            );
            self.reject_delay_ms = d.reject_delay_ms;
        }
        if self.sensor_debounce_ms > MAX_DEBOUNCE_MS {
            warn!(
                "CONFIG: sensorDebounceMs must be <= {}, using {}",
                MAX_DEBOUNCE_MS, d.sensor_debounce_ms
            );
            self.sensor_debounce_ms = d.sensor_debounce_ms;
        }
        if self.sensor_port == self.actuator_port {
            warn!(
                "CONFIG: sensorPort and actuatorPort are both {}",
                self.sensor_port
            );
        }

        self
    }

    /// `host:port` for log lines.
    pub fn broker_endpoint(&self) -> String {
        format!("{}:{}", self.broker_address, self.broker_port)
    }
}

/// MQTT forbids wildcards and empty levels-only names on publish.
fn is_publishable_topic(topic: &str) -> bool {
    !topic.trim().is_empty() && !topic.contains(['+', '#'])
}

/// Looks fields up in a settings object, first matching key wins.
struct FieldMerge<'a> {
    map: &'a Map<String, Value>,
}

impl FieldMerge<'_> {
    fn field<T: DeserializeOwned>(&self, keys: &[&str], default: T) -> T {
        let Some((key, raw)) = keys
            .iter()
            .find_map(|k| self.map.get(*k).map(|v| (*k, v)))
        else {
            return default;
        };

        match T::deserialize(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("CONFIG: ignoring {} ({}), using default", key, e);
                default
            }
        }
    }
}
