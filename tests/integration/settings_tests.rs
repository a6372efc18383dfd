//! Integration tests for the JSON settings file adapter.
//!
//! Each test works in its own temporary directory.

use std::fs;

use serde_json::Value;
use tempfile::TempDir;
use verifier::adapters::settings::{JsonSettings, load_or_init};
use verifier::app::ports::ConfigPort;
use verifier::config::VerifierConfig;
use verifier::error::ConfigError;

fn settings_in(dir: &TempDir) -> JsonSettings {
    JsonSettings::new(dir.path().join("settings.json"))
}

#[test]
fn absent_file_yields_defaults_and_writes_them() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);

    assert!(matches!(settings.load(), Err(ConfigError::NotFound(_))));

    let config = load_or_init(&settings);
    assert_eq!(config, VerifierConfig::default());

    let written: Value = serde_json::from_str(&fs::read_to_string(settings.path()).unwrap()).unwrap();
    assert_eq!(written["brokerAddress"], "192.168.5.5");
    assert_eq!(written["brokerPort"], 1883);
    assert_eq!(written["rejectDelayMs"], 3000);
    assert_eq!(written["sensorPort"], 17);
    assert_eq!(written["actuatorPort"], 27);
    assert_eq!(written["resultTopic"], "Tekpak/F6/BarcodeVerifier");

    // Second start reads the file it wrote.
    assert_eq!(settings.load().unwrap(), VerifierConfig::default());
}

#[test]
fn partial_file_merges_with_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    fs::write(settings.path(), r#"{ "rejectDelayMs": 500, "requirePresence": true }"#).unwrap();

    let config = load_or_init(&settings);
    assert_eq!(config.reject_delay_ms, 500);
    assert!(config.require_presence);
    assert_eq!(config.broker_port, 1883);
    assert_eq!(config.broker_address, "192.168.5.5");
}

#[test]
fn legacy_file_from_earlier_station_software_loads() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    fs::write(
        settings.path(),
        r#"{
            "mqttBroker": "10.1.1.20",
            "mqttVerifyTopic": "Tekpak/F6/BarcodeVerifier2",
            "rejectDelay": 1200,
            "productSensorPin": 22,
            "rejectOutputPin": 23,
            "uiTheme": "dark"
        }"#,
    )
    .unwrap();

    let config = settings.load().unwrap();
    assert_eq!(config.broker_address, "10.1.1.20");
    assert_eq!(config.result_topic, "Tekpak/F6/BarcodeVerifier2");
    assert_eq!(config.reject_delay_ms, 1200);
    assert_eq!(config.sensor_port, 22);
    assert_eq!(config.actuator_port, 23);
}

#[test]
fn bad_fields_fall_back_individually() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    fs::write(
        settings.path(),
        r#"{ "brokerPort": "abc", "rejectDelayMs": 0, "resultTopic": "a/#", "clientId": "Line6" }"#,
    )
    .unwrap();

    let config = settings.load().unwrap();
    assert_eq!(config.broker_port, 1883);
    assert_eq!(config.reject_delay_ms, 3000);
    assert_eq!(config.result_topic, "Tekpak/F6/BarcodeVerifier");
    assert_eq!(config.client_id, "Line6");
}

#[test]
fn corrupt_file_yields_defaults_and_is_left_alone() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let garbage = "{ brokerAddress: oops";
    fs::write(settings.path(), garbage).unwrap();

    assert!(matches!(settings.load(), Err(ConfigError::Parse { .. })));
    assert_eq!(load_or_init(&settings), VerifierConfig::default());
    assert_eq!(fs::read_to_string(settings.path()).unwrap(), garbage);
}

#[test]
fn non_object_json_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    fs::write(settings.path(), "[1, 2, 3]").unwrap();
    assert!(matches!(settings.load(), Err(ConfigError::Parse { .. })));
}

#[test]
fn save_then_load_preserves_every_field() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let config = VerifierConfig {
        broker_address: "mqtt.plant".into(),
        broker_port: 8883,
        result_topic: "Plant/L2/Verify".into(),
        client_id: "Station-2".into(),
        keepalive_secs: 30,
        reconnect_delay_ms: 5_000,
        reject_delay_ms: 1_250,
        actuator_port: 24,
        sensor_port: 25,
        sensor_active_high: false,
        sensor_debounce_ms: 20,
        require_presence: true,
    };
    settings.save(&config).unwrap();
    assert_eq!(settings.load().unwrap(), config);
}

#[test]
fn unwritable_location_reports_save_error() {
    let dir = TempDir::new().unwrap();
    let settings = JsonSettings::new(dir.path().join("missing-dir").join("settings.json"));
    assert!(matches!(
        settings.save(&VerifierConfig::default()),
        Err(ConfigError::Save { .. })
    ));
    // Startup still succeeds on defaults.
    assert_eq!(load_or_init(&settings), VerifierConfig::default());
}
