//! Integration tests for the event → AppService → ports pipeline.
//!
//! Each test drives a started service through mock adapters and asserts on
//! the journal of link, actuator and timer calls.  Time is simulated: the
//! reject pulse ends only when the test advances the clock.

use verifier::app::events::AppEvent;
use verifier::config::VerifierConfig;
use verifier::error::LinkError;
use verifier::events::{Event, EventQueue, ShutdownReason, TimerSlot, TimerToken};
use verifier::fsm::StateId;
use verifier::fsm::context::ConnectivityState;
use verifier::reject::RejectState;
use verifier::topics::{DEFAULT_RESULT_TOPIC, REJECT_COMMAND_TOPIC, SENSOR_STATE_TOPIC};
use verifier::validator::ScanResult;

use crate::mock_io::{IoCall, Station};

fn pub_(topic: &str, payload: &str) -> (String, String) {
    (topic.to_owned(), payload.to_owned())
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn start_requests_one_connection_with_configured_settings() {
    let st = Station::new(VerifierConfig::default());

    assert_eq!(st.svc.state(), StateId::AwaitingConnection);
    assert_eq!(st.svc.connectivity(), ConnectivityState::Connecting);
    assert_eq!(st.calls(), vec![IoCall::Connect]);

    let settings = st.io.link.last_settings.clone().unwrap();
    assert_eq!(settings.broker, "192.168.5.5");
    assert_eq!(settings.port, 1883);
    assert_eq!(settings.client_id, "PiLocalApp");
    assert_eq!(settings.keepalive_secs, 60);

    assert_eq!(
        st.events(),
        &[
            AppEvent::Started(StateId::Idle),
            AppEvent::StateChanged {
                from: StateId::Idle,
                to: StateId::AwaitingConnection
            },
            AppEvent::ConnectivityChanged(ConnectivityState::Connecting),
        ]
    );
    assert_eq!(st.svc.session().last_barcode, None);
    assert!(!st.svc.session().presence);
    assert_eq!(st.svc.reject_state(), RejectState::Inactive);
}

#[test]
fn connected_enters_operational() {
    let mut st = Station::new(VerifierConfig::default());
    st.send(Event::Connectivity(ConnectivityState::Connected));
    assert_eq!(st.svc.state(), StateId::Operational);
    assert!(st.events().contains(&AppEvent::StateChanged {
        from: StateId::AwaitingConnection,
        to: StateId::Operational
    }));
}

// ── Scans ─────────────────────────────────────────────────────

#[test]
fn valid_scan_publishes_pass_and_leaves_reject_alone() {
    let mut st = Station::connected(VerifierConfig::default());
    st.scan("012345678905");

    assert_eq!(st.published(), vec![pub_(DEFAULT_RESULT_TOPIC, "PASS")]);
    assert!(st.reject_writes().is_empty());
    assert_eq!(st.svc.reject_state(), RejectState::Inactive);
    assert_eq!(
        st.svc.session().last_barcode.as_deref(),
        Some("012345678905")
    );
    assert_eq!(st.svc.session().last_result, Some(ScanResult::Pass));
}

#[test]
fn scan_is_trimmed_before_validation() {
    let mut st = Station::connected(VerifierConfig::default());
    st.scan("  4006381333931 \r");
    assert_eq!(st.published(), vec![pub_(DEFAULT_RESULT_TOPIC, "PASS")]);
    assert_eq!(
        st.svc.session().last_barcode.as_deref(),
        Some("4006381333931")
    );
}

#[test]
fn blank_scan_does_nothing() {
    let mut st = Station::connected(VerifierConfig::default());
    st.scan("   ");
    assert!(st.calls().is_empty());
    assert_eq!(st.svc.session().last_barcode, None);
}

#[test]
fn invalid_scan_fails_and_pulses_reject_for_configured_time() {
    let mut st = Station::connected(VerifierConfig::default());
    st.scan("ABC123");

    assert_eq!(
        st.published(),
        vec![
            pub_(DEFAULT_RESULT_TOPIC, "FAIL"),
            pub_(REJECT_COMMAND_TOPIC, "ACTIVATE"),
        ]
    );
    assert_eq!(st.svc.session().last_result, Some(ScanResult::Fail));
    assert_eq!(st.svc.reject_state(), RejectState::Active);
    assert_eq!(st.reject_writes(), vec![true]);

    st.advance(2_999);
    assert_eq!(st.svc.reject_state(), RejectState::Active);

    st.advance(1);
    assert_eq!(st.svc.reject_state(), RejectState::Inactive);
    assert_eq!(st.reject_writes(), vec![true, false]);
    assert!(st.events().contains(&AppEvent::RejectDeactivated));
}

#[test]
fn own_activate_echo_keeps_the_configured_pulse() {
    let mut st = Station::connected(VerifierConfig::default());
    st.scan("ABC123");
    st.advance(100);
    // The broker delivers our own ACTIVATE back to us.
    st.command("ACTIVATE");

    st.advance(2_899);
    assert_eq!(st.svc.reject_state(), RejectState::Active);
    st.advance(1); // t = 3000
    assert_eq!(st.svc.reject_state(), RejectState::Inactive);
    assert_eq!(st.reject_writes(), vec![true, false]);

    // A request from another station still pulses the output.
    st.command("ACTIVATE");
    assert_eq!(st.svc.reject_state(), RejectState::Active);
    assert_eq!(st.reject_writes(), vec![true, false, true]);
}

#[test]
fn activate_is_honoured_when_own_request_never_left() {
    let mut st = Station::new(VerifierConfig::default());
    st.scan("ABC123");
    st.advance(3_000);
    st.send(Event::Connectivity(ConnectivityState::Connected));
    st.clear();

    st.command("ACTIVATE");
    assert_eq!(st.svc.reject_state(), RejectState::Active);
    assert_eq!(st.reject_writes(), vec![true]);
}

#[test]
fn custom_result_topic_and_pulse_length() {
    let config = VerifierConfig {
        result_topic: "Plant/Line2/Verify".into(),
        reject_delay_ms: 750,
        ..VerifierConfig::default()
    };
    let mut st = Station::connected(config);
    st.scan("12345");

    assert_eq!(st.published()[0], pub_("Plant/Line2/Verify", "FAIL"));
    assert!(
        st.calls()
            .contains(&IoCall::Schedule(TimerToken::RejectOff { generation: 1 }, 750))
    );
    st.advance(750);
    assert_eq!(st.svc.reject_state(), RejectState::Inactive);
}

// ── Remote commands ───────────────────────────────────────────

#[test]
fn second_activate_extends_the_pulse() {
    let mut st = Station::connected(VerifierConfig::default());
    st.command("ACTIVATE");
    st.advance(1_000);
    st.command("ACTIVATE");

    st.advance(2_000); // t = 3000: first deadline no longer applies
    assert_eq!(st.svc.reject_state(), RejectState::Active);

    st.advance(999);
    assert_eq!(st.svc.reject_state(), RejectState::Active);
    st.advance(1); // t = 4000
    assert_eq!(st.svc.reject_state(), RejectState::Inactive);
    assert_eq!(st.reject_writes(), vec![true, true, false]);
}

#[test]
fn stale_expiry_from_first_arm_is_ignored() {
    let mut st = Station::connected(VerifierConfig::default());
    st.command("ACTIVATE");
    st.command("ACTIVATE");
    st.send(Event::TimerFired(TimerToken::RejectOff { generation: 1 }));

    assert_eq!(st.svc.reject_state(), RejectState::Active);
    assert_eq!(st.reject_writes(), vec![true, true]);
}

#[test]
fn lowercase_deactivate_cancels_pending_pulse() {
    let mut st = Station::connected(VerifierConfig::default());
    st.command("ACTIVATE");
    st.command("deactivate");

    assert_eq!(st.svc.reject_state(), RejectState::Inactive);
    assert_eq!(st.reject_writes(), vec![true, false]);
    assert!(st.io.timer.pending().is_empty());

    st.advance(5_000);
    assert_eq!(st.reject_writes(), vec![true, false]);
}

#[test]
fn deactivate_while_inactive_touches_nothing() {
    let mut st = Station::connected(VerifierConfig::default());
    st.command("DEACTIVATE");
    assert!(st.calls().is_empty());
    assert_eq!(st.svc.reject_state(), RejectState::Inactive);
}

#[test]
fn unknown_command_is_reported_and_ignored() {
    let mut st = Station::connected(VerifierConfig::default());
    st.command("TOGGLE");
    assert!(st.calls().is_empty());
    assert_eq!(
        st.events(),
        &[AppEvent::RemoteCommandRejected("TOGGLE".into())]
    );
}

#[test]
fn message_on_unrelated_topic_is_ignored() {
    let mut st = Station::connected(VerifierConfig::default());
    st.send(Event::RemoteMessage {
        topic: "Tekpak/F6/Other".into(),
        payload: b"ACTIVATE".to_vec(),
    });
    assert!(st.calls().is_empty());
}

// ── Link loss ─────────────────────────────────────────────────

#[test]
fn failing_scan_while_disconnected_still_actuates() {
    let mut st = Station::new(VerifierConfig::default());
    st.clear();
    st.scan("ABC123");

    assert!(st.published().is_empty());
    assert_eq!(st.reject_writes(), vec![true]);
    assert!(st.events().contains(&AppEvent::PublishFailed {
        topic: DEFAULT_RESULT_TOPIC.into(),
        error: LinkError::NotConnected
    }));
    assert!(st.events().contains(&AppEvent::PublishFailed {
        topic: REJECT_COMMAND_TOPIC.into(),
        error: LinkError::NotConnected
    }));

    st.advance(3_000);
    assert_eq!(st.svc.reject_state(), RejectState::Inactive);
    assert_eq!(st.reject_writes(), vec![true, false]);
}

#[test]
fn refused_connection_is_not_retried_by_default() {
    let mut st = Station::new(VerifierConfig::default());
    st.send(Event::Connectivity(ConnectivityState::Errored(5)));

    assert_eq!(st.svc.state(), StateId::AwaitingConnection);
    assert_eq!(st.svc.connectivity(), ConnectivityState::Errored(5));
    assert_eq!(st.svc.connectivity().to_string(), "Error: 5");
    assert_eq!(st.connects(), 1);
    assert!(st.io.timer.pending().is_empty());

    st.advance(60_000);
    assert_eq!(st.connects(), 1);
}

#[test]
fn synchronous_connect_error_counts_as_transport_failure() {
    let mut st = Station::new(VerifierConfig {
        reconnect_delay_ms: 1_000,
        ..VerifierConfig::default()
    });
    st.io.link.fail_connect = Some(LinkError::Connect("no route".into()));
    st.send(Event::Connectivity(ConnectivityState::Errored(
        ConnectivityState::TRANSPORT_FAILURE,
    )));
    st.advance(1_000);

    // Retry failed synchronously and was itself rescheduled.
    assert_eq!(st.connects(), 2);
    assert_eq!(
        st.svc.connectivity(),
        ConnectivityState::Errored(ConnectivityState::TRANSPORT_FAILURE)
    );
    assert_eq!(st.io.timer.pending().len(), 1);
}

#[test]
fn reconnect_delay_schedules_retry() {
    let mut st = Station::new(VerifierConfig {
        reconnect_delay_ms: 500,
        ..VerifierConfig::default()
    });
    st.send(Event::Connectivity(ConnectivityState::Errored(
        ConnectivityState::TRANSPORT_FAILURE,
    )));
    assert!(
        st.calls()
            .contains(&IoCall::Schedule(TimerToken::Reconnect, 500))
    );

    st.advance(499);
    assert_eq!(st.connects(), 1);
    st.advance(1);
    assert_eq!(st.connects(), 2);
    assert_eq!(st.svc.connectivity(), ConnectivityState::Connecting);

    st.send(Event::Connectivity(ConnectivityState::Connected));
    assert_eq!(st.svc.state(), StateId::Operational);
    assert!(st.calls().contains(&IoCall::Cancel(TimerSlot::Reconnect)));
}

#[test]
fn link_drop_returns_to_awaiting_and_suppresses_publishes() {
    let mut st = Station::connected(VerifierConfig::default());
    st.send(Event::Connectivity(ConnectivityState::Disconnected));

    assert_eq!(st.svc.state(), StateId::AwaitingConnection);
    assert_eq!(st.connects(), 0, "no automatic retry");

    st.scan("012345678905");
    assert!(st.published().is_empty());
    assert_eq!(st.svc.session().last_result, Some(ScanResult::Pass));
}

// ── Presence ──────────────────────────────────────────────────

#[test]
fn presence_changes_are_published() {
    let mut st = Station::connected(VerifierConfig::default());
    st.send(Event::Presence(true));
    st.send(Event::Presence(false));
    assert_eq!(
        st.published(),
        vec![
            pub_(SENSOR_STATE_TOPIC, "detected"),
            pub_(SENSOR_STATE_TOPIC, "not detected"),
        ]
    );
}

#[test]
fn scans_ignore_presence_unless_gated() {
    let mut st = Station::connected(VerifierConfig::default());
    st.scan("012345678905");
    st.send(Event::Presence(true));
    st.send(Event::Presence(false));
    assert_eq!(
        st.svc.session().last_barcode.as_deref(),
        Some("012345678905")
    );
}

#[test]
fn gated_scan_without_item_is_ignored() {
    let mut st = Station::connected(VerifierConfig {
        require_presence: true,
        ..VerifierConfig::default()
    });
    st.scan("ABC123");

    assert!(st.published().is_empty());
    assert!(st.reject_writes().is_empty());
    assert_eq!(
        st.svc.session().last_barcode.as_deref(),
        Some("ABC123 (Ignored)")
    );
    assert_eq!(st.svc.session().last_result, None);

    st.send(Event::Presence(true));
    st.scan("012345678905");
    assert_eq!(
        st.published(),
        vec![
            pub_(SENSOR_STATE_TOPIC, "detected"),
            pub_(DEFAULT_RESULT_TOPIC, "PASS"),
        ]
    );

    st.send(Event::Presence(false));
    assert_eq!(st.svc.session().last_barcode, None);
    assert_eq!(st.svc.session().last_result, None);
}

// ── Actuator faults ───────────────────────────────────────────

#[test]
fn actuator_write_failure_marks_state_unknown() {
    let mut st = Station::connected(VerifierConfig::default());
    st.io.actuator.faulty = true;
    st.scan("ABC123");

    assert_eq!(st.svc.reject_state(), RejectState::Unknown);
    assert!(
        st.events()
            .iter()
            .any(|e| matches!(e, AppEvent::ActuatorFault(_)))
    );
    // The result still goes out.
    assert_eq!(st.published()[0], pub_(DEFAULT_RESULT_TOPIC, "FAIL"));

    st.io.actuator.faulty = false;
    st.command("DEACTIVATE");
    assert_eq!(st.svc.reject_state(), RejectState::Inactive);
    assert!(!st.io.actuator.level);
}

#[test]
fn unschedulable_switch_off_ends_the_pulse_at_once() {
    let mut st = Station::connected(VerifierConfig::default());
    st.io.timer.saturated = true;
    st.scan("ABC123");

    assert_eq!(st.svc.reject_state(), RejectState::Inactive);
    assert_eq!(st.reject_writes(), vec![true, false]);
    assert!(!st.io.actuator.level);
    assert!(st.events().contains(&AppEvent::RejectDeactivated));

    // Once the timer recovers, pulses run their full length again.
    st.io.timer.saturated = false;
    st.command("ACTIVATE"); // echo of our own request
    assert_eq!(st.svc.reject_state(), RejectState::Inactive);
    st.command("ACTIVATE");
    assert_eq!(st.svc.reject_state(), RejectState::Active);
    st.advance(3_000);
    assert_eq!(st.svc.reject_state(), RejectState::Inactive);
}

#[test]
fn reported_actuator_fault_marks_state_unknown() {
    let mut st = Station::connected(VerifierConfig::default());
    st.send(Event::ActuatorFault("overcurrent".into()));
    assert_eq!(st.svc.reject_state(), RejectState::Unknown);
    assert_eq!(
        st.events(),
        &[AppEvent::ActuatorFault("overcurrent".into())]
    );
}

// ── Shutdown ──────────────────────────────────────────────────

#[test]
fn shutdown_while_active_turns_output_off_before_disconnecting() {
    let mut st = Station::connected(VerifierConfig::default());
    st.scan("ABC123");
    st.clear();

    st.send(Event::Shutdown(ShutdownReason::Interrupt));

    assert_eq!(
        st.calls(),
        vec![
            IoCall::Cancel(TimerSlot::Reconnect),
            IoCall::Cancel(TimerSlot::RejectOff),
            IoCall::SetReject(false),
            IoCall::Disconnect,
            IoCall::Release,
        ]
    );
    assert_eq!(st.svc.state(), StateId::ShuttingDown);
    assert!(!st.svc.is_running());
    assert!(st.io.actuator.released);
    assert!(!st.io.actuator.level);
    assert_eq!(st.events().last(), Some(&AppEvent::ShutdownComplete));
}

#[test]
fn shutdown_while_inactive_skips_output_write() {
    let mut st = Station::connected(VerifierConfig::default());
    st.send(Event::Shutdown(ShutdownReason::Terminate));
    assert_eq!(
        st.calls(),
        vec![
            IoCall::Cancel(TimerSlot::Reconnect),
            IoCall::Disconnect,
            IoCall::Release,
        ]
    );
}

#[test]
fn events_after_shutdown_are_ignored() {
    let mut st = Station::connected(VerifierConfig::default());
    st.send(Event::Shutdown(ShutdownReason::Console));
    st.clear();

    st.scan("ABC123");
    st.command("ACTIVATE");
    st.send(Event::Connectivity(ConnectivityState::Connected));

    assert!(st.calls().is_empty());
    assert_eq!(st.svc.state(), StateId::ShuttingDown);
}

#[test]
fn run_stops_at_shutdown_and_discards_the_rest() {
    let queue = EventQueue::new();
    let tx = queue.sender();
    let mut st = Station::connected(VerifierConfig::default());

    assert!(tx.post(Event::Scan("012345678905".into())));
    assert!(tx.post(Event::Shutdown(ShutdownReason::Terminate)));
    assert!(tx.post(Event::Scan("ABC123".into())));

    st.svc.run(&queue, &mut st.io);

    assert_eq!(st.published(), vec![pub_(DEFAULT_RESULT_TOPIC, "PASS")]);
    assert!(st.reject_writes().is_empty());
    assert!(queue.is_closed());
    assert!(!tx.post(Event::Presence(true)));
}
