//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers.  Handlers read the event,
//! update the session in [`CoreContext`], and queue [`Effect`]s; they never
//! call a port.
//!
//! ```text
//!  IDLE ──[start]──▶ AWAITING_CONNECTION ──[Connected]──▶ OPERATIONAL
//!                          ▲                                   │
//!                          └──────[Disconnected / Errored]─────┘
//!
//!  Any state ──[Shutdown]──▶ SHUTTING_DOWN (terminal)
//! ```
//!
//! Scans, presence changes, remote commands and reject expiries are handled
//! the same way in AWAITING_CONNECTION and OPERATIONAL, so the reject output
//! keeps working while the broker is unreachable.

use log::{debug, info, warn};

use super::context::{ConnectivityState, CoreContext, Effect};
use super::{StateDescriptor, StateId};
use crate::app::commands::RemoteCommand;
use crate::app::events::AppEvent;
use crate::events::{Event, TimerSlot, TimerToken};
use crate::topics::{CMD_ACTIVATE, REJECT_COMMAND_TOPIC, SENSOR_STATE_TOPIC, sensor_payload};
use crate::validator::{self, ScanResult};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 — Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: None,
            on_exit: None,
            on_event: idle_event,
        },
        // Index 1 — AwaitingConnection
        StateDescriptor {
            id: StateId::AwaitingConnection,
            name: "AwaitingConnection",
            on_enter: Some(awaiting_enter),
            on_exit: None,
            on_event: awaiting_event,
        },
        // Index 2 — Operational
        StateDescriptor {
            id: StateId::Operational,
            name: "Operational",
            on_enter: Some(operational_enter),
            on_exit: Some(operational_exit),
            on_event: operational_event,
        },
        // Index 3 — ShuttingDown
        StateDescriptor {
            id: StateId::ShuttingDown,
            name: "ShuttingDown",
            on_enter: Some(shutting_down_enter),
            on_exit: None,
            on_event: shutting_down_event,
        },
    ]
}

/// Ask the link adapter for a connection attempt.
pub fn begin_connect(ctx: &mut CoreContext) {
    info!(
        "LINK: connecting to {}:{} as '{}'",
        ctx.config.broker_address, ctx.config.broker_port, ctx.config.client_id
    );
    record_connectivity(ctx, ConnectivityState::Connecting);
    ctx.push(Effect::Connect);
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state
// ═══════════════════════════════════════════════════════════════════════════

fn idle_event(_ctx: &mut CoreContext, event: &Event) -> Option<StateId> {
    match event {
        Event::Shutdown(_) => Some(StateId::ShuttingDown),
        other => {
            debug!("Idle: ignoring {:?}", other);
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  AWAITING_CONNECTION state
// ═══════════════════════════════════════════════════════════════════════════

fn awaiting_enter(ctx: &mut CoreContext) {
    debug!(
        "AwaitingConnection: link is {} ({} failed attempts)",
        ctx.session.connectivity, ctx.connect_failures
    );
}

fn awaiting_event(ctx: &mut CoreContext, event: &Event) -> Option<StateId> {
    match event {
        Event::Connectivity(ConnectivityState::Connected) => {
            link_up(ctx);
            Some(StateId::Operational)
        }
        Event::Connectivity(state) => {
            record_connectivity(ctx, *state);
            if matches!(state, ConnectivityState::Errored(_)) {
                ctx.connect_failures = ctx.connect_failures.saturating_add(1);
                warn!(
                    "LINK: connection failed with code {} (attempt {})",
                    link_code(*state),
                    ctx.connect_failures
                );
            }
            if !matches!(state, ConnectivityState::Connecting) {
                schedule_reconnect(ctx);
            }
            None
        }
        Event::TimerFired(TimerToken::Reconnect) => {
            if !matches!(ctx.session.connectivity, ConnectivityState::Connecting) {
                begin_connect(ctx);
            }
            None
        }
        Event::Shutdown(_) => Some(StateId::ShuttingDown),
        other => {
            handle_session_event(ctx, other);
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  OPERATIONAL state
// ═══════════════════════════════════════════════════════════════════════════

fn operational_enter(ctx: &mut CoreContext) {
    info!("Operational: subscribed to '{}'", REJECT_COMMAND_TOPIC);
    ctx.push(Effect::CancelTimer(TimerSlot::Reconnect));
}

fn operational_exit(ctx: &mut CoreContext) {
    warn!("Operational: link lost ({})", ctx.session.connectivity);
}

fn operational_event(ctx: &mut CoreContext, event: &Event) -> Option<StateId> {
    match event {
        Event::Connectivity(ConnectivityState::Connected) => None,
        Event::Connectivity(state) => {
            record_connectivity(ctx, *state);
            schedule_reconnect(ctx);
            Some(StateId::AwaitingConnection)
        }
        Event::TimerFired(TimerToken::Reconnect) => {
            debug!("Operational: stale reconnect timer");
            None
        }
        Event::Shutdown(_) => Some(StateId::ShuttingDown),
        other => {
            handle_session_event(ctx, other);
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  SHUTTING_DOWN state
// ═══════════════════════════════════════════════════════════════════════════

/// Ordered teardown: reject off, link closed, output released.
fn shutting_down_enter(ctx: &mut CoreContext) {
    info!("ShuttingDown: stopping station");
    ctx.push(Effect::CancelTimer(TimerSlot::Reconnect));
    ctx.cancel_reject();
    ctx.push(Effect::Disconnect);
    record_connectivity(ctx, ConnectivityState::Disconnected);
    ctx.push(Effect::ReleaseActuator);
    ctx.emit(AppEvent::ShutdownComplete);
}

fn shutting_down_event(_ctx: &mut CoreContext, event: &Event) -> Option<StateId> {
    debug!("ShuttingDown: dropping {:?}", event);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  Session handling shared by the running states
// ═══════════════════════════════════════════════════════════════════════════

fn handle_session_event(ctx: &mut CoreContext, event: &Event) {
    match event {
        Event::Scan(raw) => handle_scan(ctx, raw),
        Event::Presence(present) => handle_presence(ctx, *present),
        Event::RemoteMessage { topic, payload } => handle_remote(ctx, topic, payload),
        Event::TimerFired(TimerToken::RejectOff { generation }) => {
            if ctx.reject.expire(*generation) {
                info!("REJECT: pulse finished");
                ctx.push(Effect::SetReject(false));
                ctx.emit(AppEvent::RejectDeactivated);
            } else {
                debug!("REJECT: stale expiry (generation {})", generation);
            }
        }
        Event::ActuatorFault(reason) => {
            warn!("REJECT: actuator fault: {}", reason);
            ctx.reject.mark_unknown();
            ctx.emit(AppEvent::ActuatorFault(reason.clone()));
        }
        // Lifecycle events are routed by the state handlers.
        Event::Connectivity(_) | Event::TimerFired(TimerToken::Reconnect) | Event::Shutdown(_) => {}
    }
}

fn handle_scan(ctx: &mut CoreContext, raw: &str) {
    let barcode = raw.trim();
    if barcode.is_empty() {
        return;
    }

    if ctx.config.require_presence && !ctx.session.presence {
        info!("SCAN: '{}' ignored, no item present", barcode);
        ctx.session.last_barcode = Some(format!("{barcode} (Ignored)"));
        ctx.session.last_result = None;
        ctx.emit(AppEvent::ScanIgnored {
            barcode: barcode.to_owned(),
        });
        return;
    }

    let result = validator::validate(barcode);
    info!("SCAN: '{}' -> {}", barcode, result);
    ctx.session.last_barcode = Some(barcode.to_owned());
    ctx.session.last_result = Some(result);
    ctx.emit(AppEvent::ScanVerified {
        barcode: barcode.to_owned(),
        result,
    });

    if result == ScanResult::Fail {
        ctx.arm_reject();
    }
    let topic = ctx.config.result_topic.clone();
    ctx.publish(topic, result.as_payload());
    if result == ScanResult::Fail {
        ctx.publish(REJECT_COMMAND_TOPIC, CMD_ACTIVATE);
        // Undone by the service if the publish does not go out.
        ctx.pending_echoes += 1;
    }
}

fn handle_presence(ctx: &mut CoreContext, present: bool) {
    if ctx.session.presence == present {
        return;
    }
    info!("SENSOR: {}", sensor_payload(present));
    ctx.session.presence = present;
    ctx.emit(AppEvent::PresenceChanged(present));
    ctx.publish(SENSOR_STATE_TOPIC, sensor_payload(present));

    if !present && ctx.config.require_presence {
        ctx.session.last_barcode = None;
        ctx.session.last_result = None;
    }
}

fn handle_remote(ctx: &mut CoreContext, topic: &str, payload: &[u8]) {
    if topic != REJECT_COMMAND_TOPIC {
        debug!("LINK: ignoring message on '{}'", topic);
        return;
    }
    match RemoteCommand::parse(payload) {
        Ok(RemoteCommand::Activate) if ctx.pending_echoes > 0 => {
            // Our own request coming back; the local pulse already covers it.
            ctx.pending_echoes -= 1;
            debug!("REJECT: own activate echoed, pulse unchanged");
        }
        Ok(RemoteCommand::Activate) => {
            info!("REJECT: remote activate");
            ctx.arm_reject();
        }
        Ok(RemoteCommand::Deactivate) => {
            info!("REJECT: remote deactivate");
            ctx.cancel_reject();
        }
        Err(e) => {
            warn!("REJECT: {}", e);
            let text = String::from_utf8_lossy(payload).into_owned();
            ctx.emit(AppEvent::RemoteCommandRejected(text));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Connectivity helpers
// ═══════════════════════════════════════════════════════════════════════════

fn link_up(ctx: &mut CoreContext) {
    if ctx.connect_failures > 0 {
        info!("LINK: connected after {} failed attempts", ctx.connect_failures);
    } else {
        info!("LINK: connected");
    }
    ctx.connect_failures = 0;
    record_connectivity(ctx, ConnectivityState::Connected);
}

fn record_connectivity(ctx: &mut CoreContext, state: ConnectivityState) {
    if !state.is_connected() {
        // Clean session: nothing in flight survives the link.
        ctx.pending_echoes = 0;
    }
    if ctx.session.connectivity != state {
        ctx.session.connectivity = state;
        ctx.emit(AppEvent::ConnectivityChanged(state));
    }
}

/// Queue a retry when a reconnect delay is configured.
fn schedule_reconnect(ctx: &mut CoreContext) {
    let delay_ms = ctx.config.reconnect_delay_ms;
    if delay_ms == 0 {
        return;
    }
    info!("LINK: retrying in {} ms", delay_ms);
    ctx.push(Effect::Schedule {
        token: TimerToken::Reconnect,
        delay_ms,
    });
}

fn link_code(state: ConnectivityState) -> i32 {
    match state {
        ConnectivityState::Errored(code) => code,
        _ => 0,
    }
}
