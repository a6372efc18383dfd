//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the lifecycle FSM and the shared context.  It takes
//! one [`Event`] at a time, lets the current state handle it, then applies
//! the queued [`Effect`]s through the port traits in [`Peripherals`].
//!
//! ```text
//!  EventQueue ──▶ ┌────────────────────────┐ ──▶ MessagingPort
//!                 │       AppService       │ ──▶ ActuatorPort
//!                 │  FSM · Session · Reject│ ──▶ TimerPort
//!                 └────────────────────────┘ ──▶ EventSink
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::VerifierConfig;
use crate::error::LinkError;
use crate::events::{Event, EventQueue, TimerToken};
use crate::fsm::context::{ConnectivityState, CoreContext, Effect, Session};
use crate::fsm::states::{begin_connect, build_state_table};
use crate::fsm::{Fsm, StateId};
use crate::reject::RejectState;
use crate::topics::{CMD_ACTIVATE, REJECT_COMMAND_TOPIC};

use super::events::AppEvent;
use super::ports::{ActuatorPort, EventSink, LinkSettings, MessagingPort, TimerPort};

// ───────────────────────────────────────────────────────────────
// Peripherals
// ───────────────────────────────────────────────────────────────

/// The driven adapters the service talks to.
pub struct Peripherals<L, A, T, S> {
    pub link: L,
    pub actuator: A,
    pub timer: T,
    pub sink: S,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    ctx: CoreContext,
    events_handled: u64,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the FSM; call [`AppService::start`] next.
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            ctx: CoreContext::new(config),
            events_handled: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the FSM and request the first broker connection.
    pub fn start<L, A, T, S>(&mut self, io: &mut Peripherals<L, A, T, S>)
    where
        L: MessagingPort,
        A: ActuatorPort,
        T: TimerPort,
        S: EventSink,
    {
        self.fsm.start(&mut self.ctx);
        io.sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("AppService started in {:?}", self.fsm.current_state());

        begin_connect(&mut self.ctx);
        self.fsm
            .force_transition(StateId::AwaitingConnection, &mut self.ctx);
        io.sink.emit(&AppEvent::StateChanged {
            from: StateId::Idle,
            to: StateId::AwaitingConnection,
        });
        for event in self.flush(io) {
            self.dispatch(event, io);
        }
    }

    /// Handle one event end to end.
    ///
    /// Follow-up events produced while applying effects (a connect call
    /// failing synchronously) are handled before returning.
    pub fn dispatch<L, A, T, S>(&mut self, event: Event, io: &mut Peripherals<L, A, T, S>)
    where
        L: MessagingPort,
        A: ActuatorPort,
        T: TimerPort,
        S: EventSink,
    {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            self.events_handled += 1;
            let prev = self.fsm.current_state();
            self.fsm.dispatch(&event, &mut self.ctx);
            let now = self.fsm.current_state();
            if prev != now {
                io.sink.emit(&AppEvent::StateChanged { from: prev, to: now });
            }
            pending.extend(self.flush(io));
        }
    }

    /// Consume the queue until shutdown has been handled, then close it.
    pub fn run<L, A, T, S>(&mut self, queue: &EventQueue, io: &mut Peripherals<L, A, T, S>)
    where
        L: MessagingPort,
        A: ActuatorPort,
        T: TimerPort,
        S: EventSink,
    {
        while self.is_running() {
            let event = queue.recv();
            if matches!(event, Event::Shutdown(_)) {
                // Nothing queued behind the shutdown request is handled.
                let dropped = queue.close();
                if dropped > 0 {
                    debug!("AppService: discarded {} queued events", dropped);
                }
            }
            self.dispatch(event, io);
        }
        info!("AppService stopped after {} events", self.events_handled);
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn is_running(&self) -> bool {
        !self.fsm.current_state().is_terminal()
    }

    pub fn session(&self) -> &Session {
        &self.ctx.session
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.ctx.session.connectivity
    }

    pub fn reject_state(&self) -> RejectState {
        self.ctx.reject.state()
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.ctx.config
    }

    pub fn events_handled(&self) -> u64 {
        self.events_handled
    }

    // ── Effect application ────────────────────────────────────

    /// Apply every queued effect in order.  Returns follow-up events.
    fn flush<L, A, T, S>(&mut self, io: &mut Peripherals<L, A, T, S>) -> Vec<Event>
    where
        L: MessagingPort,
        A: ActuatorPort,
        T: TimerPort,
        S: EventSink,
    {
        let mut followups = Vec::new();
        for effect in self.ctx.take_outbox() {
            match effect {
                Effect::Connect => {
                    let settings = LinkSettings::from_config(&self.ctx.config);
                    if let Err(e) = io.link.connect(&settings) {
                        warn!("LINK: connect failed: {}", e);
                        followups.push(Event::Connectivity(ConnectivityState::Errored(
                            ConnectivityState::TRANSPORT_FAILURE,
                        )));
                    }
                }
                Effect::Disconnect => {
                    if let Err(e) = io.link.disconnect() {
                        warn!("LINK: disconnect failed: {}", e);
                    }
                }
                Effect::Publish { topic, payload } => {
                    let sent = if self.ctx.session.connectivity.is_connected() {
                        io.link.publish(&topic, payload.as_bytes())
                    } else {
                        Err(LinkError::NotConnected)
                    };
                    match sent {
                        Ok(()) => debug!("LINK: '{}' -> {}", payload, topic),
                        Err(error) => {
                            warn!("LINK: publish to '{}' failed: {}", topic, error);
                            if topic == REJECT_COMMAND_TOPIC && payload == CMD_ACTIVATE {
                                // No echo will arrive for a request that never left.
                                self.ctx.pending_echoes = self.ctx.pending_echoes.saturating_sub(1);
                            }
                            io.sink.emit(&AppEvent::PublishFailed { topic, error });
                        }
                    }
                }
                Effect::SetReject(active) => {
                    if let Err(e) = io.actuator.set_reject(active) {
                        warn!("REJECT: failed to drive output {}: {}", active, e);
                        self.ctx.reject.mark_unknown();
                        io.sink.emit(&AppEvent::ActuatorFault(e.to_string()));
                    }
                }
                Effect::Schedule { token, delay_ms } => {
                    let delay = Duration::from_millis(u64::from(delay_ms));
                    if let Err(e) = io.timer.schedule(token, delay) {
                        warn!("TIMER: cannot schedule {:?}: {}", token, e);
                        if matches!(token, TimerToken::RejectOff { .. }) {
                            self.end_pulse_now(io);
                        }
                    }
                }
                Effect::CancelTimer(slot) => io.timer.cancel(slot),
                Effect::ReleaseActuator => {
                    if let Err(e) = io.actuator.release() {
                        warn!("REJECT: release failed: {}", e);
                    }
                }
                Effect::Emit(event) => io.sink.emit(&event),
            }
        }
        followups
    }

    /// A pulse whose switch-off cannot be scheduled is ended immediately.
    fn end_pulse_now<L, A, T, S>(&mut self, io: &mut Peripherals<L, A, T, S>)
    where
        A: ActuatorPort,
        S: EventSink,
    {
        self.ctx.reject.cancel();
        match io.actuator.set_reject(false) {
            Ok(()) => io.sink.emit(&AppEvent::RejectDeactivated),
            Err(e) => {
                warn!("REJECT: failed to drive output false: {}", e);
                self.ctx.reject.mark_unknown();
                io.sink.emit(&AppEvent::ActuatorFault(e.to_string()));
            }
        }
    }
}
