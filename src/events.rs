//! Inbound event queue.
//!
//! Every asynchronous source posts into one bounded queue; the control
//! loop is the only consumer and handles one event at a time, end to end.
//!
//! ```text
//! ┌──────────────┐
//! │ Scanner      │────▶┌──────────────┐     ┌──────────────┐
//! │ Presence     │────▶│              │     │              │
//! │ MQTT link    │────▶│  EventQueue  │────▶│ Control loop │
//! │ Timer thread │────▶│  (bounded)   │     │  (consumer)  │
//! │ Signals      │────▶│              │     │              │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Producers block when the queue is full rather than dropping scans or
//! the shutdown request.  The consumer must never post into its own
//! queue with [`EventSender::post`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::debug;

use crate::fsm::context::ConnectivityState;

/// Maximum number of pending events.
const EVENT_QUEUE_CAP: usize = 32;

/// Events consumed by the control core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A complete barcode from the scanner (untrimmed).
    Scan(String),
    /// Debounced presence sensor reading changed.
    Presence(bool),
    /// The messaging link changed state.
    Connectivity(ConnectivityState),
    /// A message arrived on a subscribed topic.
    RemoteMessage { topic: String, payload: Vec<u8> },
    /// A deferred callback scheduled through the timer port fired.
    TimerFired(TimerToken),
    /// The reject output reported a hardware fault out of band.
    ActuatorFault(String),
    /// Termination requested.  Always the last event handled.
    Shutdown(ShutdownReason),
}

/// Identifies a deferred callback.  Scheduling a token replaces any pending
/// callback with the same [`TimerToken::slot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerToken {
    /// End of the reject pulse armed with `generation`.
    RejectOff { generation: u64 },
    /// Retry the broker connection.
    Reconnect,
}

/// Replacement slot of a [`TimerToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    RejectOff,
    Reconnect,
}

impl TimerToken {
    pub const fn slot(self) -> TimerSlot {
        match self {
            Self::RejectOff { .. } => TimerSlot::RejectOff,
            Self::Reconnect => TimerSlot::Reconnect,
        }
    }
}

/// Why the process is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// Ctrl+C byte on the scanner input.
    Console,
}

// ── Queue ────────────────────────────────────────────────────

type EventChannel = Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_CAP>;

struct Shared {
    channel: EventChannel,
    closed: AtomicBool,
}

/// Consumer side of the queue.  Owned by the control loop.
pub struct EventQueue {
    shared: Arc<Shared>,
}

/// Cloneable producer handle.
#[derive(Clone)]
pub struct EventSender {
    shared: Arc<Shared>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                channel: Channel::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// A new producer handle.
    pub fn sender(&self) -> EventSender {
        EventSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Block until the next event arrives.
    pub fn recv(&self) -> Event {
        futures_lite::future::block_on(self.shared.channel.receive())
    }

    /// Next event, if one is already queued.
    pub fn try_recv(&self) -> Option<Event> {
        self.shared.channel.try_receive().ok()
    }

    /// Stop accepting events and discard whatever is still queued.
    ///
    /// Returns the number of discarded events.
    pub fn close(&self) -> usize {
        self.shared.closed.store(true, Ordering::Release);
        let mut dropped = 0;
        while self.shared.channel.try_receive().is_ok() {
            dropped += 1;
        }
        dropped
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.shared.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.channel.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSender {
    /// Post an event, waiting for room if the queue is full.
    ///
    /// Returns `false` once the queue has been closed.
    pub fn post(&self, event: Event) -> bool {
        if self.shared.closed.load(Ordering::Acquire) {
            debug!("EVENTS: queue closed, dropping {:?}", event);
            return false;
        }
        futures_lite::future::block_on(self.shared.channel.send(event));
        true
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}
