//! Deferred-callback thread: implements [`TimerPort`].
//!
//! ```text
//!  ┌─────────────┐  TimerRequest   ┌──────────────────────────────┐
//!  │ AppService  │ ──────────────▶ │ timer thread                  │
//!  │ (TimerPort) │   (channel)     │ block_on(request | deadline) │
//!  └─────────────┘                 └──────────────┬───────────────┘
//!                                                 │ Event::TimerFired
//!                                                 ▼
//!                                            EventQueue
//! ```
//!
//! The thread keeps at most one pending deadline per [`TimerSlot`] and
//! waits on whichever comes first: the next request or the earliest
//! deadline.  Expiries are posted back into the event queue, so the
//! callback runs on the control loop like every other event.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use async_io_mini::Timer;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use futures_lite::future;
use log::{debug, warn};

use crate::app::ports::TimerPort;
use crate::error::TimerError;
use crate::events::{Event, EventSender, TimerSlot, TimerToken};

const REQUEST_CAP: usize = 16;
/// One pending deadline per slot.
const MAX_PENDING: usize = 2;

#[derive(Debug, Clone, Copy)]
enum TimerRequest {
    Schedule(TimerToken, Duration),
    Cancel(TimerSlot),
    Stop,
}

type RequestChannel = Channel<CriticalSectionRawMutex, TimerRequest, REQUEST_CAP>;

/// Handle to the timer thread.
pub struct ThreadTimer {
    requests: Arc<RequestChannel>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadTimer {
    pub fn spawn(events: EventSender) -> std::io::Result<Self> {
        let requests = Arc::new(RequestChannel::new());
        let worker = {
            let requests = Arc::clone(&requests);
            thread::Builder::new()
                .name("timers".into())
                .spawn(move || future::block_on(run(&requests, &events)))?
        };
        Ok(Self {
            requests,
            worker: Some(worker),
        })
    }

    /// Drop every pending deadline and wait for the thread.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        if let Some(worker) = self.worker.take() {
            future::block_on(self.requests.send(TimerRequest::Stop));
            if worker.join().is_err() {
                warn!("TIMER: thread panicked");
            }
        }
    }

    /// Never blocks: the timer thread may itself be waiting for room in the
    /// event queue that the caller drains.
    fn request(&self, req: TimerRequest) -> Result<(), TimerError> {
        if self.worker.as_ref().is_none_or(JoinHandle::is_finished) {
            return Err(TimerError::Stopped);
        }
        self.requests
            .try_send(req)
            .map_err(|_| TimerError::QueueFull)
    }
}

impl TimerPort for ThreadTimer {
    fn schedule(&mut self, token: TimerToken, delay: Duration) -> Result<(), TimerError> {
        self.request(TimerRequest::Schedule(token, delay))
    }

    fn cancel(&mut self, slot: TimerSlot) {
        if let Err(e) = self.request(TimerRequest::Cancel(slot)) {
            warn!("TIMER: cancel of {:?} dropped: {}", slot, e);
        }
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.halt();
    }
}

// ── Thread body ──────────────────────────────────────────────

async fn run(requests: &RequestChannel, events: &EventSender) {
    let mut pending: heapless::Vec<(TimerToken, Instant), MAX_PENDING> = heapless::Vec::new();

    loop {
        let next = pending.iter().map(|&(_, at)| at).min();
        let request = match next {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                future::or(async { Some(requests.receive().await) }, async {
                    Timer::after(wait).await;
                    None
                })
                .await
            }
            None => Some(requests.receive().await),
        };

        match request {
            Some(TimerRequest::Schedule(token, delay)) => {
                pending.retain(|(t, _)| t.slot() != token.slot());
                // Capacity holds one entry per slot; the retain above freed it.
                let _ = pending.push((token, Instant::now() + delay));
                debug!("TIMER: {:?} in {} ms", token, delay.as_millis());
            }
            Some(TimerRequest::Cancel(slot)) => {
                pending.retain(|(t, _)| t.slot() != slot);
            }
            Some(TimerRequest::Stop) => {
                debug!("TIMER: stopping with {} pending", pending.len());
                return;
            }
            None => {
                let now = Instant::now();
                let mut due: heapless::Vec<TimerToken, MAX_PENDING> = heapless::Vec::new();
                pending.retain(|&(token, at)| {
                    if at <= now {
                        let _ = due.push(token);
                        false
                    } else {
                        true
                    }
                });
                for token in due {
                    if !events.post(Event::TimerFired(token)) {
                        debug!("TIMER: queue closed, dropping {:?}", token);
                    }
                }
            }
        }
    }
}
