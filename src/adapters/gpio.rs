//! Digital I/O adapters: presence sensor input and reject output.
//!
//! Both are generic over the `embedded-hal` 1.0 digital traits: any board
//! HAL pin plugs in, and the in-process [`SimPin`] stands in where there is
//! none.
//!
//! ## Presence sensor
//!
//! A poller thread samples the input every [`POLL_INTERVAL`], applies the
//! configured polarity, and debounces: a new level must hold for the
//! debounce window before it is reported as `Event::Presence`.
//!
//! ## Reject output
//!
//! Active-high.  After [`ActuatorPort::release`] the line is driven low and
//! no longer touched; further writes fail with [`ActuatorError::Released`].

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use embedded_hal::digital::{self, ErrorType, InputPin, OutputPin};
use log::{debug, info, warn};

use crate::app::ports::ActuatorPort;
use crate::config::VerifierConfig;
use crate::error::ActuatorError;
use crate::events::{Event, EventSender};

/// Sampling period of the presence poller.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2);

// ───────────────────────────────────────────────────────────────
// Debouncer
// ───────────────────────────────────────────────────────────────

/// Reports a level only after it has been stable for `window_ms`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window_ms: u32,
    stable: Option<bool>,
    candidate: Option<bool>,
    since_ms: u32,
}

impl Debouncer {
    pub fn new(window_ms: u32) -> Self {
        Self {
            window_ms,
            stable: None,
            candidate: None,
            since_ms: 0,
        }
    }

    /// Feed one raw sample taken at `now_ms`.  Returns the new stable level
    /// when it changes (including the first settled reading).
    pub fn sample(&mut self, level: bool, now_ms: u32) -> Option<bool> {
        if self.candidate != Some(level) {
            self.candidate = Some(level);
            self.since_ms = now_ms;
        }
        if self.stable == self.candidate {
            return None;
        }
        if now_ms.wrapping_sub(self.since_ms) >= self.window_ms {
            self.stable = self.candidate;
            return self.stable;
        }
        None
    }

    pub fn stable(&self) -> Option<bool> {
        self.stable
    }
}

// ───────────────────────────────────────────────────────────────
// Presence poller
// ───────────────────────────────────────────────────────────────

/// Handle to the presence sensor thread.
pub struct PresencePoller {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl PresencePoller {
    /// Start sampling `pin` on a background thread.
    pub fn spawn<P>(pin: P, config: &VerifierConfig, events: EventSender) -> std::io::Result<Self>
    where
        P: InputPin + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let active_high = config.sensor_active_high;
        let debouncer = Debouncer::new(config.sensor_debounce_ms);
        info!(
            "SENSOR: polling line {} (active-{}, debounce {} ms)",
            config.sensor_port,
            if active_high { "high" } else { "low" },
            config.sensor_debounce_ms
        );

        let worker = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("presence".into())
                .spawn(move || poll(pin, active_high, debouncer, &stop, &events))?
        };
        Ok(Self {
            stop,
            worker: Some(worker),
        })
    }

    /// Stop sampling and wait for the thread.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("SENSOR: poller thread panicked");
            }
        }
    }
}

impl Drop for PresencePoller {
    fn drop(&mut self) {
        self.halt();
    }
}

fn poll<P: InputPin>(
    mut pin: P,
    active_high: bool,
    mut debouncer: Debouncer,
    stop: &AtomicBool,
    events: &EventSender,
) {
    let epoch = Instant::now();
    let mut read_failed = false;
    while !stop.load(Ordering::Acquire) && !events.is_closed() {
        match pin.is_high() {
            Ok(high) => {
                read_failed = false;
                let now_ms = epoch.elapsed().as_millis() as u32;
                if let Some(present) = debouncer.sample(high == active_high, now_ms) {
                    debug!("SENSOR: settled at {}", present);
                    events.post(Event::Presence(present));
                }
            }
            Err(e) => {
                if !read_failed {
                    warn!("SENSOR: read failed: {:?}", e);
                }
                read_failed = true;
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
    debug!("SENSOR: poller exiting, last level {:?}", debouncer.stable());
}

// ───────────────────────────────────────────────────────────────
// Reject output
// ───────────────────────────────────────────────────────────────

/// Reject actuator on an output pin.
pub struct RejectOutput<P> {
    pin: Option<P>,
    line: u8,
}

impl<P: OutputPin> RejectOutput<P> {
    /// Take the pin and drive it to the inactive level.
    pub fn new(mut pin: P, line: u8) -> Result<Self, ActuatorError> {
        pin.set_low().map_err(write_failed)?;
        info!("REJECT: output on line {} ready", line);
        Ok(Self {
            pin: Some(pin),
            line,
        })
    }

    pub fn is_released(&self) -> bool {
        self.pin.is_none()
    }
}

impl<P: OutputPin> ActuatorPort for RejectOutput<P> {
    fn set_reject(&mut self, active: bool) -> Result<(), ActuatorError> {
        let pin = self.pin.as_mut().ok_or(ActuatorError::Released)?;
        if active {
            pin.set_high().map_err(write_failed)
        } else {
            pin.set_low().map_err(write_failed)
        }
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        match self.pin.take() {
            Some(mut pin) => {
                info!("REJECT: releasing line {}", self.line);
                pin.set_low().map_err(write_failed)
            }
            None => Ok(()),
        }
    }
}

fn write_failed<E: digital::Error>(e: E) -> ActuatorError {
    ActuatorError::WriteFailed(format!("{:?}", e))
}

// ───────────────────────────────────────────────────────────────
// Simulated pin
// ───────────────────────────────────────────────────────────────

/// In-memory digital line.  Clones share the same level, so one clone can
/// be handed to an adapter while another drives or observes it.
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: Arc<AtomicBool>,
}

impl SimPin {
    pub fn new(initial_high: bool) -> Self {
        Self {
            level: Arc::new(AtomicBool::new(initial_high)),
        }
    }

    pub fn set(&self, high: bool) {
        self.level.store(high, Ordering::Release);
    }

    pub fn get(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.get())
    }
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}
