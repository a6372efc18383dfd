//! Reject pulse timer.
//!
//! Pure bookkeeping for the reject actuator: whether it is energised and
//! which deactivation is the live one.  The actual countdown runs on the
//! timer thread (see [`TimerPort`](crate::app::ports::TimerPort)); it comes
//! back as an expiry carrying the generation it was armed with.
//!
//! Every `arm` and `cancel` bumps the generation, so a countdown started
//! before the latest arm/cancel can never switch the output off.
//!
//! ```text
//!            arm(d)                 expire(gen == current)
//!  Inactive ───────▶ Active ──────────────────────────────▶ Inactive
//!     ▲                │ ▲                                     │
//!     │   cancel()     │ └──── arm(d): new generation ─────────┘
//!     └────────────────┘
//! ```

use core::fmt;

/// Logical state of the reject output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RejectState {
    #[default]
    Inactive,
    Active,
    /// The output reported a fault; its real level is unknown until the
    /// next arm or cancel drives it again.
    Unknown,
}

impl fmt::Display for RejectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inactive => "Inactive",
            Self::Active => "Active",
            Self::Unknown => "Unknown",
        })
    }
}

/// A deactivation the caller must schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arming {
    pub generation: u64,
    pub duration_ms: u32,
}

/// Reject output state plus the generation of the live countdown.
#[derive(Debug, Default)]
pub struct RejectTimer {
    state: RejectState,
    generation: u64,
    armed: bool,
}

impl RejectTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Energise the output and start a fresh countdown.
    ///
    /// Any countdown already running is invalidated.
    pub fn arm(&mut self, duration_ms: u32) -> Arming {
        self.generation = self.generation.wrapping_add(1);
        self.state = RejectState::Active;
        self.armed = true;
        Arming {
            generation: self.generation,
            duration_ms,
        }
    }

    /// De-energise immediately and drop any countdown.
    ///
    /// Returns `false` when the output was already inactive with nothing
    /// pending (the call is then a no-op apart from invalidation).
    pub fn cancel(&mut self) -> bool {
        let was_live = self.armed || self.state != RejectState::Inactive;
        self.generation = self.generation.wrapping_add(1);
        self.state = RejectState::Inactive;
        self.armed = false;
        was_live
    }

    /// A countdown finished.  Returns `true` if it was the live one and the
    /// output must now be switched off.
    pub fn expire(&mut self, generation: u64) -> bool {
        if !self.armed || generation != self.generation {
            return false;
        }
        self.armed = false;
        self.state = RejectState::Inactive;
        true
    }

    /// The output reported a fault.
    pub fn mark_unknown(&mut self) {
        self.state = RejectState::Unknown;
    }

    pub fn state(&self) -> RejectState {
        self.state
    }

    /// Whether a deactivation is pending.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
