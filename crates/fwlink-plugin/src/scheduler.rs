//! Debounced rescans.
//!
//! Topology change notifications arrive in bursts, well before the hardware
//! has settled. [`RescanScheduler`] keeps at most one pending deadline; each
//! notification pushes it back to `delay` after the latest one, so a burst
//! of any length produces a single rescan.
//!
//! The scheduler does not own a timer task. The host's event loop asks for
//! the [`RescanScheduler::deadline`], sleeps until it, and then calls
//! [`RescanScheduler::take_due`]. Deadlines are [`tokio::time::Instant`]s so
//! tests can drive them with a paused clock.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{DEFAULT_RESCAN_DELAY_SECS, MAX_RESCAN_DELAY_SECS};

/// Default debounce window.
pub const DEFAULT_RESCAN_DELAY: Duration = Duration::from_secs(DEFAULT_RESCAN_DELAY_SECS);
/// Longest debounce window; longer ones are clamped.
pub const MAX_RESCAN_DELAY: Duration = Duration::from_secs(MAX_RESCAN_DELAY_SECS);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRescan {
    deadline: Instant,
    generation: u64,
}

/// At most one pending rescan deadline.
#[derive(Debug, Clone)]
pub struct RescanScheduler {
    delay: Duration,
    pending: Option<PendingRescan>,
    generation: u64,
}

impl RescanScheduler {
    /// Scheduler with the given debounce window, at most [`MAX_RESCAN_DELAY`].
    pub fn new(delay: Duration) -> Self {
        if delay > MAX_RESCAN_DELAY {
            warn!(
                delay_secs = delay.as_secs(),
                max_secs = MAX_RESCAN_DELAY_SECS,
                "clamping rescan delay"
            );
        }
        Self {
            delay: delay.min(MAX_RESCAN_DELAY),
            pending: None,
            generation: 0,
        }
    }

    /// Debounce window.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a change notification now.
    pub fn notify_changed(&mut self) -> Instant {
        self.notify_changed_at(Instant::now())
    }

    /// Record a change notification at `now`, replacing any pending deadline.
    pub fn notify_changed_at(&mut self, now: Instant) -> Instant {
        if self.pending.is_some() {
            debug!("replacing pending rescan");
        }
        self.generation = self.generation.wrapping_add(1);
        // past the clock's range the rescan runs at the next loop turn
        let deadline = now.checked_add(self.delay).unwrap_or(now);
        self.pending = Some(PendingRescan {
            deadline,
            generation: self.generation,
        });
        deadline
    }

    /// Drop the pending deadline. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Whether a rescan is pending.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending rescan is due.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.deadline)
    }

    /// Number of notifications seen so far. A rescan fires for the
    /// generation current when its deadline passed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// If the pending deadline has passed, clear it and return `true`.
    ///
    /// The caller runs the rescan. A notification arriving after this
    /// starts a fresh window.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(pending) if pending.deadline <= now => {
                debug!(generation = pending.generation, "rescan due");
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl Default for RescanScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_RESCAN_DELAY)
    }
}
