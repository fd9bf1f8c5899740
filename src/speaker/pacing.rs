//! Request pacing and rate-limit cooldown.
//!
//! Pacing is keyed to call issuance, not completion: a call's slot is
//! stamped when it is reserved, so back-to-back calls stay spaced even while
//! an earlier one is still in flight.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::PacingConfig;

#[derive(Debug, Default)]
struct PacingState {
    last_call: Option<Instant>,
    cooldown_until: Option<Instant>,
}

/// Shared pacing state for one remote endpoint.
#[derive(Debug)]
pub struct Pacer {
    urgent_gap: Duration,
    background_gap: Duration,
    state: Mutex<PacingState>,
}

impl Pacer {
    pub fn new(urgent_gap: Duration, background_gap: Duration) -> Self {
        Self {
            urgent_gap,
            background_gap,
            state: Mutex::new(PacingState::default()),
        }
    }

    pub fn for_synthesis(config: &PacingConfig) -> Self {
        Self::new(config.priority_gap(), config.background_gap())
    }

    /// Translation calls are always user-triggered, so one gap covers both levels.
    pub fn for_translation(config: &PacingConfig) -> Self {
        let gap = Duration::from_millis(config.translation_min_gap_ms);
        Self::new(gap, gap)
    }

    fn required_gap(&self, urgent: bool) -> Duration {
        if urgent {
            self.urgent_gap
        } else {
            self.background_gap
        }
    }

    /// How long a caller must wait before issuing its next call.
    pub fn may_proceed_at(&self, urgent: bool) -> Duration {
        let state = self.state.lock();
        match state.last_call {
            Some(last) => (last + self.required_gap(urgent)).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    pub fn record_call(&self) {
        self.state.lock().last_call = Some(Instant::now());
    }

    /// Reserve the next free slot, then sleep until it.
    ///
    /// The slot is claimed under the lock before sleeping, so overlapping
    /// callers queue up one gap apart instead of waking together.
    pub async fn wait_turn(&self, urgent: bool) {
        let slot = {
            let mut state = self.state.lock();
            let now = Instant::now();
            let slot = match state.last_call {
                Some(last) => (last + self.required_gap(urgent)).max(now),
                None => now,
            };
            state.last_call = Some(slot);
            slot
        };

        let wait = slot.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            debug!("Pacing: waiting {}ms (urgent={urgent})", wait.as_millis());
            tokio::time::sleep_until(slot).await;
        }
    }

    pub fn enter_cooldown(&self, duration: Duration) {
        warn!("Rate limited: background requests paused for {}s", duration.as_secs());
        self.state.lock().cooldown_until = Some(Instant::now() + duration);
    }

    /// Background requests respect the cooldown; urgent ones bypass it.
    pub fn is_cooling_down(&self, urgent: bool) -> bool {
        !urgent && !self.cooldown_remaining().is_zero()
    }

    pub fn cooldown_remaining(&self) -> Duration {
        match self.state.lock().cooldown_until {
            Some(until) => until.saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }
}
