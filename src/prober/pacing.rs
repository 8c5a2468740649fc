//! Per-worker request pacing.
//!
//! Every attempt is followed by a pause. The pause starts at the configured
//! delay, grows when the target serves challenge pages and shrinks back once
//! it answers normally again. Each worker owns its own pacer.

use rand::Rng;
use std::time::Duration;

/// Step added to the delay after a challenge page.
pub const ESCALATION_STEP: Duration = Duration::from_secs(2);

/// Step removed from the delay after a classified response.
pub const RELAX_STEP: Duration = Duration::from_secs(1);

/// Adaptive inter-request delay.
#[derive(Debug, Clone)]
pub struct Pacer {
    base: Duration,
    current: Duration,
    max: Duration,
    jitter: bool,
}

impl Pacer {
    /// Create a pacer starting at `base` that never grows beyond `max`.
    pub fn new(base: Duration, max: Duration, jitter: bool) -> Self {
        Self {
            base,
            current: base,
            max: max.max(base),
            jitter,
        }
    }

    /// Current delay, without jitter.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Back off after a challenge page.
    pub fn escalate(&mut self) {
        self.current = (self.current + ESCALATION_STEP).min(self.max);
    }

    /// Ease off after the target answered normally.
    pub fn relax(&mut self) {
        self.current = self.current.saturating_sub(RELAX_STEP).max(self.base);
    }

    /// The wait to apply after the next attempt.
    pub fn next_wait(&self) -> Duration {
        if self.jitter && !self.current.is_zero() {
            self.current + rand::thread_rng().gen_range(Duration::ZERO..self.current)
        } else {
            self.current
        }
    }

    /// Sleep for [`Pacer::next_wait`].
    pub async fn pause(&self) {
        let wait = self.next_wait();
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}
