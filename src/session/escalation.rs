//! Wait escalation for one outstanding request.
//!
//! Elapsed time is counted in whole intervals (`k * T` after the k-th expiry),
//! so a late wake-up never shortens the wait. The request fails at the first
//! expiry where `k * T >= max_wait`, i.e. the smallest T-aligned time at or
//! past the maximum. The call itself is never re-sent.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationStep {
    /// Keep waiting; the pending indicator should be refreshed.
    Extend,
    /// Give up and finalize the turn as unavailable.
    Fail,
}

#[derive(Debug, Clone)]
pub struct Escalation {
    dispatched_at: Instant,
    interval: Duration,
    max_wait: Duration,
    expiries: u32,
}

impl Escalation {
    pub fn new(dispatched_at: Instant, interval: Duration, max_wait: Duration) -> Self {
        Self {
            dispatched_at,
            interval: interval.max(Duration::from_millis(1)),
            max_wait,
            expiries: 0,
        }
    }

    /// When the next expiry is due; `None` only if the instant would overflow.
    pub fn next_deadline(&self) -> Option<Instant> {
        let offset = self.interval.checked_mul(self.expiries.saturating_add(1))?;
        self.dispatched_at.checked_add(offset)
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Wait accounted so far.
    pub fn elapsed(&self) -> Duration {
        self.interval.saturating_mul(self.expiries)
    }

    pub fn expiries(&self) -> u32 {
        self.expiries
    }

    /// Record one expiry and decide what to do.
    pub fn on_expiry(&mut self) -> EscalationStep {
        self.expiries = self.expiries.saturating_add(1);
        if self.elapsed() >= self.max_wait {
            EscalationStep::Fail
        } else {
            EscalationStep::Extend
        }
    }
}

/// Forced-failure offset for interval `t` and max wait `m`: the smallest
/// positive multiple of `t` that is `>= m`.
pub fn forced_failure_after(t: Duration, m: Duration) -> Duration {
    let t_ms = t.as_millis().max(1);
    let k = m.as_millis().div_ceil(t_ms).max(1);
    Duration::from_millis(u64::try_from(k * t_ms).unwrap_or(u64::MAX))
}
