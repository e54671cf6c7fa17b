//! Bounded reconnect policy applied after an involuntary link loss.

use std::time::Duration;

/// How automatic reconnects are paced and capped.
///
/// The first reconnect after losing a `Ready` session is immediate. Every
/// consecutive failed attempt `n` (1-based) waits `initial_delay * 2^(n-1)`,
/// capped at `max_delay`, before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts before giving up. `0` never gives up.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay to wait after `failed_attempts` consecutive failures.
    #[must_use]
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        if failed_attempts == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32
            .checked_shl(failed_attempts - 1)
            .unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Whether `failed_attempts` consecutive failures exhaust the policy.
    #[must_use]
    pub fn is_exhausted(&self, failed_attempts: u32) -> bool {
        self.max_attempts != 0 && failed_attempts >= self.max_attempts
    }
}
