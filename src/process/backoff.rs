/*!
 * Restart Backoff
 * Restarts are unconditional; only the pause before them is pluggable
 */

use super::traits::BackoffPolicy;
use crate::core::limits::RESTART_BACKOFF;
use std::time::Duration;

/// Same delay before every restart, no growth and no cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedBackoff {
    fn default() -> Self {
        Self::new(RESTART_BACKOFF)
    }
}

impl BackoffPolicy for FixedBackoff {
    fn delay(&self, _restarts: u64) -> Duration {
        self.delay
    }
}

/// Respawn immediately; meant for tests
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl BackoffPolicy for NoBackoff {
    fn delay(&self, _restarts: u64) -> Duration {
        Duration::ZERO
    }
}
