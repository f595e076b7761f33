use std::time::Duration;

/// How long to wait between reconnection attempts, and when to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            cap: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay before attempt `attempt`, counting from 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionAttemptState {
    pub attempt_count: u32,
    pub next_delay: Option<Duration>,
}

impl ConnectionAttemptState {
    pub fn on_open(&mut self) {
        *self = Self::default();
    }

    /// Records a lost or failed connection. Returns the delay before the next
    /// attempt, or `None` once the attempts are used up.
    pub fn on_failure(&mut self, policy: &BackoffPolicy) -> Option<Duration> {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.next_delay = if self.attempt_count <= policy.max_attempts {
            Some(policy.delay_for(self.attempt_count))
        } else {
            None
        };
        self.next_delay
    }

    pub fn exhausted(&self, policy: &BackoffPolicy) -> bool {
        self.attempt_count > policy.max_attempts
    }
}
