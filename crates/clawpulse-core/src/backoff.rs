use std::time::Duration;

pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);
pub const DEFAULT_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl BackoffPolicy {
    /// Swaps inverted bounds and floors the multiplier at 1 so the delay can
    /// never shrink between disconnects.
    pub fn normalized(self) -> Self {
        let (min_delay, max_delay) = if self.min_delay <= self.max_delay {
            (self.min_delay, self.max_delay)
        } else {
            (self.max_delay, self.min_delay)
        };
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        Self {
            min_delay,
            max_delay,
            multiplier,
        }
    }
}

/// Reconnect delay tracker. `current` stays within `[min_delay, max_delay]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        let policy = policy.normalized();
        Self {
            current: policy.min_delay,
            policy,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Returns the wait for this disconnect and grows the delay for the next one.
    pub fn on_disconnect(&mut self) -> Duration {
        let wait = self.current;
        self.current = self
            .current
            .mul_f64(self.policy.multiplier)
            .min(self.policy.max_delay);
        wait
    }

    pub fn reset(&mut self) {
        self.current = self.policy.min_delay;
    }
}

pub fn format_wait(wait: Duration) -> String {
    let secs = wait.as_secs_f64();
    let rounded = (secs * 1000.0).round() / 1000.0;
    format!("{rounded}")
}
