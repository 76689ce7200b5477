use std::time::Duration;

use crate::config::BotConfig;

/// Decides how long to wait before reconnect attempt `attempt` (1-based,
/// counted since the last successful spawn). `None` means give up.
pub trait ReconnectPolicy: Send + Sync {
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Same delay every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl FixedDelay {
    pub fn forever(delay: Duration) -> Self {
        FixedDelay {
            delay,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt > max => None,
            _ => Some(self.delay),
        }
    }
}

/// Doubles the delay per attempt, up to `max`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.initial.saturating_mul(1 << exponent);
        Some(delay.min(self.max))
    }
}

/// Fixed delay forever, or exponential backoff when a maximum delay is set.
pub fn policy_for(config: &BotConfig) -> Box<dyn ReconnectPolicy> {
    match config.reconnect_max_delay {
        Some(max) => Box::new(ExponentialBackoff {
            initial: config.reconnect_delay,
            max,
            max_attempts: None,
        }),
        None => Box::new(FixedDelay::forever(config.reconnect_delay)),
    }
}
