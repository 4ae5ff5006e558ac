//! Exponential requeue backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Requeue delay policy for failed reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(5),
            max: Duration::from_secs(1000),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            self.base.as_millis() as u64,
            self.max.as_millis() as u64,
        )
    }
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Up to 10% extra so failing keys spread out.
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_exponentially_and_caps() {
        assert_eq!(calculate_backoff(0, 100, 2000), Duration::ZERO);
        assert!(calculate_backoff(1, 100, 2000) >= Duration::from_millis(100));
        assert!(calculate_backoff(3, 100, 2000) >= Duration::from_millis(400));

        let capped = calculate_backoff(40, 100, 1000);
        assert!(capped >= Duration::from_millis(1000));
        assert!(capped < Duration::from_millis(1100));
    }

    #[test]
    fn policy_uses_its_bounds() {
        let policy = Backoff {
            base: Duration::from_millis(10),
            max: Duration::from_millis(50),
        };
        assert!(policy.delay(10) < Duration::from_millis(55));
    }
}
