//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::AcceptConfig;

/// Calculate exponential backoff delay with jitter.
///
/// `attempt` is 1-based; attempt 0 yields no delay. The delay doubles per
/// attempt from `base_ms`, is capped at `max_ms`, and gets up to 10% jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(exponential).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

/// Delay before retrying accept after `consecutive_errors` failures in a row.
pub fn accept_backoff(consecutive_errors: u32, config: &AcceptConfig) -> Duration {
    calculate_backoff(consecutive_errors, config.backoff_base_ms, config.backoff_max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(calculate_backoff(0, 100, 2000), Duration::ZERO);

        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1 >= Duration::from_millis(100) && b1 < Duration::from_millis(110));

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2 >= Duration::from_millis(200));

        let capped = calculate_backoff(30, 100, 1000);
        assert!(capped >= Duration::from_millis(1000) && capped < Duration::from_millis(1100));
    }

    #[test]
    fn accept_backoff_uses_config() {
        let config = AcceptConfig {
            backoff_base_ms: 10,
            backoff_max_ms: 40,
            max_consecutive_errors: 5,
        };
        assert!(accept_backoff(1, &config) >= Duration::from_millis(10));
        assert!(accept_backoff(10, &config) < Duration::from_millis(45));
    }
}
