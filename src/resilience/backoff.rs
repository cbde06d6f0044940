//! Linear backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Delay before the attempt following `attempt` (zero-based):
/// `base_ms * (attempt + 1)` plus a random jitter in `0..max_jitter_ms`.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_jitter_ms: u64) -> Duration {
    let step = base_ms.saturating_mul(u64::from(attempt) + 1);

    let jitter = if max_jitter_ms > 0 {
        rand::thread_rng().gen_range(0..max_jitter_ms)
    } else {
        0
    };

    Duration::from_millis(step.saturating_add(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b0 = calculate_backoff(0, 500, 250);
        assert!(b0.as_millis() >= 500 && b0.as_millis() < 750);

        let b1 = calculate_backoff(1, 500, 250);
        assert!(b1.as_millis() >= 1000 && b1.as_millis() < 1250);

        let b2 = calculate_backoff(2, 600, 0);
        assert_eq!(b2.as_millis(), 1800);
    }

    #[test]
    fn test_backoff_strictly_increases_when_jitter_below_base() {
        for _ in 0..50 {
            let earlier = calculate_backoff(0, 500, 250);
            let later = calculate_backoff(1, 500, 250);
            assert!(later > earlier);
        }
    }

    #[test]
    fn test_backoff_increases_at_the_jitter_bound() {
        // Largest accepted jitter is one below the step.
        for _ in 0..50 {
            let earlier = calculate_backoff(0, 100, 99);
            let later = calculate_backoff(1, 100, 99);
            assert!(later > earlier);
        }
    }
}
