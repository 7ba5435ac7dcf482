//! Fixed retry backoff ladder.

use std::time::Duration;

use crate::diagnosis::Diagnosis;

const LADDER: [Duration; 3] = [
    Duration::from_secs(30),
    Duration::from_secs(2 * 60),
    Duration::from_secs(10 * 60),
];

/// The delay before the next retry, given the number of consecutive
/// failures so far (1-indexed: this is the first failure, the second,
/// ...) and the diagnosed cause. Rate-limited failures always use the
/// longest rung regardless of `retry_count`.
pub fn backoff_for(retry_count: u32, diagnosis: Diagnosis) -> Duration {
    if diagnosis == Diagnosis::RateLimited {
        return *LADDER.last().expect("non-empty ladder");
    }
    let index = (retry_count.saturating_sub(1) as usize).min(LADDER.len() - 1);
    LADDER[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_uses_first_rung() {
        assert_eq!(backoff_for(1, Diagnosis::Transient), Duration::from_secs(30));
    }

    #[test]
    fn second_failure_uses_second_rung() {
        assert_eq!(backoff_for(2, Diagnosis::Transient), Duration::from_secs(120));
    }

    #[test]
    fn failures_beyond_ladder_stay_at_last_rung() {
        assert_eq!(backoff_for(10, Diagnosis::Unknown), Duration::from_secs(600));
    }

    #[test]
    fn rate_limited_always_uses_largest_step() {
        assert_eq!(backoff_for(1, Diagnosis::RateLimited), Duration::from_secs(600));
    }

    #[test]
    fn ladder_is_non_decreasing() {
        let delays: Vec<Duration> = (1..=5).map(|n| backoff_for(n, Diagnosis::Transient)).collect();
        for window in delays.windows(2) {
            assert!(window[1] >= window[0]);
        }
    }
}
