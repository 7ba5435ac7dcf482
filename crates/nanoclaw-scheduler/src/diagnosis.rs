//! Classifies a task run's failure against recent history so the
//! engine can pick a recovery action: retry, pause, or deactivate.

use regex::RegexSet;

/// The diagnosed failure category and the recovery it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnosis {
    /// The task's chat no longer exists; deactivate and notify.
    Orphaned,
    /// The agent or an API it called was rate-limited; retry at the
    /// largest backoff rung regardless of the current retry count.
    RateLimited,
    /// The run exceeded its idle/run timeout; retry.
    Timeout,
    /// The same error has recurred across recent runs; pause and notify.
    Persistent,
    /// Recent runs have failed with differing errors; retry.
    Transient,
    /// No recent history to pattern-match against; retry.
    Unknown,
}

impl Diagnosis {
    /// One-line human-readable summary for the chat notification.
    pub fn description(&self) -> &'static str {
        match self {
            Diagnosis::Orphaned => "the task's chat no longer exists",
            Diagnosis::RateLimited => "the agent hit a rate limit",
            Diagnosis::Timeout => "the run exceeded its timeout",
            Diagnosis::Persistent => "the same error has recurred across recent runs",
            Diagnosis::Transient => "recent runs have failed with differing errors",
            Diagnosis::Unknown => "the cause could not be classified",
        }
    }

    /// Recommended next action, for the same notification.
    pub fn recommendation(&self) -> &'static str {
        match self {
            Diagnosis::Orphaned => "the task has been deactivated",
            Diagnosis::RateLimited => "retrying with the longest backoff",
            Diagnosis::Timeout => "consider increasing the task's timeout",
            Diagnosis::Persistent => "the task has been paused; fix the underlying error and resume it",
            Diagnosis::Transient => "retrying",
            Diagnosis::Unknown => "retrying",
        }
    }
}

fn orphaned_pattern() -> &'static RegexSet {
    static SET: std::sync::OnceLock<RegexSet> = std::sync::OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([r"(?i)group not found", r"(?i)chat not found"]).expect("valid pattern set")
    })
}

fn rate_limited_pattern() -> &'static RegexSet {
    static SET: std::sync::OnceLock<RegexSet> = std::sync::OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            r"(?i)rate limit",
            r"429",
            r"(?i)too many requests",
            r"(?i)api error",
        ])
        .expect("valid pattern set")
    })
}

fn timeout_pattern() -> &'static RegexSet {
    static SET: std::sync::OnceLock<RegexSet> = std::sync::OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([r"(?i)timeout", r"(?i)timed out", r"(?i)idle timeout"])
            .expect("valid pattern set")
    })
}

/// Normalize an error string for identical-error comparison: lowercase
/// and collapse runs of whitespace, ignoring leading/trailing context
/// that often carries a timestamp or request id.
fn normalize(error: &str) -> String {
    error.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Diagnose a failure given the current error and the N most recent
/// errors from the task's run log (oldest first, current run excluded).
pub fn diagnose(current_error: &str, recent_errors: &[String]) -> Diagnosis {
    if orphaned_pattern().is_match(current_error) {
        return Diagnosis::Orphaned;
    }
    if rate_limited_pattern().is_match(current_error) {
        return Diagnosis::RateLimited;
    }
    if timeout_pattern().is_match(current_error) {
        return Diagnosis::Timeout;
    }

    if recent_errors.len() >= 2 {
        let current_norm = normalize(current_error);
        let all_identical = recent_errors.iter().all(|e| normalize(e) == current_norm);
        if all_identical {
            return Diagnosis::Persistent;
        }
        return Diagnosis::Transient;
    }

    Diagnosis::Unknown
}
