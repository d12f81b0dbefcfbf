//! Pulls a retry hint out of raw error text or process exit status, so
//! callers of the tracker do not have to parse provider-specific error
//! shapes themselves.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// One wait-seconds pattern tried in priority order. `scale` converts a
/// minute-denominated capture (e.g. "retry in 2 minutes") to seconds.
struct WaitPattern {
    regex: LazyLock<Regex>,
    scale: f64,
}

macro_rules! wait_pattern {
    ($re:expr, $scale:expr) => {
        WaitPattern {
            regex: LazyLock::new(|| Regex::new($re).unwrap()),
            scale: $scale,
        }
    };
}

static WAIT_PATTERNS: &[WaitPattern] = &[
    wait_pattern!(r"(?i)retry-after:?\s*(\d+(?:\.\d+)?)", 1.0),
    wait_pattern!(r"(?i)try again in\s*(\d+(?:\.\d+)?)\s*s", 1.0),
    wait_pattern!(r"(?i)wait\s*(\d+(?:\.\d+)?)\s*seconds", 1.0),
    wait_pattern!(r"(?i)retry in\s*(\d+(?:\.\d+)?)\s*m(?:in(?:ute)?s?)?", 60.0),
    wait_pattern!(r"(?i)retry in\s*(\d+(?:\.\d+)?)\s*s(?:ec(?:ond)?s?)?", 1.0),
    wait_pattern!(r"(?i)(\d+(?:\.\d+)?)\s*seconds? cooldown", 1.0),
    wait_pattern!(r"(?i)rate.?limit.{0,20}?(\d+(?:\.\d+)?)\s*s\b", 1.0),
];

static RATE_LIMIT_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)rate.?limit|too many requests|quota exceeded|throttled").unwrap()
});

static EXIT_CODE_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)exit (?:code|status)\D{0,5}(\d+)").unwrap());

const RATE_LIMIT_EXIT_CODE: i32 = 429;

/// Evidence extracted from an error message and/or process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RateLimitDetection {
    pub rate_limited: bool,
    pub wait_seconds: Option<f64>,
    pub exit_code: Option<i32>,
}

/// Extracts a "wait N seconds" hint from raw output, trying each pattern
/// in priority order and returning the first match, scaled to seconds.
pub fn extract_wait_seconds(text: &str) -> Option<f64> {
    for pattern in WAIT_PATTERNS {
        if let Some(caps) = pattern.regex.captures(text) {
            if let Ok(value) = caps[1].parse::<f64>() {
                return Some(value * pattern.scale);
            }
        }
    }
    None
}

/// Extracts an exit code mentioned in free-form text (e.g. `"exit code
/// 429"`), independent of whatever exit code the caller's process itself
/// observed.
pub fn extract_exit_code(text: &str) -> Option<i32> {
    EXIT_CODE_TEXT
        .captures(text)
        .and_then(|caps| caps[1].parse::<i32>().ok())
}

/// Composes the text and exit-code signals into a single detection. An
/// observed process exit code of 429 short-circuits to detected;
/// otherwise the message text (including any exit code mentioned within
/// it) is consulted.
pub fn detect(message: &str, process_exit_code: Option<i32>) -> RateLimitDetection {
    if process_exit_code == Some(RATE_LIMIT_EXIT_CODE) {
        return RateLimitDetection {
            rate_limited: true,
            wait_seconds: extract_wait_seconds(message),
            exit_code: process_exit_code,
        };
    }

    let text_exit_code = extract_exit_code(message);
    let rate_limited =
        RATE_LIMIT_TEXT.is_match(message) || text_exit_code == Some(RATE_LIMIT_EXIT_CODE);

    RateLimitDetection {
        rate_limited,
        wait_seconds: extract_wait_seconds(message),
        exit_code: process_exit_code.or(text_exit_code),
    }
}

/// Extracts a wait-seconds hint as a [`Duration`], for callers that want
/// to feed it straight into
/// [`crate::tracker::RateLimitTracker::record_rate_limit_with_cooldown`].
pub fn wait_duration(text: &str) -> Option<Duration> {
    extract_wait_seconds(text).map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_429_status() {
        let result = detect("HTTP 429 Too Many Requests", None);
        assert!(result.rate_limited);
    }

    #[test]
    fn exit_code_429_short_circuits() {
        let result = detect("connection reset", Some(429));
        assert!(result.rate_limited);
        assert_eq!(result.exit_code, Some(429));
    }

    #[test]
    fn extracts_retry_after_seconds() {
        let result = detect("rate limit exceeded. retry-after: 30", None);
        assert!(result.rate_limited);
        assert_eq!(result.wait_seconds, Some(30.0));
    }

    #[test]
    fn extracts_try_again_in_seconds() {
        let result = detect("please try again in 15s", None);
        assert_eq!(result.wait_seconds, Some(15.0));
    }

    #[test]
    fn extracts_wait_seconds_phrase() {
        let result = detect("wait 45 seconds before retrying", None);
        assert_eq!(result.wait_seconds, Some(45.0));
    }

    #[test]
    fn extracts_retry_in_minutes_scaled() {
        let result = detect("retry in 2 minutes", None);
        assert_eq!(result.wait_seconds, Some(120.0));
    }

    #[test]
    fn extracts_cooldown_phrase() {
        let result = detect("60 seconds cooldown in effect", None);
        assert_eq!(result.wait_seconds, Some(60.0));
    }

    #[test]
    fn no_hit_on_unrelated_error() {
        let result = detect("connection refused", Some(1));
        assert!(!result.rate_limited);
        assert_eq!(result.wait_seconds, None);
    }

    #[test]
    fn wait_duration_converts_to_duration() {
        assert_eq!(
            wait_duration("retry-after: 10"),
            Some(Duration::from_secs(10))
        );
    }
}
