//! Pure classification of OS-level resource exhaustion and upstream
//! rate-limit signals from a syscall error, free-form error text, captured
//! stderr, and a process exit code.
//!
//! Every branch here is retryable by construction — the [`classify`]
//! function returns `None` for anything it doesn't recognize, which callers
//! should treat as an error to surface unchanged rather than retry blindly.

use std::io;
use std::time::SystemTime;

/// The resource conditions this module recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceErrorKind {
    /// `EAGAIN`/`EWOULDBLOCK`: a syscall, typically `fork`, would block.
    Eagain,
    /// `ENOMEM`: the kernel could not satisfy a memory allocation.
    Enomem,
    /// `ENFILE`: the system-wide open file table is full.
    Enfile,
    /// `EMFILE`: this process has hit its open file descriptor limit.
    Emfile,
    /// An upstream API rejected the request with a rate-limit signal.
    RateLimit,
}

/// A classified resource error, with enough context to decide retry policy
/// and to log a useful diagnostic.
#[derive(Debug, Clone)]
pub struct ResourceError {
    pub kind: ResourceErrorKind,
    pub retryable: bool,
    pub exit_code: Option<i32>,
    pub stderr_hint: Option<String>,
    pub timestamp: SystemTime,
}

const EAGAIN_PATTERNS: &[&str] = &[
    "resource temporarily unavailable",
    "eagain",
    "try again",
    "cannot allocate memory",
    "fork: retry",
    "fork failed",
    "cannot fork",
];

const ENOMEM_PATTERNS: &[&str] = &[
    "out of memory",
    "enomem",
    "memory allocation failed",
    "not enough memory",
    "insufficient memory",
];

const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rate limit",
    "too many requests",
    "quota exceeded",
    "429",
    "throttled",
];

const FILE_LIMIT_PATTERNS: &[&str] = &[
    "too many open files",
    "emfile",
    "enfile",
    "file table overflow",
];

fn matches_any(lower: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|pattern| lower.contains(pattern))
}

fn classify_text(lower: &str) -> Option<ResourceErrorKind> {
    if matches_any(lower, EAGAIN_PATTERNS) {
        return Some(ResourceErrorKind::Eagain);
    }
    if matches_any(lower, ENOMEM_PATTERNS) {
        return Some(ResourceErrorKind::Enomem);
    }
    if matches_any(lower, RATE_LIMIT_PATTERNS) {
        return Some(ResourceErrorKind::RateLimit);
    }
    if matches_any(lower, FILE_LIMIT_PATTERNS) {
        // "enfile" is system-wide, "emfile" is per-process; check the more
        // specific substring first since "file table overflow" alone is
        // ambiguous and defaults to the per-process kind.
        return Some(if lower.contains("enfile") {
            ResourceErrorKind::Enfile
        } else {
            ResourceErrorKind::Emfile
        });
    }
    None
}

fn classify_io_error(err: &io::Error) -> Option<ResourceErrorKind> {
    match err.kind() {
        io::ErrorKind::WouldBlock => return Some(ResourceErrorKind::Eagain),
        io::ErrorKind::OutOfMemory => return Some(ResourceErrorKind::Enomem),
        _ => {}
    }
    match err.raw_os_error() {
        Some(23) => Some(ResourceErrorKind::Enfile), // ENFILE on Linux
        Some(24) => Some(ResourceErrorKind::Emfile), // EMFILE on Linux
        _ => None,
    }
}

fn classify_exit_code(code: i32) -> Option<ResourceErrorKind> {
    match code {
        11 => Some(ResourceErrorKind::Eagain),
        12 => Some(ResourceErrorKind::Enomem),
        137 => Some(ResourceErrorKind::Enomem), // OOM-killed: 128 + SIGKILL(9)
        _ => None,
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Classifies a process failure into a [`ResourceError`], or `None` if none
/// of the recognized resource-exhaustion or rate-limit conditions apply.
///
/// Inspects, in order: the syscall error behind `source`, the lower-cased
/// `message`, the lower-cased `stderr` (recording a truncated hint on
/// match), and finally `exit_code` shortcuts.
pub fn classify(
    message: &str,
    source: Option<&io::Error>,
    stderr: Option<&str>,
    exit_code: Option<i32>,
    now: SystemTime,
) -> Option<ResourceError> {
    if let Some(kind) = source.and_then(classify_io_error) {
        return Some(ResourceError {
            kind,
            retryable: true,
            exit_code,
            stderr_hint: None,
            timestamp: now,
        });
    }

    if let Some(kind) = classify_text(&message.to_lowercase()) {
        return Some(ResourceError {
            kind,
            retryable: true,
            exit_code,
            stderr_hint: None,
            timestamp: now,
        });
    }

    if let Some(stderr_text) = stderr {
        if let Some(kind) = classify_text(&stderr_text.to_lowercase()) {
            return Some(ResourceError {
                kind,
                retryable: true,
                exit_code,
                stderr_hint: Some(truncate_chars(stderr_text, 200)),
                timestamp: now,
            });
        }
    }

    if let Some(kind) = exit_code.and_then(classify_exit_code) {
        return Some(ResourceError {
            kind,
            retryable: true,
            exit_code,
            stderr_hint: None,
            timestamp: now,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> SystemTime {
        SystemTime::UNIX_EPOCH
    }

    #[test]
    fn io_error_would_block_classifies_as_eagain() {
        let err = io::Error::from(io::ErrorKind::WouldBlock);
        let result = classify("spawn failed", Some(&err), None, None, now()).unwrap();
        assert_eq!(result.kind, ResourceErrorKind::Eagain);
        assert!(result.retryable);
    }

    #[test]
    fn io_error_out_of_memory_classifies_as_enomem() {
        let err = io::Error::from(io::ErrorKind::OutOfMemory);
        let result = classify("alloc failed", Some(&err), None, None, now()).unwrap();
        assert_eq!(result.kind, ResourceErrorKind::Enomem);
    }

    #[test]
    fn message_pattern_family_matches_case_insensitively() {
        let result = classify("Resource Temporarily Unavailable", None, None, None, now()).unwrap();
        assert_eq!(result.kind, ResourceErrorKind::Eagain);
    }

    #[test]
    fn rate_limit_message_is_classified() {
        let result = classify("upstream returned: rate limit exceeded", None, None, None, now()).unwrap();
        assert_eq!(result.kind, ResourceErrorKind::RateLimit);
    }

    #[test]
    fn file_limit_patterns_distinguish_emfile_from_enfile() {
        let per_process = classify("too many open files (emfile)", None, None, None, now()).unwrap();
        assert_eq!(per_process.kind, ResourceErrorKind::Emfile);

        let system_wide = classify("enfile: file table overflow", None, None, None, now()).unwrap();
        assert_eq!(system_wide.kind, ResourceErrorKind::Enfile);
    }

    #[test]
    fn stderr_match_records_truncated_hint() {
        let long_stderr = format!("eagain: {}", "x".repeat(500));
        let result = classify("unrelated", None, Some(&long_stderr), None, now()).unwrap();
        assert_eq!(result.kind, ResourceErrorKind::Eagain);
        assert_eq!(result.stderr_hint.unwrap().chars().count(), 200);
    }

    #[test]
    fn exit_code_shortcuts_classify_without_any_text_match() {
        assert_eq!(
            classify("", None, None, Some(11), now()).unwrap().kind,
            ResourceErrorKind::Eagain
        );
        assert_eq!(
            classify("", None, None, Some(12), now()).unwrap().kind,
            ResourceErrorKind::Enomem
        );
        assert_eq!(
            classify("", None, None, Some(137), now()).unwrap().kind,
            ResourceErrorKind::Enomem
        );
    }

    #[test]
    fn unrecognized_error_classifies_as_none() {
        assert!(classify("segmentation fault", None, None, Some(139), now()).is_none());
    }

    #[test]
    fn message_match_takes_priority_over_exit_code() {
        let result = classify("too many requests", None, None, Some(11), now()).unwrap();
        assert_eq!(result.kind, ResourceErrorKind::RateLimit);
    }
}
