//! Failure modes intrinsic to the rate-limit tracker: persistence I/O and
//! malformed on-disk state. Classification and tracking themselves never
//! fail — only loading/saving touches the filesystem.

use thiserror::Error;

/// Errors returned by [`crate::tracker::RateLimitTracker::load_from_dir`] and
/// [`crate::tracker::RateLimitTracker::save_to_dir`].
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Reading or writing the persisted state file failed.
    #[error("rate-limit state I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The persisted state file was not valid JSON or did not match the
    /// expected shape.
    #[error("rate-limit state at {path} is not valid JSON: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
