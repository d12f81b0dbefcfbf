//! A shared, composable error envelope used by the facade crate to unify
//! errors across subsystems, in the spirit of a single `?`-friendly type
//! instead of one bespoke error enum per call site.

use std::fmt;
use std::time::Duration;

/// Unified error type across the admission-control subsystems.
///
/// Each subsystem crate defines its own narrow error enum for the failure
/// modes intrinsic to it (see `paneguard_ratelimit::RateLimitError`,
/// `paneguard_agent_caps::ConfigError`); `CoreError` exists only for
/// callers that want to handle every subsystem uniformly, e.g. the facade
/// crate. It is not used internally by any single-subsystem crate.
/// Agent Caps' admission path itself is infallible — rejection and
/// cancellation are reported as plain `bool`/`AcquireOutcome` values, not a
/// `Result` — so `CapacityExceeded` and `Cancelled` below are populated by
/// callers translating those outcomes, not raised internally.
#[derive(Debug, Clone)]
pub enum CoreError<E = std::convert::Infallible> {
    /// Agent Caps rejected an admission request because the relevant cap
    /// (per-type or global) is saturated.
    CapacityExceeded {
        /// The agent type the admission was for.
        agent_type: String,
        /// The effective cap in force at rejection time.
        current_cap: usize,
    },
    /// A blocking `acquire` observed the caller's cancellation signal.
    Cancelled,
    /// The upstream provider is rate-limiting the caller; retry after the
    /// given duration if present.
    RateLimited {
        /// Hint for how long to wait before retrying, if known.
        retry_after: Option<Duration>,
    },
    /// The global scheduler backoff is currently active.
    GlobalBackoffActive {
        /// Time remaining until the backoff lifts.
        remaining: Duration,
    },
    /// An application-level error that did not originate in this core.
    Application(E),
}

impl<E: fmt::Display> fmt::Display for CoreError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::CapacityExceeded {
                agent_type,
                current_cap,
            } => write!(
                f,
                "agent cap exceeded for {agent_type}: current cap is {current_cap}"
            ),
            CoreError::Cancelled => write!(f, "admission wait was cancelled"),
            CoreError::RateLimited { retry_after } => match retry_after {
                Some(d) => write!(f, "rate limited, retry after {d:?}"),
                None => write!(f, "rate limited"),
            },
            CoreError::GlobalBackoffActive { remaining } => {
                write!(f, "global backoff active for another {remaining:?}")
            }
            CoreError::Application(e) => write!(f, "{e}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for CoreError<E> {}

impl<E> CoreError<E> {
    /// True if this is a [`CoreError::CapacityExceeded`].
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, CoreError::CapacityExceeded { .. })
    }

    /// True if this is a [`CoreError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Cancelled)
    }

    /// True if this is a [`CoreError::RateLimited`].
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CoreError::RateLimited { .. })
    }

    /// True if this is a [`CoreError::Application`].
    pub fn is_application(&self) -> bool {
        matches!(self, CoreError::Application(_))
    }

    /// Extracts the wrapped application error, if any.
    pub fn application_error(self) -> Option<E> {
        match self {
            CoreError::Application(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_match_variants() {
        let e: CoreError<String> = CoreError::CapacityExceeded {
            agent_type: "cod".into(),
            current_cap: 2,
        };
        assert!(e.is_capacity_exceeded());
        assert!(!e.is_cancelled());

        let e: CoreError<String> = CoreError::Cancelled;
        assert!(e.is_cancelled());

        let e: CoreError<String> = CoreError::Application("boom".into());
        assert!(e.is_application());
        assert_eq!(e.application_error(), Some("boom".to_string()));
    }

    #[test]
    fn display_is_human_readable() {
        let e: CoreError<String> = CoreError::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        };
        assert!(e.to_string().contains("30s") || e.to_string().contains("retry after"));
    }
}
