//! Admission control here never fails in the `Result` sense — callers are
//! told `true`/`false` (non-blocking) or `Admitted`/`Cancelled` (blocking).
//! This module exists for the one genuinely fallible corner: configuring an
//! agent type with a cap of zero and ramp-up disabled, which would make it
//! permanently un-admittable and is rejected at build time.

use thiserror::Error;

/// Errors building an [`crate::AgentCapsConfig`].
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// An agent type was configured with `max_concurrent = 0` while
    /// ramp-up is disabled, so no slot would ever be admittable.
    #[error("agent type {agent_type:?} has max_concurrent = 0 with ramp-up disabled")]
    ZeroCapacity { agent_type: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_agent_type() {
        let err = ConfigError::ZeroCapacity {
            agent_type: "cod".to_string(),
        };
        assert!(err.to_string().contains("cod"));
    }
}
