//! Per-provider learned state.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// The state the tracker maintains for one canonical provider name.
///
/// `learned_delay` only ever grows via [`crate::tracker::RateLimitTracker::record_rate_limit`]
/// and only ever shrinks via repeated [`crate::tracker::RateLimitTracker::record_success`]
/// calls — there is no direct setter, so external callers cannot desync it
/// from the observations that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderState {
    pub provider: String,
    pub learned_delay: Duration,
    pub consecutive_successes: u32,
    pub last_rate_limit_at: Option<SystemTime>,
    pub cooldown_until: Option<SystemTime>,
    #[serde(default)]
    pub total_rate_limits: u64,
    #[serde(default)]
    pub total_successes: u64,
}

impl ProviderState {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            learned_delay: Duration::ZERO,
            consecutive_successes: 0,
            last_rate_limit_at: None,
            cooldown_until: None,
            total_rate_limits: 0,
            total_successes: 0,
        }
    }
}
