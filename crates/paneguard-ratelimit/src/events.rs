use paneguard_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Observability events emitted by the rate-limit tracker.
#[derive(Debug, Clone)]
pub enum RateLimitEvent {
    /// A rate-limit response was recorded and the learned delay grew.
    RateLimitObserved {
        provider: String,
        timestamp: Instant,
        learned_delay: Duration,
    },
    /// A success was recorded while a provider had learned delay, and
    /// the delay was decayed.
    DelayDecayed {
        provider: String,
        timestamp: Instant,
        learned_delay: Duration,
    },
    /// A provider entered an explicit cooldown window.
    CooldownStarted {
        provider: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// A provider's cooldown was cleared, manually or by expiry.
    CooldownCleared {
        provider: String,
        timestamp: Instant,
    },
}

impl RateLimitEvent {
    pub fn provider(&self) -> &str {
        match self {
            RateLimitEvent::RateLimitObserved { provider, .. }
            | RateLimitEvent::DelayDecayed { provider, .. }
            | RateLimitEvent::CooldownStarted { provider, .. }
            | RateLimitEvent::CooldownCleared { provider, .. } => provider,
        }
    }
}

impl ResilienceEvent for RateLimitEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimitEvent::RateLimitObserved { .. } => "rate_limit_observed",
            RateLimitEvent::DelayDecayed { .. } => "delay_decayed",
            RateLimitEvent::CooldownStarted { .. } => "cooldown_started",
            RateLimitEvent::CooldownCleared { .. } => "cooldown_cleared",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimitEvent::RateLimitObserved { timestamp, .. }
            | RateLimitEvent::DelayDecayed { timestamp, .. }
            | RateLimitEvent::CooldownStarted { timestamp, .. }
            | RateLimitEvent::CooldownCleared { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        self.provider()
    }
}
