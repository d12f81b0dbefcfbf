use paneguard_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by [`crate::CodexThrottle`] as its phase machine advances.
#[derive(Debug, Clone)]
pub enum CodexThrottleEvent {
    /// `normal` → `paused`: a rate limit was observed.
    Paused {
        timestamp: Instant,
        pane_id: String,
        cooldown: Duration,
        allowed_concurrent: usize,
    },
    /// `paused` → `recovering`: the cooldown window elapsed.
    RecoveryStarted {
        timestamp: Instant,
        allowed_concurrent: usize,
    },
    /// `recovering` → `normal`: the admission window reached its ceiling.
    Recovered { timestamp: Instant },
}

impl CodexThrottleEvent {
    fn kind(&self) -> &'static str {
        match self {
            CodexThrottleEvent::Paused { .. } => "codex_throttle.paused",
            CodexThrottleEvent::RecoveryStarted { .. } => "codex_throttle.recovery_started",
            CodexThrottleEvent::Recovered { .. } => "codex_throttle.recovered",
        }
    }
}

impl ResilienceEvent for CodexThrottleEvent {
    fn event_type(&self) -> &'static str {
        self.kind()
    }

    fn timestamp(&self) -> Instant {
        match self {
            CodexThrottleEvent::Paused { timestamp, .. } => *timestamp,
            CodexThrottleEvent::RecoveryStarted { timestamp, .. } => *timestamp,
            CodexThrottleEvent::Recovered { timestamp } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        self.kind()
    }
}
