use crate::resource_error::ResourceErrorKind;
use paneguard_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by [`crate::BackoffController`] as jobs retry and as the
/// global scheduler pause starts, extends, and ends.
#[derive(Debug, Clone)]
pub enum BackoffEvent {
    /// A job was told to retry after `delay`.
    Retry {
        timestamp: Instant,
        job_id: String,
        attempt: u32,
        delay: Duration,
        kind: ResourceErrorKind,
    },
    /// A job exhausted its retry budget.
    RetryExhausted {
        timestamp: Instant,
        job_id: String,
        attempts: u32,
    },
    /// Consecutive failures crossed the threshold; the scheduler was paused.
    GlobalBackoffStarted {
        timestamp: Instant,
        until: Instant,
        consecutive_failures: u32,
    },
    /// A further failure during an active pause pushed `until` out.
    GlobalBackoffExtended { timestamp: Instant, until: Instant },
    /// The pause elapsed (or a success ended it early) and the scheduler
    /// resumed.
    GlobalBackoffEnded { timestamp: Instant },
}

impl BackoffEvent {
    fn kind(&self) -> &'static str {
        match self {
            BackoffEvent::Retry { .. } => "backoff.retry",
            BackoffEvent::RetryExhausted { .. } => "backoff.retry_exhausted",
            BackoffEvent::GlobalBackoffStarted { .. } => "backoff.global_backoff_started",
            BackoffEvent::GlobalBackoffExtended { .. } => "backoff.global_backoff_extended",
            BackoffEvent::GlobalBackoffEnded { .. } => "backoff.global_backoff_ended",
        }
    }

    fn job_id(&self) -> &str {
        match self {
            BackoffEvent::Retry { job_id, .. } | BackoffEvent::RetryExhausted { job_id, .. } => job_id,
            BackoffEvent::GlobalBackoffStarted { .. }
            | BackoffEvent::GlobalBackoffExtended { .. }
            | BackoffEvent::GlobalBackoffEnded { .. } => "<scheduler>",
        }
    }
}

impl ResilienceEvent for BackoffEvent {
    fn event_type(&self) -> &'static str {
        self.kind()
    }

    fn timestamp(&self) -> Instant {
        match self {
            BackoffEvent::Retry { timestamp, .. }
            | BackoffEvent::RetryExhausted { timestamp, .. }
            | BackoffEvent::GlobalBackoffStarted { timestamp, .. }
            | BackoffEvent::GlobalBackoffExtended { timestamp, .. }
            | BackoffEvent::GlobalBackoffEnded { timestamp } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        self.job_id()
    }
}
