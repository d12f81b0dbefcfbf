use crate::events::BackoffEvent;
use paneguard_core::events::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// A one-way capability to pause and resume an external scheduler.
///
/// [`crate::BackoffController`] only ever calls `pause`/`resume` on this
/// trait; it never expects a call back into itself, so a `Pauser`
/// implementation must not take a lock the controller could itself be
/// waiting on.
pub trait Pauser: Send + Sync {
    fn pause(&self);
    fn resume(&self);
}

/// A [`Pauser`] that does nothing, for callers with no scheduler to pause.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPauser;

impl Pauser for NoopPauser {
    fn pause(&self) {}
    fn resume(&self) {}
}

/// A [`Pauser`] backed by a pair of closures.
pub struct FnPauser<P, R> {
    pause: P,
    resume: R,
}

impl<P, R> FnPauser<P, R>
where
    P: Fn() + Send + Sync,
    R: Fn() + Send + Sync,
{
    pub fn new(pause: P, resume: R) -> Self {
        Self { pause, resume }
    }
}

impl<P, R> Pauser for FnPauser<P, R>
where
    P: Fn() + Send + Sync,
    R: Fn() + Send + Sync,
{
    fn pause(&self) {
        (self.pause)()
    }

    fn resume(&self) {
        (self.resume)()
    }
}

/// Configuration for [`crate::BackoffController`].
pub struct BackoffConfig {
    pub(crate) initial_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) multiplier: f64,
    pub(crate) jitter_factor: f64,
    pub(crate) max_retries: u32,
    pub(crate) pause_queue_on_backoff: bool,
    pub(crate) consecutive_failures_threshold: u32,
    pub(crate) pauser: Arc<dyn Pauser>,
    pub(crate) event_listeners: EventListeners<BackoffEvent>,
}

impl BackoffConfig {
    /// Starts building a [`BackoffConfig`] from its defaults.
    pub fn builder() -> BackoffConfigBuilder {
        BackoffConfigBuilder::new()
    }

    pub(crate) fn emit(&self, event: &BackoffEvent) {
        self.event_listeners.emit(event);
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfigBuilder::default().build()
    }
}

/// Builder for [`BackoffConfig`].
pub struct BackoffConfigBuilder {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_factor: f64,
    max_retries: u32,
    pause_queue_on_backoff: bool,
    consecutive_failures_threshold: u32,
    pauser: Arc<dyn Pauser>,
    event_listeners: EventListeners<BackoffEvent>,
}

impl Default for BackoffConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - `initial_delay`: 500ms
    /// - `max_delay`: 60s
    /// - `multiplier`: 2.0
    /// - `jitter_factor`: 0.2
    /// - `max_retries`: 5
    /// - `pause_queue_on_backoff`: true
    /// - `consecutive_failures_threshold`: 5
    /// - `pauser`: [`NoopPauser`]
    pub fn new() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_factor: 0.2,
            max_retries: 5,
            pause_queue_on_backoff: true,
            consecutive_failures_threshold: 5,
            pauser: Arc::new(NoopPauser),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the un-jittered delay returned for the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Caps `CurrentDelay` so it never grows unbounded.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Growth factor applied to `CurrentDelay` after each retry.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Fraction of the base delay to jitter by, in `[0, 1]`.
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Maximum retry attempts before a job is told to give up.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Whether crossing `consecutive_failures_threshold` pauses the
    /// attached scheduler. Disable to compute delays without ever calling
    /// the [`Pauser`].
    pub fn pause_queue_on_backoff(mut self, enabled: bool) -> Self {
        self.pause_queue_on_backoff = enabled;
        self
    }

    /// Consecutive retryable failures (across all jobs) required to trigger
    /// a global pause.
    pub fn consecutive_failures_threshold(mut self, threshold: u32) -> Self {
        self.consecutive_failures_threshold = threshold;
        self
    }

    /// Sets the capability used to pause/resume the external scheduler.
    pub fn pauser(mut self, pauser: impl Pauser + 'static) -> Self {
        self.pauser = Arc::new(pauser);
        self
    }

    /// Registers a callback invoked when a job is told to retry.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BackoffEvent::Retry {
                job_id,
                attempt,
                delay,
                ..
            } = event
            {
                f(job_id, *attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback invoked when a job exhausts its retry budget.
    pub fn on_retry_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BackoffEvent::RetryExhausted { job_id, attempts, .. } = event {
                f(job_id, *attempts);
            }
        }));
        self
    }

    /// Registers a callback invoked when the global scheduler pause starts.
    pub fn on_backoff_start<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, BackoffEvent::GlobalBackoffStarted { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback invoked when the global scheduler pause ends.
    pub fn on_backoff_end<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, BackoffEvent::GlobalBackoffEnded { .. }) {
                f();
            }
        }));
        self
    }

    /// Builds the config.
    pub fn build(self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
            jitter_factor: self.jitter_factor,
            max_retries: self.max_retries,
            pause_queue_on_backoff: self.pause_queue_on_backoff,
            consecutive_failures_threshold: self.consecutive_failures_threshold,
            pauser: self.pauser,
            event_listeners: self.event_listeners,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_are_sane() {
        let config = BackoffConfig::default();
        assert_eq!(config.initial_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(60));
        assert_eq!(config.max_retries, 5);
        assert!(config.pause_queue_on_backoff);
    }

    #[test]
    fn jitter_factor_is_clamped_to_unit_interval() {
        let config = BackoffConfig::builder().jitter_factor(5.0).build();
        assert_eq!(config.jitter_factor, 1.0);

        let config = BackoffConfig::builder().jitter_factor(-5.0).build();
        assert_eq!(config.jitter_factor, 0.0);
    }

    #[test]
    fn custom_pauser_is_stored_and_callable_through_config() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let pauses = Arc::new(AtomicUsize::new(0));
        let resumes = Arc::new(AtomicUsize::new(0));
        let (p, r) = (pauses.clone(), resumes.clone());
        let config = BackoffConfig::builder()
            .pauser(FnPauser::new(
                move || {
                    p.fetch_add(1, Ordering::SeqCst);
                },
                move || {
                    r.fetch_add(1, Ordering::SeqCst);
                },
            ))
            .build();

        config.pauser.pause();
        config.pauser.resume();
        assert_eq!(pauses.load(Ordering::SeqCst), 1);
        assert_eq!(resumes.load(Ordering::SeqCst), 1);
    }
}
