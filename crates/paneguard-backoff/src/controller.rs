use crate::config::BackoffConfig;
use crate::events::BackoffEvent;
use crate::resource_error::ResourceError;
use paneguard_core::clock::{Clock, SharedClock, SystemClock};
use paneguard_core::rng::{Jitter, SharedJitter, ThreadRngJitter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

#[cfg(feature = "metrics")]
use metrics::gauge;

/// Point-in-time view of the controller's bookkeeping.
#[derive(Debug, Clone)]
pub struct BackoffStats {
    pub consecutive_failures: u32,
    pub current_delay: Duration,
    pub global_backoff_active: bool,
    pub global_backoff_remaining: Duration,
}

struct Inner {
    consecutive_failures: u32,
    current_delay: Duration,
    global_backoff_until: Option<Instant>,
    /// Duration the resumer task should currently sleep for; re-read on
    /// every loop iteration so an extension takes effect without spawning
    /// a second resumer.
    global_backoff_wait: Duration,
}

struct Shared {
    config: BackoffConfig,
    clock: SharedClock,
    jitter: SharedJitter,
    global_backoff_active: AtomicBool,
    backoff_notify: Notify,
    inner: Mutex<Inner>,
}

/// Computes jittered exponential retry delays and triggers a system-wide
/// scheduler pause once consecutive failures cross a threshold.
///
/// Cheap to clone; clones share the same underlying state. At most one
/// background resumer task runs at a time regardless of how many times a
/// global backoff is re-triggered while already active.
#[derive(Clone)]
pub struct BackoffController {
    shared: Arc<Shared>,
}

impl BackoffController {
    /// Creates a controller backed by the real clock and `rand::thread_rng`.
    pub fn new(config: BackoffConfig) -> Self {
        Self::with_clock_and_jitter(config, Arc::new(SystemClock), Arc::new(ThreadRngJitter))
    }

    /// Creates a controller with an injectable clock, for deterministic
    /// tests of the delay curve and the global-backoff resumer.
    pub fn with_clock(config: BackoffConfig, clock: SharedClock) -> Self {
        Self::with_clock_and_jitter(config, clock, Arc::new(ThreadRngJitter))
    }

    /// Creates a controller with both an injectable clock and jitter
    /// source, for fully deterministic tests.
    pub fn with_clock_and_jitter(config: BackoffConfig, clock: SharedClock, jitter: SharedJitter) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            shared: Arc::new(Shared {
                config,
                clock,
                jitter,
                global_backoff_active: AtomicBool::new(false),
                backoff_notify: Notify::new(),
                inner: Mutex::new(Inner {
                    consecutive_failures: 0,
                    current_delay: initial_delay,
                    global_backoff_until: None,
                    global_backoff_wait: Duration::ZERO,
                }),
            }),
        }
    }

    /// Handles a classified resource error for `job_id`, currently at retry
    /// attempt `retry_count` (0-indexed, i.e. the count of attempts already
    /// made before this one). Returns whether the caller should retry and,
    /// if so, after how long.
    pub fn handle_error(&self, job_id: &str, retry_count: u32, error: &ResourceError) -> (bool, Duration) {
        let now = self.shared.clock.now();

        if retry_count >= self.shared.config.max_retries {
            self.shared.config.emit(&BackoffEvent::RetryExhausted {
                timestamp: now,
                job_id: job_id.to_string(),
                attempts: retry_count,
            });
            return (false, Duration::ZERO);
        }

        let delay = {
            let mut inner = self.shared.inner.lock().unwrap();
            let base = inner.current_delay;

            let span = base.as_secs_f64() * self.shared.config.jitter_factor;
            let jitter = self.shared.jitter.uniform(-span, span);
            let delay = Duration::from_secs_f64((base.as_secs_f64() + jitter).max(0.1));

            let next = (base.as_secs_f64() * self.shared.config.multiplier).min(self.shared.config.max_delay.as_secs_f64());
            inner.current_delay = Duration::from_secs_f64(next);
            inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

            delay
        };

        #[cfg(feature = "metrics")]
        gauge!("backoff_current_delay_seconds").set(self.shared.inner.lock().unwrap().current_delay.as_secs_f64());

        self.shared.config.emit(&BackoffEvent::Retry {
            timestamp: now,
            job_id: job_id.to_string(),
            attempt: retry_count,
            delay,
            kind: error.kind,
        });

        self.maybe_trigger_global_backoff(delay);

        (true, delay)
    }

    /// Resets the consecutive-failure counter and `CurrentDelay`, and ends
    /// any active global backoff immediately.
    pub fn record_success(&self) {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.consecutive_failures = 0;
            inner.current_delay = self.shared.config.initial_delay;
        }
        self.shared.backoff_notify.notify_one();
        end_global_backoff(&self.shared);
    }

    /// Cheap, lock-free check of whether a global scheduler pause is active.
    pub fn is_in_global_backoff(&self) -> bool {
        self.shared.global_backoff_active.load(Ordering::SeqCst)
    }

    /// Time remaining until the active global backoff ends, or zero if none
    /// is active.
    pub fn remaining_backoff(&self) -> Duration {
        if !self.is_in_global_backoff() {
            return Duration::ZERO;
        }
        let now = self.shared.clock.now();
        let inner = self.shared.inner.lock().unwrap();
        inner
            .global_backoff_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Returns a snapshot of the controller's current bookkeeping.
    pub fn stats(&self) -> BackoffStats {
        let now = self.shared.clock.now();
        let inner = self.shared.inner.lock().unwrap();
        BackoffStats {
            consecutive_failures: inner.consecutive_failures,
            current_delay: inner.current_delay,
            global_backoff_active: self.shared.global_backoff_active.load(Ordering::SeqCst),
            global_backoff_remaining: inner
                .global_backoff_until
                .map(|until| until.saturating_duration_since(now))
                .unwrap_or(Duration::ZERO),
        }
    }

    /// Drops all accumulated state: failure count, current delay, and any
    /// active global backoff (resuming the scheduler without emitting the
    /// `onBackoffEnd` hook, mirroring a hard reset rather than a natural
    /// end).
    pub fn reset(&self) {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.consecutive_failures = 0;
            inner.current_delay = self.shared.config.initial_delay;
            inner.global_backoff_until = None;
        }
        self.shared.backoff_notify.notify_one();
        if self.shared.global_backoff_active.swap(false, Ordering::SeqCst) {
            self.shared.config.pauser.resume();
        }
    }

    fn maybe_trigger_global_backoff(&self, delay: Duration) {
        let now = self.shared.clock.now();
        let mut inner = self.shared.inner.lock().unwrap();

        if inner.consecutive_failures < self.shared.config.consecutive_failures_threshold
            || !self.shared.config.pause_queue_on_backoff
        {
            return;
        }

        let candidate_until = now + delay;

        if self.shared.global_backoff_active.load(Ordering::SeqCst) {
            let extended_until = match inner.global_backoff_until {
                Some(existing) => candidate_until.max(existing),
                None => candidate_until,
            };
            inner.global_backoff_until = Some(extended_until);
            inner.global_backoff_wait = extended_until.saturating_duration_since(now);
            self.shared.backoff_notify.notify_one();
            self.shared.config.emit(&BackoffEvent::GlobalBackoffExtended {
                timestamp: now,
                until: extended_until,
            });
            return;
        }

        inner.global_backoff_until = Some(candidate_until);
        inner.global_backoff_wait = delay;
        self.shared.global_backoff_active.store(true, Ordering::SeqCst);
        self.shared.config.pauser.pause();

        self.shared.config.emit(&BackoffEvent::GlobalBackoffStarted {
            timestamp: now,
            until: candidate_until,
            consecutive_failures: inner.consecutive_failures,
        });

        drop(inner);
        self.spawn_resumer();
    }

    fn spawn_resumer(&self) {
        let shared = self.shared.clone();
        tokio::spawn(async move {
            loop {
                if !shared.global_backoff_active.load(Ordering::SeqCst) {
                    return;
                }
                let wait = shared.inner.lock().unwrap().global_backoff_wait;
                tokio::select! {
                    _ = tokio::time::sleep(wait) => break,
                    _ = shared.backoff_notify.notified() => continue,
                }
            }
            end_global_backoff(&shared);
        });
    }
}

fn end_global_backoff(shared: &Arc<Shared>) {
    if shared.global_backoff_active.swap(false, Ordering::SeqCst) {
        let now = shared.clock.now();
        {
            let mut inner = shared.inner.lock().unwrap();
            inner.global_backoff_until = None;
        }
        shared.config.pauser.resume();
        shared.config.emit(&BackoffEvent::GlobalBackoffEnded { timestamp: now });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_error::ResourceErrorKind;
    use paneguard_core::clock::FixedClock;
    use paneguard_core::rng::ZeroJitter;
    use std::sync::atomic::AtomicUsize;
    use std::time::SystemTime;

    fn resource_error(kind: ResourceErrorKind) -> ResourceError {
        ResourceError {
            kind,
            retryable: true,
            exit_code: None,
            stderr_hint: None,
            timestamp: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn handle_error_returns_base_delay_with_zero_jitter() {
        let controller = BackoffController::with_clock_and_jitter(
            BackoffConfig::builder().initial_delay(Duration::from_secs(1)).build(),
            Arc::new(FixedClock::new()),
            Arc::new(ZeroJitter),
        );
        let (should_retry, delay) = controller.handle_error("job-1", 0, &resource_error(ResourceErrorKind::Eagain));
        assert!(should_retry);
        assert_eq!(delay, Duration::from_secs(1));
    }

    #[test]
    fn current_delay_grows_multiplicatively_and_caps_at_max_delay() {
        let controller = BackoffController::with_clock_and_jitter(
            BackoffConfig::builder()
                .initial_delay(Duration::from_secs(1))
                .multiplier(2.0)
                .max_delay(Duration::from_secs(3))
                .max_retries(10)
                .build(),
            Arc::new(FixedClock::new()),
            Arc::new(ZeroJitter),
        );

        let (_, d1) = controller.handle_error("job", 0, &resource_error(ResourceErrorKind::Eagain));
        let (_, d2) = controller.handle_error("job", 1, &resource_error(ResourceErrorKind::Eagain));
        let (_, d3) = controller.handle_error("job", 2, &resource_error(ResourceErrorKind::Eagain));
        let (_, d4) = controller.handle_error("job", 3, &resource_error(ResourceErrorKind::Eagain));

        assert_eq!(d1, Duration::from_secs(1));
        assert_eq!(d2, Duration::from_secs(2));
        assert_eq!(d3, Duration::from_secs(3));
        assert_eq!(d4, Duration::from_secs(3)); // capped
    }

    #[test]
    fn delay_never_drops_below_one_hundred_milliseconds() {
        let controller = BackoffController::with_clock_and_jitter(
            BackoffConfig::builder()
                .initial_delay(Duration::from_millis(10))
                .jitter_factor(1.0)
                .build(),
            Arc::new(FixedClock::new()),
            Arc::new(ZeroJitter),
        );
        let (_, delay) = controller.handle_error("job", 0, &resource_error(ResourceErrorKind::Eagain));
        assert!(delay >= Duration::from_millis(100));
    }

    #[test]
    fn retry_exhaustion_returns_false_and_zero_without_mutating_delay() {
        let controller = BackoffController::with_clock_and_jitter(
            BackoffConfig::builder().max_retries(2).build(),
            Arc::new(FixedClock::new()),
            Arc::new(ZeroJitter),
        );
        let (should_retry, delay) = controller.handle_error("job", 2, &resource_error(ResourceErrorKind::Enomem));
        assert!(!should_retry);
        assert_eq!(delay, Duration::ZERO);
        assert_eq!(controller.stats().consecutive_failures, 0);
    }

    #[test]
    fn on_retry_exhausted_hook_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let controller = BackoffController::new(
            BackoffConfig::builder()
                .max_retries(1)
                .on_retry_exhausted(move |_job, _attempts| {
                    f.fetch_add(1, Ordering::SeqCst);
                })
                .build(),
        );
        controller.handle_error("job", 1, &resource_error(ResourceErrorKind::Eagain));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn record_success_resets_failures_and_delay() {
        let controller = BackoffController::with_clock_and_jitter(
            BackoffConfig::builder().initial_delay(Duration::from_secs(1)).multiplier(2.0).build(),
            Arc::new(FixedClock::new()),
            Arc::new(ZeroJitter),
        );
        controller.handle_error("job", 0, &resource_error(ResourceErrorKind::Eagain));
        assert_eq!(controller.stats().consecutive_failures, 1);

        controller.record_success();
        let stats = controller.stats();
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.current_delay, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn global_backoff_pauses_then_resumes_exactly_once() {
        let pauses = Arc::new(AtomicUsize::new(0));
        let resumes = Arc::new(AtomicUsize::new(0));
        let (p, r) = (pauses.clone(), resumes.clone());

        let clock = Arc::new(FixedClock::new());
        let controller = BackoffController::with_clock_and_jitter(
            BackoffConfig::builder()
                .initial_delay(Duration::from_secs(1))
                .multiplier(1.0)
                .consecutive_failures_threshold(3)
                .max_retries(10)
                .pauser(crate::config::FnPauser::new(
                    move || {
                        p.fetch_add(1, Ordering::SeqCst);
                    },
                    move || {
                        r.fetch_add(1, Ordering::SeqCst);
                    },
                ))
                .build(),
            clock.clone(),
            Arc::new(ZeroJitter),
        );

        controller.handle_error("a", 0, &resource_error(ResourceErrorKind::Eagain));
        controller.handle_error("b", 0, &resource_error(ResourceErrorKind::Eagain));
        assert_eq!(pauses.load(Ordering::SeqCst), 0);

        controller.handle_error("c", 0, &resource_error(ResourceErrorKind::Eagain));
        assert_eq!(pauses.load(Ordering::SeqCst), 1);
        assert!(controller.is_in_global_backoff());

        clock.advance(Duration::from_millis(1100));
        tokio::time::advance(Duration::from_millis(1100)).await;
        tokio::task::yield_now().await;

        assert!(!controller.is_in_global_backoff());
        assert_eq!(resumes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retrigger_during_active_backoff_extends_rather_than_stacks() {
        let pauses = Arc::new(AtomicUsize::new(0));
        let p = pauses.clone();

        let clock = Arc::new(FixedClock::new());
        let controller = BackoffController::with_clock_and_jitter(
            BackoffConfig::builder()
                .initial_delay(Duration::from_secs(2))
                .multiplier(1.0)
                .consecutive_failures_threshold(1)
                .max_retries(10)
                .pauser(crate::config::FnPauser::new(
                    move || {
                        p.fetch_add(1, Ordering::SeqCst);
                    },
                    || {},
                ))
                .build(),
            clock.clone(),
            Arc::new(ZeroJitter),
        );

        controller.handle_error("a", 0, &resource_error(ResourceErrorKind::Eagain));
        assert_eq!(pauses.load(Ordering::SeqCst), 1);
        assert!(controller.is_in_global_backoff());

        clock.advance(Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(controller.is_in_global_backoff(), "still within the first window");

        // A second failure arrives before the first window elapses; this
        // must extend the existing backoff, not spawn a second resumer.
        controller.handle_error("a", 1, &resource_error(ResourceErrorKind::Eagain));
        assert_eq!(pauses.load(Ordering::SeqCst), 1, "pause is only called once");

        clock.advance(Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(
            controller.is_in_global_backoff(),
            "extension should have pushed the end out further"
        );
    }

    #[tokio::test]
    async fn record_success_ends_active_backoff_promptly() {
        let resumes = Arc::new(AtomicUsize::new(0));
        let r = resumes.clone();

        let clock = Arc::new(FixedClock::new());
        let controller = BackoffController::with_clock_and_jitter(
            BackoffConfig::builder()
                .initial_delay(Duration::from_secs(300))
                .consecutive_failures_threshold(1)
                .pauser(crate::config::FnPauser::new(|| {}, move || {
                    r.fetch_add(1, Ordering::SeqCst);
                }))
                .build(),
            clock,
            Arc::new(ZeroJitter),
        );

        controller.handle_error("a", 0, &resource_error(ResourceErrorKind::Eagain));
        assert!(controller.is_in_global_backoff());

        controller.record_success();
        assert!(!controller.is_in_global_backoff());
        assert_eq!(resumes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reset_clears_everything_and_resumes_if_active() {
        let resumes = Arc::new(AtomicUsize::new(0));
        let r = resumes.clone();
        let controller = BackoffController::with_clock_and_jitter(
            BackoffConfig::builder()
                .consecutive_failures_threshold(1)
                .pauser(crate::config::FnPauser::new(|| {}, move || {
                    r.fetch_add(1, Ordering::SeqCst);
                }))
                .build(),
            Arc::new(FixedClock::new()),
            Arc::new(ZeroJitter),
        );
        controller.handle_error("a", 0, &resource_error(ResourceErrorKind::Eagain));
        assert!(controller.is_in_global_backoff());

        controller.reset();
        assert!(!controller.is_in_global_backoff());
        assert_eq!(controller.stats().consecutive_failures, 0);
        assert_eq!(resumes.load(Ordering::SeqCst), 1);
    }
}
