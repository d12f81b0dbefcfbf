use crate::events::CodexThrottleEvent;
use paneguard_core::events::EventListeners;
use std::time::Duration;

/// Configuration for the codex throttle's AIMD phase machine.
pub struct CodexThrottleConfig {
    pub(crate) max_concurrent: usize,
    pub(crate) multiplicative_decrease: f64,
    pub(crate) additive_increase: usize,
    pub(crate) default_cooldown: Duration,
    pub(crate) max_cooldown: Duration,
    pub(crate) recovery_check_interval: Duration,
    pub(crate) event_listeners: EventListeners<CodexThrottleEvent>,
}

/// Builder for [`CodexThrottleConfig`].
pub struct CodexThrottleConfigBuilder {
    max_concurrent: usize,
    multiplicative_decrease: f64,
    additive_increase: usize,
    default_cooldown: Duration,
    max_cooldown: Duration,
    recovery_check_interval: Duration,
    event_listeners: EventListeners<CodexThrottleEvent>,
}

impl Default for CodexThrottleConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodexThrottleConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - max_concurrent: 4
    /// - multiplicative_decrease: 0.5
    /// - additive_increase: 1
    /// - default_cooldown: 30 seconds
    /// - max_cooldown: 5 minutes
    /// - recovery_check_interval: 15 seconds
    pub fn new() -> Self {
        Self {
            max_concurrent: 4,
            multiplicative_decrease: 0.5,
            additive_increase: 1,
            default_cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(300),
            recovery_check_interval: Duration::from_secs(15),
            event_listeners: EventListeners::new(),
        }
    }

    /// The admission window's ceiling; also where `AllowedConcurrent`
    /// settles once the phase machine returns to `normal`.
    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Fraction `AllowedConcurrent` is multiplied by on a rate limit.
    pub fn multiplicative_decrease(mut self, factor: f64) -> Self {
        self.multiplicative_decrease = factor;
        self
    }

    /// Amount `AllowedConcurrent` grows by per recovery step.
    pub fn additive_increase(mut self, step: usize) -> Self {
        self.additive_increase = step;
        self
    }

    /// Cooldown used when a rate limit carries no wait hint.
    pub fn default_cooldown(mut self, duration: Duration) -> Self {
        self.default_cooldown = duration;
        self
    }

    /// Ceiling on how long a single cooldown window can grow to, even
    /// after repeated escalation.
    pub fn max_cooldown(mut self, duration: Duration) -> Self {
        self.max_cooldown = duration;
        self
    }

    /// How often, while recovering, `AllowedConcurrent` is allowed to step
    /// upward.
    pub fn recovery_check_interval(mut self, duration: Duration) -> Self {
        self.recovery_check_interval = duration;
        self
    }

    /// Registers a callback invoked on every phase transition.
    pub fn on_phase_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&CodexThrottleEvent) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(paneguard_core::events::FnListener::new(move |event| {
                f(event)
            }));
        self
    }

    pub fn build(self) -> CodexThrottleConfig {
        CodexThrottleConfig {
            max_concurrent: self.max_concurrent,
            multiplicative_decrease: self.multiplicative_decrease,
            additive_increase: self.additive_increase,
            default_cooldown: self.default_cooldown,
            max_cooldown: self.max_cooldown,
            recovery_check_interval: self.recovery_check_interval,
            event_listeners: self.event_listeners,
        }
    }
}

impl CodexThrottleConfig {
    pub fn builder() -> CodexThrottleConfigBuilder {
        CodexThrottleConfigBuilder::new()
    }

    pub(crate) fn emit(&self, event: &CodexThrottleEvent) {
        self.event_listeners.emit(event);
    }
}

impl Default for CodexThrottleConfig {
    fn default() -> Self {
        CodexThrottleConfigBuilder::default().build()
    }
}
