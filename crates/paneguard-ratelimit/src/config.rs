use crate::events::RateLimitEvent;
use paneguard_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for the rate-limit tracker.
pub struct RateLimitTrackerConfig {
    pub(crate) min_delay_anthropic: Duration,
    pub(crate) min_delay_openai: Duration,
    pub(crate) min_delay_google: Duration,
    pub(crate) min_delay_default: Duration,
    pub(crate) max_learned_delay: Duration,
    pub(crate) successes_to_decay: u32,
    pub(crate) event_listeners: EventListeners<RateLimitEvent>,
}

/// Builder for [`RateLimitTrackerConfig`].
pub struct RateLimitTrackerConfigBuilder {
    min_delay_anthropic: Duration,
    min_delay_openai: Duration,
    min_delay_google: Duration,
    min_delay_default: Duration,
    max_learned_delay: Duration,
    successes_to_decay: u32,
    event_listeners: EventListeners<RateLimitEvent>,
}

impl Default for RateLimitTrackerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitTrackerConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - min_delay (anthropic/openai/google/default): 1 second
    /// - max_learned_delay: 10 minutes
    /// - successes_to_decay: 10
    pub fn new() -> Self {
        Self {
            min_delay_anthropic: Duration::from_secs(1),
            min_delay_openai: Duration::from_secs(1),
            min_delay_google: Duration::from_secs(1),
            min_delay_default: Duration::from_secs(1),
            max_learned_delay: Duration::from_secs(600),
            successes_to_decay: 10,
            event_listeners: EventListeners::new(),
        }
    }

    pub fn min_delay_anthropic(mut self, duration: Duration) -> Self {
        self.min_delay_anthropic = duration;
        self
    }

    pub fn min_delay_openai(mut self, duration: Duration) -> Self {
        self.min_delay_openai = duration;
        self
    }

    pub fn min_delay_google(mut self, duration: Duration) -> Self {
        self.min_delay_google = duration;
        self
    }

    pub fn min_delay_default(mut self, duration: Duration) -> Self {
        self.min_delay_default = duration;
        self
    }

    /// Caps how large a learned delay can grow regardless of how many
    /// consecutive rate-limit responses a provider produces.
    pub fn max_learned_delay(mut self, duration: Duration) -> Self {
        self.max_learned_delay = duration;
        self
    }

    /// Number of consecutive successes required before the learned delay
    /// is halved.
    pub fn successes_to_decay(mut self, count: u32) -> Self {
        self.successes_to_decay = count;
        self
    }

    /// Registers a callback invoked whenever a provider's learned delay
    /// grows in response to an observed rate limit.
    pub fn on_rate_limit_observed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimitEvent::RateLimitObserved {
                provider,
                learned_delay,
                ..
            } = event
            {
                f(provider, *learned_delay);
            }
        }));
        self
    }

    /// Registers a callback invoked whenever a provider enters a cooldown
    /// window.
    pub fn on_cooldown_started<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimitEvent::CooldownStarted {
                provider, duration, ..
            } = event
            {
                f(provider, *duration);
            }
        }));
        self
    }

    pub fn build(self) -> RateLimitTrackerConfig {
        RateLimitTrackerConfig {
            min_delay_anthropic: self.min_delay_anthropic,
            min_delay_openai: self.min_delay_openai,
            min_delay_google: self.min_delay_google,
            min_delay_default: self.min_delay_default,
            max_learned_delay: self.max_learned_delay,
            successes_to_decay: self.successes_to_decay,
            event_listeners: self.event_listeners,
        }
    }
}

impl RateLimitTrackerConfig {
    pub fn builder() -> RateLimitTrackerConfigBuilder {
        RateLimitTrackerConfigBuilder::new()
    }

    pub(crate) fn min_delay_for(&self, provider: &str) -> Duration {
        match provider {
            "anthropic" => self.min_delay_anthropic,
            "openai" => self.min_delay_openai,
            "google" => self.min_delay_google,
            _ => self.min_delay_default,
        }
    }

    pub(crate) fn max_learned_delay(&self) -> Duration {
        self.max_learned_delay
    }

    pub(crate) fn successes_to_decay(&self) -> u32 {
        self.successes_to_decay
    }

    pub(crate) fn emit(&self, event: &RateLimitEvent) {
        self.event_listeners.emit(event);
    }
}

impl Default for RateLimitTrackerConfig {
    fn default() -> Self {
        RateLimitTrackerConfigBuilder::default().build()
    }
}
