//! Configuration for per-agent-type admission control.

use crate::error::ConfigError;
use crate::events::AgentCapsEvent;
use paneguard_core::events::{EventListeners, FnListener};
use std::collections::HashMap;
use std::time::Duration;

/// Per-agent-type admission settings.
#[derive(Debug, Clone)]
pub struct AgentTypeConfig {
    pub(crate) max_concurrent: usize,
    pub(crate) ramp_up_enabled: bool,
    pub(crate) ramp_up_initial: usize,
    pub(crate) ramp_up_step: usize,
    pub(crate) ramp_up_interval: Duration,
    pub(crate) cooldown_on_failure: bool,
    pub(crate) cooldown_reduction: usize,
    pub(crate) cooldown_recovery: Duration,
}

impl AgentTypeConfig {
    pub fn builder() -> AgentTypeConfigBuilder {
        AgentTypeConfigBuilder::new()
    }
}

impl Default for AgentTypeConfig {
    fn default() -> Self {
        AgentTypeConfigBuilder::new().build()
    }
}

/// Builder for [`AgentTypeConfig`].
pub struct AgentTypeConfigBuilder {
    max_concurrent: usize,
    ramp_up_enabled: bool,
    ramp_up_initial: usize,
    ramp_up_step: usize,
    ramp_up_interval: Duration,
    cooldown_on_failure: bool,
    cooldown_reduction: usize,
    cooldown_recovery: Duration,
}

impl Default for AgentTypeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentTypeConfigBuilder {
    /// Creates a builder with defaults.
    ///
    /// Defaults: max_concurrent 4, ramp-up disabled, cooldown-on-failure
    /// disabled, cooldown_reduction 1, cooldown_recovery 60 seconds.
    pub fn new() -> Self {
        Self {
            max_concurrent: 4,
            ramp_up_enabled: false,
            ramp_up_initial: 1,
            ramp_up_step: 1,
            ramp_up_interval: Duration::from_secs(30),
            cooldown_on_failure: false,
            cooldown_reduction: 1,
            cooldown_recovery: Duration::from_secs(60),
        }
    }

    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Enables ramp-up: the type starts admitting at `initial` and climbs
    /// toward `max_concurrent` by `step` every `interval`.
    pub fn ramp_up(mut self, initial: usize, step: usize, interval: Duration) -> Self {
        self.ramp_up_enabled = true;
        self.ramp_up_initial = initial;
        self.ramp_up_step = step;
        self.ramp_up_interval = interval;
        self
    }

    /// Shrinks the cap by `reduction` (floored at 1) for `recovery` after a
    /// `record_failure` call, when `enabled`.
    pub fn cooldown_on_failure(mut self, enabled: bool, reduction: usize, recovery: Duration) -> Self {
        self.cooldown_on_failure = enabled;
        self.cooldown_reduction = reduction;
        self.cooldown_recovery = recovery;
        self
    }

    pub fn build(self) -> AgentTypeConfig {
        AgentTypeConfig {
            max_concurrent: self.max_concurrent,
            ramp_up_enabled: self.ramp_up_enabled,
            ramp_up_initial: self.ramp_up_initial,
            ramp_up_step: self.ramp_up_step,
            ramp_up_interval: self.ramp_up_interval,
            cooldown_on_failure: self.cooldown_on_failure,
            cooldown_reduction: self.cooldown_reduction,
            cooldown_recovery: self.cooldown_recovery,
        }
    }
}

/// Top-level configuration: a `GlobalMax` ceiling across all agent types
/// plus a per-type [`AgentTypeConfig`] registry.
pub struct AgentCapsConfig {
    pub(crate) global_max: usize,
    pub(crate) types: HashMap<String, AgentTypeConfig>,
    pub(crate) default_type: AgentTypeConfig,
    pub(crate) event_listeners: EventListeners<AgentCapsEvent>,
}

/// Builder for [`AgentCapsConfig`].
pub struct AgentCapsConfigBuilder {
    global_max: usize,
    types: HashMap<String, AgentTypeConfig>,
    default_type: AgentTypeConfig,
    event_listeners: EventListeners<AgentCapsEvent>,
}

impl Default for AgentCapsConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentCapsConfigBuilder {
    /// Creates a builder with defaults: no global ceiling, no agent types
    /// registered (unregistered types fall back to the default type
    /// configuration).
    pub fn new() -> Self {
        Self {
            global_max: 0,
            types: HashMap::new(),
            default_type: AgentTypeConfig::default(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Caps the sum of running instances across all agent types. Zero
    /// means unlimited.
    pub fn global_max(mut self, max: usize) -> Self {
        self.global_max = max;
        self
    }

    /// Registers (or replaces) the configuration for one agent type.
    pub fn agent_type(mut self, name: impl Into<String>, config: AgentTypeConfig) -> Self {
        self.types.insert(name.into(), config);
        self
    }

    /// Configuration used for agent types with no explicit registration.
    pub fn default_type(mut self, config: AgentTypeConfig) -> Self {
        self.default_type = config;
        self
    }

    /// Registers a callback invoked whenever a slot is acquired.
    pub fn on_slot_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, usize, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let AgentCapsEvent::SlotAcquired {
                agent_type,
                running,
                cap,
                ..
            } = event
            {
                f(agent_type, *running, *cap);
            }
        }));
        self
    }

    /// Registers a callback invoked whenever admission is rejected.
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, usize, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let AgentCapsEvent::Rejected {
                agent_type,
                running,
                cap,
                ..
            } = event
            {
                f(agent_type, *running, *cap);
            }
        }));
        self
    }

    /// Registers a callback invoked whenever an agent type enters cooldown.
    pub fn on_cooldown_entered<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let AgentCapsEvent::CooldownEntered {
                agent_type, cap, ..
            } = event
            {
                f(agent_type, *cap);
            }
        }));
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<AgentCapsConfig, ConfigError> {
        for (agent_type, config) in &self.types {
            if config.max_concurrent == 0 && !config.ramp_up_enabled {
                return Err(ConfigError::ZeroCapacity {
                    agent_type: agent_type.clone(),
                });
            }
        }
        if self.default_type.max_concurrent == 0 && !self.default_type.ramp_up_enabled {
            return Err(ConfigError::ZeroCapacity {
                agent_type: "<default>".to_string(),
            });
        }
        Ok(AgentCapsConfig {
            global_max: self.global_max,
            types: self.types,
            default_type: self.default_type,
            event_listeners: self.event_listeners,
        })
    }
}

impl AgentCapsConfig {
    pub fn builder() -> AgentCapsConfigBuilder {
        AgentCapsConfigBuilder::new()
    }

    pub(crate) fn type_config(&self, agent_type: &str) -> AgentTypeConfig {
        self.types
            .get(agent_type)
            .cloned()
            .unwrap_or_else(|| self.default_type.clone())
    }

    pub(crate) fn emit(&self, event: &AgentCapsEvent) {
        self.event_listeners.emit(event);
    }
}

impl Default for AgentCapsConfig {
    fn default() -> Self {
        AgentCapsConfigBuilder::default()
            .build()
            .expect("default configuration is always valid")
    }
}
