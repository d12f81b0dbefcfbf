//! Wires the five component crates together the way a scheduler actually
//! drives them: pane output through the classifier and into the rate-limit
//! tracker (and, for codex, the throttle); launch requests through agent
//! caps; launch failures through the backoff controller.

use paneguard_agent_caps::{AcquireOutcome, AgentCaps, AgentCapsConfig};
use paneguard_backoff::{resource_error, BackoffConfig, BackoffController};
use paneguard_classifier::{classify, AgentState, AgentType, ClassifierConfig};
use paneguard_codex_throttle::{CodexThrottle, CodexThrottleConfig};
use paneguard_core::clock::{SharedClock, SystemClock};
use paneguard_ratelimit::{RateLimitTracker, RateLimitTrackerConfig};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

/// Configuration for every wired-up component of a [`System`].
pub struct SystemConfig {
    pub classifier: ClassifierConfig,
    pub ratelimit: RateLimitTrackerConfig,
    pub codex_throttle: CodexThrottleConfig,
    pub agent_caps: AgentCapsConfig,
    pub backoff: BackoffConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            ratelimit: RateLimitTrackerConfig::default(),
            codex_throttle: CodexThrottleConfig::default(),
            agent_caps: AgentCapsConfig::default(),
            backoff: BackoffConfig::default(),
        }
    }
}

/// The orchestrator's admission-control core, with every component
/// attached to the same clock.
///
/// `System` owns one of each component crate's top-level type and forwards
/// calls between them where the spec's data flow requires it: a detected
/// rate limit reaches both the rate-limit tracker and, for codex panes, the
/// attached throttle; a codex launch request is gated by that throttle
/// through [`AgentCaps::record_codex_rate_limit`] and
/// [`AgentCaps::with_codex_throttle`].
pub struct System {
    classifier_config: ClassifierConfig,
    clock: SharedClock,
    pub ratelimit: RateLimitTracker,
    pub codex_throttle: Arc<CodexThrottle>,
    pub agent_caps: AgentCaps,
    pub backoff: BackoffController,
}

impl System {
    /// Builds a system backed by the real wall clock.
    pub fn new(config: SystemConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Builds a system with an injected clock, for deterministic tests.
    pub fn with_clock(config: SystemConfig, clock: SharedClock) -> Self {
        let codex_throttle = Arc::new(CodexThrottle::with_clock(config.codex_throttle, clock.clone()));
        let agent_caps =
            AgentCaps::with_clock(config.agent_caps, clock.clone()).with_codex_throttle(codex_throttle.clone());
        let ratelimit = RateLimitTracker::with_clock(config.ratelimit, clock.clone());
        let backoff = BackoffController::with_clock(config.backoff, clock.clone());

        Self {
            classifier_config: config.classifier,
            clock,
            ratelimit,
            codex_throttle,
            agent_caps,
            backoff,
        }
    }

    /// Classifies a pane's recent scrollback and feeds any detected rate
    /// limit back into the rate-limit tracker, and, for a codex pane, the
    /// codex throttle.
    pub fn process_output(&self, provider: &str, pane_id: &str, output: &str) -> AgentState {
        let state = classify(output, self.clock.as_ref(), &self.classifier_config);
        if state.is_rate_limited {
            self.ratelimit.record_rate_limit(provider, "output_classified_rate_limited");
            if state.agent_type == AgentType::Codex {
                self.agent_caps.record_codex_rate_limit(pane_id, None);
            }
        }
        state
    }

    /// Waits for an admission slot for `agent_type`, honoring cancellation.
    pub async fn launch(&self, agent_type: &str, cancel: &CancellationToken) -> AcquireOutcome {
        self.agent_caps.acquire(agent_type, cancel).await
    }

    /// Releases the slot acquired by a prior [`Self::launch`].
    pub fn release(&self, agent_type: &str) {
        self.agent_caps.release(agent_type);
    }

    /// Classifies a launch failure and, if it is a recognized resource
    /// error, asks the backoff controller whether to retry and after how
    /// long. Returns `None` for errors the resource-error classifier does
    /// not recognize, which callers should surface unchanged rather than
    /// retry.
    pub fn handle_launch_failure(
        &self,
        agent_type: &str,
        job_id: &str,
        retry_count: u32,
        message: &str,
        source: Option<&std::io::Error>,
        stderr: Option<&str>,
        exit_code: Option<i32>,
    ) -> Option<(bool, Duration)> {
        let error = resource_error::classify(message, source, stderr, exit_code, SystemTime::now())?;
        self.agent_caps.record_failure(agent_type);
        Some(self.backoff.handle_error(job_id, retry_count, &error))
    }

    /// Records a successful launch: clears the agent type's failure
    /// cooldown and the backoff controller's consecutive-failure count.
    pub fn record_launch_success(&self, agent_type: &str) {
        self.agent_caps.record_success(agent_type);
        self.backoff.record_success();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paneguard_agent_caps::AcquireOutcome;
    use paneguard_core::clock::FixedClock;

    fn test_system() -> System {
        System::with_clock(SystemConfig::default(), Arc::new(FixedClock::new()))
    }

    #[test]
    fn process_output_feeds_the_rate_limit_tracker() {
        let system = test_system();
        let state = system.process_output("openai", "pane-1", "Error: rate limit exceeded");
        assert!(state.is_rate_limited);
        assert!(system.ratelimit.optimal_delay("openai") > Duration::ZERO);
    }

    #[test]
    fn process_output_forwards_codex_rate_limits_to_the_throttle() {
        let system = test_system();
        let state = system.process_output("openai", "codex-pane", "codex: rate limit exceeded");
        assert_eq!(state.agent_type, AgentType::Codex);
        assert!(!system.codex_throttle.may_launch(0));
    }

    #[test]
    fn handle_launch_failure_classifies_resource_errors() {
        let system = test_system();
        let (should_retry, delay) =
            system.handle_launch_failure("codex", "job-1", 0, "cannot allocate memory", None, None, None).unwrap();
        assert!(should_retry);
        assert!(delay > Duration::ZERO);
        assert!(system.agent_caps.stats().contains_key("codex"));
    }

    #[test]
    fn handle_launch_failure_surfaces_unclassified_errors_as_none() {
        let system = test_system();
        assert!(system
            .handle_launch_failure("codex", "job-1", 0, "a perfectly ordinary application bug", None, None, None)
            .is_none());
    }

    #[tokio::test]
    async fn launch_is_admitted_when_capacity_is_free() {
        let system = test_system();
        let cancel = CancellationToken::new();
        assert_eq!(system.launch("claude", &cancel).await, AcquireOutcome::Admitted);
        system.release("claude");
    }

    #[test]
    fn record_launch_success_clears_failure_state() {
        let system = test_system();
        system
            .handle_launch_failure("claude", "job-1", 0, "cannot allocate memory", None, None, None)
            .unwrap();
        system.record_launch_success("claude");
        assert!(!system.agent_caps.stats()["claude"].in_cooldown);
    }
}
