use crate::config::CodexThrottleConfig;
use crate::events::CodexThrottleEvent;
use paneguard_core::clock::{Clock, SharedClock, SystemClock};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::gauge;

/// Phase of the AIMD launch throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Launches are admitted up to `MaxConcurrent`.
    Normal,
    /// No launches are admitted until the cooldown window elapses.
    Paused,
    /// Launches are admitted up to a window that grows additively over
    /// time back toward `MaxConcurrent`.
    Recovering,
}

/// Point-in-time view of the throttle's phase machine.
#[derive(Debug, Clone)]
pub struct CodexThrottleStatus {
    pub phase: Phase,
    pub allowed_concurrent: usize,
    pub max_concurrent: usize,
    pub rate_limit_count: u32,
    pub cooldown_remaining: Duration,
    pub affected_panes: Vec<String>,
    pub guidance: String,
}

struct Inner {
    phase: Phase,
    allowed_concurrent: usize,
    cooldown_until: Option<Instant>,
    cooldown_dur: Duration,
    rate_limit_count: u32,
    last_recovery_step: Option<Instant>,
    affected_panes: Vec<String>,
}

/// AIMD launch throttle gating a single agent family ("cod").
///
/// Consulted before launching a new instance of that family; multiplicative
/// decrease on a rate limit, additive increase over time while recovering.
pub struct CodexThrottle {
    config: CodexThrottleConfig,
    clock: SharedClock,
    state: Mutex<Inner>,
}

impl CodexThrottle {
    /// Creates a throttle using the real system clock.
    pub fn new(config: CodexThrottleConfig) -> Self {
        Self::with_clock(config, std::sync::Arc::new(SystemClock))
    }

    /// Creates a throttle using an injected clock, for deterministic tests.
    pub fn with_clock(config: CodexThrottleConfig, clock: SharedClock) -> Self {
        let max_concurrent = config.max_concurrent;
        Self {
            config,
            clock,
            state: Mutex::new(Inner {
                phase: Phase::Normal,
                allowed_concurrent: max_concurrent,
                cooldown_until: None,
                cooldown_dur: Duration::ZERO,
                rate_limit_count: 0,
                last_recovery_step: None,
                affected_panes: Vec::new(),
            }),
        }
    }

    /// Advances the phase machine lazily and answers whether a launch with
    /// `current_running` instances already in flight is currently allowed.
    pub fn may_launch(&self, current_running: usize) -> bool {
        let mut inner = self.state.lock().unwrap();
        self.advance(&mut inner);
        match inner.phase {
            Phase::Normal => current_running < self.config.max_concurrent,
            Phase::Paused => false,
            Phase::Recovering => current_running < inner.allowed_concurrent,
        }
    }

    /// Records a rate limit observed on `pane_id`. Multiplicatively shrinks
    /// the admission window and enters (or extends) a cooldown.
    pub fn record_rate_limit(&self, pane_id: &str, wait_seconds: Option<Duration>) {
        let mut inner = self.state.lock().unwrap();
        self.advance(&mut inner);

        if !inner.affected_panes.iter().any(|p| p == pane_id) {
            inner.affected_panes.push(pane_id.to_string());
        }

        let already_paused = inner.phase == Phase::Paused;
        inner.allowed_concurrent =
            ((inner.allowed_concurrent as f64) * self.config.multiplicative_decrease) as usize;

        inner.rate_limit_count += 1;

        let base = wait_seconds
            .filter(|d| *d > Duration::ZERO)
            .unwrap_or(self.config.default_cooldown);
        let mut cooldown = base;
        if inner.rate_limit_count > 1 {
            cooldown = Duration::from_secs_f64(cooldown.as_secs_f64() * 1.5);
        }
        if cooldown > self.config.max_cooldown {
            cooldown = self.config.max_cooldown;
        }

        let now = self.clock.now();
        let candidate_until = now + cooldown;
        inner.cooldown_until = Some(match inner.cooldown_until {
            Some(existing) if already_paused => existing.max(candidate_until),
            _ => candidate_until,
        });
        inner.cooldown_dur = cooldown;
        inner.phase = Phase::Paused;

        #[cfg(feature = "metrics")]
        {
            gauge!("codex_throttle_allowed_concurrent").set(inner.allowed_concurrent as f64);
            gauge!("codex_throttle_phase").set(1.0);
        }

        self.config.emit(&CodexThrottleEvent::Paused {
            timestamp: now,
            pane_id: pane_id.to_string(),
            cooldown,
            allowed_concurrent: inner.allowed_concurrent,
        });
    }

    /// Resets the consecutive rate-limit counter. Does not itself advance
    /// recovery; only elapsed time does that.
    pub fn record_success(&self) {
        let mut inner = self.state.lock().unwrap();
        inner.rate_limit_count = 0;
    }

    /// Returns a snapshot of the throttle's current phase and admission
    /// window, with a human-readable guidance string.
    pub fn status(&self) -> CodexThrottleStatus {
        let mut inner = self.state.lock().unwrap();
        self.advance(&mut inner);
        let cooldown_remaining = match inner.cooldown_until {
            Some(until) => until.saturating_duration_since(self.clock.now()),
            None => Duration::ZERO,
        };
        let guidance = match inner.phase {
            Phase::Normal => "codex launches are unrestricted".to_string(),
            Phase::Paused => format!(
                "codex launches are paused for {:.0}s",
                cooldown_remaining.as_secs_f64()
            ),
            Phase::Recovering => format!(
                "codex launches are recovering: {}/{} allowed",
                inner.allowed_concurrent, self.config.max_concurrent
            ),
        };
        CodexThrottleStatus {
            phase: inner.phase,
            allowed_concurrent: inner.allowed_concurrent,
            max_concurrent: self.config.max_concurrent,
            rate_limit_count: inner.rate_limit_count,
            cooldown_remaining,
            affected_panes: inner.affected_panes.clone(),
            guidance,
        }
    }

    /// Removes `pane_id` from the set of panes implicated in the current
    /// cooldown, without otherwise altering the phase machine.
    pub fn clear_affected_pane(&self, pane_id: &str) {
        let mut inner = self.state.lock().unwrap();
        inner.affected_panes.retain(|p| p != pane_id);
    }

    /// Resets the throttle to `normal` with a full admission window.
    pub fn reset(&self) {
        let mut inner = self.state.lock().unwrap();
        inner.phase = Phase::Normal;
        inner.allowed_concurrent = self.config.max_concurrent;
        inner.cooldown_until = None;
        inner.cooldown_dur = Duration::ZERO;
        inner.rate_limit_count = 0;
        inner.last_recovery_step = None;
        inner.affected_panes.clear();
    }

    /// Advances `paused` → `recovering` → `normal` transitions driven
    /// purely by elapsed time. Always called with the lock held.
    fn advance(&self, inner: &mut Inner) {
        let now = self.clock.now();

        if inner.phase == Phase::Paused {
            if let Some(until) = inner.cooldown_until {
                if now > until {
                    inner.phase = Phase::Recovering;
                    inner.last_recovery_step = Some(now);
                    if inner.allowed_concurrent < 1 {
                        inner.allowed_concurrent = 1;
                    }
                    self.config.emit(&CodexThrottleEvent::RecoveryStarted {
                        timestamp: now,
                        allowed_concurrent: inner.allowed_concurrent,
                    });
                }
            }
        }

        if inner.phase == Phase::Recovering {
            let last_step = inner.last_recovery_step.unwrap_or(now);
            let elapsed = now.saturating_duration_since(last_step);
            let interval = self.config.recovery_check_interval;
            if interval > Duration::ZERO {
                let steps = (elapsed.as_secs_f64() / interval.as_secs_f64()).floor() as usize;
                if steps > 0 {
                    inner.allowed_concurrent += steps * self.config.additive_increase;
                    inner.last_recovery_step = Some(now);
                    if inner.allowed_concurrent >= self.config.max_concurrent {
                        inner.allowed_concurrent = self.config.max_concurrent;
                        inner.phase = Phase::Normal;
                        inner.cooldown_until = None;
                        inner.cooldown_dur = Duration::ZERO;
                        inner.affected_panes.clear();
                        self.config
                            .emit(&CodexThrottleEvent::Recovered { timestamp: now });
                    }
                }
            }
        }
    }
}
