//! Per-agent-type admission control.

use crate::config::{AgentCapsConfig, AgentTypeConfig};
use crate::events::AgentCapsEvent;
use paneguard_core::clock::{Clock, SharedClock, SystemClock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "codex-throttle")]
use paneguard_codex_throttle::CodexThrottle;

#[cfg(feature = "metrics")]
use metrics::gauge;

/// Outcome of a blocking [`AgentCaps::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// A slot was granted.
    Admitted,
    /// The caller's cancellation signal fired before a slot was granted.
    Cancelled,
}

/// Point-in-time view of one agent type's admission state.
#[derive(Debug, Clone)]
pub struct AgentTypeStats {
    pub running: usize,
    pub current_cap: usize,
    pub max_concurrent: usize,
    pub in_cooldown: bool,
    pub waiting: usize,
}

struct Waiter {
    /// Set exactly once, by whichever of {release, cancellation} gets there
    /// first. The loser must not act on this waiter again.
    claimed: Arc<AtomicBool>,
    /// Set by `release` alongside `claimed`, before notifying, so the
    /// woken `acquire` call can tell admission apart from cancellation.
    admitted: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

struct TypeState {
    config: AgentTypeConfig,
    running: usize,
    current_cap: usize,
    started_at: Option<Instant>,
    last_ramp_up: Instant,
    cooldown_at: Option<Instant>,
    in_cooldown: bool,
    waiters: VecDeque<Waiter>,
}

impl TypeState {
    fn new(config: AgentTypeConfig, now: Instant) -> Self {
        let current_cap = if config.ramp_up_enabled {
            config.ramp_up_initial.max(1)
        } else {
            config.max_concurrent
        };
        Self {
            config,
            running: 0,
            current_cap,
            started_at: None,
            last_ramp_up: now,
            cooldown_at: None,
            in_cooldown: false,
            waiters: VecDeque::new(),
        }
    }
}

struct Inner {
    types: HashMap<String, TypeState>,
}

enum Admit {
    Admitted { running: usize, cap: usize },
    RejectedCod,
    RejectedTypeFull { running: usize, cap: usize },
    RejectedGlobalFull,
}

struct Shared {
    config: AgentCapsConfig,
    clock: SharedClock,
    #[cfg(feature = "codex-throttle")]
    codex_throttle: Option<Arc<CodexThrottle>>,
    inner: Mutex<Inner>,
}

/// Admission control keyed by agent type: a per-type concurrency cap with
/// optional ramp-up and failure cooldown, a global ceiling across all
/// types, and fair FIFO waiter queues.
///
/// Cheap to clone; clones share the same underlying state.
#[derive(Clone)]
pub struct AgentCaps {
    shared: Arc<Shared>,
}

fn compute_ramped_cap(config: &AgentTypeConfig, started_at: Option<Instant>, now: Instant) -> usize {
    if !config.ramp_up_enabled {
        return config.max_concurrent;
    }
    match started_at {
        None => config.ramp_up_initial.max(1),
        Some(start) => {
            if config.ramp_up_interval.is_zero() {
                return config.max_concurrent;
            }
            let elapsed = now.saturating_duration_since(start);
            let steps = (elapsed.as_secs_f64() / config.ramp_up_interval.as_secs_f64()).floor() as usize;
            (config.ramp_up_initial.max(1) + steps * config.ramp_up_step).min(config.max_concurrent)
        }
    }
}

impl AgentCaps {
    /// Creates admission control using the real system clock.
    pub fn new(config: AgentCapsConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates admission control using an injected clock, for
    /// deterministic tests of ramp-up and cooldown timing.
    pub fn with_clock(config: AgentCapsConfig, clock: SharedClock) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                clock,
                #[cfg(feature = "codex-throttle")]
                codex_throttle: None,
                inner: Mutex::new(Inner {
                    types: HashMap::new(),
                }),
            }),
        }
    }

    /// Attaches a [`CodexThrottle`] so that launches of the `"cod"` agent
    /// type additionally consult its AIMD phase machine.
    #[cfg(feature = "codex-throttle")]
    pub fn with_codex_throttle(mut self, throttle: Arc<CodexThrottle>) -> Self {
        let shared = Arc::get_mut(&mut self.shared)
            .expect("attach codex throttle before sharing AgentCaps across clones");
        shared.codex_throttle = Some(throttle);
        self
    }

    /// Non-blocking admission check.
    pub fn try_acquire(&self, agent_type: &str) -> bool {
        let now = self.shared.clock.now();
        let mut inner = self.shared.inner.lock().unwrap();
        match self.try_admit_locked(&mut inner, agent_type, now) {
            Admit::Admitted { running, cap } => {
                drop(inner);
                self.emit_acquired(agent_type, now, running, cap);
                true
            }
            Admit::RejectedTypeFull { running, cap } => {
                drop(inner);
                self.emit_rejected(agent_type, now, running, cap);
                false
            }
            Admit::RejectedCod | Admit::RejectedGlobalFull => false,
        }
    }

    /// Blocking admission check. Waits fairly (FIFO within `agent_type`)
    /// until a slot is available or `cancel` fires.
    pub async fn acquire(&self, agent_type: &str, cancel: &CancellationToken) -> AcquireOutcome {
        let now = self.shared.clock.now();
        {
            let mut inner = self.shared.inner.lock().unwrap();
            if let Admit::Admitted { running, cap } = self.try_admit_locked(&mut inner, agent_type, now) {
                drop(inner);
                self.emit_acquired(agent_type, now, running, cap);
                return AcquireOutcome::Admitted;
            }
        }

        let claimed = Arc::new(AtomicBool::new(false));
        let admitted = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        {
            let mut inner = self.shared.inner.lock().unwrap();
            let config = self.shared.config.type_config(agent_type);
            let type_state = inner
                .types
                .entry(agent_type.to_string())
                .or_insert_with(|| TypeState::new(config, now));
            type_state.waiters.push_back(Waiter {
                claimed: claimed.clone(),
                admitted: admitted.clone(),
                notify: notify.clone(),
            });
        }

        tokio::select! {
            biased;
            _ = notify.notified() => {
                self.conclude_wait(agent_type, &admitted)
            }
            _ = cancel.cancelled() => {
                if claimed.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
                    self.shared.config.emit(&AgentCapsEvent::Cancelled {
                        timestamp: self.shared.clock.now(),
                        agent_type: agent_type.to_string(),
                    });
                    AcquireOutcome::Cancelled
                } else {
                    // `release` already won the claim race and is about to
                    // (or just did) notify us; wait for it rather than
                    // reporting a spurious cancellation.
                    notify.notified().await;
                    self.conclude_wait(agent_type, &admitted)
                }
            }
        }
    }

    fn conclude_wait(&self, agent_type: &str, admitted: &AtomicBool) -> AcquireOutcome {
        if admitted.load(Ordering::SeqCst) {
            let now = self.shared.clock.now();
            let inner = self.shared.inner.lock().unwrap();
            let (running, cap) = inner
                .types
                .get(agent_type)
                .map(|t| (t.running, t.current_cap))
                .unwrap_or((0, 0));
            drop(inner);
            self.emit_acquired(agent_type, now, running, cap);
            AcquireOutcome::Admitted
        } else {
            AcquireOutcome::Cancelled
        }
    }

    /// Releases one slot and wakes at most one fair waiter.
    pub fn release(&self, agent_type: &str) {
        let now = self.shared.clock.now();
        let mut inner = self.shared.inner.lock().unwrap();
        let running_after = {
            let type_state = inner.types.get_mut(agent_type);
            match type_state {
                Some(t) if t.running > 0 => {
                    t.running -= 1;
                    t.running
                }
                Some(t) => t.running,
                None => 0,
            }
        };
        self.wake_waiters_locked(&mut inner, agent_type);
        if self.shared.config.global_max > 0 {
            self.wake_any_type_locked(&mut inner);
        }
        drop(inner);
        self.shared.config.emit(&AgentCapsEvent::SlotReleased {
            timestamp: now,
            agent_type: agent_type.to_string(),
            running: running_after,
        });
    }

    /// Records a failed launch. If the agent type has `cooldown_on_failure`
    /// enabled, shrinks its cap and schedules automatic recovery.
    pub fn record_failure(&self, agent_type: &str) {
        let now = self.shared.clock.now();
        let recovery = {
            let mut inner = self.shared.inner.lock().unwrap();
            let config = self.shared.config.type_config(agent_type);
            let type_state = inner
                .types
                .entry(agent_type.to_string())
                .or_insert_with(|| TypeState::new(config, now));
            if !type_state.config.cooldown_on_failure {
                return;
            }
            type_state.current_cap = type_state
                .current_cap
                .saturating_sub(type_state.config.cooldown_reduction)
                .max(1);
            type_state.in_cooldown = true;
            type_state.cooldown_at = Some(now);
            let cap = type_state.current_cap;
            let recovery = type_state.config.cooldown_recovery;
            self.shared.config.emit(&AgentCapsEvent::CooldownEntered {
                timestamp: now,
                agent_type: agent_type.to_string(),
                cap,
            });
            recovery
        };

        let shared = self.shared.clone();
        let agent_type = agent_type.to_string();
        let scheduled_at = now;
        tokio::spawn(async move {
            tokio::time::sleep(recovery).await;
            recover_from_cooldown(&shared, &agent_type, scheduled_at);
        });
    }

    /// Records a successful launch. If the agent type is in cooldown, this
    /// makes the next recovery check due immediately rather than waiting
    /// for the full recovery window.
    pub fn record_success(&self, agent_type: &str) {
        let now = self.shared.clock.now();
        let mut inner = self.shared.inner.lock().unwrap();
        if let Some(type_state) = inner.types.get_mut(agent_type) {
            if type_state.in_cooldown {
                let recovery = type_state.config.cooldown_recovery;
                type_state.cooldown_at = Some(now.checked_sub(recovery).unwrap_or(now));
                try_recover_locked(type_state, now);
            }
        }
        self.wake_waiters_locked(&mut inner, agent_type);
    }

    /// Overrides the current cap for `agent_type` directly, bypassing
    /// ramp-up and cooldown bookkeeping, and wakes any waiters it admits.
    pub fn set_cap(&self, agent_type: &str, cap: usize) {
        let now = self.shared.clock.now();
        let mut inner = self.shared.inner.lock().unwrap();
        let config = self.shared.config.type_config(agent_type);
        let type_state = inner
            .types
            .entry(agent_type.to_string())
            .or_insert_with(|| TypeState::new(config, now));
        type_state.current_cap = cap;
        self.wake_waiters_locked(&mut inner, agent_type);
    }

    /// Skips the ramp-up timer and admits `agent_type` at `max_concurrent`
    /// immediately.
    pub fn force_ramp_up(&self, agent_type: &str) {
        let now = self.shared.clock.now();
        let mut inner = self.shared.inner.lock().unwrap();
        let config = self.shared.config.type_config(agent_type);
        let max_concurrent = config.max_concurrent;
        let type_state = inner
            .types
            .entry(agent_type.to_string())
            .or_insert_with(|| TypeState::new(config, now));
        type_state.current_cap = max_concurrent;
        type_state.last_ramp_up = now;
        self.wake_waiters_locked(&mut inner, agent_type);
    }

    /// Snapshots the current state of every agent type that has been
    /// touched at least once.
    pub fn stats(&self) -> HashMap<String, AgentTypeStats> {
        let inner = self.shared.inner.lock().unwrap();
        inner
            .types
            .iter()
            .map(|(name, t)| {
                (
                    name.clone(),
                    AgentTypeStats {
                        running: t.running,
                        current_cap: t.current_cap,
                        max_concurrent: t.config.max_concurrent,
                        in_cooldown: t.in_cooldown,
                        waiting: t.waiters.len(),
                    },
                )
            })
            .collect()
    }

    /// Drops all per-type state, as if no agent had ever launched.
    pub fn reset(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.types.clear();
    }

    /// Forwards a codex rate limit to the attached throttle and, in
    /// concert, applies this crate's own failure cooldown to the `"cod"`
    /// agent type.
    #[cfg(feature = "codex-throttle")]
    pub fn record_codex_rate_limit(&self, pane_id: &str, wait_seconds: Option<Duration>) {
        if let Some(throttle) = &self.shared.codex_throttle {
            throttle.record_rate_limit(pane_id, wait_seconds);
        }
        self.record_failure("cod");
    }

    fn try_admit_locked(&self, inner: &mut Inner, agent_type: &str, now: Instant) -> Admit {
        #[cfg(feature = "codex-throttle")]
        if agent_type == "cod" {
            if let Some(throttle) = &self.shared.codex_throttle {
                let running_cod = inner.types.get(agent_type).map(|t| t.running).unwrap_or(0);
                if !throttle.may_launch(running_cod) {
                    return Admit::RejectedCod;
                }
            }
        }

        let config = self.shared.config.type_config(agent_type);
        if !inner.types.contains_key(agent_type) {
            inner
                .types
                .insert(agent_type.to_string(), TypeState::new(config, now));
        }

        {
            let type_state = inner.types.get_mut(agent_type).unwrap();
            if type_state.config.ramp_up_enabled
                && type_state.started_at.is_some()
                && type_state.current_cap < type_state.config.max_concurrent
            {
                let interval = type_state.config.ramp_up_interval;
                if !interval.is_zero() {
                    let elapsed = now.saturating_duration_since(type_state.last_ramp_up);
                    let steps = (elapsed.as_secs_f64() / interval.as_secs_f64()).floor() as usize;
                    if steps > 0 {
                        type_state.current_cap = (type_state.current_cap
                            + steps * type_state.config.ramp_up_step)
                            .min(type_state.config.max_concurrent);
                        type_state.last_ramp_up = now;
                        self.shared.config.emit(&AgentCapsEvent::RampedUp {
                            timestamp: now,
                            agent_type: agent_type.to_string(),
                            cap: type_state.current_cap,
                        });
                    }
                }
            }
        }

        let (running, cap) = {
            let type_state = inner.types.get(agent_type).unwrap();
            (type_state.running, type_state.current_cap)
        };

        if running >= cap {
            return Admit::RejectedTypeFull { running, cap };
        }

        if self.shared.config.global_max > 0 {
            let total: usize = inner.types.values().map(|t| t.running).sum();
            if total >= self.shared.config.global_max {
                return Admit::RejectedGlobalFull;
            }
        }

        let type_state = inner.types.get_mut(agent_type).unwrap();
        type_state.running += 1;
        if type_state.started_at.is_none() {
            type_state.started_at = Some(now);
        }

        #[cfg(feature = "metrics")]
        {
            gauge!("agent_caps_running", "agent_type" => agent_type.to_string())
                .set(type_state.running as f64);
            gauge!("agent_caps_cap", "agent_type" => agent_type.to_string())
                .set(type_state.current_cap as f64);
        }

        Admit::Admitted {
            running: type_state.running,
            cap: type_state.current_cap,
        }
    }

    fn wake_waiters_locked(&self, inner: &mut Inner, agent_type: &str) {
        drain_one_waiter_locked(&self.shared, inner, agent_type);
    }

    fn wake_any_type_locked(&self, inner: &mut Inner) {
        let candidates: Vec<String> = inner
            .types
            .iter()
            .filter(|(_, t)| t.running < t.current_cap && !t.waiters.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        for name in candidates {
            let before = inner.types.get(&name).map(|t| t.running).unwrap_or(0);
            self.wake_waiters_locked(inner, &name);
            let after = inner.types.get(&name).map(|t| t.running).unwrap_or(0);
            if after > before {
                break;
            }
            // This candidate's wake was gated (e.g. "cod" still throttled);
            // try the next one instead of stopping here.
        }
    }

    fn emit_acquired(&self, agent_type: &str, timestamp: Instant, running: usize, cap: usize) {
        self.shared.config.emit(&AgentCapsEvent::SlotAcquired {
            timestamp,
            agent_type: agent_type.to_string(),
            running,
            cap,
        });
    }

    fn emit_rejected(&self, agent_type: &str, timestamp: Instant, running: usize, cap: usize) {
        self.shared.config.emit(&AgentCapsEvent::Rejected {
            timestamp,
            agent_type: agent_type.to_string(),
            running,
            cap,
        });
    }
}

fn try_recover_locked(type_state: &mut TypeState, now: Instant) -> bool {
    if !type_state.in_cooldown {
        return false;
    }
    let cooldown_at = type_state.cooldown_at.unwrap_or(now);
    if now.duration_since(cooldown_at) >= type_state.config.cooldown_recovery {
        type_state.in_cooldown = false;
        type_state.cooldown_at = None;
        type_state.current_cap = compute_ramped_cap(&type_state.config, type_state.started_at, now);
        true
    } else {
        false
    }
}

fn recover_from_cooldown(shared: &Arc<Shared>, agent_type: &str, scheduled_at: Instant) {
    let now = shared.clock.now();
    let mut inner = shared.inner.lock().unwrap();
    let cap = {
        let type_state = match inner.types.get_mut(agent_type) {
            Some(t) => t,
            None => return,
        };
        if !type_state.in_cooldown || type_state.cooldown_at != Some(scheduled_at) {
            // Superseded by a later failure, or already cleared by a
            // success-triggered recovery.
            return;
        }
        type_state.in_cooldown = false;
        type_state.cooldown_at = None;
        type_state.current_cap = compute_ramped_cap(&type_state.config, type_state.started_at, now);
        type_state.current_cap
    };
    shared.config.emit(&AgentCapsEvent::CooldownCleared {
        timestamp: now,
        agent_type: agent_type.to_string(),
        cap,
    });
    drain_one_waiter_locked(shared.as_ref(), &mut inner, agent_type);
}

/// Returns whether a slot may be credited to `agent_type` right now, beyond
/// the plain `running < current_cap` check. For `"cod"` with an attached
/// [`CodexThrottle`], this re-consults `may_launch` — a waiter queued
/// earlier because `try_admit_locked` returned `RejectedCod` must not be
/// admitted here just because a slot freed up while the throttle is still
/// paused.
#[cfg(feature = "codex-throttle")]
fn cod_gate_allows(shared: &Shared, agent_type: &str, running: usize) -> bool {
    if agent_type != "cod" {
        return true;
    }
    match &shared.codex_throttle {
        Some(throttle) => throttle.may_launch(running),
        None => true,
    }
}

#[cfg(not(feature = "codex-throttle"))]
fn cod_gate_allows(_shared: &Shared, _agent_type: &str, _running: usize) -> bool {
    true
}

/// Wakes at most one waiter for `agent_type` under the held lock, skipping
/// any already claimed by a concurrent cancellation. Shared by the
/// release-driven wake path and the cooldown-recovery wake path so both
/// apply the same admission gate (including the `"cod"` throttle re-check)
/// before crediting a slot.
fn drain_one_waiter_locked(shared: &Shared, inner: &mut Inner, agent_type: &str) {
    loop {
        let ready = match inner.types.get(agent_type) {
            Some(t) => {
                t.running < t.current_cap
                    && !t.waiters.is_empty()
                    && cod_gate_allows(shared, agent_type, t.running)
            }
            None => false,
        };
        if !ready {
            break;
        }
        let type_state = inner.types.get_mut(agent_type).unwrap();
        let waiter = match type_state.waiters.pop_front() {
            Some(w) => w,
            None => break,
        };
        if waiter
            .claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            type_state.running += 1;
            waiter.admitted.store(true, Ordering::SeqCst);
            waiter.notify.notify_one();
            break;
        }
        // Already claimed by a concurrent cancellation; try the next.
    }
}
