//! The adaptive per-provider delay tracker (§4.2): learns how aggressively
//! each upstream provider is willing to be hit, backs off on rate-limit
//! events, decays back down on sustained success, and persists what it has
//! learned across process restarts.

use crate::config::RateLimitTrackerConfig;
use crate::error::RateLimitError;
use crate::events::RateLimitEvent;
use crate::provider;
use crate::state::ProviderState;
use chrono::{DateTime, Utc};
use paneguard_core::clock::{Clock, SharedClock, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Multiplicative growth applied to the learned delay on each rate-limit
/// observation.
const DELAY_INCREASE_RATE: f64 = 1.5;
/// Multiplicative shrink applied to the learned delay once enough
/// consecutive successes have accumulated.
const DELAY_DECREASE_RATE: f64 = 0.9;
/// A persisted delay or cooldown further out than this is treated as
/// corrupted and reset, independent of `max_learned_delay` (see
/// `debug_assert!` below — if `max_learned_delay` is ever raised past this
/// bound the two must move together).
const RATE_LIMIT_SANITIZE_MAX: Duration = Duration::from_secs(3600);

const DATA_SUBDIR: &str = ".paneguard";
const STATE_FILE: &str = "rate_limits.json";

/// One entry in a provider's rolling event history (debug/audit trail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub time: SystemTime,
    pub provider: String,
    pub action: String,
}

/// The longest history ring kept per provider.
const HISTORY_CAPACITY: usize = 100;

/// Learns and enforces per-provider request cadence.
///
/// All public methods normalize the caller's `provider` string first (see
/// [`provider::normalize`]), so `"claude"`, `"claude-code"`, and `"cc"` all
/// address the same underlying state.
pub struct RateLimitTracker {
    config: RateLimitTrackerConfig,
    clock: SharedClock,
    state: Mutex<HashMap<String, ProviderState>>,
    history: Mutex<HashMap<String, VecDeque<HistoryEntry>>>,
}

impl RateLimitTracker {
    /// Creates a tracker backed by the real wall clock.
    pub fn new(config: RateLimitTrackerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a tracker with an injected clock, for deterministic tests.
    pub fn with_clock(config: RateLimitTrackerConfig, clock: SharedClock) -> Self {
        debug_assert!(
            config.max_learned_delay() < RATE_LIMIT_SANITIZE_MAX,
            "max_learned_delay must stay below the persistence sanitizer bound"
        );
        Self {
            config,
            clock,
            state: Mutex::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Records a plain rate-limit observation: the learned delay grows
    /// multiplicatively, capped at `max_learned_delay`, and the consecutive
    /// success counter resets. Returns the new learned delay.
    pub fn record_rate_limit(&self, provider: &str, action: &str) -> Duration {
        let key = provider::normalize(provider);
        let delay = self.grow_delay(&key);
        self.push_history(&key, action);
        self.emit(RateLimitEvent::RateLimitObserved {
            provider: key,
            timestamp: self.clock.now(),
            learned_delay: delay,
        });
        delay
    }

    /// As [`Self::record_rate_limit`], but additionally extends the
    /// provider's cooldown window by `max(wait_seconds, learned_delay)`,
    /// never shrinking an existing cooldown. Returns the cooldown duration
    /// remaining from now.
    pub fn record_rate_limit_with_cooldown(
        &self,
        provider: &str,
        action: &str,
        wait_seconds: f64,
    ) -> Duration {
        let key = provider::normalize(provider);
        let learned_delay = self.grow_delay(&key);
        self.push_history(&key, action);
        self.emit(RateLimitEvent::RateLimitObserved {
            provider: key.clone(),
            timestamp: self.clock.now(),
            learned_delay,
        });

        let now = self.clock.system_now();
        let extension = wait_seconds.max(0.0).max(learned_delay.as_secs_f64());
        let candidate = now + Duration::from_secs_f64(extension);

        let remaining = {
            let mut states = self.state.lock().expect("rate-limit state lock poisoned");
            let entry = states
                .entry(key.clone())
                .or_insert_with(|| ProviderState::new(key.clone()));
            let new_until = match entry.cooldown_until {
                Some(existing) if existing > candidate => existing,
                _ => candidate,
            };
            entry.cooldown_until = Some(new_until);
            new_until.duration_since(now).unwrap_or(Duration::ZERO)
        };

        self.emit(RateLimitEvent::CooldownStarted {
            provider: key,
            timestamp: self.clock.now(),
            duration: remaining,
        });
        remaining
    }

    fn grow_delay(&self, key: &str) -> Duration {
        let min_delay = self.config.min_delay_for(key);
        let max_delay = self.config.max_learned_delay();
        let mut states = self.state.lock().expect("rate-limit state lock poisoned");
        let entry = states
            .entry(key.to_string())
            .or_insert_with(|| ProviderState::new(key));

        let grown = (entry.learned_delay.as_secs_f64() * DELAY_INCREASE_RATE)
            .max(min_delay.as_secs_f64());
        entry.learned_delay = Duration::from_secs_f64(grown).min(max_delay);
        entry.consecutive_successes = 0;
        entry.last_rate_limit_at = Some(self.clock.system_now());
        entry.total_rate_limits += 1;
        entry.learned_delay
    }

    /// Records a successful request. Once `successes_to_decay` consecutive
    /// successes have been observed, the learned delay shrinks by 10%
    /// (bounded below by the provider's minimum) and the counter resets.
    pub fn record_success(&self, provider: &str) {
        let key = provider::normalize(provider);
        let min_delay = self.config.min_delay_for(&key);
        let decayed = {
            let mut states = self.state.lock().expect("rate-limit state lock poisoned");
            let entry = states
                .entry(key.clone())
                .or_insert_with(|| ProviderState::new(key.clone()));
            entry.total_successes += 1;
            entry.consecutive_successes += 1;

            if entry.consecutive_successes < self.config.successes_to_decay() {
                return;
            }

            let shrunk = (entry.learned_delay.as_secs_f64() * DELAY_DECREASE_RATE)
                .max(min_delay.as_secs_f64());
            entry.learned_delay = Duration::from_secs_f64(shrunk);
            entry.consecutive_successes = 0;
            entry.learned_delay
        };

        self.emit(RateLimitEvent::DelayDecayed {
            provider: key,
            timestamp: self.clock.now(),
            learned_delay: decayed,
        });
    }

    /// The delay a caller should currently wait before issuing another
    /// request to `provider`.
    pub fn optimal_delay(&self, provider: &str) -> Duration {
        let key = provider::normalize(provider);
        let min_delay = self.config.min_delay_for(&key);
        let states = self.state.lock().expect("rate-limit state lock poisoned");
        states
            .get(&key)
            .map(|s| s.learned_delay.max(min_delay))
            .unwrap_or(min_delay)
    }

    /// Time remaining in `provider`'s cooldown window, or zero if none is
    /// active.
    pub fn cooldown_remaining(&self, provider: &str) -> Duration {
        let key = provider::normalize(provider);
        let now = self.clock.system_now();
        let states = self.state.lock().expect("rate-limit state lock poisoned");
        states
            .get(&key)
            .and_then(|s| s.cooldown_until)
            .and_then(|until| until.duration_since(now).ok())
            .unwrap_or(Duration::ZERO)
    }

    /// True if `provider` currently has time remaining in its cooldown.
    pub fn is_in_cooldown(&self, provider: &str) -> bool {
        self.cooldown_remaining(provider) > Duration::ZERO
    }

    /// Clears any active cooldown for `provider`.
    pub fn clear_cooldown(&self, provider: &str) {
        let key = provider::normalize(provider);
        {
            let mut states = self.state.lock().expect("rate-limit state lock poisoned");
            if let Some(entry) = states.get_mut(&key) {
                entry.cooldown_until = None;
            }
        }
        self.emit(RateLimitEvent::CooldownCleared {
            provider: key,
            timestamp: self.clock.now(),
        });
    }

    fn push_history(&self, key: &str, action: &str) {
        let mut history = self.history.lock().expect("rate-limit history lock poisoned");
        let entries = history.entry(key.to_string()).or_default();
        entries.push_back(HistoryEntry {
            time: self.clock.system_now(),
            provider: key.to_string(),
            action: action.to_string(),
        });
        while entries.len() > HISTORY_CAPACITY {
            entries.pop_front();
        }
    }

    fn emit(&self, event: RateLimitEvent) {
        self.config.emit(&event);
    }

    /// Loads persisted state from `<dir>/.paneguard/rate_limits.json`,
    /// sanitizing any corrupted values (see module docs). Missing files are
    /// not an error — the tracker simply starts empty.
    pub fn load_from_dir(&self, dir: &Path) -> Result<(), RateLimitError> {
        let path = dir.join(DATA_SUBDIR).join(STATE_FILE);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(RateLimitError::Io {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };

        let persisted: PersistedFile =
            serde_json::from_slice(&bytes).map_err(|e| RateLimitError::Malformed {
                path: path.display().to_string(),
                source: e,
            })?;

        let now = self.clock.system_now();
        let mut states = self.state.lock().expect("rate-limit state lock poisoned");
        let mut history = self.history.lock().expect("rate-limit history lock poisoned");
        states.clear();
        history.clear();

        for (provider, raw) in persisted.state {
            states.insert(provider.clone(), sanitize(provider, raw, now));
        }
        for (provider, entries) in persisted.history {
            let ring: VecDeque<HistoryEntry> = entries
                .into_iter()
                .map(|e| HistoryEntry {
                    time: e.time.into(),
                    provider: e.provider,
                    action: e.action,
                })
                .collect();
            history.insert(provider, ring);
        }
        Ok(())
    }

    /// Saves current state to `<dir>/.paneguard/rate_limits.json`. Best
    /// effort: the directory is created if missing; the file is written
    /// with mode 0644 on unix.
    pub fn save_to_dir(&self, dir: &Path) -> Result<(), RateLimitError> {
        let subdir = dir.join(DATA_SUBDIR);
        fs::create_dir_all(&subdir).map_err(|e| RateLimitError::Io {
            path: subdir.display().to_string(),
            source: e,
        })?;
        let path = subdir.join(STATE_FILE);

        let states = self.state.lock().expect("rate-limit state lock poisoned");
        let history = self.history.lock().expect("rate-limit history lock poisoned");

        let persisted = PersistedFile {
            state: states
                .iter()
                .map(|(k, v)| (k.clone(), PersistedProviderState::from_state(v)))
                .collect(),
            history: history
                .iter()
                .map(|(k, entries)| {
                    (
                        k.clone(),
                        entries
                            .iter()
                            .map(|e| PersistedHistoryEntry {
                                time: e.time.into(),
                                provider: e.provider.clone(),
                                action: e.action.clone(),
                            })
                            .collect(),
                    )
                })
                .collect(),
        };
        drop(states);
        drop(history);

        let json = serde_json::to_vec_pretty(&persisted).map_err(|e| RateLimitError::Malformed {
            path: path.display().to_string(),
            source: e,
        })?;
        fs::write(&path, json).map_err(|e| RateLimitError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&path, fs::Permissions::from_mode(0o644));
        }

        Ok(())
    }
}

fn sanitize(provider: String, raw: PersistedProviderState, now: SystemTime) -> ProviderState {
    let learned_delay = if raw.current_delay < 0 || raw.current_delay as u64 > RATE_LIMIT_SANITIZE_MAX.as_nanos() as u64 {
        Duration::ZERO
    } else {
        Duration::from_nanos(raw.current_delay as u64)
    };

    let cooldown_until = raw.cooldown_until.map(SystemTime::from).filter(|until| {
        until
            .duration_since(now)
            .map(|remaining| remaining <= RATE_LIMIT_SANITIZE_MAX)
            .unwrap_or(true)
    });

    ProviderState {
        provider,
        learned_delay,
        consecutive_successes: raw.consecutive_success,
        last_rate_limit_at: raw.last_rate_limit.map(SystemTime::from),
        cooldown_until,
        total_rate_limits: raw.total_rate_limits,
        total_successes: raw.total_successes,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedFile {
    state: HashMap<String, PersistedProviderState>,
    history: HashMap<String, Vec<PersistedHistoryEntry>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedProviderState {
    current_delay: i64,
    consecutive_success: u32,
    last_rate_limit: Option<DateTime<Utc>>,
    cooldown_until: Option<DateTime<Utc>>,
    #[serde(default)]
    total_rate_limits: u64,
    #[serde(default)]
    total_successes: u64,
}

impl PersistedProviderState {
    fn from_state(state: &ProviderState) -> Self {
        Self {
            current_delay: state.learned_delay.as_nanos() as i64,
            consecutive_success: state.consecutive_successes,
            last_rate_limit: state.last_rate_limit_at.map(DateTime::<Utc>::from),
            cooldown_until: state.cooldown_until.map(DateTime::<Utc>::from),
            total_rate_limits: state.total_rate_limits,
            total_successes: state.total_successes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedHistoryEntry {
    time: DateTime<Utc>,
    provider: String,
    action: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use paneguard_core::clock::FixedClock;

    fn tracker() -> (RateLimitTracker, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new());
        let tracker = RateLimitTracker::with_clock(
            RateLimitTrackerConfig::builder().build(),
            clock.clone() as SharedClock,
        );
        (tracker, clock)
    }

    #[test]
    fn record_rate_limit_grows_delay_multiplicatively() {
        let (tracker, _clock) = tracker();
        let d1 = tracker.record_rate_limit("anthropic", "launch");
        assert_eq!(d1, Duration::from_secs(1));
        let d2 = tracker.record_rate_limit("anthropic", "launch");
        assert!(d2 > d1);
    }

    #[test]
    fn delay_never_exceeds_max_learned_delay() {
        let (tracker, _clock) = tracker();
        for _ in 0..100 {
            tracker.record_rate_limit("openai", "launch");
        }
        assert_eq!(tracker.optimal_delay("openai"), Duration::from_secs(600));
    }

    #[test]
    fn provider_aliases_share_state() {
        let (tracker, _clock) = tracker();
        tracker.record_rate_limit("claude", "a");
        let direct = tracker.optimal_delay("anthropic");
        let aliased = tracker.optimal_delay("cc");
        assert_eq!(direct, aliased);
    }

    #[test]
    fn success_decays_delay_after_threshold() {
        let (tracker, _clock) = tracker();
        tracker.record_rate_limit("anthropic", "a");
        let before = tracker.optimal_delay("anthropic");
        for _ in 0..10 {
            tracker.record_success("anthropic");
        }
        let after = tracker.optimal_delay("anthropic");
        assert!(after < before);
    }

    #[test]
    fn success_decay_floors_at_min_delay() {
        let (tracker, _clock) = tracker();
        for _ in 0..50 {
            for _ in 0..10 {
                tracker.record_success("anthropic");
            }
        }
        assert_eq!(tracker.optimal_delay("anthropic"), Duration::from_secs(1));
    }

    #[test]
    fn cooldown_extends_monotonically() {
        let (tracker, clock) = tracker();
        let first = tracker.record_rate_limit_with_cooldown("openai", "a", 10.0);
        assert!(first >= Duration::from_secs(10));
        clock.advance(Duration::from_secs(2));
        // A smaller hint must not shrink the existing cooldown.
        let second = tracker.record_rate_limit_with_cooldown("openai", "a", 1.0);
        assert!(second >= first - Duration::from_secs(2));
    }

    #[test]
    fn clear_cooldown_removes_it() {
        let (tracker, _clock) = tracker();
        tracker.record_rate_limit_with_cooldown("google", "a", 30.0);
        assert!(tracker.is_in_cooldown("google"));
        tracker.clear_cooldown("google");
        assert!(!tracker.is_in_cooldown("google"));
    }

    #[test]
    fn save_and_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let (tracker, _clock) = tracker();
        tracker.record_rate_limit("anthropic", "launch");
        tracker.record_rate_limit_with_cooldown("openai", "launch", 42.0);
        tracker.save_to_dir(dir.path()).unwrap();

        let (reloaded, _clock2) = tracker();
        reloaded.load_from_dir(dir.path()).unwrap();
        assert_eq!(
            reloaded.optimal_delay("anthropic"),
            tracker.optimal_delay("anthropic")
        );
        assert!(reloaded.is_in_cooldown("openai"));
    }

    #[test]
    fn load_sanitizes_negative_delay_and_far_future_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let subdir = dir.path().join(DATA_SUBDIR);
        fs::create_dir_all(&subdir).unwrap();
        let corrupted = serde_json::json!({
            "state": {
                "anthropic": {
                    "current_delay": -1,
                    "consecutive_success": 0,
                    "last_rate_limit": null,
                    "cooldown_until": (Utc::now() + chrono::Duration::hours(2)).to_rfc3339(),
                    "total_rate_limits": 1,
                    "total_successes": 0
                }
            },
            "history": {}
        });
        fs::write(
            subdir.join(STATE_FILE),
            serde_json::to_vec(&corrupted).unwrap(),
        )
        .unwrap();

        let (tracker, _clock) = tracker();
        tracker.load_from_dir(dir.path()).unwrap();
        assert_eq!(tracker.optimal_delay("anthropic"), Duration::from_secs(1));
        assert!(!tracker.is_in_cooldown("anthropic"));
    }

    #[test]
    fn missing_persisted_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (tracker, _clock) = tracker();
        assert!(tracker.load_from_dir(dir.path()).is_ok());
    }

    #[test]
    fn history_ring_caps_at_100_entries() {
        let (tracker, _clock) = tracker();
        for _ in 0..150 {
            tracker.record_rate_limit("anthropic", "launch");
        }
        let history = tracker.history.lock().unwrap();
        assert_eq!(history.get("anthropic").unwrap().len(), 100);
    }
}
