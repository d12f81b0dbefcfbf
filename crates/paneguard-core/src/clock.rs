//! Time injection for components whose correctness depends on elapsed time.
//!
//! Every lazily-advanced phase machine in this workspace (Codex Throttle,
//! Agent Caps ramp-up/cooldown, Backoff Controller's global pause) takes a
//! [`Clock`] instead of calling `Instant::now()`/`SystemTime::now()`
//! directly, so tests can drive transitions deterministically without
//! sleeping on a wall clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A source of monotonic and wall-clock time.
///
/// The default implementation, [`SystemClock`], delegates to
/// `std::time`. Tests use [`FixedClock`] to advance time explicitly.
pub trait Clock: Send + Sync {
    /// Monotonic instant, used for all interval/duration math.
    fn now(&self) -> Instant;

    /// Wall-clock time, used only where a value must be persisted or
    /// rendered (e.g. `AgentState::parsed_at`, RFC3339 timestamps).
    fn system_now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Shared handle to a clock implementation.
pub type SharedClock = Arc<dyn Clock>;

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only advances when told to.
///
/// `Instant` has no public constructor for arbitrary points in time, so
/// `FixedClock` anchors a real `Instant` taken at construction and tracks
/// an offset in nanoseconds on top of it; `now()` returns `anchor + offset`.
pub struct FixedClock {
    anchor: Instant,
    anchor_system: SystemTime,
    offset_nanos: AtomicU64,
}

impl FixedClock {
    /// Creates a clock pinned at the moment of construction.
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
            anchor_system: SystemTime::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    /// Advances the clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.offset_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    fn offset(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Instant {
        self.anchor + self.offset()
    }

    fn system_now(&self) -> SystemTime {
        self.anchor_system + self.offset()
    }
}

/// Converts a `SystemTime` to a Unix timestamp in whole seconds, saturating
/// at zero for times before the epoch. Used by persistence sanitization.
pub fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}
