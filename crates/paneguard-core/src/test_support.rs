//! Fake-clock/fake-jitter test harness shared across the workspace's
//! `dev-dependencies`, gated behind the `test-util` feature so it never
//! ships in a release build.
//!
//! Every subsystem crate already injects [`crate::clock::Clock`] and
//! [`crate::rng::Jitter`]; this module just bundles the fakes so a test
//! exercising more than one subsystem doesn't construct a separate
//! [`FixedClock`]/[`SeededJitter`] pair by hand each time.

use crate::clock::{FixedClock, SharedClock};
use crate::rng::{SeededJitter, SharedJitter, ZeroJitter};
use std::sync::Arc;
use std::time::Duration;

/// A paired fake clock and fake jitter source for deterministic tests.
pub struct TestHarness {
    clock: Arc<FixedClock>,
    pub jitter: SharedJitter,
}

impl TestHarness {
    /// A harness with a seeded (but reproducible) jitter source.
    pub fn seeded(seed: u64) -> Self {
        Self {
            clock: Arc::new(FixedClock::new()),
            jitter: Arc::new(SeededJitter::new(seed)),
        }
    }

    /// A harness whose jitter source always returns zero, for tests that
    /// assert on an exact, un-jittered delay.
    pub fn zero_jitter() -> Self {
        Self {
            clock: Arc::new(FixedClock::new()),
            jitter: Arc::new(ZeroJitter),
        }
    }

    /// The clock as the trait object constructors like `BackoffController`
    /// expect.
    pub fn clock(&self) -> SharedClock {
        self.clock.clone()
    }

    /// Advances the fake clock shared by everything built from this
    /// harness.
    pub fn advance(&self, duration: Duration) {
        self.clock.advance(duration);
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::seeded(0)
    }
}
