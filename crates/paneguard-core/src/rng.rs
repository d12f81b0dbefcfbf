//! Randomness injection for jittered delays.
//!
//! The Backoff Controller's jitter must never call a global random source
//! directly so that tests can pin the sequence of jitter values. `Jitter`
//! mirrors the `Clock` abstraction in [`crate::clock`]: a trait with a
//! real implementation backed by `rand`, and a deterministic one for tests.

use std::sync::{Arc, Mutex};

/// A source of jitter in `[-1.0, 1.0]`, scaled by the caller.
pub trait Jitter: Send + Sync {
    /// Returns a value uniformly distributed in `[min, max]`.
    fn uniform(&self, min: f64, max: f64) -> f64;
}

/// Shared handle to a jitter source.
pub type SharedJitter = Arc<dyn Jitter>;

/// The default jitter source, backed by `rand::thread_rng`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl Jitter for ThreadRngJitter {
    fn uniform(&self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        rand::Rng::gen_range(&mut rand::thread_rng(), min..=max)
    }
}

/// A seeded jitter source for deterministic tests.
///
/// Wraps `rand::rngs::StdRng` behind a mutex since `Jitter::uniform` takes
/// `&self`.
pub struct SeededJitter {
    rng: Mutex<rand::rngs::StdRng>,
}

impl SeededJitter {
    /// Creates a jitter source seeded with `seed`, reproducible across runs.
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;
        Self {
            rng: Mutex::new(rand::rngs::StdRng::seed_from_u64(seed)),
        }
    }
}

impl Jitter for SeededJitter {
    fn uniform(&self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        let mut rng = self.rng.lock().expect("jitter rng lock poisoned");
        rand::Rng::gen_range(&mut *rng, min..=max)
    }
}

/// A jitter source that always returns zero, for tests asserting on the
/// un-jittered base delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroJitter;

impl Jitter for ZeroJitter {
    fn uniform(&self, _min: f64, _max: f64) -> f64 {
        0.0
    }
}
