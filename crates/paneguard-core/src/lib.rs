//! Shared foundation for the `paneguard` admission-control crates.
//!
//! This crate provides infrastructure used by every other crate in the
//! workspace:
//! - an [`events`] bus for observability (independent of `tracing`),
//! - an injectable [`clock`] so phase machines can be driven deterministically
//!   in tests instead of sleeping on a wall clock,
//! - an injectable [`rng`] so jittered delays are reproducible in tests,
//! - a unified [`error::CoreError`] for callers that want to handle every
//!   subsystem uniformly, and
//! - (behind the `test-util` feature) a [`test_support`] harness bundling
//!   the fake clock and fake jitter source for other crates' tests.
//!
//! No component here is specific to output classification, rate-limit
//! tracking, throttling, admission caps, or backoff — those live in their
//! own crates and depend on this one.

pub mod clock;
pub mod error;
pub mod events;
pub mod rng;

#[cfg(feature = "test-util")]
pub mod test_support;

pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use error::CoreError;
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use rng::{Jitter, SeededJitter, SharedJitter, ThreadRngJitter, ZeroJitter};
