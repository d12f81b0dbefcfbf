//! Admission control and resilience core for a multi-agent terminal-session
//! orchestrator.
//!
//! This crate is a thin facade over five independent component crates, each
//! usable on its own:
//!
//! - [`classifier`] — parses pane scrollback into structured [`AgentState`].
//! - [`ratelimit`] — per-provider adaptive delay, informed by rate limits the
//!   classifier detects.
//! - [`codex_throttle`] — an AIMD launch gate for one agent family.
//! - [`agent_caps`] — per-agent-type concurrency caps, consulting the Codex
//!   Throttle for that family's launches.
//! - [`backoff`] — jittered retry delays and a global scheduler pause driven
//!   by a pure resource-error classifier.
//!
//! Enable the `full` feature to pull in all five plus [`System`], which wires
//! them together the way a scheduler actually uses them: pane output flows
//! through the classifier into the rate-limit tracker (and, for codex, the
//! throttle); launch requests flow through agent caps; launch failures flow
//! through the backoff controller.
//!
//! Each component crate remains independently usable — `System` is a
//! convenience, not the only supported entry point.

pub use paneguard_core as core;

#[cfg(feature = "classifier")]
pub use paneguard_classifier as classifier;
#[cfg(feature = "ratelimit")]
pub use paneguard_ratelimit as ratelimit;
#[cfg(feature = "codex-throttle")]
pub use paneguard_codex_throttle as codex_throttle;
#[cfg(feature = "agent-caps")]
pub use paneguard_agent_caps as agent_caps;
#[cfg(feature = "backoff")]
pub use paneguard_backoff as backoff;

#[cfg(feature = "full")]
mod system;

#[cfg(feature = "full")]
pub use system::{System, SystemConfig};
