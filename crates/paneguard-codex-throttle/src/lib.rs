//! AIMD launch throttle gating how aggressively one agent family (codex)
//! may be launched, in response to rate limits it reports back.
//!
//! The throttle advances a small phase machine — `normal`, `paused`,
//! `recovering` — purely as a function of elapsed time and observed rate
//! limits: a rate limit halves the admission window and pauses launches
//! for a cooldown window; once the cooldown elapses the window grows back
//! additively until it reaches its ceiling and the throttle returns to
//! `normal`.
//!
//! ```
//! use paneguard_codex_throttle::{CodexThrottle, CodexThrottleConfig};
//!
//! let throttle = CodexThrottle::new(CodexThrottleConfig::builder().max_concurrent(4).build());
//! assert!(throttle.may_launch(0));
//! throttle.record_rate_limit("pane-1", None);
//! assert!(!throttle.may_launch(0));
//! ```

mod config;
mod events;
mod throttle;

pub use config::{CodexThrottleConfig, CodexThrottleConfigBuilder};
pub use events::CodexThrottleEvent;
pub use throttle::{CodexThrottle, CodexThrottleStatus, Phase};
