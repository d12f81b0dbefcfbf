//! Jittered exponential retry delays coordinated with a system-wide
//! scheduler pause, fed by a pure classifier that recognizes OS-level
//! resource exhaustion and upstream rate-limit signals.
//!
//! # Example
//!
//! ```rust
//! use paneguard_backoff::{resource_error, BackoffConfig, BackoffController};
//! use std::time::SystemTime;
//!
//! let controller = BackoffController::new(BackoffConfig::builder().max_retries(3).build());
//!
//! let error = resource_error::classify("rate limit exceeded", None, None, None, SystemTime::now())
//!     .expect("recognized resource error");
//! let (should_retry, delay) = controller.handle_error("job-1", 0, &error);
//! assert!(should_retry);
//! assert!(delay >= std::time::Duration::from_millis(100));
//! ```
//!
//! Repeated failures pause an attached scheduler until the backoff elapses.
//! Triggering the pause spawns a background resumer task, so this requires
//! a Tokio runtime:
//!
//! ```rust
//! use paneguard_backoff::{BackoffConfig, BackoffController, FnPauser};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let paused = Arc::new(AtomicBool::new(false));
//! let p = paused.clone();
//! let config = BackoffConfig::builder()
//!     .consecutive_failures_threshold(1)
//!     .pauser(FnPauser::new(move || p.store(true, Ordering::SeqCst), || {}))
//!     .build();
//! let controller = BackoffController::new(config);
//!
//! let error = paneguard_backoff::resource_error::classify(
//!     "cannot allocate memory", None, None, None, std::time::SystemTime::now(),
//! ).unwrap();
//! controller.handle_error("job-1", 0, &error);
//! assert!(paused.load(Ordering::SeqCst));
//! assert!(controller.is_in_global_backoff());
//! # }
//! ```

mod config;
mod controller;
mod events;
pub mod resource_error;

pub use config::{BackoffConfig, BackoffConfigBuilder, FnPauser, NoopPauser, Pauser};
pub use controller::{BackoffController, BackoffStats};
pub use events::BackoffEvent;
pub use resource_error::{ResourceError, ResourceErrorKind};
