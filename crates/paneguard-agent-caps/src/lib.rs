//! Per-agent-type admission control: a concurrency cap per agent type, an
//! optional global ceiling across all types, ramp-up that widens a fresh
//! type's cap over time, and a failure cooldown that shrinks it back down.
//!
//! # Basic Example
//!
//! ```rust
//! use paneguard_agent_caps::{AgentCaps, AgentCapsConfig, AgentTypeConfig};
//!
//! let config = AgentCapsConfig::builder()
//!     .agent_type("claude-code", AgentTypeConfig::builder().max_concurrent(4).build())
//!     .build()
//!     .unwrap();
//! let caps = AgentCaps::new(config);
//!
//! assert!(caps.try_acquire("claude-code"));
//! assert!(caps.try_acquire("claude-code"));
//! caps.release("claude-code");
//! ```
//!
//! # Blocking Acquire with Cancellation
//!
//! ```rust
//! use paneguard_agent_caps::{AgentCaps, AgentCapsConfig, AgentTypeConfig, AcquireOutcome};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let config = AgentCapsConfig::builder()
//!     .agent_type("cod", AgentTypeConfig::builder().max_concurrent(1).build())
//!     .build()
//!     .unwrap();
//! let caps = AgentCaps::new(config);
//!
//! assert!(caps.try_acquire("cod"));
//!
//! let cancel = CancellationToken::new();
//! cancel.cancel();
//! let outcome = caps.acquire("cod", &cancel).await;
//! assert_eq!(outcome, AcquireOutcome::Cancelled);
//! # }
//! ```
//!
//! # Ramp-up and Failure Cooldown
//!
//! ```rust
//! use paneguard_agent_caps::{AgentCaps, AgentCapsConfig, AgentTypeConfig};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = AgentCapsConfig::builder()
//!     .agent_type(
//!         "claude-code",
//!         AgentTypeConfig::builder()
//!             .max_concurrent(8)
//!             .ramp_up(1, 1, Duration::from_secs(30))
//!             .cooldown_on_failure(true, 1, Duration::from_secs(60))
//!             .build(),
//!     )
//!     .build()
//!     .unwrap();
//! let caps = AgentCaps::new(config);
//!
//! // Starts at the ramp-up floor, not the full cap.
//! assert!(caps.try_acquire("claude-code"));
//! assert!(!caps.try_acquire("claude-code"));
//!
//! caps.record_failure("claude-code");
//! let stats = caps.stats();
//! assert!(stats["claude-code"].in_cooldown);
//! # }
//! ```

pub mod caps;
pub mod config;
pub mod error;
pub mod events;

pub use caps::{AcquireOutcome, AgentCaps, AgentTypeStats};
pub use config::{AgentCapsConfig, AgentCapsConfigBuilder, AgentTypeConfig, AgentTypeConfigBuilder};
pub use error::ConfigError;
pub use events::AgentCapsEvent;

#[cfg(test)]
mod tests {
    use super::*;
    use paneguard_core::clock::FixedClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn config_with(agent_type: AgentTypeConfig) -> AgentCapsConfig {
        AgentCapsConfig::builder()
            .agent_type("t", agent_type)
            .build()
            .unwrap()
    }

    #[test]
    fn try_acquire_respects_cap_and_release_frees_it() {
        let caps = AgentCaps::new(config_with(AgentTypeConfig::builder().max_concurrent(2).build()));
        assert!(caps.try_acquire("t"));
        assert!(caps.try_acquire("t"));
        assert!(!caps.try_acquire("t"));
        caps.release("t");
        assert!(caps.try_acquire("t"));
    }

    #[test]
    fn unregistered_type_falls_back_to_default() {
        let caps = AgentCaps::new(AgentCapsConfig::default());
        assert!(caps.try_acquire("anything"));
        let stats = caps.stats();
        assert_eq!(stats["anything"].max_concurrent, 4);
    }

    #[test]
    fn global_max_caps_across_types() {
        let config = AgentCapsConfig::builder()
            .global_max(1)
            .agent_type("a", AgentTypeConfig::builder().max_concurrent(4).build())
            .agent_type("b", AgentTypeConfig::builder().max_concurrent(4).build())
            .build()
            .unwrap();
        let caps = AgentCaps::new(config);
        assert!(caps.try_acquire("a"));
        assert!(!caps.try_acquire("b"));
        caps.release("a");
        assert!(caps.try_acquire("b"));
    }

    #[test]
    fn events_fire_on_acquire_and_rejection() {
        let acquired = Arc::new(AtomicUsize::new(0));
        let rejected = Arc::new(AtomicUsize::new(0));
        let a = acquired.clone();
        let r = rejected.clone();
        let config = AgentCapsConfig::builder()
            .agent_type("t", AgentTypeConfig::builder().max_concurrent(1).build())
            .on_slot_acquired(move |_, _, _| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .on_rejected(move |_, _, _| {
                r.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        let caps = AgentCaps::new(config);
        assert!(caps.try_acquire("t"));
        assert!(!caps.try_acquire("t"));
        assert_eq!(acquired.load(Ordering::SeqCst), 1);
        assert_eq!(rejected.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ramp_up_widens_cap_over_time() {
        let clock = Arc::new(FixedClock::new());
        let config = config_with(
            AgentTypeConfig::builder()
                .max_concurrent(3)
                .ramp_up(1, 1, Duration::from_secs(10))
                .build(),
        );
        let caps = AgentCaps::with_clock(config, clock.clone());

        assert!(caps.try_acquire("t"));
        assert!(!caps.try_acquire("t"));

        clock.advance(Duration::from_secs(10));
        assert!(caps.try_acquire("t"));
        assert!(!caps.try_acquire("t"));

        clock.advance(Duration::from_secs(20));
        assert!(caps.try_acquire("t"));
        let stats = caps.stats();
        assert_eq!(stats["t"].current_cap, 3);
    }

    #[test]
    fn set_cap_and_force_ramp_up_override_directly() {
        let config = config_with(
            AgentTypeConfig::builder()
                .max_concurrent(5)
                .ramp_up(1, 1, Duration::from_secs(60))
                .build(),
        );
        let caps = AgentCaps::new(config);
        caps.force_ramp_up("t");
        assert_eq!(caps.stats()["t"].current_cap, 5);
        caps.set_cap("t", 2);
        assert_eq!(caps.stats()["t"].current_cap, 2);
    }

    #[test]
    fn reset_drops_all_state() {
        let caps = AgentCaps::new(config_with(AgentTypeConfig::builder().max_concurrent(1).build()));
        assert!(caps.try_acquire("t"));
        caps.reset();
        assert!(caps.stats().is_empty());
        assert!(caps.try_acquire("t"));
    }

    #[tokio::test]
    async fn acquire_admits_immediately_when_capacity_is_free() {
        let caps = AgentCaps::new(config_with(AgentTypeConfig::builder().max_concurrent(1).build()));
        let cancel = CancellationToken::new();
        assert_eq!(caps.acquire("t", &cancel).await, AcquireOutcome::Admitted);
    }

    #[tokio::test]
    async fn acquire_waits_then_is_admitted_on_release() {
        let caps = Arc::new(AgentCaps::new(config_with(
            AgentTypeConfig::builder().max_concurrent(1).build(),
        )));
        assert!(caps.try_acquire("t"));

        let waiter = caps.clone();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(async move { waiter.acquire("t", &cancel).await });

        tokio::task::yield_now().await;
        caps.release("t");

        assert_eq!(handle.await.unwrap(), AcquireOutcome::Admitted);
    }

    #[tokio::test]
    async fn acquire_returns_cancelled_when_token_fires_first() {
        let caps = AgentCaps::new(config_with(AgentTypeConfig::builder().max_concurrent(1).build()));
        assert!(caps.try_acquire("t"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(caps.acquire("t", &cancel).await, AcquireOutcome::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_consume_a_slot() {
        let caps = Arc::new(AgentCaps::new(config_with(
            AgentTypeConfig::builder().max_concurrent(1).build(),
        )));
        assert!(caps.try_acquire("t"));

        let waiter_caps = caps.clone();
        let cancel = CancellationToken::new();
        let waiter_cancel = cancel.clone();
        let handle = tokio::spawn(async move { waiter_caps.acquire("t", &waiter_cancel).await });

        tokio::task::yield_now().await;
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), AcquireOutcome::Cancelled);

        caps.release("t");
        assert!(caps.try_acquire("t"));
    }

    #[tokio::test(start_paused = true)]
    async fn record_failure_recovers_cap_after_cooldown() {
        let caps = Arc::new(AgentCaps::new(config_with(
            AgentTypeConfig::builder()
                .max_concurrent(4)
                .cooldown_on_failure(true, 2, Duration::from_secs(30))
                .build(),
        )));
        caps.record_failure("t");
        assert_eq!(caps.stats()["t"].current_cap, 2);
        assert!(caps.stats()["t"].in_cooldown);

        tokio::time::advance(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;

        assert!(!caps.stats()["t"].in_cooldown);
        assert_eq!(caps.stats()["t"].current_cap, 4);
    }

    #[tokio::test]
    async fn record_success_during_cooldown_clears_it_promptly() {
        let clock = Arc::new(FixedClock::new());
        let config = config_with(
            AgentTypeConfig::builder()
                .max_concurrent(4)
                .cooldown_on_failure(true, 1, Duration::from_secs(300))
                .build(),
        );
        let caps = AgentCaps::with_clock(config, clock);
        caps.record_failure("t");
        assert!(caps.stats()["t"].in_cooldown);

        caps.record_success("t");
        assert!(!caps.stats()["t"].in_cooldown);
        assert_eq!(caps.stats()["t"].current_cap, 4);
    }
}
