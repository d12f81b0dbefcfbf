//! Regression test for the Agent Caps / Codex Throttle integration: a
//! `"cod"` waiter queued because `try_admit_locked` returned `RejectedCod`
//! must not be admitted by a later release or cooldown-recovery wake while
//! the attached `CodexThrottle` is still in its `Paused` phase.

use paneguard_agent_caps::{AcquireOutcome, AgentCaps, AgentCapsConfig, AgentTypeConfig};
use paneguard_codex_throttle::{CodexThrottle, CodexThrottleConfig};
use paneguard_core::clock::FixedClock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn queued_cod_waiter_is_not_woken_while_throttle_is_paused() {
    let clock = Arc::new(FixedClock::new());
    let throttle = Arc::new(CodexThrottle::with_clock(
        CodexThrottleConfig::builder().max_concurrent(4).build(),
        clock.clone(),
    ));
    let config = AgentCapsConfig::builder()
        .agent_type("cod", AgentTypeConfig::builder().max_concurrent(4).build())
        .build()
        .unwrap();
    let caps = AgentCaps::with_clock(config, clock.clone()).with_codex_throttle(throttle.clone());

    assert!(caps.try_acquire("cod"));

    throttle.record_rate_limit("pane-1", None);
    assert!(!caps.try_acquire("cod"));

    let waiter_caps = caps.clone();
    let cancel = CancellationToken::new();
    let waiter_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        let cancel = waiter_cancel;
        waiter_caps.acquire("cod", &cancel).await
    });

    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    // Freeing the originally-held slot must not admit the queued waiter
    // while the throttle is still paused.
    caps.release("cod");
    tokio::task::yield_now().await;
    assert!(!handle.is_finished());

    // Once the cooldown elapses, a subsequent wake attempt must admit it.
    clock.advance(Duration::from_secs(31));
    caps.release("cod"); // running is already 0; this only retriggers the wake scan
    let outcome = tokio::time::timeout(Duration::from_millis(200), handle)
        .await
        .expect("waiter should be admitted once the throttle recovers")
        .unwrap();
    assert_eq!(outcome, AcquireOutcome::Admitted);

    cancel.cancel();
}
