//! Walks through per-agent-type admission: a plain cap, ramp-up for a
//! fresh agent type, failure cooldown, and a cancellable blocking wait.

use paneguard_agent_caps::{AcquireOutcome, AgentCaps, AgentCapsConfig, AgentTypeConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let config = AgentCapsConfig::builder()
        .global_max(6)
        .agent_type(
            "claude-code",
            AgentTypeConfig::builder()
                .max_concurrent(4)
                .ramp_up(1, 1, Duration::from_secs(30))
                .build(),
        )
        .agent_type(
            "cod",
            AgentTypeConfig::builder()
                .max_concurrent(2)
                .cooldown_on_failure(true, 1, Duration::from_secs(2))
                .build(),
        )
        .on_slot_acquired(|agent_type, running, cap| {
            println!("acquired: {agent_type} now running {running}/{cap}");
        })
        .on_rejected(|agent_type, running, cap| {
            println!("rejected: {agent_type} already at {running}/{cap}");
        })
        .on_cooldown_entered(|agent_type, cap| {
            println!("cooldown: {agent_type} shrank to {cap}");
        })
        .build()
        .expect("valid configuration");

    let caps = Arc::new(AgentCaps::new(config));

    println!("-- fresh claude-code agent type only admits its ramp-up floor --");
    assert!(caps.try_acquire("claude-code"));
    assert!(!caps.try_acquire("claude-code"));

    println!("-- a cod launch failure enters cooldown, shrinking its cap --");
    assert!(caps.try_acquire("cod"));
    caps.record_failure("cod");
    let stats = caps.stats();
    println!(
        "cod: running={} cap={} in_cooldown={}",
        stats["cod"].running, stats["cod"].current_cap, stats["cod"].in_cooldown
    );

    println!("-- a second pane waits for a cod slot and is woken on release --");
    let waiter = caps.clone();
    let cancel = CancellationToken::new();
    let wait_cancel = cancel.clone();
    let handle = tokio::spawn(async move { waiter.acquire("cod", &wait_cancel).await });

    tokio::task::yield_now().await;
    caps.release("cod");
    match handle.await.unwrap() {
        AcquireOutcome::Admitted => println!("waiter admitted after release"),
        AcquireOutcome::Cancelled => println!("waiter cancelled"),
    }

    println!("-- a cancelled wait never consumes a slot --");
    assert!(caps.try_acquire("claude-code"));
    let waiter = caps.clone();
    let cancel = CancellationToken::new();
    let wait_cancel = cancel.clone();
    let handle = tokio::spawn(async move { waiter.acquire("claude-code", &wait_cancel).await });
    tokio::task::yield_now().await;
    cancel.cancel();
    println!("outcome: {:?}", handle.await.unwrap());
}
