//! Walks a simulated codex launch through every wired-up component: output
//! classification, the rate-limit tracker, agent caps, the codex throttle,
//! and the backoff controller.
//!
//! Run with: cargo run --example full_stack -p paneguard --features full

use paneguard::{System, SystemConfig};
use paneguard_agent_caps::{AcquireOutcome, AgentCapsConfig, AgentTypeConfig};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // "cod" is the admission-control key for the codex family specifically
    // (see `AgentCaps::record_codex_rate_limit`); it is distinct from the
    // classifier's `AgentType::Codex` and from rate-limit provider aliases.
    let config = SystemConfig {
        agent_caps: AgentCapsConfig::builder()
            .agent_type("cod", AgentTypeConfig::builder().max_concurrent(2).build())
            .build()
            .unwrap(),
        ..SystemConfig::default()
    };
    let system = System::new(config);

    println!("1. A launch is admitted immediately, capacity is free:");
    let cancel = CancellationToken::new();
    let outcome = system.launch("cod", &cancel).await;
    println!("   outcome={outcome:?}");
    assert_eq!(outcome, AcquireOutcome::Admitted);

    println!("\n2. The pane reports a rate limit; it reaches the tracker and the throttle:");
    let state = system.process_output("openai", "codex-pane-1", "Error: rate limit exceeded, please retry later");
    println!("   is_rate_limited={} agent_type={:?}", state.is_rate_limited, state.agent_type);
    println!("   codex_throttle.status={:?}", system.codex_throttle.status());

    println!("\n3. The launch then fails with an OS-level resource error:");
    let outcome = system.handle_launch_failure(
        "cod",
        "launch-codex-1",
        0,
        "cannot allocate memory",
        None,
        None,
        None,
    );
    println!("   classified_outcome={outcome:?}");

    system.release("cod");

    println!("\n4. A later launch succeeds, clearing the cooldown and the failure count:");
    system.record_launch_success("cod");
    println!("   agent_caps.stats={:?}", system.agent_caps.stats());
}
