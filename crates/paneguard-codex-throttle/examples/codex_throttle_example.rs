//! Demonstrates a full pause/recover cycle driven by a fixed clock.
//!
//! Run with: cargo run --example codex_throttle_example -p paneguard-codex-throttle

use paneguard_codex_throttle::{CodexThrottle, CodexThrottleConfig};
use paneguard_core::clock::FixedClock;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    let clock = Arc::new(FixedClock::new());
    let throttle = CodexThrottle::with_clock(
        CodexThrottleConfig::builder()
            .max_concurrent(4)
            .on_phase_change(|event| println!("  {event:?}"))
            .build(),
        clock.clone(),
    );

    println!("1. Normal phase, four launches allowed:");
    println!("   may_launch(0) = {}", throttle.may_launch(0));

    println!("\n2. Pane reports a rate limit:");
    throttle.record_rate_limit("pane-7", Some(Duration::from_secs(20)));
    println!("   status = {:?}", throttle.status().phase);

    println!("\n3. Cooldown elapses, throttle begins recovering:");
    clock.advance(Duration::from_secs(21));
    println!("   may_launch(0) = {}", throttle.may_launch(0));
    println!("   allowed_concurrent = {}", throttle.status().allowed_concurrent);

    println!("\n4. Recovery interval elapses twice, window reaches ceiling:");
    clock.advance(Duration::from_secs(30));
    throttle.may_launch(0);
    println!("   status = {:?}", throttle.status().phase);
    println!("   allowed_concurrent = {}", throttle.status().allowed_concurrent);
}
