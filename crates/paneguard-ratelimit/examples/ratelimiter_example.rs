//! Demonstrates learning a per-provider cadence from rate-limit
//! observations, decaying it back down on success, and persisting it
//! across a simulated restart.
//!
//! Run with: cargo run --example ratelimiter_example -p paneguard-ratelimit

use paneguard_ratelimit::{detect, RateLimitTracker, RateLimitTrackerConfig};
use std::time::Duration;
use tempfile::tempdir;

fn main() {
    println!("=== paneguard rate-limit tracker demo ===\n");

    let tracker = RateLimitTracker::new(
        RateLimitTrackerConfig::builder()
            .min_delay_anthropic(Duration::from_secs(1))
            .max_learned_delay(Duration::from_secs(600))
            .successes_to_decay(5)
            .on_rate_limit_observed(|provider, delay| {
                println!("  [{provider}] learned delay now {delay:?}");
            })
            .on_cooldown_started(|provider, duration| {
                println!("  [{provider}] cooldown for {duration:?}");
            })
            .build(),
    );

    println!("1. Observing repeated rate limits from Claude Code:");
    for _ in 0..4 {
        tracker.record_rate_limit("claude-code", "launch_rejected");
    }
    println!(
        "   optimal_delay(anthropic) = {:?}\n",
        tracker.optimal_delay("anthropic")
    );

    println!("2. A 429 response with a retry-after hint:");
    let detection = detect("429 Too Many Requests. retry-after: 20", Some(429));
    if detection.rate_limited {
        let cooldown = tracker.record_rate_limit_with_cooldown(
            "cod",
            "api_call_rejected",
            detection.wait_seconds.unwrap_or(30.0),
        );
        println!("   cooldown remaining: {cooldown:?}\n");
    }

    println!("3. Recovering via sustained success:");
    for _ in 0..5 {
        tracker.record_success("claude-code");
    }
    println!(
        "   optimal_delay(anthropic) after recovery = {:?}\n",
        tracker.optimal_delay("anthropic")
    );

    println!("4. Persisting and reloading state:");
    let dir = tempdir().unwrap();
    tracker.save_to_dir(dir.path()).unwrap();
    let reloaded = RateLimitTracker::new(RateLimitTrackerConfig::default());
    reloaded.load_from_dir(dir.path()).unwrap();
    println!(
        "   reloaded optimal_delay(anthropic) = {:?}",
        reloaded.optimal_delay("anthropic")
    );
}
