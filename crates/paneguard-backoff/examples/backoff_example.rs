//! Demonstrates classification, a jittered retry delay, and a global
//! scheduler pause driven by a fixed clock.
//!
//! Run with: cargo run --example backoff_example -p paneguard-backoff

use paneguard_backoff::{resource_error, BackoffConfig, BackoffController, FnPauser};
use paneguard_core::clock::FixedClock;
use paneguard_core::rng::ZeroJitter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let clock = Arc::new(FixedClock::new());
    let scheduler_paused = Arc::new(AtomicBool::new(false));
    let pause_flag = scheduler_paused.clone();
    let resume_flag = scheduler_paused.clone();

    let config = BackoffConfig::builder()
        .initial_delay(Duration::from_secs(1))
        .multiplier(2.0)
        .consecutive_failures_threshold(3)
        .on_retry(|job, attempt, delay| println!("  retry {job} (attempt {attempt}) after {delay:?}"))
        .on_backoff_start(|| println!("  scheduler paused"))
        .on_backoff_end(|| println!("  scheduler resumed"))
        .pauser(FnPauser::new(
            move || pause_flag.store(true, Ordering::SeqCst),
            move || resume_flag.store(false, Ordering::SeqCst),
        ))
        .build();

    let controller = BackoffController::with_clock_and_jitter(config, clock.clone(), Arc::new(ZeroJitter));

    println!("1. A rate-limit error is classified and the job is told to retry:");
    let error = resource_error::classify("rate limit exceeded", None, None, None, SystemTime::now()).unwrap();
    let (should_retry, delay) = controller.handle_error("launch-claude-code", 0, &error);
    println!("   should_retry={should_retry} delay={delay:?}");

    println!("\n2. Two more consecutive failures cross the threshold and pause the scheduler:");
    let oom = resource_error::classify("cannot allocate memory", None, None, None, SystemTime::now()).unwrap();
    controller.handle_error("launch-codex", 0, &oom);
    controller.handle_error("launch-codex", 1, &oom);
    println!("   in_global_backoff={}", controller.is_in_global_backoff());
    println!("   scheduler_paused={}", scheduler_paused.load(Ordering::SeqCst));

    println!("\n3. Time passes and the backoff elapses on its own:");
    clock.advance(Duration::from_secs(30));
    println!("   remaining_backoff={:?}", controller.remaining_backoff());

    println!("\n4. A success in the meantime resets counters and would end an active backoff early:");
    controller.record_success();
    println!("   stats={:?}", controller.stats());
}
