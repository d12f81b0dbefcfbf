//! Property test for P2: the learned delay never leaves
//! `[min_delay, max_learned_delay]` under any sequence of rate-limit and
//! success observations.

use paneguard_ratelimit::{RateLimitTrackerConfig, RateLimitTracker};
use proptest::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum Op {
    RateLimit,
    Success,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::RateLimit), Just(Op::Success)]
}

proptest! {
    #[test]
    fn learned_delay_stays_within_bounds(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let config = RateLimitTrackerConfig::builder()
            .min_delay_anthropic(Duration::from_millis(500))
            .max_learned_delay(Duration::from_secs(600))
            .build();
        let tracker = RateLimitTracker::new(config);

        for op in ops {
            match op {
                Op::RateLimit => {
                    tracker.record_rate_limit("anthropic", "prop");
                }
                Op::Success => {
                    tracker.record_success("anthropic");
                }
            }
            let delay = tracker.optimal_delay("anthropic");
            prop_assert!(delay >= Duration::from_millis(500));
            prop_assert!(delay <= Duration::from_secs(600));
        }
    }
}
