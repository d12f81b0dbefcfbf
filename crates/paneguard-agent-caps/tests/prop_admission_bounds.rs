//! Property test for P1: the current cap never exceeds `max_concurrent`,
//! admission never lets a type's running count exceed its current cap *at
//! the moment of admission*, and the sum of running counts across types
//! never exceeds the configured global ceiling, under any interleaving of
//! acquire/release/failure/success.
//!
//! A failure cooldown can shrink `current_cap` below an already-running
//! count — in-flight work isn't evicted, only new admissions are gated —
//! so `running <= current_cap` is checked only as an admission-time
//! invariant (`try_acquire` returning `true`), not as an always-true
//! snapshot over `stats()`.

use paneguard_agent_caps::{AgentCaps, AgentCapsConfig, AgentTypeConfig};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    TryAcquireA,
    TryAcquireB,
    ReleaseA,
    ReleaseB,
    FailA,
    SuccessA,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::TryAcquireA),
        Just(Op::TryAcquireB),
        Just(Op::ReleaseA),
        Just(Op::ReleaseB),
        Just(Op::FailA),
        Just(Op::SuccessA),
    ]
}

proptest! {
    #[test]
    fn running_never_exceeds_cap_or_global_ceiling(ops in prop::collection::vec(op_strategy(), 0..300)) {
        let global_max = 3;
        let config = AgentCapsConfig::builder()
            .global_max(global_max)
            .agent_type(
                "a",
                AgentTypeConfig::builder()
                    .max_concurrent(2)
                    .cooldown_on_failure(true, 1, std::time::Duration::from_secs(30))
                    .build(),
            )
            .agent_type("b", AgentTypeConfig::builder().max_concurrent(2).build())
            .build()
            .unwrap();
        let caps = AgentCaps::new(config);

        let mut held_a: usize = 0;
        let mut held_b: usize = 0;

        for op in ops {
            match op {
                Op::TryAcquireA => {
                    let before = caps.stats().get("a").map(|s| s.running).unwrap_or(0);
                    let before_cap = caps.stats().get("a").map(|s| s.current_cap).unwrap_or(0);
                    if caps.try_acquire("a") {
                        held_a += 1;
                        prop_assert!(before < before_cap);
                    }
                }
                Op::TryAcquireB => {
                    let before = caps.stats().get("b").map(|s| s.running).unwrap_or(0);
                    let before_cap = caps.stats().get("b").map(|s| s.current_cap).unwrap_or(0);
                    if caps.try_acquire("b") {
                        held_b += 1;
                        prop_assert!(before < before_cap);
                    }
                }
                Op::ReleaseA => {
                    if held_a > 0 {
                        caps.release("a");
                        held_a -= 1;
                    }
                }
                Op::ReleaseB => {
                    if held_b > 0 {
                        caps.release("b");
                        held_b -= 1;
                    }
                }
                Op::FailA => {
                    caps.record_failure("a");
                }
                Op::SuccessA => {
                    caps.record_success("a");
                }
            }

            let stats = caps.stats();
            let mut total_running = 0;
            for (_, s) in stats.iter() {
                prop_assert!(s.current_cap <= s.max_concurrent);
                total_running += s.running;
            }
            prop_assert!(total_running <= global_max);
        }
    }
}
