//! Property test for P4: `Confidence` stays in `[0, 1]`, a rate-limited
//! state is never also flagged working or idle, and an idle state is never
//! also flagged working — for any scrollback built from a random mix of
//! known agent-header/pattern lines and arbitrary junk text.

use paneguard_classifier::{classify, ClassifierConfig};
use paneguard_core::clock::FixedClock;
use proptest::prelude::*;

const FRAGMENTS: &[&str] = &[
    "claude code",
    "claude>",
    "human:",
    "esc to interrupt",
    "thinking",
    "tool use:",
    "rate limit",
    "usage limit reached",
    "429",
    "codex",
    "openai codex",
    "running command",
    "applying patch",
    "codex>",
    "too many requests",
    "quota exceeded",
    "gemini cli",
    "gemini>",
    "generating",
    "resource exhausted",
    "error:",
    "exception",
    "traceback",
    "47% context left",
    "total=219,582 input=1",
    "some random unrelated line of chatter",
    "",
];

fn fragment() -> impl Strategy<Value = &'static str> {
    prop::sample::select(FRAGMENTS)
}

proptest! {
    #[test]
    fn classification_invariants_hold(lines in prop::collection::vec(fragment(), 0..80)) {
        let output = lines.join("\n");
        let clock = FixedClock::new();
        let state = classify(&output, &clock, &ClassifierConfig::default());

        prop_assert!(state.confidence >= 0.0 && state.confidence <= 1.0);
        if state.is_rate_limited {
            prop_assert!(!state.is_working);
            prop_assert!(!state.is_idle);
        }
        if state.is_idle {
            prop_assert!(!state.is_working);
        }
    }
}
