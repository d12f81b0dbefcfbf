//! Per-agent-type pattern tables used by the classification cascade.
//!
//! Patterns are plain `regex::Regex` values behind `LazyLock` statics —
//! one table per [`AgentType`](crate::types::AgentType), compiled once per
//! process. There is deliberately no trait for "a thing with patterns":
//! dynamic dispatch across agent families is modeled as a closed match,
//! not an open interface (see the design notes on dynamic dispatch).

use crate::types::AgentType;
use regex::Regex;
use std::sync::LazyLock;

pub struct PatternTable {
    /// Exact header/signature patterns checked before the frequency fallback.
    pub headers: &'static [&'static str],
    /// Case-insensitive substrings counted in the frequency fallback and
    /// matched (window=20 lines) for the `IsWorking` flag.
    pub working: &'static [&'static str],
    /// Prompt needles matched (window=5 lines) for `IsIdle`. Each needle is
    /// compiled into a case-insensitive regex anchored at the end of the
    /// line (trailing whitespace tolerated) — see [`idle_patterns`] — so a
    /// needle like `">"` matches a bare shell-style prompt, not the literal
    /// two-character sequence `"> $"`.
    pub idle: &'static [&'static str],
    /// Case-insensitive substrings matched (window=10 lines) for `IsInError`.
    pub error: &'static [&'static str],
    /// Case-insensitive substrings matched (window=50 lines) for `IsRateLimited`.
    pub rate_limit: &'static [&'static str],
}

pub static CLAUDE: PatternTable = PatternTable {
    headers: &["claude code", "claude>"],
    working: &[
        "esc to interrupt",
        "thinking",
        "tool use:",
        "running…",
        "running...",
    ],
    idle: &["claude>", "human:", ">"],
    error: &["error:", "exception", "traceback"],
    rate_limit: &[
        "rate limit",
        "usage limit reached",
        "try again later",
        "429",
    ],
};

pub static CODEX: PatternTable = PatternTable {
    headers: &["codex", "openai codex"],
    working: &["running command", "applying patch", "thinking", "working"],
    idle: &["codex>", "›", ">"],
    error: &["error:", "failed to", "traceback"],
    rate_limit: &["rate limit", "too many requests", "429", "quota exceeded"],
};

pub static GEMINI: PatternTable = PatternTable {
    headers: &["gemini cli", "gemini>"],
    working: &["generating", "thinking", "running tool"],
    idle: &["gemini>", ">"],
    error: &["error:", "exception", "failed"],
    rate_limit: &["rate limit", "resource exhausted", "429", "quota"],
};

pub static CURSOR: PatternTable = PatternTable {
    headers: &["cursor agent", "cursor>"],
    working: &["running", "editing", "thinking"],
    idle: &["cursor>", ">"],
    error: &["error:", "failed"],
    rate_limit: &["rate limit", "429", "too many requests"],
};

pub static WINDSURF: PatternTable = PatternTable {
    headers: &["windsurf", "cascade>"],
    working: &["running", "analyzing", "thinking"],
    idle: &["cascade>", ">"],
    error: &["error:", "failed"],
    rate_limit: &["rate limit", "429", "too many requests"],
};

pub static AIDER: PatternTable = PatternTable {
    headers: &["aider v", "aider chat"],
    working: &["applying edit", "running", "thinking"],
    idle: &[">"],
    error: &["error:", "failed", "traceback"],
    rate_limit: &["rate limit", "429", "too many requests"],
};

/// Returns the pattern table for a recognized agent type. `Unknown` has no
/// table — callers never look one up for it.
pub fn table(agent_type: AgentType) -> &'static PatternTable {
    match agent_type {
        AgentType::Claude => &CLAUDE,
        AgentType::Codex => &CODEX,
        AgentType::Gemini => &GEMINI,
        AgentType::Cursor => &CURSOR,
        AgentType::Windsurf => &WINDSURF,
        AgentType::Aider => &AIDER,
        AgentType::Unknown => unreachable!("no pattern table for Unknown"),
    }
}

/// Compiles each idle needle into a case-insensitive regex anchored at the
/// end of the line, trailing whitespace tolerated — a prompt-shaped match,
/// not a literal substring.
fn compile_idle(needles: &'static [&'static str]) -> Vec<Regex> {
    needles
        .iter()
        .map(|needle| {
            Regex::new(&format!(r"(?i){}\s*$", regex::escape(needle)))
                .expect("idle needle compiles to a valid regex")
        })
        .collect()
}

static CLAUDE_IDLE: LazyLock<Vec<Regex>> = LazyLock::new(|| compile_idle(CLAUDE.idle));
static CODEX_IDLE: LazyLock<Vec<Regex>> = LazyLock::new(|| compile_idle(CODEX.idle));
static GEMINI_IDLE: LazyLock<Vec<Regex>> = LazyLock::new(|| compile_idle(GEMINI.idle));
static CURSOR_IDLE: LazyLock<Vec<Regex>> = LazyLock::new(|| compile_idle(CURSOR.idle));
static WINDSURF_IDLE: LazyLock<Vec<Regex>> = LazyLock::new(|| compile_idle(WINDSURF.idle));
static AIDER_IDLE: LazyLock<Vec<Regex>> = LazyLock::new(|| compile_idle(AIDER.idle));

/// Returns the compiled, end-of-line-anchored idle regexes for `agent_type`,
/// matching [`PatternTable::idle`]'s needles one-for-one.
pub fn idle_patterns(agent_type: AgentType) -> &'static [Regex] {
    match agent_type {
        AgentType::Claude => &CLAUDE_IDLE,
        AgentType::Codex => &CODEX_IDLE,
        AgentType::Gemini => &GEMINI_IDLE,
        AgentType::Cursor => &CURSOR_IDLE,
        AgentType::Windsurf => &WINDSURF_IDLE,
        AgentType::Aider => &AIDER_IDLE,
        AgentType::Unknown => unreachable!("no pattern table for Unknown"),
    }
}

/// True if any line in `window` matches any of `patterns`.
pub fn window_matches_idle(window: &[&str], patterns: &[Regex]) -> bool {
    window
        .iter()
        .any(|line| patterns.iter().any(|pattern| pattern.is_match(line)))
}

/// Codex's context-percent pattern is checked before the plain header
/// because it is both more specific and more valuable.
pub static CODEX_CONTEXT_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)%\s*context\s*(?:left|remaining)").unwrap());

pub static CODEX_TOKEN_USAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)total[=:]\s*([\d,]+)").unwrap());

pub static CLAUDE_CONTEXT_WARNING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)context (?:window )?(?:running low|almost full|low)").unwrap());

pub static GEMINI_MEMORY_MB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*mb\b").unwrap());

/// Counts case-insensitive substring matches of `needle` in `haystack`.
pub fn count_matches(haystack: &str, needle: &str) -> usize {
    let haystack = haystack.to_lowercase();
    let needle = needle.to_lowercase();
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(&needle).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_recognized_type_has_a_table() {
        for t in AgentType::PRIORITY {
            let table = table(t);
            assert!(!table.headers.is_empty());
        }
    }

    #[test]
    fn context_percent_extracts_value() {
        let caps = CODEX_CONTEXT_PERCENT
            .captures("47% context left · ? for shortcuts")
            .unwrap();
        assert_eq!(&caps[1], "47");
    }

    #[test]
    fn token_usage_extracts_value() {
        let caps = CODEX_TOKEN_USAGE
            .captures("Token usage: total=219,582 input=206,150")
            .unwrap();
        assert_eq!(&caps[1], "219,582");
    }
}
