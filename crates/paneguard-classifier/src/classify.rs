//! The classification algorithm: turns a captured pane's scrollback into a
//! structured [`AgentState`].
//!
//! Classification is total — there is no error path. Output that matches
//! nothing recognizable produces `AgentType::Unknown` with low confidence,
//! never a failure.

use crate::config::ClassifierConfig;
use crate::patterns::{self, count_matches};
use crate::types::{AgentState, AgentType};
use paneguard_core::Clock;

const RATE_LIMIT_WINDOW: usize = 50;
const IDLE_WINDOW: usize = 5;
const WORKING_WINDOW: usize = 20;
const ERROR_WINDOW: usize = 10;

/// Classifies one pane's raw scrollback capture.
///
/// Steps, in order: strip ANSI/CSI/OSC escapes, detect the agent type via
/// a priority cascade over header patterns (falling back to
/// pattern-frequency scoring), extract type-specific metrics, compute the
/// windowed qualitative flags, score confidence, then truncate the raw
/// sample retained on the result.
pub fn classify(output: &str, clock: &dyn Clock, config: &ClassifierConfig) -> AgentState {
    let parsed_at = clock.system_now();
    let cleaned = crate::ansi::strip(output);

    if cleaned.trim().is_empty() {
        return AgentState::unknown_at(parsed_at);
    }

    let lines: Vec<&str> = cleaned.lines().collect();
    let (agent_type, type_confidence) = detect_type(&cleaned, &lines);

    let mut state = AgentState::unknown_at(parsed_at);
    state.agent_type = agent_type;

    if agent_type == AgentType::Unknown {
        state.confidence = type_confidence;
        state.raw_sample = truncate_tail(&cleaned, config.sample_length());
        return state;
    }

    extract_metrics(&cleaned, agent_type, &mut state, config);

    let table = patterns::table(agent_type);
    let tail = |n: usize| -> Vec<&str> {
        let start = lines.len().saturating_sub(n);
        lines[start..].to_vec()
    };

    let limit_window = tail(RATE_LIMIT_WINDOW);
    state.is_rate_limited = window_matches_any(&limit_window, table.rate_limit);
    state.limit_indicators = matched_needles(&limit_window, table.rate_limit);

    if state.is_rate_limited {
        // A rate-limit hit overrides everything else: force not-working,
        // not-idle, still classify error state, then stop — no working/idle
        // matching is performed once the upstream has pushed back.
        state.is_working = false;
        state.is_idle = false;
        state.is_in_error = window_matches_any(&tail(ERROR_WINDOW), table.error);
        state.confidence = score_confidence(type_confidence, &state);
        state.raw_sample = truncate_tail(&cleaned, config.sample_length());
        return state;
    }

    state.is_idle = patterns::window_matches_idle(&tail(IDLE_WINDOW), patterns::idle_patterns(agent_type))
        || (agent_type == AgentType::Gemini
            && !window_matches_any(&tail(WORKING_WINDOW), table.working));
    state.is_in_error = window_matches_any(&tail(ERROR_WINDOW), table.error);

    let working_window = tail(WORKING_WINDOW);
    state.is_working = window_matches_any(&working_window, table.working) && !state.is_idle;
    state.work_indicators = matched_needles(&working_window, table.working);

    state.confidence = score_confidence(type_confidence, &state);
    state.raw_sample = truncate_tail(&cleaned, config.sample_length());
    state
}

/// Distinct pattern needles (in table order) that matched somewhere in
/// `window`, deduplicated but not sorted — the table's own ordering is
/// preserved so debug output reads like the pattern table.
fn matched_needles(window: &[&str], needles: &[&str]) -> Vec<String> {
    needles
        .iter()
        .filter(|needle| window.iter().any(|line| count_matches(line, needle) > 0))
        .map(|needle| needle.to_string())
        .collect()
}

/// Priority cascade: check each type's header patterns in
/// [`AgentType::PRIORITY`] order and take the first hit. If none match,
/// fall back to whichever type has the most total pattern hits across its
/// whole table, provided at least one hit exists.
fn detect_type(cleaned: &str, lines: &[&str]) -> (AgentType, f64) {
    let lowered = cleaned.to_lowercase();

    // Codex's context-percent pattern is more specific and more valuable
    // than its plain header, so it's checked first even though both land
    // on the same type.
    if patterns::CODEX_CONTEXT_PERCENT.is_match(cleaned) {
        return (AgentType::Codex, 0.9);
    }

    for agent_type in AgentType::PRIORITY {
        let table = patterns::table(agent_type);
        if table.headers.iter().any(|h| lowered.contains(h)) {
            return (agent_type, 0.9);
        }
    }

    let mut best: Option<(AgentType, usize)> = None;
    for agent_type in AgentType::PRIORITY {
        let table = patterns::table(agent_type);
        let hits: usize = lines
            .iter()
            .map(|line| {
                table
                    .working
                    .iter()
                    .map(|needle| count_matches(line, needle))
                    .sum::<usize>()
            })
            .sum();
        if hits > 0 && best.map(|(_, best_hits)| hits > best_hits).unwrap_or(true) {
            best = Some((agent_type, hits));
        }
    }

    match best {
        Some((agent_type, hits)) => (agent_type, (0.4 + (hits as f64) * 0.02).min(0.75)),
        None => (AgentType::Unknown, 0.2),
    }
}

fn extract_metrics(
    cleaned: &str,
    agent_type: AgentType,
    state: &mut AgentState,
    config: &ClassifierConfig,
) {
    match agent_type {
        AgentType::Codex => {
            if let Some(caps) = patterns::CODEX_CONTEXT_PERCENT.captures(cleaned) {
                if let Ok(pct) = caps[1].parse::<f64>() {
                    state.context_remaining = Some((pct / 100.0).clamp(0.0, 1.0));
                }
            }
            if let Some(caps) = patterns::CODEX_TOKEN_USAGE.captures(cleaned) {
                let digits: String = caps[1].chars().filter(|c| c.is_ascii_digit()).collect();
                state.tokens_used = digits.parse::<u64>().ok();
            }
        }
        AgentType::Claude => {
            if patterns::CLAUDE_CONTEXT_WARNING.is_match(cleaned) {
                state.context_remaining = Some(0.1);
            }
        }
        AgentType::Gemini => {
            if let Some(caps) = patterns::GEMINI_MEMORY_MB.captures(cleaned) {
                state.memory_mb = caps[1].parse::<f64>().ok();
            }
        }
        _ => {}
    }

    if let Some(remaining) = state.context_remaining {
        state.is_context_low = remaining <= config.context_low_threshold();
    }
}

fn window_matches_any(window: &[&str], needles: &[&str]) -> bool {
    window
        .iter()
        .any(|line| needles.iter().any(|needle| count_matches(line, needle) > 0))
}

/// Scores confidence from a fixed base, independent of how the type was
/// detected: `+0.25` for an explicit context fraction, `+0.05` for a token
/// count, `+0.10` per matched work indicator (capped at three), `+0.20` for
/// any rate-limit indicator, `-0.30` for an unknown type, and `-0.20` if
/// working and idle are somehow both set (a self-check penalty — resolution
/// above should already make this impossible). Clamped to `[0, 1]`.
fn score_confidence(_type_confidence: f64, state: &AgentState) -> f64 {
    let mut confidence = 0.5;

    if state.context_remaining.is_some() {
        confidence += 0.25;
    }
    if state.tokens_used.is_some() {
        confidence += 0.05;
    }
    confidence += 0.10 * state.work_indicators.len().min(3) as f64;
    if !state.limit_indicators.is_empty() {
        confidence += 0.20;
    }
    if state.agent_type == AgentType::Unknown {
        confidence -= 0.30;
    }
    if state.is_working && state.is_idle {
        confidence -= 0.20;
    }

    confidence.clamp(0.0, 1.0)
}

fn truncate_tail(input: &str, max_len: usize) -> String {
    if input.len() <= max_len {
        return input.to_string();
    }
    let start = input.len() - max_len;
    let boundary = (start..input.len())
        .find(|&i| input.is_char_boundary(i))
        .unwrap_or(start);
    input[boundary..].to_string()
}
