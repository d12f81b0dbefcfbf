//! The closed set of recognized agent families and the classification
//! result produced for each pane.

use std::time::SystemTime;

/// A vendor CLI family the classifier recognizes.
///
/// This is a tagged variant over a small closed set, not an open trait —
/// adding a new family means adding a variant plus a pattern table, not
/// implementing an interface (see the design notes on dynamic dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentType {
    Claude,
    Codex,
    Gemini,
    Cursor,
    Windsurf,
    Aider,
    Unknown,
}

impl AgentType {
    /// Priority order used both for header-match precedence and as the
    /// tie-break order when falling back to pattern-frequency scoring.
    pub const PRIORITY: [AgentType; 6] = [
        AgentType::Claude,
        AgentType::Codex,
        AgentType::Gemini,
        AgentType::Cursor,
        AgentType::Windsurf,
        AgentType::Aider,
    ];

    /// Short lowercase identifier, used in logs and as the normalization
    /// input for provider mapping elsewhere in the workspace.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Claude => "claude",
            AgentType::Codex => "codex",
            AgentType::Gemini => "gemini",
            AgentType::Cursor => "cursor",
            AgentType::Windsurf => "windsurf",
            AgentType::Aider => "aider",
            AgentType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structured result of classifying one pane's scrollback.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentState {
    pub agent_type: AgentType,
    pub parsed_at: SystemTime,
    pub context_remaining: Option<f64>,
    pub tokens_used: Option<u64>,
    pub memory_mb: Option<f64>,
    pub is_working: bool,
    pub is_idle: bool,
    pub is_in_error: bool,
    pub is_rate_limited: bool,
    pub is_context_low: bool,
    pub work_indicators: Vec<String>,
    pub limit_indicators: Vec<String>,
    pub confidence: f64,
    pub raw_sample: String,
}

impl AgentState {
    /// A state representing degenerate/empty input: unknown type, every
    /// flag false, low confidence. Classification never fails, so this is
    /// the floor every other result is built from.
    pub fn unknown_at(parsed_at: SystemTime) -> Self {
        Self {
            agent_type: AgentType::Unknown,
            parsed_at,
            context_remaining: None,
            tokens_used: None,
            memory_mb: None,
            is_working: false,
            is_idle: false,
            is_in_error: false,
            is_rate_limited: false,
            is_context_low: false,
            work_indicators: Vec::new(),
            limit_indicators: Vec::new(),
            confidence: 0.2,
            raw_sample: String::new(),
        }
    }
}
