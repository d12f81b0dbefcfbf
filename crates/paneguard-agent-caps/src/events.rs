use paneguard_core::events::ResilienceEvent;
use std::time::Instant;

/// Events emitted by [`crate::AgentCaps`] as slots are granted, released, or
/// ramped.
#[derive(Debug, Clone)]
pub enum AgentCapsEvent {
    /// A slot was granted immediately or after a wait.
    SlotAcquired {
        timestamp: Instant,
        agent_type: String,
        running: usize,
        cap: usize,
    },
    /// A slot was released back to its agent type.
    SlotReleased {
        timestamp: Instant,
        agent_type: String,
        running: usize,
    },
    /// A non-blocking `try_acquire` or an `acquire` that chose not to wait
    /// was rejected.
    Rejected {
        timestamp: Instant,
        agent_type: String,
        running: usize,
        cap: usize,
    },
    /// A blocking `acquire` was cancelled before a slot became available.
    Cancelled {
        timestamp: Instant,
        agent_type: String,
    },
    /// `CurrentCap` grew during lazy ramp-up.
    RampedUp {
        timestamp: Instant,
        agent_type: String,
        cap: usize,
    },
    /// A failure put an agent type into cooldown, shrinking its cap.
    CooldownEntered {
        timestamp: Instant,
        agent_type: String,
        cap: usize,
    },
    /// A cooldown ended and the cap was restored.
    CooldownCleared {
        timestamp: Instant,
        agent_type: String,
        cap: usize,
    },
}

impl AgentCapsEvent {
    fn kind(&self) -> &'static str {
        match self {
            AgentCapsEvent::SlotAcquired { .. } => "agent_caps.slot_acquired",
            AgentCapsEvent::SlotReleased { .. } => "agent_caps.slot_released",
            AgentCapsEvent::Rejected { .. } => "agent_caps.rejected",
            AgentCapsEvent::Cancelled { .. } => "agent_caps.cancelled",
            AgentCapsEvent::RampedUp { .. } => "agent_caps.ramped_up",
            AgentCapsEvent::CooldownEntered { .. } => "agent_caps.cooldown_entered",
            AgentCapsEvent::CooldownCleared { .. } => "agent_caps.cooldown_cleared",
        }
    }

    pub fn agent_type(&self) -> &str {
        match self {
            AgentCapsEvent::SlotAcquired { agent_type, .. }
            | AgentCapsEvent::SlotReleased { agent_type, .. }
            | AgentCapsEvent::Rejected { agent_type, .. }
            | AgentCapsEvent::Cancelled { agent_type, .. }
            | AgentCapsEvent::RampedUp { agent_type, .. }
            | AgentCapsEvent::CooldownEntered { agent_type, .. }
            | AgentCapsEvent::CooldownCleared { agent_type, .. } => agent_type,
        }
    }
}

impl ResilienceEvent for AgentCapsEvent {
    fn event_type(&self) -> &'static str {
        self.kind()
    }

    fn timestamp(&self) -> Instant {
        match self {
            AgentCapsEvent::SlotAcquired { timestamp, .. }
            | AgentCapsEvent::SlotReleased { timestamp, .. }
            | AgentCapsEvent::Rejected { timestamp, .. }
            | AgentCapsEvent::Cancelled { timestamp, .. }
            | AgentCapsEvent::RampedUp { timestamp, .. }
            | AgentCapsEvent::CooldownEntered { timestamp, .. }
            | AgentCapsEvent::CooldownCleared { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        self.agent_type()
    }
}
