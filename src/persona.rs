//! Participant descriptors supplied by the persona configuration.

use serde::{Deserialize, Serialize};

/// An immutable description of one roundtable participant.
///
/// Identity is the descriptor's position in the ordered participant list, so
/// display names do not need to be unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub display_name: String,
    pub icon: String,
    /// Free-text persona instructions.
    pub persona_text: String,
}

impl AgentDescriptor {
    pub fn new(
        display_name: impl Into<String>,
        icon: impl Into<String>,
        persona_text: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            icon: icon.into(),
            persona_text: persona_text.into(),
        }
    }

    /// The four stock personas, in seating order.
    ///
    /// A session with `n` participants takes the first `n`.
    pub fn default_roster() -> Vec<AgentDescriptor> {
        vec![
            AgentDescriptor::new(
                "Advocate",
                "⭕",
                "You argue in favour of the proposition. Emphasise the benefits and keep the discussion forward-looking.",
            ),
            AgentDescriptor::new(
                "Skeptic",
                "❌",
                "You take the critical position. Point out risks and concerns, and ask for a careful discussion.",
            ),
            AgentDescriptor::new(
                "Moderator",
                "⚖️",
                "You are an impartial moderator. Organise the discussion and draw out both sides' views.",
            ),
            AgentDescriptor::new(
                "Free Thinker",
                "🦄",
                "You are a free spirit with a perspective of your own. Offer ideas that step outside the frame of the debate.",
            ),
        ]
    }

    /// Label used when presenting this participant, e.g. `⭕ Advocate`.
    pub fn label(&self) -> String {
        if self.icon.is_empty() {
            self.display_name.clone()
        } else {
            format!("{} {}", self.icon, self.display_name)
        }
    }
}
