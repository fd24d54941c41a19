//! Durable conversation state.
//!
//! [`ConversationState`] is the single source of truth that survives re-entrant
//! invocations. It is a plain serializable value: the orchestrator takes a state
//! and returns the next one, and callers persist it between invocations.

use crate::error::RoundtableError;
use crate::persona::AgentDescriptor;
use crate::scheduler::next_speaker;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Smallest number of participants a conversation can start with.
pub const MIN_AGENTS: usize = 2;
/// Largest number of participants a conversation can start with.
pub const MAX_AGENTS: usize = 4;

/// Where a conversation is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing started, or reset.
    #[default]
    Idle,
    /// Participants are taking turns.
    Running,
    /// All turns are in; the closing report is pending.
    Summarizing,
    /// Terminal. Transcript and report are final.
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Summarizing => "summarizing",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// One utterance in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub speaker_index: usize,
    pub display_name: String,
    pub icon: String,
    pub text: String,
}

impl TurnRecord {
    pub fn new(speaker_index: usize, agent: &AgentDescriptor, text: impl Into<String>) -> Self {
        Self {
            speaker_index,
            display_name: agent.display_name.clone(),
            icon: agent.icon.clone(),
            text: text.into(),
        }
    }

    /// `"{display_name}: {text}"`, as quoted to the next speaker.
    pub fn render(&self) -> String {
        format!("{}: {}", self.display_name, self.text)
    }

    /// `"【{display_name}】\n{text}"`, as embedded in the closing report prompt.
    pub fn render_for_report(&self) -> String {
        format!("【{}】\n{}", self.display_name, self.text)
    }
}

/// Completed turns out of the configured total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Fraction of turns completed, in `0.0..=1.0`.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

/// The aggregate persisted across invocations.
///
/// Topic, rules, participants, turn limit and model are copied in when the
/// conversation starts, so later configuration edits cannot affect a run in
/// flight. Only the orchestrator produces new states; each transition either
/// appends one turn or stores the summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    conversation_id: Option<Uuid>,
    phase: Phase,
    #[serde(default)]
    turns: Vec<TurnRecord>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    topic: String,
    #[serde(default)]
    global_rules: String,
    #[serde(default)]
    agents: Vec<AgentDescriptor>,
    #[serde(default)]
    max_turns: usize,
    #[serde(default)]
    model_id: String,
}

impl ConversationState {
    /// An idle state with nothing captured.
    pub fn idle() -> Self {
        Self::default()
    }

    /// A freshly started conversation: running, no turns yet.
    pub(crate) fn started(
        topic: String,
        global_rules: String,
        agents: Vec<AgentDescriptor>,
        max_turns: usize,
        model_id: String,
    ) -> Self {
        Self {
            conversation_id: Some(Uuid::new_v4()),
            phase: Phase::Running,
            turns: Vec::new(),
            summary: None,
            topic,
            global_rules,
            agents,
            max_turns,
            model_id,
        }
    }

    pub fn conversation_id(&self) -> Option<Uuid> {
        self.conversation_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The transcript, in arrival order.
    pub fn turns(&self) -> &[TurnRecord] {
        &self.turns
    }

    pub fn last_turn(&self) -> Option<&TurnRecord> {
        self.turns.last()
    }

    /// The closing report; present only once the phase is [`Phase::Done`].
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn global_rules(&self) -> &str {
        &self.global_rules
    }

    pub fn agents(&self) -> &[AgentDescriptor] {
        &self.agents
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.turns.len(),
            total: self.max_turns,
        }
    }

    /// Index of the participant who speaks next, while running.
    pub fn next_speaker_index(&self) -> Option<usize> {
        (self.phase == Phase::Running && !self.agents.is_empty())
            .then(|| next_speaker(self.turns.len(), self.agents.len()))
    }

    /// Returns the state with `turn` appended, moving to summarizing when the
    /// last turn arrives.
    pub(crate) fn with_turn(&self, turn: TurnRecord) -> Self {
        let mut next = self.clone();
        next.turns.push(turn);
        if next.turns.len() >= next.max_turns {
            next.phase = Phase::Summarizing;
        }
        next
    }

    /// Returns the state with the closing report stored, marked done.
    pub(crate) fn with_summary(&self, summary: String) -> Self {
        let mut next = self.clone();
        next.summary = Some(summary);
        next.phase = Phase::Done;
        next
    }

    /// Checks every invariant a persisted state must satisfy.
    pub fn validate(&self) -> Result<(), RoundtableError> {
        if self.phase == Phase::Idle {
            if !self.turns.is_empty() || self.summary.is_some() {
                return Err(RoundtableError::invalid_state(
                    "idle state must not carry turns or a summary",
                ));
            }
            return Ok(());
        }

        if self.conversation_id.is_none() {
            return Err(RoundtableError::invalid_state(
                "started conversation has no id",
            ));
        }
        if !(MIN_AGENTS..=MAX_AGENTS).contains(&self.agents.len()) {
            return Err(RoundtableError::invalid_state(format!(
                "agent count {} outside {MIN_AGENTS}..={MAX_AGENTS}",
                self.agents.len()
            )));
        }
        if self.max_turns == 0 {
            return Err(RoundtableError::invalid_state("max_turns is 0"));
        }
        if self.turns.len() > self.max_turns {
            return Err(RoundtableError::invalid_state(format!(
                "{} turns exceed max_turns {}",
                self.turns.len(),
                self.max_turns
            )));
        }
        for (position, turn) in self.turns.iter().enumerate() {
            let expected = next_speaker(position, self.agents.len());
            if turn.speaker_index != expected {
                return Err(RoundtableError::invalid_state(format!(
                    "turn {position} spoken by agent {} but agent {expected} was scheduled",
                    turn.speaker_index
                )));
            }
        }

        let complete = self.turns.len() == self.max_turns;
        let has_summary = self.summary.as_deref().is_some_and(|s| !s.is_empty());
        let consistent = match self.phase {
            Phase::Idle => true,
            Phase::Running => !complete && self.summary.is_none(),
            Phase::Summarizing => complete && self.summary.is_none(),
            Phase::Done => complete && has_summary,
        };
        if !consistent {
            return Err(RoundtableError::invalid_state(format!(
                "phase {} inconsistent with {}/{} turns and summary present = {}",
                self.phase,
                self.turns.len(),
                self.max_turns,
                self.summary.is_some()
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, RoundtableError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a persisted state and rejects it if any invariant is broken.
    pub fn from_json(json: &str) -> Result<Self, RoundtableError> {
        let state: Self = serde_json::from_str(json)?;
        state.validate()?;
        Ok(state)
    }
}
