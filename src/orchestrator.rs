//! The turn orchestration state machine.
//!
//! ```text
//!            start                 last turn appended        summary stored
//!   IDLE ───────────▶ RUNNING ─────────────────────▶ SUMMARIZING ─────────▶ DONE
//!     ▲                 │ ▲                               │ ▲
//!     │                 └─┘ turn appended                 └─┘ summary failed
//!     └──────────────── reset (from any phase) ──────────────────────────────
//! ```
//!
//! Each call to [`Orchestrator::step`] performs at most one backend call and
//! returns the next [`ConversationState`]. A failed step returns an error and
//! the caller keeps the state it passed in, so the same step can simply be
//! invoked again. Nothing about the conversation lives on the call stack between
//! steps; the only in-memory cache is the [`SessionRegistry`], and it is rebuilt
//! from the state whenever it is missing or its history does not end where the
//! state's transcript ends.

use crate::backend::LanguageModel;
use crate::config::Credential;
use crate::error::{BackendError, ConfigurationError, RoundtableError};
use crate::persona::AgentDescriptor;
use crate::prompts::SummaryRequest;
use crate::registry::SessionRegistry;
use crate::state::{ConversationState, MAX_AGENTS, MIN_AGENTS, Phase, TurnRecord};
use tracing::{error, info, warn};

/// Everything needed to start a conversation.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub topic: String,
    pub agents: Vec<AgentDescriptor>,
    pub global_rules: String,
    pub max_turns: usize,
    pub model_id: String,
    pub credential: Option<Credential>,
}

impl StartRequest {
    /// Rejects requests that cannot start a conversation.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.topic.trim().is_empty() {
            return Err(ConfigurationError::EmptyTopic);
        }
        if !self.credential.as_ref().is_some_and(|c| !c.is_empty()) {
            return Err(ConfigurationError::MissingCredential);
        }
        if !(MIN_AGENTS..=MAX_AGENTS).contains(&self.agents.len()) {
            return Err(ConfigurationError::AgentCount {
                count: self.agents.len(),
                min: MIN_AGENTS,
                max: MAX_AGENTS,
            });
        }
        if self.max_turns == 0 {
            return Err(ConfigurationError::ZeroTurns);
        }
        if self.model_id.trim().is_empty() {
            return Err(ConfigurationError::EmptyModel);
        }
        Ok(())
    }
}

/// What the next step of a conversation will do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Not started; nothing to do until `start`.
    Wait,
    /// Ask this participant for the next turn.
    Turn { speaker_index: usize },
    /// Generate the closing report.
    Summarize,
    /// Terminal; nothing left to do.
    Finished,
}

/// What a completed step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The state was idle; no backend call was made.
    NotStarted,
    /// A participant spoke.
    TurnAppended(TurnRecord),
    /// The closing report was stored.
    SummaryReady,
    /// The conversation was already done; no backend call was made.
    AlreadyDone,
}

/// Result of a successful [`Orchestrator::step`].
#[derive(Debug, Clone)]
pub struct Step {
    pub state: ConversationState,
    pub outcome: StepOutcome,
}

/// Decides the next action for `state` without performing it.
pub fn next_action(state: &ConversationState) -> Action {
    match state.phase() {
        Phase::Idle => Action::Wait,
        Phase::Running => match state.next_speaker_index() {
            Some(speaker_index) => Action::Turn { speaker_index },
            None => Action::Summarize,
        },
        Phase::Summarizing => Action::Summarize,
        Phase::Done => Action::Finished,
    }
}

/// Drives conversations against a [`LanguageModel`] backend.
pub struct Orchestrator<B: LanguageModel> {
    backend: B,
    registry: Option<SessionRegistry>,
}

impl<B: LanguageModel> Orchestrator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            registry: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The session bindings currently held, if any.
    pub fn registry(&self) -> Option<&SessionRegistry> {
        self.registry.as_ref()
    }

    /// Validates `request`, binds one session per participant and returns a
    /// running state with an empty transcript.
    ///
    /// Invalid requests are rejected before any backend interaction.
    pub async fn start(
        &mut self,
        request: StartRequest,
    ) -> Result<ConversationState, RoundtableError> {
        request.validate()?;

        let StartRequest {
            topic,
            agents,
            global_rules,
            max_turns,
            model_id,
            credential: _,
        } = request;
        let state = ConversationState::started(topic, global_rules, agents, max_turns, model_id);

        self.registry = None;
        let registry = SessionRegistry::bind(&self.backend, &state).await?;
        self.registry = Some(registry);

        info!(
            target = "llm_roundtable::orchestrator",
            conversation_id = ?state.conversation_id(),
            agents = state.agents().len(),
            max_turns = state.max_turns(),
            event = "conversation_started"
        );
        Ok(state)
    }

    /// Advances `state` by exactly one transition.
    ///
    /// On error `state` is untouched and remains the current state; calling
    /// `step` again with it retries the same transition.
    pub async fn step(&mut self, state: &ConversationState) -> Result<Step, RoundtableError> {
        state.validate()?;

        match next_action(state) {
            Action::Wait => Ok(Step {
                state: state.clone(),
                outcome: StepOutcome::NotStarted,
            }),
            Action::Finished => Ok(Step {
                state: state.clone(),
                outcome: StepOutcome::AlreadyDone,
            }),
            Action::Turn { speaker_index } => self.take_turn(state, speaker_index).await,
            Action::Summarize => self.summarize(state).await,
        }
    }

    /// Discards the session bindings and returns an idle state.
    pub fn reset(&mut self, state: ConversationState) -> ConversationState {
        if self.registry.take().is_some() || state.phase() != Phase::Idle {
            info!(
                target = "llm_roundtable::orchestrator",
                conversation_id = ?state.conversation_id(),
                phase = %state.phase(),
                discarded_turns = state.turns().len(),
                event = "conversation_reset"
            );
        }
        ConversationState::idle()
    }

    async fn registry_for(
        &mut self,
        state: &ConversationState,
    ) -> Result<&mut SessionRegistry, BackendError> {
        let stale = !self
            .registry
            .as_ref()
            .is_some_and(|registry| registry.belongs_to(state));
        if stale {
            self.registry = None;
            let registry = SessionRegistry::rehydrate(&self.backend, state).await?;
            self.registry = Some(registry);
        }
        self.registry
            .as_mut()
            .ok_or_else(|| BackendError::Other("session registry unavailable".into()))
    }

    async fn take_turn(
        &mut self,
        state: &ConversationState,
        speaker_index: usize,
    ) -> Result<Step, RoundtableError> {
        let turn_number = state.turns().len() + 1;
        let registry = self.registry_for(state).await?;

        let text = match registry.advance(speaker_index, state.last_turn()).await {
            Ok(text) => text,
            Err(err) => {
                error!(
                    target = "llm_roundtable::orchestrator",
                    conversation_id = ?state.conversation_id(),
                    speaker_index,
                    turn = turn_number,
                    max_turns = state.max_turns(),
                    retryable = err.is_retryable(),
                    error = %err,
                    event = "turn_failed"
                );
                return Err(err.into());
            }
        };

        let turn = TurnRecord::new(speaker_index, &state.agents()[speaker_index], text);
        let next = state.with_turn(turn.clone());

        info!(
            target = "llm_roundtable::orchestrator",
            conversation_id = ?state.conversation_id(),
            speaker = %turn.display_name,
            speaker_index,
            turn = turn_number,
            max_turns = state.max_turns(),
            phase = %next.phase(),
            event = "turn_appended"
        );

        Ok(Step {
            state: next,
            outcome: StepOutcome::TurnAppended(turn),
        })
    }

    async fn summarize(&mut self, state: &ConversationState) -> Result<Step, RoundtableError> {
        let prompt = SummaryRequest::new(state.topic(), state.agents(), state.turns())
            .to_prompt()
            .map_err(|err| BackendError::Other(format!("failed to render report prompt: {err}")))?;

        let result = self
            .backend
            .generate(state.model_id(), &prompt)
            .await
            .and_then(|summary| {
                if summary.trim().is_empty() {
                    Err(BackendError::EmptyResponse("summary is empty".into()))
                } else {
                    Ok(summary)
                }
            });

        match result {
            Ok(summary) => {
                info!(
                    target = "llm_roundtable::orchestrator",
                    conversation_id = ?state.conversation_id(),
                    summary_chars = summary.chars().count(),
                    event = "summary_ready"
                );
                Ok(Step {
                    state: state.with_summary(summary),
                    outcome: StepOutcome::SummaryReady,
                })
            }
            Err(err) => {
                warn!(
                    target = "llm_roundtable::orchestrator",
                    conversation_id = ?state.conversation_id(),
                    retryable = err.is_retryable(),
                    error = %err,
                    event = "summary_failed"
                );
                Err(err.into())
            }
        }
    }
}
