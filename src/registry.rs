//! Per-participant session bindings.
//!
//! The registry owns one [`SessionBinding`] per participant of a started
//! conversation. Bindings live only in memory; after a restart they are rebuilt
//! from the persisted [`ConversationState`] with [`SessionRegistry::rehydrate`].

use crate::backend::{ChatSession, LanguageModel};
use crate::error::BackendError;
use crate::persona::AgentDescriptor;
use crate::prompts;
use crate::state::{ConversationState, TurnRecord};
use tracing::{debug, info};
use uuid::Uuid;

/// A participant's backend session and the instruction it was opened with.
pub struct SessionBinding {
    session: Box<dyn ChatSession>,
    system_instruction: String,
}

impl SessionBinding {
    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }
}

/// Owns the backend sessions of one conversation, indexed by seat.
pub struct SessionRegistry {
    conversation_id: Option<Uuid>,
    topic: String,
    first_agent: AgentDescriptor,
    bindings: Vec<SessionBinding>,
    /// Turns the sessions have seen, replayed or live.
    turns_seen: usize,
    last_reply: Option<String>,
}

impl SessionRegistry {
    /// Opens one session per participant of `state`.
    pub async fn bind<B>(backend: &B, state: &ConversationState) -> Result<Self, BackendError>
    where
        B: LanguageModel + ?Sized,
    {
        let first_agent = state
            .agents()
            .first()
            .cloned()
            .ok_or_else(|| BackendError::Other("cannot bind sessions without agents".into()))?;

        let mut bindings = Vec::with_capacity(state.agents().len());
        for agent in state.agents() {
            let system_instruction =
                prompts::system_instruction(agent, state.topic(), state.global_rules());
            let session = backend
                .create_session(state.model_id(), &system_instruction)
                .await?;
            bindings.push(SessionBinding {
                session,
                system_instruction,
            });
        }

        info!(
            target = "llm_roundtable::registry",
            conversation_id = ?state.conversation_id(),
            agents = bindings.len(),
            model = state.model_id(),
            event = "sessions_bound"
        );

        Ok(Self {
            conversation_id: state.conversation_id(),
            topic: state.topic().to_string(),
            first_agent,
            bindings,
            turns_seen: 0,
            last_reply: None,
        })
    }

    /// Binds fresh sessions and replays every recorded turn into its speaker's
    /// session history. Makes no generation calls.
    pub async fn rehydrate<B>(backend: &B, state: &ConversationState) -> Result<Self, BackendError>
    where
        B: LanguageModel + ?Sized,
    {
        let mut registry = Self::bind(backend, state).await?;
        let mut prior: Option<&TurnRecord> = None;
        for turn in state.turns() {
            let prompt = registry.prompt_for(prior);
            let binding = registry.bindings.get_mut(turn.speaker_index).ok_or_else(|| {
                BackendError::Other(format!("no session for agent {}", turn.speaker_index))
            })?;
            binding.session.record_exchange(&prompt, &turn.text);
            prior = Some(turn);
        }
        registry.turns_seen = state.turns().len();
        registry.last_reply = prior.map(|turn| turn.text.clone());

        debug!(
            target = "llm_roundtable::registry",
            conversation_id = ?state.conversation_id(),
            replayed_turns = state.turns().len(),
            event = "sessions_rehydrated"
        );
        Ok(registry)
    }

    /// Whether these sessions can serve the next step of `state`.
    ///
    /// The sessions must belong to the same conversation and their history must
    /// end exactly where `state`'s transcript ends. A state rewound to an earlier
    /// save, or a step whose result the caller discarded, does not match.
    pub fn belongs_to(&self, state: &ConversationState) -> bool {
        self.conversation_id.is_some()
            && self.conversation_id == state.conversation_id()
            && self.turns_seen == state.turns().len()
            && self.last_reply.as_deref() == state.last_turn().map(|turn| turn.text.as_str())
    }

    /// Number of turns the sessions have recorded.
    pub fn turns_seen(&self) -> usize {
        self.turns_seen
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn binding(&self, speaker_index: usize) -> Option<&SessionBinding> {
        self.bindings.get(speaker_index)
    }

    /// The prompt a speaker receives after `prior`, or the kickoff when nobody
    /// has spoken yet.
    pub fn prompt_for(&self, prior: Option<&TurnRecord>) -> String {
        prompts::turn_prompt(prior, &self.first_agent, &self.topic)
    }

    /// Asks `speaker_index` to respond to `prior`. Exactly one backend call.
    ///
    /// Returns the generated text verbatim.
    pub async fn advance(
        &mut self,
        speaker_index: usize,
        prior: Option<&TurnRecord>,
    ) -> Result<String, BackendError> {
        let prompt = self.prompt_for(prior);
        let binding = self
            .bindings
            .get_mut(speaker_index)
            .ok_or_else(|| BackendError::Other(format!("no session for agent {speaker_index}")))?;
        let reply = binding.session.send(&prompt).await?;
        self.turns_seen += 1;
        self.last_reply = Some(reply.clone());
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Echoes each prompt back with the session's seat name and history length.
    #[derive(Clone, Default)]
    struct EchoBackend {
        sessions_opened: Arc<Mutex<Vec<String>>>,
    }

    struct EchoSession {
        name: String,
        history: Vec<(String, String)>,
    }

    #[async_trait]
    impl ChatSession for EchoSession {
        async fn send(&mut self, prompt: &str) -> Result<String, BackendError> {
            let reply = format!("{}#{} heard [{}]", self.name, self.history.len(), prompt);
            self.record_exchange(prompt, &reply);
            Ok(reply)
        }

        fn record_exchange(&mut self, prompt: &str, reply: &str) {
            self.history.push((prompt.to_string(), reply.to_string()));
        }
    }

    #[async_trait]
    impl LanguageModel for EchoBackend {
        async fn create_session(
            &self,
            _model_id: &str,
            system_instruction: &str,
        ) -> Result<Box<dyn ChatSession>, BackendError> {
            self.sessions_opened
                .lock()
                .unwrap()
                .push(system_instruction.to_string());
            let name = system_instruction.lines().next().unwrap_or_default().to_string();
            Ok(Box::new(EchoSession {
                name,
                history: Vec::new(),
            }))
        }

        async fn generate(&self, _model_id: &str, prompt: &str) -> Result<String, BackendError> {
            Ok(prompt.to_string())
        }
    }

    fn state() -> ConversationState {
        let agents = AgentDescriptor::default_roster().into_iter().take(3).collect();
        ConversationState::started(
            "Cities".into(),
            "Be civil.".into(),
            agents,
            6,
            "test-model".into(),
        )
    }

    #[tokio::test]
    async fn test_bind_opens_one_session_per_agent() {
        let backend = EchoBackend::default();
        let state = state();
        let registry = SessionRegistry::bind(&backend, &state).await.unwrap();

        assert_eq!(registry.len(), 3);
        assert!(registry.belongs_to(&state));
        assert!(!registry.belongs_to(&ConversationState::idle()));

        let opened = backend.sessions_opened.lock().unwrap();
        assert_eq!(opened.len(), 3);
        assert!(opened[1].starts_with("Your name is Skeptic."));
        assert!(opened[1].contains("Discussion topic: Cities"));
        assert_eq!(
            registry.binding(1).unwrap().system_instruction(),
            opened[1].as_str()
        );
    }

    #[tokio::test]
    async fn test_advance_uses_kickoff_then_prior_turn() {
        let backend = EchoBackend::default();
        let state = state();
        let mut registry = SessionRegistry::bind(&backend, &state).await.unwrap();

        let first = registry.advance(0, None).await.unwrap();
        assert!(first.contains("Advocate, please open the discussion"));

        let turn = TurnRecord::new(0, &state.agents()[0], first);
        let second = registry.advance(1, Some(&turn)).await.unwrap();
        assert!(second.starts_with("Your name is Skeptic.#0 heard [Advocate: "));
    }

    #[tokio::test]
    async fn test_advance_unknown_seat_fails() {
        let backend = EchoBackend::default();
        let mut registry = SessionRegistry::bind(&backend, &state()).await.unwrap();
        assert!(registry.advance(7, None).await.is_err());
    }

    #[tokio::test]
    async fn test_rehydrate_replays_history() {
        let backend = EchoBackend::default();
        let mut state = state();
        let mut live = SessionRegistry::bind(&backend, &state).await.unwrap();
        for _ in 0..4 {
            let speaker = state.next_speaker_index().unwrap();
            let text = live.advance(speaker, state.last_turn()).await.unwrap();
            let turn = TurnRecord::new(speaker, &state.agents()[speaker], text);
            state = state.with_turn(turn);
        }

        let mut resumed = SessionRegistry::rehydrate(&backend, &state).await.unwrap();
        let speaker = state.next_speaker_index().unwrap();
        let from_live = live.advance(speaker, state.last_turn()).await.unwrap();
        let from_resumed = resumed.advance(speaker, state.last_turn()).await.unwrap();
        assert_eq!(from_live, from_resumed);
        assert!(from_resumed.contains("#1 heard"));
    }

    #[tokio::test]
    async fn test_registry_tracks_transcript_position() {
        let backend = EchoBackend::default();
        let state = state();
        let mut registry = SessionRegistry::bind(&backend, &state).await.unwrap();
        assert!(registry.belongs_to(&state));

        let text = registry.advance(0, None).await.unwrap();
        assert_eq!(registry.turns_seen(), 1);
        // the sessions moved past the state they were bound for
        assert!(!registry.belongs_to(&state));

        let next = state.with_turn(TurnRecord::new(0, &state.agents()[0], text));
        assert!(registry.belongs_to(&next));

        let forked = state.with_turn(TurnRecord::new(0, &state.agents()[0], "something else"));
        assert!(!registry.belongs_to(&forked));

        let resumed = SessionRegistry::rehydrate(&backend, &next).await.unwrap();
        assert_eq!(resumed.turns_seen(), 1);
        assert!(resumed.belongs_to(&next));
    }
}
