//! 'llm-roundtable' - turn-based multi-persona conversations over an LLM backend.
//!
//! A roundtable seats two to four participants, each with a persona, on a
//! shared topic. They speak in strict round-robin order for a fixed number of
//! turns, after which a closing report is generated from the transcript.
//!
//! The crate is built for hosts that re-run the whole program on every update:
//! there is no long-lived loop. Each invocation loads a [`ConversationState`],
//! advances it by one step with [`Orchestrator::step`] (at most one backend call),
//! and persists the result.
//!
//! ```rust,no_run
//! use llm_roundtable::backend::GeminiBackend;
//! use llm_roundtable::config::{Credential, RoundtableConfig};
//! use llm_roundtable::storage::{JsonFileStore, StateStore};
//! use llm_roundtable::{Orchestrator, Phase};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let key = std::env::var("GEMINI_API_KEY")?;
//! let store = JsonFileStore::new("roundtable-state.json");
//! let mut orchestrator = Orchestrator::new(GeminiBackend::new(key.clone()));
//!
//! let mut state = store.load()?;
//! if state.phase() == Phase::Idle {
//!     let request = RoundtableConfig::default().to_start_request(Some(Credential::new(key)));
//!     state = orchestrator.start(request).await?;
//! }
//!
//! // One step per invocation; the host calls us again to continue.
//! let step = orchestrator.step(&state).await?;
//! store.save(&step.state)?;
//! println!("{} ({})", step.state.phase(), step.state.progress());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod observability;
pub mod orchestrator;
pub mod persona;
pub mod prompts;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod storage;

pub use backend::{ChatSession, LanguageModel};
pub use error::{BackendError, ConfigurationError, RoundtableError};
pub use orchestrator::{Action, Orchestrator, StartRequest, Step, StepOutcome, next_action};
pub use persona::AgentDescriptor;
pub use scheduler::next_speaker;
pub use state::{ConversationState, Phase, Progress, TurnRecord};
