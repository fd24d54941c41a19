//! Language model backend abstraction.
//!
//! The roundtable talks to a model through two seams:
//!
//! - [`LanguageModel`] opens a stateful [`ChatSession`] per participant and offers a
//!   stateless [`generate`](LanguageModel::generate) call used for the closing report.
//! - [`ChatSession`] carries one participant's system instruction and exchange
//!   history, so each turn only has to send the newest prompt.
//!
//! Implement both traits to plug in another provider; tests use scripted mocks.

#[cfg(feature = "gemini-api")]
pub mod gemini_api;

#[cfg(feature = "gemini-api")]
pub use gemini_api::{GeminiBackend, GeminiChatSession};

use crate::error::BackendError;
use async_trait::async_trait;

/// A stateful dialogue channel bound to one participant.
#[async_trait]
pub trait ChatSession: Send {
    /// Sends `prompt` and returns the reply, recording both in the session history.
    ///
    /// A failed send must leave the history unchanged.
    async fn send(&mut self, prompt: &str) -> Result<String, BackendError>;

    /// Records an exchange that already happened without calling the backend.
    ///
    /// Used to rebuild a session's history when a persisted conversation is
    /// resumed in a fresh process.
    fn record_exchange(&mut self, prompt: &str, reply: &str);
}

/// A text-generation service addressed by model identifier.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Opens a session whose every request carries `system_instruction`.
    async fn create_session(
        &self,
        model_id: &str,
        system_instruction: &str,
    ) -> Result<Box<dyn ChatSession>, BackendError>;

    /// One-shot generation with no session history.
    async fn generate(&self, model_id: &str, prompt: &str) -> Result<String, BackendError>;
}
