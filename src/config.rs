//! Session configuration.
//!
//! [`RoundtableConfig`] is what a user edits between runs: topic, rules,
//! participants, turn limit, model and pacing. It is only read at start time;
//! the values a conversation actually uses are the copies captured in its
//! [`ConversationState`](crate::state::ConversationState).

use crate::error::RoundtableError;
use crate::orchestrator::StartRequest;
use crate::persona::AgentDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default topic for a new session.
pub const DEFAULT_TOPIC: &str = "Does AI take away human creativity, or extend it?";
/// Default number of turns.
pub const DEFAULT_MAX_TURNS: usize = 6;
/// Default model identifier.
pub const DEFAULT_MODEL_ID: &str = "gemini-2.0-flash";
/// Default delay between displayed turns, in seconds.
pub const DEFAULT_PACE_SECS: f64 = 1.5;

/// An opaque backend credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// User-editable settings for a roundtable session.
///
/// # Examples
///
/// ```
/// use llm_roundtable::config::RoundtableConfig;
///
/// let config: RoundtableConfig = serde_json::from_str(r#"{
///     "topic": "Four-day work week",
///     "participants": 3,
///     "max_turns": 9
/// }"#).unwrap();
///
/// assert_eq!(config.agents().len(), 3);
/// assert_eq!(config.agents()[2].display_name, "Moderator");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundtableConfig {
    pub topic: String,
    pub global_rules: String,
    /// Participant seats. Falls back to the stock roster when empty.
    pub agents: Vec<AgentDescriptor>,
    /// Number of stock personas to seat when `agents` is empty.
    pub participants: usize,
    pub max_turns: usize,
    pub model_id: String,
    /// Pause between steps when running to completion.
    pub pace_secs: f64,
}

impl Default for RoundtableConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            global_rules: "Answer in three sentences or fewer. Respond to what the previous speaker said."
                .to_string(),
            agents: Vec::new(),
            participants: 2,
            max_turns: DEFAULT_MAX_TURNS,
            model_id: DEFAULT_MODEL_ID.to_string(),
            pace_secs: DEFAULT_PACE_SECS,
        }
    }
}

impl RoundtableConfig {
    /// Reads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RoundtableError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Reads `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, RoundtableError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// The seats for this session.
    pub fn agents(&self) -> Vec<AgentDescriptor> {
        if self.agents.is_empty() {
            AgentDescriptor::default_roster()
                .into_iter()
                .take(self.participants)
                .collect()
        } else {
            self.agents.clone()
        }
    }

    /// Pacing delay; negative, non-finite or out-of-range values mean no delay.
    pub fn pace(&self) -> Duration {
        Duration::try_from_secs_f64(self.pace_secs).unwrap_or(Duration::ZERO)
    }

    /// Builds the start request for this configuration.
    pub fn to_start_request(&self, credential: Option<Credential>) -> StartRequest {
        StartRequest {
            topic: self.topic.clone(),
            agents: self.agents(),
            global_rules: self.global_rules.clone(),
            max_turns: self.max_turns,
            model_id: self.model_id.clone(),
            credential,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RoundtableConfig::default();
        assert_eq!(config.topic, DEFAULT_TOPIC);
        assert_eq!(config.max_turns, 6);
        assert_eq!(config.pace(), Duration::from_millis(1500));
        let agents = config.agents();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].display_name, "Advocate");
        assert_eq!(agents[1].display_name, "Skeptic");
    }

    #[test]
    fn test_explicit_agents_win_over_participants() {
        let config = RoundtableConfig {
            agents: vec![
                AgentDescriptor::new("A", "", "a"),
                AgentDescriptor::new("B", "", "b"),
                AgentDescriptor::new("C", "", "c"),
            ],
            participants: 2,
            ..Default::default()
        };
        assert_eq!(config.agents().len(), 3);
    }

    #[test]
    fn test_pace_ignores_invalid_values() {
        let mut config = RoundtableConfig::default();
        config.pace_secs = -1.0;
        assert_eq!(config.pace(), Duration::ZERO);
        config.pace_secs = f64::NAN;
        assert_eq!(config.pace(), Duration::ZERO);
        config.pace_secs = f64::INFINITY;
        assert_eq!(config.pace(), Duration::ZERO);
        config.pace_secs = 1e300;
        assert_eq!(config.pace(), Duration::ZERO);
    }

    #[test]
    fn test_start_request_carries_settings() {
        let config = RoundtableConfig::default();
        let request = config.to_start_request(Some(Credential::new("k")));
        assert_eq!(request.topic, config.topic);
        assert_eq!(request.max_turns, 6);
        request.validate().unwrap();

        let request = config.to_start_request(None);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_credential_is_redacted() {
        let credential = Credential::new("secret-key");
        assert_eq!(format!("{credential:?}"), "Credential(***)");
        assert_eq!(credential.expose(), "secret-key");
        assert!(Credential::new("  ").is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtable.json");
        std::fs::write(&path, r#"{"topic": "Cats vs dogs", "pace_secs": 0}"#).unwrap();

        let config = RoundtableConfig::load(&path).unwrap();
        assert_eq!(config.topic, "Cats vs dogs");
        assert_eq!(config.pace(), Duration::ZERO);
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
    }

    #[test]
    fn test_pace_read_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtable.json");
        std::fs::write(&path, r#"{"pace_secs": 0.25}"#).unwrap();

        let config = RoundtableConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.pace(), Duration::from_millis(250));

        let config = RoundtableConfig::load_or_default(None).unwrap();
        assert_eq!(config.pace(), Duration::from_millis(1500));
    }
}
