//! Durable session storage for [`ConversationState`].
//!
//! Every invocation loads the state, advances it by one step and saves it
//! back. Saves are atomic: the new state is written to a sibling temp file,
//! flushed, then renamed over the old one, so a crash mid-write leaves the
//! previous state intact.

use crate::error::RoundtableError;
use crate::state::ConversationState;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a conversation's state lives between invocations.
pub trait StateStore {
    /// Loads the stored state; an empty store yields an idle state.
    fn load(&self) -> Result<ConversationState, RoundtableError>;

    /// Replaces the stored state.
    fn save(&self, state: &ConversationState) -> Result<(), RoundtableError>;

    /// Removes the stored state.
    fn clear(&self) -> Result<(), RoundtableError>;
}

/// A [`StateStore`] backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<ConversationState, RoundtableError> {
        match fs::read_to_string(&self.path) {
            Ok(json) => ConversationState::from_json(&json),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(ConversationState::idle()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, state: &ConversationState) -> Result<(), RoundtableError> {
        let json = state.to_json()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        {
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!(
            target = "llm_roundtable::storage",
            path = %self.path.display(),
            phase = %state.phase(),
            turns = state.turns().len(),
            "state saved"
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), RoundtableError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
