//! Unified `Store` trait — single async interface for all persistence.
//!
//! Covers the three stored shapes: the profile record, the chat log, and the
//! artifact workflow (state plus its own step log). Logs are exposed as a
//! windowed read view — at most the `window` most recent entries — while the
//! backing file may retain the full history.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::profile::Profile;
use crate::engine::workflow::WorkflowState;
use crate::error::StoreError;

/// One general-chat round trip: what the user said and what the coach replied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatExchange {
    pub user: String,
    pub bot: String,
}

/// Who produced a workflow step-log turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Bot,
}

/// One turn of the artifact workflow conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTurn {
    pub role: Speaker,
    pub text: String,
}

impl StepTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Speaker::User,
            text: text.into(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            role: Speaker::Bot,
            text: text.into(),
        }
    }
}

/// Backend-agnostic persistence trait covering profiles, chat history, and
/// workflow state.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Profiles ────────────────────────────────────────────────────

    /// Load the profile for `email`, creating and persisting a default one
    /// on first access.
    async fn load_profile(&self, email: &str) -> Result<Profile, StoreError>;

    /// Persist a profile under its own identity key.
    async fn save_profile(&self, profile: &Profile) -> Result<(), StoreError>;

    // ── Chat history ────────────────────────────────────────────────

    /// Windowed read view of the chat log, oldest first. A log that fails
    /// to parse is reset to empty and the reset is persisted.
    async fn chat_history(&self, email: &str) -> Result<Vec<ChatExchange>, StoreError>;

    /// Append one exchange to the chat log.
    async fn append_exchange(&self, email: &str, exchange: ChatExchange)
        -> Result<(), StoreError>;

    // ── Workflow ────────────────────────────────────────────────────

    /// Load the workflow state for `email`, creating a default one pointed
    /// at `initial_step` on first access.
    async fn workflow_state(
        &self,
        email: &str,
        initial_step: &str,
    ) -> Result<WorkflowState, StoreError>;

    /// Persist the workflow state.
    async fn save_workflow_state(
        &self,
        email: &str,
        state: &WorkflowState,
    ) -> Result<(), StoreError>;

    /// Windowed read view of the workflow step log, oldest first. Corrupt
    /// logs reset the same way chat history does.
    async fn step_log(&self, email: &str) -> Result<Vec<StepTurn>, StoreError>;

    /// Append one turn to the workflow step log.
    async fn append_step_turn(&self, email: &str, turn: StepTurn) -> Result<(), StoreError>;
}
