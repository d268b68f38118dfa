//! Flat-JSON persistence backend.
//!
//! Layout under the data directory:
//! - `profiles.json` — map of e-mail → profile
//! - `chat_histories/<email>_history.json` — chat log, full history
//! - `artifacts/<email>.json` — workflow state
//! - `artifacts/<email>_log.json` — workflow step log, full history
//!
//! Log files keep everything ever appended; the window cap applies to the
//! read view only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::warn;

use crate::engine::profile::Profile;
use crate::engine::workflow::WorkflowState;
use crate::error::StoreError;

use super::traits::{ChatExchange, StepTurn, Store};

pub struct JsonStore {
    root: PathBuf,
    window: usize,
    /// Serializes read-modify-write cycles across requests. Per-identity
    /// turn ordering remains the caller's responsibility.
    file_lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>, window: usize) -> Self {
        Self {
            root: root.into(),
            window,
            file_lock: Mutex::new(()),
        }
    }

    fn profiles_path(&self) -> PathBuf {
        self.root.join("profiles.json")
    }

    fn chat_log_path(&self, email: &str) -> PathBuf {
        self.root
            .join("chat_histories")
            .join(format!("{}_history.json", file_key(email)))
    }

    fn workflow_path(&self, email: &str) -> PathBuf {
        self.root
            .join("artifacts")
            .join(format!("{}.json", file_key(email)))
    }

    fn step_log_path(&self, email: &str) -> PathBuf {
        self.root
            .join("artifacts")
            .join(format!("{}_log.json", file_key(email)))
    }

    /// Load the full profile map. A missing file is an empty map; a file
    /// that fails to parse is a hard error — profiles are never reset.
    async fn read_profiles(&self) -> Result<BTreeMap<String, Profile>, StoreError> {
        let path = self.profiles_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        serde_json::from_str(&raw).map_err(|e| {
            StoreError::Serialization(format!("{}: {e}", path.display()))
        })
    }

    /// Load a full log file, resetting it to empty (and persisting the
    /// reset) when it fails to parse.
    async fn read_log<T>(&self, path: &Path) -> Result<Vec<T>, StoreError>
    where
        T: Serialize + DeserializeOwned,
    {
        if !path.exists() {
            write_json(path, &Vec::<T>::new()).await?;
            return Ok(Vec::new());
        }
        let raw = tokio::fs::read_to_string(path).await?;
        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt log, resetting to empty");
                write_json(path, &Vec::<T>::new()).await?;
                Ok(Vec::new())
            }
        }
    }

    fn windowed<T>(&self, mut entries: Vec<T>) -> Vec<T> {
        let excess = entries.len().saturating_sub(self.window);
        entries.drain(..excess);
        entries
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn load_profile(&self, email: &str) -> Result<Profile, StoreError> {
        let _guard = self.file_lock.lock().await;
        let mut profiles = self.read_profiles().await?;
        if let Some(profile) = profiles.get(email) {
            return Ok(profile.clone());
        }
        let profile = Profile::new(email);
        profiles.insert(email.to_string(), profile.clone());
        write_json(&self.profiles_path(), &profiles).await?;
        Ok(profile)
    }

    async fn save_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let _guard = self.file_lock.lock().await;
        let mut profiles = self.read_profiles().await?;
        profiles.insert(profile.email.clone(), profile.clone());
        write_json(&self.profiles_path(), &profiles).await
    }

    async fn chat_history(&self, email: &str) -> Result<Vec<ChatExchange>, StoreError> {
        let _guard = self.file_lock.lock().await;
        let entries = self.read_log(&self.chat_log_path(email)).await?;
        Ok(self.windowed(entries))
    }

    async fn append_exchange(
        &self,
        email: &str,
        exchange: ChatExchange,
    ) -> Result<(), StoreError> {
        let _guard = self.file_lock.lock().await;
        let path = self.chat_log_path(email);
        let mut entries: Vec<ChatExchange> = self.read_log(&path).await?;
        entries.push(exchange);
        write_json(&path, &entries).await
    }

    async fn workflow_state(
        &self,
        email: &str,
        initial_step: &str,
    ) -> Result<WorkflowState, StoreError> {
        let _guard = self.file_lock.lock().await;
        let path = self.workflow_path(email);
        if path.exists() {
            let raw = tokio::fs::read_to_string(&path).await?;
            return serde_json::from_str(&raw).map_err(|e| {
                StoreError::Serialization(format!("{}: {e}", path.display()))
            });
        }
        let state = WorkflowState::new(initial_step);
        write_json(&path, &state).await?;
        Ok(state)
    }

    async fn save_workflow_state(
        &self,
        email: &str,
        state: &WorkflowState,
    ) -> Result<(), StoreError> {
        let _guard = self.file_lock.lock().await;
        write_json(&self.workflow_path(email), state).await
    }

    async fn step_log(&self, email: &str) -> Result<Vec<StepTurn>, StoreError> {
        let _guard = self.file_lock.lock().await;
        let entries = self.read_log(&self.step_log_path(email)).await?;
        Ok(self.windowed(entries))
    }

    async fn append_step_turn(&self, email: &str, turn: StepTurn) -> Result<(), StoreError> {
        let _guard = self.file_lock.lock().await;
        let path = self.step_log_path(email);
        let mut entries: Vec<StepTurn> = self.read_log(&path).await?;
        entries.push(turn);
        write_json(&path, &entries).await
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// E-mails are used directly in file names; only path separators need
/// replacing.
fn file_key(email: &str) -> String {
    email.replace(['/', '\\'], "_")
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let raw = serde_json::to_string_pretty(value)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    tokio::fs::write(path, raw).await?;
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), 10);
        (dir, store)
    }

    #[tokio::test]
    async fn load_profile_creates_default_lazily() {
        let (_dir, store) = test_store();
        let profile = store.load_profile("alex@example.com").await.unwrap();
        assert_eq!(profile.email, "alex@example.com");
        assert!(profile.name.is_empty());

        // The default is persisted, not just returned.
        let again = store.load_profile("alex@example.com").await.unwrap();
        assert_eq!(again.email, "alex@example.com");
    }

    #[tokio::test]
    async fn save_and_reload_profile() {
        let (_dir, store) = test_store();
        let mut profile = store.load_profile("alex@example.com").await.unwrap();
        profile.name = "Alex".into();
        profile.age = 29;
        store.save_profile(&profile).await.unwrap();

        let loaded = store.load_profile("alex@example.com").await.unwrap();
        assert_eq!(loaded.name, "Alex");
        assert_eq!(loaded.age, 29);
    }

    #[tokio::test]
    async fn profiles_are_keyed_independently() {
        let (_dir, store) = test_store();
        let mut a = store.load_profile("a@x.com").await.unwrap();
        a.name = "A".into();
        store.save_profile(&a).await.unwrap();

        let b = store.load_profile("b@x.com").await.unwrap();
        assert!(b.name.is_empty());
    }

    #[tokio::test]
    async fn chat_history_windows_to_ten_most_recent() {
        let (_dir, store) = test_store();
        for i in 0..15 {
            store
                .append_exchange(
                    "alex@example.com",
                    ChatExchange {
                        user: format!("msg {i}"),
                        bot: format!("reply {i}"),
                    },
                )
                .await
                .unwrap();
        }

        let history = store.chat_history("alex@example.com").await.unwrap();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].user, "msg 5");
        assert_eq!(history[9].user, "msg 14");
    }

    #[tokio::test]
    async fn corrupt_chat_log_resets_to_empty() {
        let (dir, store) = test_store();
        let path = dir
            .path()
            .join("chat_histories")
            .join("alex@example.com_history.json");
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&path, "{not json").await.unwrap();

        let history = store.chat_history("alex@example.com").await.unwrap();
        assert!(history.is_empty());

        // The reset was persisted — the file now parses.
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: Vec<ChatExchange> = serde_json::from_str(&raw).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn corrupt_profiles_file_is_a_hard_error() {
        let (dir, store) = test_store();
        tokio::fs::write(dir.path().join("profiles.json"), "[oops")
            .await
            .unwrap();
        let result = store.load_profile("alex@example.com").await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn workflow_state_created_at_initial_step() {
        let (_dir, store) = test_store();
        let state = store
            .workflow_state("alex@example.com", "Define Business Problem")
            .await
            .unwrap();
        assert_eq!(state.current_step, "Define Business Problem");
        assert!(state.data.is_empty());
    }

    #[tokio::test]
    async fn workflow_state_roundtrip() {
        let (_dir, store) = test_store();
        let mut state = store
            .workflow_state("alex@example.com", "Define Business Problem")
            .await
            .unwrap();
        state
            .data
            .insert("Define Business Problem".into(), "calls go unanswered".into());
        state.current_step = "Set Project Direction".into();
        store
            .save_workflow_state("alex@example.com", &state)
            .await
            .unwrap();

        let loaded = store
            .workflow_state("alex@example.com", "Define Business Problem")
            .await
            .unwrap();
        assert_eq!(loaded.current_step, "Set Project Direction");
        assert_eq!(
            loaded.data.get("Define Business Problem").unwrap(),
            "calls go unanswered"
        );
    }

    #[tokio::test]
    async fn step_log_appends_and_windows() {
        let (_dir, store) = test_store();
        for i in 0..12 {
            store
                .append_step_turn("alex@example.com", StepTurn::user(format!("turn {i}")))
                .await
                .unwrap();
        }
        let log = store.step_log("alex@example.com").await.unwrap();
        assert_eq!(log.len(), 10);
        assert_eq!(log[0].text, "turn 2");
    }
}
