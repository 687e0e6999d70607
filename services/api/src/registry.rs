//! In-Memory Registries
//!
//! Modules and chat sessions live in process memory behind `RwLock`ed maps.
//! Module generation runs on background tasks, so the registry is the one
//! place where status transitions are recorded; REST reads and WebSocket
//! writers share it through the application state.

use crate::models::{ModuleRecord, ModuleStatus, ModuleSummary};
use chrono::Utc;
use slate_core::capability::ChatTurn;
use slate_core::command::CommandScript;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// All generated (and in-flight) modules, keyed by id.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<HashMap<Uuid, ModuleRecord>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: ModuleRecord) {
        self.modules.write().await.insert(record.id, record);
    }

    pub async fn get(&self, id: Uuid) -> Option<ModuleRecord> {
        self.modules.read().await.get(&id).cloned()
    }

    /// Most recently updated first.
    pub async fn list(&self) -> Vec<ModuleSummary> {
        let modules = self.modules.read().await;
        let mut summaries: Vec<ModuleSummary> = modules.values().map(ModuleSummary::from).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    pub async fn set_status(&self, id: Uuid, status: ModuleStatus) {
        if let Some(record) = self.modules.write().await.get_mut(&id) {
            record.status = status;
            record.updated_at = Utc::now();
        }
    }

    /// Marks the module completed and stores its playable script.
    pub async fn complete(&self, id: Uuid, script: CommandScript) {
        if let Some(record) = self.modules.write().await.get_mut(&id) {
            record.status = ModuleStatus::Completed;
            record.script = Some(script);
            record.updated_at = Utc::now();
        }
    }
}

/// One resumable chat session: its display title and the turns exchanged so
/// far (user prompts and assistant narration).
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub title: String,
    pub history: Vec<ChatTurn>,
    pub updated_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SessionRecord>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, title: String) -> SessionRecord {
        let record = SessionRecord {
            id: Uuid::new_v4(),
            title,
            history: Vec::new(),
            updated_at: Utc::now(),
        };
        self.sessions
            .write()
            .await
            .insert(record.id, record.clone());
        record
    }

    pub async fn get(&self, id: Uuid) -> Option<SessionRecord> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Appends turns to a session's history.
    pub async fn append_history(&self, id: Uuid, turns: Vec<ChatTurn>) {
        if let Some(record) = self.sessions.write().await.get_mut(&id) {
            record.history.extend(turns);
            record.updated_at = Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slate_core::module::ModuleLength;

    fn record(title: &str) -> ModuleRecord {
        let now = Utc::now();
        ModuleRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            prompt: "prompt".to_string(),
            length: ModuleLength::Short,
            status: ModuleStatus::Generating,
            language_code: "en-US".to_string(),
            script: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trips() {
        let registry = ModuleRegistry::new();
        let record = record("First");
        let id = record.id;
        registry.insert(record).await;

        let fetched = registry.get(id).await.unwrap();
        assert_eq!(fetched.title, "First");
        assert_eq!(fetched.status, ModuleStatus::Generating);
        assert!(registry.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn complete_stores_the_script_and_flips_status() {
        let registry = ModuleRegistry::new();
        let record = record("Module");
        let id = record.id;
        registry.insert(record).await;

        registry
            .complete(id, CommandScript::from_validated(vec![]))
            .await;

        let fetched = registry.get(id).await.unwrap();
        assert_eq!(fetched.status, ModuleStatus::Completed);
        assert!(fetched.script.is_some());
    }

    #[tokio::test]
    async fn list_orders_by_most_recent_update() {
        let registry = ModuleRegistry::new();
        let first = record("older");
        let second = record("newer");
        let second_id = second.id;
        registry.insert(first).await;
        registry.insert(second).await;

        // Touching a record moves it to the front.
        registry.set_status(second_id, ModuleStatus::Failed).await;

        let listed = registry.list().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].title, "newer");
        assert_eq!(listed[0].status, ModuleStatus::Failed);
    }

    #[tokio::test]
    async fn session_history_accumulates() {
        let registry = SessionRegistry::new();
        let session = registry.create("Photosynthesis".to_string()).await;

        registry
            .append_history(
                session.id,
                vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")],
            )
            .await;
        registry
            .append_history(session.id, vec![ChatTurn::user("more")])
            .await;

        let fetched = registry.get(session.id).await.unwrap();
        assert_eq!(fetched.history.len(), 3);
        assert_eq!(fetched.title, "Photosynthesis");
    }
}
