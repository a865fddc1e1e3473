// Storage ports for the host application's records.
// The core defines WHAT it needs from the CRM; the infra layer provides the
// actual implementations (in-memory, SQLite).

use super::records_models::{Lead, NewTask, Project, SalesStage, Task, TaskStage};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Backend(String),
}

/// Access to leads and their chatter.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn get_lead(&self, id: u64) -> Result<Lead, StoreError>;

    /// Persists the whole snapshot (used by the "mark won" action to move
    /// the lead into a won stage).
    async fn save_lead(&self, lead: &Lead) -> Result<(), StoreError>;

    /// Flips `google_sync_done` to true. Never resets it.
    async fn mark_sync_done(&self, id: u64) -> Result<(), StoreError>;

    /// Posts an HTML note on the lead's message thread.
    async fn post_lead_note(&self, id: u64, body_html: &str) -> Result<(), StoreError>;

    /// The stage the explicit "mark won" action moves a lead into, if the
    /// pipeline has one flagged `is_won`.
    async fn won_stage(&self) -> Result<Option<SalesStage>, StoreError>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get_project(&self, id: u64) -> Result<Project, StoreError>;

    async fn all_projects(&self) -> Result<Vec<Project>, StoreError>;

    /// Projects currently opted into sync (used to pre-populate the settings
    /// screen).
    async fn projects_with_sheets_enabled(&self) -> Result<Vec<Project>, StoreError>;

    async fn set_use_google_sheets(&self, id: u64, enabled: bool) -> Result<(), StoreError>;
}

/// Access to task stages and tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// First stage visible to the project: stages scoped to it OR globally
    /// scoped, ordered by sequence ascending (ties broken by id).
    async fn first_stage_for_project(
        &self,
        project_id: u64,
    ) -> Result<Option<TaskStage>, StoreError>;

    /// Creates a stage scoped to the given project.
    async fn create_stage(
        &self,
        name: &str,
        sequence: u32,
        project_id: u64,
    ) -> Result<TaskStage, StoreError>;

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError>;

    /// Posts an HTML note on the task's message thread.
    async fn post_task_note(&self, id: u64, body_html: &str) -> Result<(), StoreError>;
}
