// Domain records for the lead-to-sheets automation.
// These are plain snapshots of the host CRM's records - no store handles,
// no I/O. The stores in `record_stores` hand them out and take them back.

use serde::{Deserialize, Serialize};

/// A project that may participate in spreadsheet sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    /// Per-project opt-in. Written by the settings screen, read by the
    /// eligibility check.
    pub use_google_sheets: bool,
    /// The long identifier from the spreadsheet URL.
    pub google_spreadsheet_id: Option<String>,
    /// Whether winning a lead in this project also creates a task.
    pub create_task_on_lead: bool,
}

/// A stage in the sales pipeline. `is_won` marks the terminal "won" stages
/// the write path watches for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesStage {
    pub id: u64,
    pub name: String,
    pub is_won: bool,
}

/// Snapshot of a sales opportunity.
///
/// Contact and salesperson are denormalized (id + display name) because the
/// spreadsheet row and the task description only ever need the names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: u64,
    pub name: String,
    pub contact_name: Option<String>,
    pub partner_id: Option<u64>,
    pub partner_name: Option<String>,
    pub email_from: Option<String>,
    pub phone: Option<String>,
    pub expected_revenue: f64,
    pub user_id: Option<u64>,
    pub user_name: Option<String>,
    pub stage: Option<SalesStage>,
    /// Project that receives the row and the task.
    pub project_id: Option<u64>,
    /// Idempotency flag: goes false -> true exactly once, never reset.
    pub google_sync_done: bool,
}

impl Lead {
    /// Display name used for the task title: partner, then contact, then the
    /// lead's own name.
    pub fn display_name(&self) -> &str {
        self.partner_name
            .as_deref()
            .or(self.contact_name.as_deref())
            .unwrap_or(&self.name)
    }
}

/// A stage in a project's task board. An empty `project_ids` means the stage
/// is global (shared by every project).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStage {
    pub id: u64,
    pub name: String,
    pub sequence: u32,
    pub project_ids: Vec<u64>,
}

impl TaskStage {
    #[allow(dead_code)]
    pub fn applies_to(&self, project_id: u64) -> bool {
        self.project_ids.is_empty() || self.project_ids.contains(&project_id)
    }
}

/// A task as stored by the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub name: String,
    pub project_id: u64,
    pub stage_id: u64,
    /// HTML body shown in the task form.
    pub description: String,
    pub partner_id: Option<u64>,
    pub user_ids: Vec<u64>,
}

/// Field values for a task about to be created.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub project_id: u64,
    pub stage_id: u64,
    pub description: String,
    pub partner_id: Option<u64>,
    pub user_ids: Vec<u64>,
}
