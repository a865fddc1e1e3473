// In-memory implementation of the record stores. Stands in for the host
// CRM in tests and when wiring the pipeline without a database.

use crate::core::records::{
    Lead, LeadStore, NewTask, Project, ProjectStore, SalesStage, StoreError, Task, TaskStage,
    TaskStore,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Chatter notes are keyed by (model, record id), the same way the host
/// application threads them.
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
struct NoteKey {
    model: &'static str,
    record_id: u64,
}

pub struct InMemoryCrmStore {
    leads: DashMap<u64, Lead>,
    projects: DashMap<u64, Project>,
    sales_stages: DashMap<u64, SalesStage>,
    task_stages: DashMap<u64, TaskStage>,
    tasks: DashMap<u64, Task>,
    notes: DashMap<NoteKey, Vec<String>>,
    /// Ids handed to records created through the store. Starts high so it
    /// never collides with fixture ids.
    next_id: AtomicU64,
}

impl InMemoryCrmStore {
    pub fn new() -> Self {
        Self {
            leads: DashMap::new(),
            projects: DashMap::new(),
            sales_stages: DashMap::new(),
            task_stages: DashMap::new(),
            tasks: DashMap::new(),
            notes: DashMap::new(),
            next_id: AtomicU64::new(1_000),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    // Seeding helpers, used by tests and the demo wiring.

    pub fn add_lead(&self, lead: Lead) {
        self.leads.insert(lead.id, lead);
    }

    pub fn add_project(&self, project: Project) {
        self.projects.insert(project.id, project);
    }

    pub fn add_sales_stage(&self, stage: SalesStage) {
        self.sales_stages.insert(stage.id, stage);
    }

    pub fn add_task_stage(&self, stage: TaskStage) {
        self.task_stages.insert(stage.id, stage);
    }

    // Inspection helpers for assertions.

    pub fn task(&self, id: u64) -> Option<Task> {
        self.tasks.get(&id).map(|t| t.value().clone())
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn task_stage(&self, id: u64) -> Option<TaskStage> {
        self.task_stages.get(&id).map(|s| s.value().clone())
    }

    pub fn task_stage_count(&self) -> usize {
        self.task_stages.len()
    }

    pub fn lead_notes(&self, id: u64) -> Vec<String> {
        self.notes
            .get(&NoteKey {
                model: "crm.lead",
                record_id: id,
            })
            .map(|n| n.value().clone())
            .unwrap_or_default()
    }

    pub fn task_notes(&self, id: u64) -> Vec<String> {
        self.notes
            .get(&NoteKey {
                model: "project.task",
                record_id: id,
            })
            .map(|n| n.value().clone())
            .unwrap_or_default()
    }

    fn append_note(&self, model: &'static str, record_id: u64, body: &str) {
        self.notes
            .entry(NoteKey { model, record_id })
            .or_default()
            .push(body.to_string());
    }
}

impl Default for InMemoryCrmStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeadStore for InMemoryCrmStore {
    async fn get_lead(&self, id: u64) -> Result<Lead, StoreError> {
        self.leads
            .get(&id)
            .map(|l| l.value().clone())
            .ok_or_else(|| StoreError::NotFound(format!("crm.lead({})", id)))
    }

    async fn save_lead(&self, lead: &Lead) -> Result<(), StoreError> {
        self.leads.insert(lead.id, lead.clone());
        Ok(())
    }

    async fn mark_sync_done(&self, id: u64) -> Result<(), StoreError> {
        let mut lead = self
            .leads
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("crm.lead({})", id)))?;
        lead.google_sync_done = true;
        Ok(())
    }

    async fn post_lead_note(&self, id: u64, body_html: &str) -> Result<(), StoreError> {
        if !self.leads.contains_key(&id) {
            return Err(StoreError::NotFound(format!("crm.lead({})", id)));
        }
        self.append_note("crm.lead", id, body_html);
        Ok(())
    }

    async fn won_stage(&self) -> Result<Option<SalesStage>, StoreError> {
        let mut won: Vec<SalesStage> = self
            .sales_stages
            .iter()
            .filter(|s| s.is_won)
            .map(|s| s.value().clone())
            .collect();
        won.sort_by_key(|s| s.id);
        Ok(won.into_iter().next())
    }
}

#[async_trait]
impl ProjectStore for InMemoryCrmStore {
    async fn get_project(&self, id: u64) -> Result<Project, StoreError> {
        self.projects
            .get(&id)
            .map(|p| p.value().clone())
            .ok_or_else(|| StoreError::NotFound(format!("project.project({})", id)))
    }

    async fn all_projects(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects: Vec<Project> = self.projects.iter().map(|p| p.value().clone()).collect();
        projects.sort_by_key(|p| p.id);
        Ok(projects)
    }

    async fn projects_with_sheets_enabled(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects: Vec<Project> = self
            .projects
            .iter()
            .filter(|p| p.use_google_sheets)
            .map(|p| p.value().clone())
            .collect();
        projects.sort_by_key(|p| p.id);
        Ok(projects)
    }

    async fn set_use_google_sheets(&self, id: u64, enabled: bool) -> Result<(), StoreError> {
        let mut project = self
            .projects
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("project.project({})", id)))?;
        project.use_google_sheets = enabled;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for InMemoryCrmStore {
    async fn first_stage_for_project(
        &self,
        project_id: u64,
    ) -> Result<Option<TaskStage>, StoreError> {
        let mut stages: Vec<TaskStage> = self
            .task_stages
            .iter()
            .filter(|s| s.applies_to(project_id))
            .map(|s| s.value().clone())
            .collect();
        stages.sort_by_key(|s| (s.sequence, s.id));
        Ok(stages.into_iter().next())
    }

    async fn create_stage(
        &self,
        name: &str,
        sequence: u32,
        project_id: u64,
    ) -> Result<TaskStage, StoreError> {
        let stage = TaskStage {
            id: self.allocate_id(),
            name: name.to_string(),
            sequence,
            project_ids: vec![project_id],
        };
        self.task_stages.insert(stage.id, stage.clone());
        Ok(stage)
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        let task = Task {
            id: self.allocate_id(),
            name: task.name,
            project_id: task.project_id,
            stage_id: task.stage_id,
            description: task.description,
            partner_id: task.partner_id,
            user_ids: task.user_ids,
        };
        self.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn post_task_note(&self, id: u64, body_html: &str) -> Result<(), StoreError> {
        if !self.tasks.contains_key(&id) {
            return Err(StoreError::NotFound(format!("project.task({})", id)));
        }
        self.append_note("project.task", id, body_html);
        Ok(())
    }
}
