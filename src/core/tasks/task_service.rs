// Task creation from a won lead: stage resolution, HTML description,
// cross-reference notes.

use crate::core::records::{Lead, LeadStore, NewTask, Project, StoreError, Task, TaskStore};
use std::sync::Arc;

/// Stage created when a project has no task stages at all.
pub const DEFAULT_STAGE_NAME: &str = "Por hacer";
pub const DEFAULT_STAGE_SEQUENCE: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

pub struct TaskFromLeadService {
    tasks: Arc<dyn TaskStore>,
    leads: Arc<dyn LeadStore>,
}

impl TaskFromLeadService {
    pub fn new(tasks: Arc<dyn TaskStore>, leads: Arc<dyn LeadStore>) -> Self {
        Self { tasks, leads }
    }

    /// Creates the follow-up task for a lead that just synced.
    ///
    /// Stage resolution: first stage scoped to the project or globally
    /// scoped, by sequence; falls back to creating "Por hacer" (sequence 10)
    /// scoped to this project. After creation, cross-reference notes are
    /// posted on both records.
    pub async fn create_from_lead(&self, lead: &Lead, project: &Project) -> Result<Task, TaskError> {
        let stage = match self.tasks.first_stage_for_project(project.id).await? {
            Some(stage) => stage,
            None => {
                tracing::info!(
                    project_id = project.id,
                    "Project has no task stages, creating the default one"
                );
                self.tasks
                    .create_stage(DEFAULT_STAGE_NAME, DEFAULT_STAGE_SEQUENCE, project.id)
                    .await?
            }
        };

        let task = self
            .tasks
            .create_task(NewTask {
                name: format!("[LEAD-{}] {}", lead.id, lead.display_name()),
                project_id: project.id,
                stage_id: stage.id,
                description: lead_description_html(lead),
                partner_id: lead.partner_id,
                user_ids: lead.user_id.into_iter().collect(),
            })
            .await?;

        self.leads
            .post_lead_note(
                lead.id,
                &format!(
                    "<p>✅ Tarea creada: <a href=\"#id={}&model=project.task\">{}</a></p>",
                    task.id, task.name
                ),
            )
            .await?;
        self.tasks
            .post_task_note(
                task.id,
                &format!(
                    "<p>🔗 Creada desde el lead <a href=\"#id={}&model=crm.lead\">{}</a></p>",
                    lead.id, lead.name
                ),
            )
            .await?;

        Ok(task)
    }
}

/// HTML block listing whichever lead fields are filled in.
pub fn lead_description_html(lead: &Lead) -> String {
    let mut lines = vec![
        "<h3>📋 Información del Nuevo Lead:</h3>".to_string(),
        "<ul>".to_string(),
    ];

    if let Some(partner) = lead.partner_name.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("<li><strong>Cliente:</strong> {}</li>", partner));
    } else if let Some(contact) = lead.contact_name.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("<li><strong>Contacto:</strong> {}</li>", contact));
    }

    if let Some(email) = lead.email_from.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("<li><strong>Email:</strong> {}</li>", email));
    }

    if let Some(phone) = lead.phone.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("<li><strong>Teléfono:</strong> {}</li>", phone));
    }

    if lead.expected_revenue > 0.0 {
        lines.push(format!(
            "<li><strong>Valor esperado:</strong> ${}</li>",
            format_amount(lead.expected_revenue)
        ));
    }

    if let Some(user) = lead.user_name.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("<li><strong>Vendedor:</strong> {}</li>", user));
    }

    lines.push("</ul>".to_string());
    lines.join("\n")
}

/// `1234567.5` -> `"1,234,567.50"`.
fn format_amount(value: f64) -> String {
    let raw = format!("{:.2}", value);
    let (integer, decimals) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));
    let (sign, digits) = integer.strip_prefix('-').map_or(("", integer), |d| ("-", d));

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}{}.{}", sign, grouped, decimals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::records::InMemoryCrmStore;
    use crate::core::records::TaskStage;

    fn lead() -> Lead {
        Lead {
            id: 42,
            name: "Oportunidad web".to_string(),
            contact_name: Some("Carlos".to_string()),
            partner_id: None,
            partner_name: None,
            email_from: Some("carlos@acme.mx".to_string()),
            phone: None,
            expected_revenue: 12500.0,
            user_id: Some(7),
            user_name: Some("Laura".to_string()),
            stage: None,
            project_id: Some(1),
            google_sync_done: false,
        }
    }

    fn project() -> Project {
        Project {
            id: 1,
            name: "Proyecto".to_string(),
            use_google_sheets: true,
            google_spreadsheet_id: Some("abc123".to_string()),
            create_task_on_lead: true,
        }
    }

    fn service(store: &Arc<InMemoryCrmStore>) -> TaskFromLeadService {
        TaskFromLeadService::new(store.clone(), store.clone())
    }

    #[test]
    fn description_lists_only_filled_fields() {
        let html = lead_description_html(&lead());

        assert!(html.contains("<h3>📋 Información del Nuevo Lead:</h3>"));
        assert!(html.contains("<li><strong>Contacto:</strong> Carlos</li>"));
        assert!(html.contains("<li><strong>Email:</strong> carlos@acme.mx</li>"));
        assert!(html.contains("<li><strong>Valor esperado:</strong> $12,500.00</li>"));
        assert!(html.contains("<li><strong>Vendedor:</strong> Laura</li>"));
        assert!(!html.contains("Teléfono"));
    }

    #[test]
    fn partner_replaces_contact_in_description() {
        let mut l = lead();
        l.partner_name = Some("ACME SA".to_string());
        let html = lead_description_html(&l);

        assert!(html.contains("<li><strong>Cliente:</strong> ACME SA</li>"));
        assert!(!html.contains("Contacto"));
    }

    #[test]
    fn amounts_group_thousands() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(950.5), "950.50");
        assert_eq!(format_amount(12500.0), "12,500.00");
        assert_eq!(format_amount(1234567.891), "1,234,567.89");
    }

    #[tokio::test]
    async fn creates_the_default_stage_when_the_project_has_none() {
        let store = Arc::new(InMemoryCrmStore::new());
        store.add_lead(lead());
        store.add_project(project());

        let task = service(&store)
            .create_from_lead(&lead(), &project())
            .await
            .unwrap();

        let stage = store.task_stage(task.stage_id).unwrap();
        assert_eq!(stage.name, DEFAULT_STAGE_NAME);
        assert_eq!(stage.sequence, DEFAULT_STAGE_SEQUENCE);
        assert_eq!(stage.project_ids, vec![1]);
        assert_eq!(store.task_stage_count(), 1);
    }

    #[tokio::test]
    async fn picks_the_lowest_sequence_stage_project_or_global() {
        let store = Arc::new(InMemoryCrmStore::new());
        store.add_lead(lead());
        store.add_project(project());
        store.add_task_stage(TaskStage {
            id: 50,
            name: "En curso".to_string(),
            sequence: 20,
            project_ids: vec![1],
        });
        store.add_task_stage(TaskStage {
            id: 51,
            name: "Nuevas".to_string(),
            sequence: 5,
            project_ids: vec![],
        });
        store.add_task_stage(TaskStage {
            id: 52,
            name: "Otras".to_string(),
            sequence: 1,
            project_ids: vec![99],
        });

        let task = service(&store)
            .create_from_lead(&lead(), &project())
            .await
            .unwrap();

        // The global stage with sequence 5 wins; the other project's stage
        // with sequence 1 is not visible here.
        assert_eq!(task.stage_id, 51);
    }

    #[tokio::test]
    async fn task_carries_title_links_and_assignee() {
        let store = Arc::new(InMemoryCrmStore::new());
        let mut l = lead();
        l.partner_id = Some(3);
        l.partner_name = Some("ACME SA".to_string());
        store.add_lead(l.clone());
        store.add_project(project());

        let task = service(&store)
            .create_from_lead(&l, &project())
            .await
            .unwrap();

        assert_eq!(task.name, "[LEAD-42] ACME SA");
        assert_eq!(task.project_id, 1);
        assert_eq!(task.partner_id, Some(3));
        assert_eq!(task.user_ids, vec![7]);

        let lead_notes = store.lead_notes(42);
        assert_eq!(lead_notes.len(), 1);
        assert!(lead_notes[0].contains("Tarea creada"));
        assert!(lead_notes[0].contains(&format!("#id={}&model=project.task", task.id)));

        let task_notes = store.task_notes(task.id);
        assert_eq!(task_notes.len(), 1);
        assert!(task_notes[0].contains("#id=42&model=crm.lead"));
    }
}
