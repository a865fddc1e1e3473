// Settings screen backing service: the credentials blob and the full
// overwrite of per-project opt-in flags.

use crate::core::config::{ConfigError, ConfigStore};
use crate::core::records::{ProjectStore, StoreError};
use std::sync::Arc;

/// Global parameter keys.
pub const PARAM_GOOGLE_KEY_FILE: &str = "crm_sheets.google_key_file";
pub const PARAM_GOOGLE_KEY_FILENAME: &str = "crm_sheets.google_key_filename";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// What the settings screen edits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsForm {
    /// Base64-encoded service-account JSON, as uploaded.
    pub google_key_file: Option<String>,
    /// Original filename of the uploaded key, for display.
    pub google_key_filename: Option<String>,
    /// Projects the administrator ticked.
    pub sheets_project_ids: Vec<u64>,
}

pub struct SheetsSettingsService {
    config: Arc<dyn ConfigStore>,
    projects: Arc<dyn ProjectStore>,
}

impl SheetsSettingsService {
    pub fn new(config: Arc<dyn ConfigStore>, projects: Arc<dyn ProjectStore>) -> Self {
        Self { config, projects }
    }

    /// Persists the form. The opt-in flag is a full overwrite: every project
    /// in the system ends up with `use_google_sheets` equal to its
    /// membership in the selected set.
    pub async fn set_values(&self, form: &SettingsForm) -> Result<(), SettingsError> {
        self.config
            .set_param(PARAM_GOOGLE_KEY_FILE, form.google_key_file.as_deref())
            .await?;
        self.config
            .set_param(
                PARAM_GOOGLE_KEY_FILENAME,
                form.google_key_filename.as_deref(),
            )
            .await?;

        for project in self.projects.all_projects().await? {
            let selected = form.sheets_project_ids.contains(&project.id);
            if project.use_google_sheets != selected {
                tracing::info!(
                    project_id = project.id,
                    enabled = selected,
                    "Updating project sheets opt-in"
                );
            }
            self.projects
                .set_use_google_sheets(project.id, selected)
                .await?;
        }

        Ok(())
    }

    /// Reads the form back for the settings screen: the stored blob plus the
    /// currently opted-in project set.
    pub async fn get_values(&self) -> Result<SettingsForm, SettingsError> {
        let google_key_file = self.config.get_param(PARAM_GOOGLE_KEY_FILE).await?;
        let google_key_filename = self.config.get_param(PARAM_GOOGLE_KEY_FILENAME).await?;

        let mut sheets_project_ids: Vec<u64> = self
            .projects
            .projects_with_sheets_enabled()
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        sheets_project_ids.sort_unstable();

        Ok(SettingsForm {
            google_key_file,
            google_key_filename,
            sheets_project_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::records::Project;
    use crate::infra::config::InMemoryConfigStore;
    use crate::infra::records::InMemoryCrmStore;

    fn project(id: u64, enabled: bool) -> Project {
        Project {
            id,
            name: format!("Proyecto {}", id),
            use_google_sheets: enabled,
            google_spreadsheet_id: None,
            create_task_on_lead: true,
        }
    }

    fn service() -> (Arc<InMemoryCrmStore>, SheetsSettingsService) {
        let store = Arc::new(InMemoryCrmStore::new());
        let config = Arc::new(InMemoryConfigStore::new());
        let service = SheetsSettingsService::new(config, store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn save_overwrites_the_whole_opt_in_set() {
        let (store, service) = service();
        store.add_project(project(1, true));
        store.add_project(project(2, false));
        store.add_project(project(3, false));

        service
            .set_values(&SettingsForm {
                google_key_file: Some("blob".to_string()),
                google_key_filename: Some("key.json".to_string()),
                sheets_project_ids: vec![2, 3],
            })
            .await
            .unwrap();

        // Project 1 was deselected: its flag must drop to false.
        assert!(!store.get_project(1).await.unwrap().use_google_sheets);
        assert!(store.get_project(2).await.unwrap().use_google_sheets);
        assert!(store.get_project(3).await.unwrap().use_google_sheets);
    }

    #[tokio::test]
    async fn load_returns_blob_and_flagged_projects() {
        let (store, service) = service();
        store.add_project(project(1, false));
        store.add_project(project(2, true));
        store.add_project(project(7, true));

        service
            .set_values(&SettingsForm {
                google_key_file: Some("blob".to_string()),
                google_key_filename: Some("key.json".to_string()),
                sheets_project_ids: vec![2, 7],
            })
            .await
            .unwrap();

        let form = service.get_values().await.unwrap();
        assert_eq!(form.google_key_file.as_deref(), Some("blob"));
        assert_eq!(form.google_key_filename.as_deref(), Some("key.json"));
        assert_eq!(form.sheets_project_ids, vec![2, 7]);
    }

    #[tokio::test]
    async fn clearing_the_blob_removes_the_param() {
        let (store, service) = service();
        store.add_project(project(1, false));

        service
            .set_values(&SettingsForm {
                google_key_file: Some("blob".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        service
            .set_values(&SettingsForm::default())
            .await
            .unwrap();

        let form = service.get_values().await.unwrap();
        assert_eq!(form.google_key_file, None);
    }
}
