// SQLite-backed implementation of the record stores, used by the binary so
// records survive restarts. Schema mirrors the host application's models.

use crate::core::records::{
    Lead, LeadStore, NewTask, Project, ProjectStore, SalesStage, StoreError, Task, TaskStage,
    TaskStore,
};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteCrmStore {
    pool: Pool<Sqlite>,
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl SqliteCrmStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        // One statement per query: sqlite prepared statements don't batch.
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                use_google_sheets BOOLEAN NOT NULL DEFAULT 0,
                google_spreadsheet_id TEXT,
                create_task_on_lead BOOLEAN NOT NULL DEFAULT 1
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS sales_stages (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                is_won BOOLEAN NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS leads (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                contact_name TEXT,
                partner_id INTEGER,
                partner_name TEXT,
                email_from TEXT,
                phone TEXT,
                expected_revenue REAL NOT NULL DEFAULT 0,
                user_id INTEGER,
                user_name TEXT,
                stage_id INTEGER,
                project_id INTEGER,
                google_sync_done BOOLEAN NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS task_stages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                sequence INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS task_stage_projects (
                stage_id INTEGER NOT NULL,
                project_id INTEGER NOT NULL,
                PRIMARY KEY (stage_id, project_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                project_id INTEGER NOT NULL,
                stage_id INTEGER NOT NULL,
                description TEXT NOT NULL,
                partner_id INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS task_assignees (
                task_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                PRIMARY KEY (task_id, user_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS record_notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                model TEXT NOT NULL,
                record_id INTEGER NOT NULL,
                body TEXT NOT NULL
            )
            "#,
        ];
        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // Seeding helpers for the composition root.

    pub async fn upsert_project(&self, project: &Project) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, name, use_google_sheets, google_spreadsheet_id, create_task_on_lead)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                use_google_sheets = excluded.use_google_sheets,
                google_spreadsheet_id = excluded.google_spreadsheet_id,
                create_task_on_lead = excluded.create_task_on_lead
            "#,
        )
        .bind(project.id as i64)
        .bind(&project.name)
        .bind(project.use_google_sheets)
        .bind(&project.google_spreadsheet_id)
        .bind(project.create_task_on_lead)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_sales_stage(&self, stage: &SalesStage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sales_stages (id, name, is_won)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                is_won = excluded.is_won
            "#,
        )
        .bind(stage.id as i64)
        .bind(&stage.name)
        .bind(stage.is_won)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn stage_by_id(&self, id: i64) -> Result<Option<SalesStage>, StoreError> {
        let row = sqlx::query("SELECT id, name, is_won FROM sales_stages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(|row| SalesStage {
            id: row.get::<i64, _>("id") as u64,
            name: row.get("name"),
            is_won: row.get("is_won"),
        }))
    }

    async fn lead_from_row(&self, row: sqlx::sqlite::SqliteRow) -> Result<Lead, StoreError> {
        let stage = match row.get::<Option<i64>, _>("stage_id") {
            Some(stage_id) => self.stage_by_id(stage_id).await?,
            None => None,
        };
        Ok(Lead {
            id: row.get::<i64, _>("id") as u64,
            name: row.get("name"),
            contact_name: row.get("contact_name"),
            partner_id: row.get::<Option<i64>, _>("partner_id").map(|id| id as u64),
            partner_name: row.get("partner_name"),
            email_from: row.get("email_from"),
            phone: row.get("phone"),
            expected_revenue: row.get("expected_revenue"),
            user_id: row.get::<Option<i64>, _>("user_id").map(|id| id as u64),
            user_name: row.get("user_name"),
            stage,
            project_id: row.get::<Option<i64>, _>("project_id").map(|id| id as u64),
            google_sync_done: row.get("google_sync_done"),
        })
    }

    fn project_from_row(row: sqlx::sqlite::SqliteRow) -> Project {
        Project {
            id: row.get::<i64, _>("id") as u64,
            name: row.get("name"),
            use_google_sheets: row.get("use_google_sheets"),
            google_spreadsheet_id: row.get("google_spreadsheet_id"),
            create_task_on_lead: row.get("create_task_on_lead"),
        }
    }

    async fn stage_project_ids(&self, stage_id: i64) -> Result<Vec<u64>, StoreError> {
        let rows = sqlx::query(
            "SELECT project_id FROM task_stage_projects WHERE stage_id = ? ORDER BY project_id",
        )
        .bind(stage_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(|row| row.get::<i64, _>("project_id") as u64)
            .collect())
    }
}

#[async_trait]
impl LeadStore for SqliteCrmStore {
    async fn get_lead(&self, id: u64) -> Result<Lead, StoreError> {
        let row = sqlx::query("SELECT * FROM leads WHERE id = ?")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::NotFound(format!("crm.lead({})", id)))?;
        self.lead_from_row(row).await
    }

    async fn save_lead(&self, lead: &Lead) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO leads (
                id, name, contact_name, partner_id, partner_name, email_from,
                phone, expected_revenue, user_id, user_name, stage_id,
                project_id, google_sync_done
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                contact_name = excluded.contact_name,
                partner_id = excluded.partner_id,
                partner_name = excluded.partner_name,
                email_from = excluded.email_from,
                phone = excluded.phone,
                expected_revenue = excluded.expected_revenue,
                user_id = excluded.user_id,
                user_name = excluded.user_name,
                stage_id = excluded.stage_id,
                project_id = excluded.project_id,
                google_sync_done = excluded.google_sync_done
            "#,
        )
        .bind(lead.id as i64)
        .bind(&lead.name)
        .bind(&lead.contact_name)
        .bind(lead.partner_id.map(|id| id as i64))
        .bind(&lead.partner_name)
        .bind(&lead.email_from)
        .bind(&lead.phone)
        .bind(lead.expected_revenue)
        .bind(lead.user_id.map(|id| id as i64))
        .bind(&lead.user_name)
        .bind(lead.stage.as_ref().map(|s| s.id as i64))
        .bind(lead.project_id.map(|id| id as i64))
        .bind(lead.google_sync_done)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if let Some(stage) = &lead.stage {
            self.upsert_sales_stage(stage)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        Ok(())
    }

    async fn mark_sync_done(&self, id: u64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE leads SET google_sync_done = 1 WHERE id = ?")
            .bind(id as i64)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("crm.lead({})", id)));
        }
        Ok(())
    }

    async fn post_lead_note(&self, id: u64, body_html: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO record_notes (model, record_id, body) VALUES ('crm.lead', ?, ?)")
            .bind(id as i64)
            .bind(body_html)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn won_stage(&self) -> Result<Option<SalesStage>, StoreError> {
        let row =
            sqlx::query("SELECT id, name, is_won FROM sales_stages WHERE is_won = 1 ORDER BY id LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
        Ok(row.map(|row| SalesStage {
            id: row.get::<i64, _>("id") as u64,
            name: row.get("name"),
            is_won: row.get("is_won"),
        }))
    }
}

#[async_trait]
impl ProjectStore for SqliteCrmStore {
    async fn get_project(&self, id: u64) -> Result<Project, StoreError> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::NotFound(format!("project.project({})", id)))?;
        Ok(Self::project_from_row(row))
    }

    async fn all_projects(&self) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query("SELECT * FROM projects ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(Self::project_from_row).collect())
    }

    async fn projects_with_sheets_enabled(&self) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query("SELECT * FROM projects WHERE use_google_sheets = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(Self::project_from_row).collect())
    }

    async fn set_use_google_sheets(&self, id: u64, enabled: bool) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE projects SET use_google_sheets = ? WHERE id = ?")
            .bind(enabled)
            .bind(id as i64)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("project.project({})", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for SqliteCrmStore {
    async fn first_stage_for_project(
        &self,
        project_id: u64,
    ) -> Result<Option<TaskStage>, StoreError> {
        // A stage is visible if it has no project links (global) or links to
        // this project.
        let row = sqlx::query(
            r#"
            SELECT ts.id, ts.name, ts.sequence
            FROM task_stages ts
            WHERE NOT EXISTS (
                    SELECT 1 FROM task_stage_projects tsp WHERE tsp.stage_id = ts.id
                )
                OR EXISTS (
                    SELECT 1 FROM task_stage_projects tsp
                    WHERE tsp.stage_id = ts.id AND tsp.project_id = ?
                )
            ORDER BY ts.sequence ASC, ts.id ASC
            LIMIT 1
            "#,
        )
        .bind(project_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: i64 = row.get("id");
        Ok(Some(TaskStage {
            id: id as u64,
            name: row.get("name"),
            sequence: row.get::<i64, _>("sequence") as u32,
            project_ids: self.stage_project_ids(id).await?,
        }))
    }

    async fn create_stage(
        &self,
        name: &str,
        sequence: u32,
        project_id: u64,
    ) -> Result<TaskStage, StoreError> {
        let result = sqlx::query("INSERT INTO task_stages (name, sequence) VALUES (?, ?)")
            .bind(name)
            .bind(sequence as i64)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        let stage_id = result.last_insert_rowid();

        sqlx::query("INSERT INTO task_stage_projects (stage_id, project_id) VALUES (?, ?)")
            .bind(stage_id)
            .bind(project_id as i64)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(TaskStage {
            id: stage_id as u64,
            name: name.to_string(),
            sequence,
            project_ids: vec![project_id],
        })
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO tasks (name, project_id, stage_id, description, partner_id)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.name)
        .bind(task.project_id as i64)
        .bind(task.stage_id as i64)
        .bind(&task.description)
        .bind(task.partner_id.map(|id| id as i64))
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        let task_id = result.last_insert_rowid();

        for user_id in &task.user_ids {
            sqlx::query("INSERT INTO task_assignees (task_id, user_id) VALUES (?, ?)")
                .bind(task_id)
                .bind(*user_id as i64)
                .execute(&self.pool)
                .await
                .map_err(backend)?;
        }

        Ok(Task {
            id: task_id as u64,
            name: task.name,
            project_id: task.project_id,
            stage_id: task.stage_id,
            description: task.description,
            partner_id: task.partner_id,
            user_ids: task.user_ids,
        })
    }

    async fn post_task_note(&self, id: u64, body_html: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO record_notes (model, record_id, body) VALUES ('project.task', ?, ?)",
        )
        .bind(id as i64)
        .bind(body_html)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteCrmStore {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteCrmStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    fn lead(id: u64) -> Lead {
        Lead {
            id,
            name: "Oportunidad".to_string(),
            contact_name: Some("Carlos".to_string()),
            partner_id: None,
            partner_name: None,
            email_from: None,
            phone: None,
            expected_revenue: 950.0,
            user_id: Some(3),
            user_name: Some("Laura".to_string()),
            stage: Some(SalesStage {
                id: 4,
                name: "Ganado".to_string(),
                is_won: true,
            }),
            project_id: Some(1),
            google_sync_done: false,
        }
    }

    #[tokio::test]
    async fn test_lead_round_trip() {
        let store = store().await;
        store.save_lead(&lead(5)).await.unwrap();

        let loaded = store.get_lead(5).await.unwrap();
        assert_eq!(loaded.name, "Oportunidad");
        assert_eq!(loaded.expected_revenue, 950.0);
        assert_eq!(loaded.stage.as_ref().unwrap().name, "Ganado");
        assert!(loaded.stage.as_ref().unwrap().is_won);
        assert!(!loaded.google_sync_done);

        store.mark_sync_done(5).await.unwrap();
        assert!(store.get_lead(5).await.unwrap().google_sync_done);
    }

    #[tokio::test]
    async fn test_stage_resolution_prefers_lowest_sequence() {
        let store = store().await;

        let global = store.create_stage("Global", 5, 99).await.unwrap();
        // Detach the helper's project link to make it truly global.
        sqlx::query("DELETE FROM task_stage_projects WHERE stage_id = ?")
            .bind(global.id as i64)
            .execute(&store.pool)
            .await
            .unwrap();
        store.create_stage("Ajena", 1, 42).await.unwrap();
        store.create_stage("Propia", 20, 7).await.unwrap();

        let first = store.first_stage_for_project(7).await.unwrap().unwrap();
        assert_eq!(first.name, "Global");
        assert!(first.project_ids.is_empty());
    }

    #[tokio::test]
    async fn test_no_stages_means_none() {
        let store = store().await;
        assert!(store.first_stage_for_project(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_task_creation_with_assignees() {
        let store = store().await;
        let stage = store.create_stage("Por hacer", 10, 1).await.unwrap();

        let task = store
            .create_task(NewTask {
                name: "[LEAD-5] Carlos".to_string(),
                project_id: 1,
                stage_id: stage.id,
                description: "<p>hola</p>".to_string(),
                partner_id: Some(8),
                user_ids: vec![3],
            })
            .await
            .unwrap();

        assert_eq!(task.name, "[LEAD-5] Carlos");
        store.post_task_note(task.id, "<p>nota</p>").await.unwrap();
    }

    #[tokio::test]
    async fn test_settings_flag_overwrite() {
        let store = store().await;
        store
            .upsert_project(&Project {
                id: 1,
                name: "Uno".to_string(),
                use_google_sheets: true,
                google_spreadsheet_id: None,
                create_task_on_lead: true,
            })
            .await
            .unwrap();
        store
            .upsert_project(&Project {
                id: 2,
                name: "Dos".to_string(),
                use_google_sheets: false,
                google_spreadsheet_id: None,
                create_task_on_lead: true,
            })
            .await
            .unwrap();

        store.set_use_google_sheets(1, false).await.unwrap();
        store.set_use_google_sheets(2, true).await.unwrap();

        let enabled = store.projects_with_sheets_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].id, 2);
    }
}
