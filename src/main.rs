// This is the entry point of the lead-to-sheets automation.
//
// **Architecture Overview:**
// - `core/` = Business logic (host-agnostic)
// - `infra/` = Implementations of core traits (stores, Google API, bus)
// - `crm/` = Host-application adapters (event entry points)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Seed the demo records described by the environment
// 4. Drive one "mark as won" end to end

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "crm/crm_layer.rs"]
mod crm;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::records::{Lead, LeadStore, Project, SalesStage};
use crate::core::settings::{SettingsForm, SheetsSettingsService};
use crate::core::sheets::credentials::encode_key_file;
use crate::core::sheets::SheetsExporter;
use crate::core::sync::{LeadSyncService, SyncOutcome};
use crate::core::tasks::TaskFromLeadService;
use crate::crm::LeadEventHandler;
use crate::infra::config::JsonConfigStore;
use crate::infra::google_sheets::GoogleSheetsClient;
use crate::infra::notify::BusNotifier;
use crate::infra::records::SqliteCrmStore;
use std::sync::Arc;

const DEMO_USER_ID: u64 = 1;

/// Reads the service-account key from the environment, preferring a file
/// path over inline JSON.
async fn load_key_file_from_env() -> Option<(String, String)> {
    if let Ok(path) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
        let json = tokio::fs::read(&path)
            .await
            .unwrap_or_else(|e| panic!("Failed to read key file at {}: {}", path, e));
        let filename = std::path::Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "key.json".to_string());
        return Some((encode_key_file(&json), filename));
    }

    if let Ok(json) = std::env::var("GOOGLE_SERVICE_ACCOUNT_JSON") {
        return Some((encode_key_file(json.as_bytes()), "key.json".to_string()));
    }

    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Keep runtime databases in a dedicated folder so the repo root stays tidy.
    let data_dir = "data";
    std::fs::create_dir_all(data_dir)?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}/crm.db?mode=rwc", data_dir))
        .await?;
    let store = Arc::new(SqliteCrmStore::new(pool));
    store.migrate().await?;

    let config = Arc::new(JsonConfigStore::new(format!(
        "{}/config_params.json",
        data_dir
    )));

    let sheets_client = Arc::new(GoogleSheetsClient::new());
    let notifier = Arc::new(BusNotifier::new());

    // Timestamps in the sheet use the company timezone.
    let timezone: chrono_tz::Tz = std::env::var("SHEET_TIMEZONE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(chrono_tz::America::Mexico_City);

    let exporter =
        SheetsExporter::new(config.clone(), sheets_client.clone()).with_timezone(timezone);
    let tasks = TaskFromLeadService::new(store.clone(), store.clone());
    let sync = LeadSyncService::new(
        store.clone(),
        store.clone(),
        exporter,
        tasks,
        notifier.clone(),
    );
    let handler = LeadEventHandler::new(store.clone(), sync);
    let settings = SheetsSettingsService::new(config.clone(), store.clone());

    // ========================================================================
    // DEMO DATA
    // ========================================================================
    // Seed one project and one open lead from the environment, then win it.

    let spreadsheet_id = std::env::var("SPREADSHEET_ID")
        .ok()
        .and_then(|raw| GoogleSheetsClient::extract_spreadsheet_id(&raw));

    let project = Project {
        id: 1,
        name: std::env::var("PROJECT_NAME").unwrap_or_else(|_| "Proyecto Demo".to_string()),
        use_google_sheets: true,
        google_spreadsheet_id: spreadsheet_id,
        create_task_on_lead: true,
    };
    store.upsert_project(&project).await?;

    store
        .upsert_sales_stage(&SalesStage {
            id: 1,
            name: "Nuevo".to_string(),
            is_won: false,
        })
        .await?;
    store
        .upsert_sales_stage(&SalesStage {
            id: 4,
            name: "Ganado".to_string(),
            is_won: true,
        })
        .await?;

    let lead = Lead {
        id: 1,
        name: std::env::var("LEAD_NAME").unwrap_or_else(|_| "Oportunidad demo".to_string()),
        contact_name: std::env::var("LEAD_CONTACT").ok(),
        partner_id: None,
        partner_name: None,
        email_from: std::env::var("LEAD_EMAIL").ok(),
        phone: std::env::var("LEAD_PHONE").ok(),
        expected_revenue: std::env::var("LEAD_REVENUE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0),
        user_id: Some(DEMO_USER_ID),
        user_name: std::env::var("LEAD_SALESPERSON").ok(),
        stage: Some(SalesStage {
            id: 1,
            name: "Nuevo".to_string(),
            is_won: false,
        }),
        project_id: Some(project.id),
        google_sync_done: false,
    };
    // Don't clobber an existing lead's sync flag across runs.
    if store.get_lead(lead.id).await.is_err() {
        store.save_lead(&lead).await?;
    }

    // Store the credentials the way the settings screen would.
    if let Some((blob, filename)) = load_key_file_from_env().await {
        settings
            .set_values(&SettingsForm {
                google_key_file: Some(blob),
                google_key_filename: Some(filename),
                sheets_project_ids: vec![project.id],
            })
            .await?;
        tracing::info!("Stored Google credentials from the environment");
    }

    let form = settings.get_values().await?;
    tracing::info!(
        projects = ?form.sheets_project_ids,
        has_credentials = form.google_key_file.is_some(),
        "Sheets settings loaded"
    );

    // ========================================================================
    // RUN ONE WON TRANSITION
    // ========================================================================

    let mut inbox = notifier.subscribe(DEMO_USER_ID);

    let outcome = handler.mark_won(lead.id, DEMO_USER_ID).await?;
    match &outcome {
        SyncOutcome::Synced {
            updated_range,
            task_id,
        } => {
            tracing::info!(%updated_range, ?task_id, "Lead won and synced");
        }
        SyncOutcome::Skipped(reason) => {
            tracing::info!(?reason, "Lead won but sync skipped");
        }
        SyncOutcome::SendFailed(message) => {
            tracing::error!(%message, "Lead won but sync failed");
        }
    }

    while let Ok(notification) = inbox.try_recv() {
        println!(
            "[{}] {}: {}",
            if notification.sticky { "sticky" } else { "toast" },
            notification.title,
            notification.message
        );
    }

    Ok(())
}
