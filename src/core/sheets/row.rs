// Assembly of the one row a won lead contributes to the spreadsheet.

use crate::core::records::Lead;
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

/// Literal placeholders the sheet shows when a lead field is empty.
pub const FALLBACK_CONTACT: &str = "Sin nombre";
pub const FALLBACK_SALESPERSON: &str = "Sin comercial";
pub const FALLBACK_STAGE: &str = "Sin etapa";

/// One cell of an appended row. Revenue must land in the sheet as a number,
/// everything else as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl CellValue {
    fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }
}

/// Builds the 8-column row for a lead:
/// `[timestamp, lead name, contact, email, phone, revenue, salesperson, stage]`.
pub fn lead_row(lead: &Lead, stamp: DateTime<Tz>) -> Vec<CellValue> {
    let contact = lead
        .partner_name
        .as_deref()
        .or(lead.contact_name.as_deref())
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_CONTACT);

    let salesperson = lead
        .user_name
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_SALESPERSON);

    let stage = lead
        .stage
        .as_ref()
        .map(|s| s.name.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_STAGE);

    vec![
        CellValue::text(stamp.format("%Y-%m-%d %H:%M:%S").to_string()),
        CellValue::text(lead.name.clone()),
        CellValue::text(contact),
        CellValue::text(lead.email_from.clone().unwrap_or_default()),
        CellValue::text(lead.phone.clone().unwrap_or_default()),
        CellValue::Number(lead.expected_revenue),
        CellValue::text(salesperson),
        CellValue::text(stage),
    ]
}
