// Port for the spreadsheet API. The core hands over a decoded key, a
// spreadsheet id and a row; the infra client owns HTTP, OAuth and caching.

use super::credentials::ServiceAccountKey;
use super::row::CellValue;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    #[error("Error de autenticación con Google: {0}")]
    Auth(String),
    #[error("Google Sheets API error ({0}): {1}")]
    Api(u16, String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("La hoja de cálculo no tiene pestañas")]
    NoWorksheets,
}

/// What the API reported back for a successful append.
#[derive(Debug, Clone)]
pub struct AppendReceipt {
    /// e.g. `'Hoja 1'!A7:H7`
    pub updated_range: String,
}

#[async_trait]
pub trait SheetsClient: Send + Sync {
    /// Appends one row to the first worksheet of the spreadsheet.
    async fn append_row(
        &self,
        key: &ServiceAccountKey,
        spreadsheet_id: &str,
        row: &[CellValue],
    ) -> Result<AppendReceipt, SheetsError>;
}
