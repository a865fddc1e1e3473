pub mod credentials;
pub mod exporter;
pub mod row;
pub mod sheets_client;

pub use credentials::{decode_service_account_key, CredentialsError, ServiceAccountKey};
pub use exporter::{SendError, SheetsExporter};
pub use row::{lead_row, CellValue};
pub use sheets_client::{AppendReceipt, SheetsClient, SheetsError};
