// =============================================================================
// GOOGLE SHEETS CLIENT WITH SERVICE ACCOUNT AUTHENTICATION
// =============================================================================
//
// Appends rows to a spreadsheet through the Sheets API v4.
//
// **Authentication:**
// The administrator uploads a service-account JSON key on the settings
// screen; the spreadsheet must be shared with the service account email
// (looks like: name@project.iam.gserviceaccount.com) with "Editor" access.
// Each call signs an RS256 JWT with the key and exchanges it at the token
// endpoint for a bearer token, which is cached per account until shortly
// before expiry.
//
// **Why resolve the first sheet by title?**
// The append endpoint takes an A1 range. "First worksheet" is not an
// addressable range, so we fetch the spreadsheet's sheet list once per
// append and use the first tab's title.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::core::sheets::{AppendReceipt, CellValue, ServiceAccountKey, SheetsClient, SheetsError};
use async_trait::async_trait;

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

// =============================================================================
// SERVICE ACCOUNT AUTHENTICATION
// =============================================================================

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    /// Issuer (service account email).
    iss: String,
    /// Scope (what APIs we want access to).
    scope: String,
    /// Audience (token endpoint).
    aud: String,
    /// Issued at (Unix timestamp).
    iat: u64,
    /// Expiration (Unix timestamp, max 1 hour from iat).
    exp: u64,
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    expires_in: u64,
    #[allow(dead_code)]
    token_type: String,
}

/// Cached access token with expiration.
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

// =============================================================================
// SHEETS API RESPONSE STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Serialize)]
struct AppendRequest<'a> {
    values: Vec<&'a [CellValue]>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: AppendUpdates,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: String,
}

// =============================================================================
// GOOGLE SHEETS CLIENT
// =============================================================================

/// Client for the Sheets API. Credentials arrive per call (they live in the
/// global config blob); bearer tokens are cached per account email.
pub struct GoogleSheetsClient {
    client: Client,
    cached_tokens: RwLock<HashMap<String, CachedToken>>,
}

impl GoogleSheetsClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            cached_tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Extracts the spreadsheet ID from a Google Sheets URL, or passes a
    /// bare ID through.
    pub fn extract_spreadsheet_id(url_or_id: &str) -> Option<String> {
        if url_or_id.contains("docs.google.com") {
            if let Some(start) = url_or_id.find("/spreadsheets/d/") {
                let after_d = &url_or_id[start + 16..];
                let end = after_d.find('/').unwrap_or(after_d.len());
                let id = &after_d[..end];
                if !id.is_empty() {
                    return Some(id.to_string());
                }
            }
        } else if !url_or_id.contains('/') && !url_or_id.contains(' ') && !url_or_id.is_empty() {
            return Some(url_or_id.to_string());
        }
        None
    }

    /// Gets a valid access token for the account, refreshing if necessary.
    async fn access_token(&self, key: &ServiceAccountKey) -> Result<String, SheetsError> {
        {
            let cached = self.cached_tokens.read().await;
            if let Some(token) = cached.get(&key.client_email) {
                if token.expires_at > SystemTime::now() + Duration::from_secs(60) {
                    return Ok(token.token.clone());
                }
            }
        }

        let new_token = self.fetch_new_token(key).await?;

        {
            let mut cached = self.cached_tokens.write().await;
            cached.insert(
                key.client_email.clone(),
                CachedToken {
                    token: new_token.clone(),
                    expires_at: SystemTime::now() + Duration::from_secs(55 * 60),
                },
            );
        }

        Ok(new_token)
    }

    /// Signs the JWT assertion and exchanges it at the token endpoint.
    async fn fetch_new_token(&self, key: &ServiceAccountKey) -> Result<String, SheetsError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SheetsError::Auth(e.to_string()))?
            .as_secs();

        let claims = JwtClaims {
            iss: key.client_email.clone(),
            scope: SHEETS_SCOPE.to_string(),
            aud: key.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let header = Header::new(Algorithm::RS256);
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| SheetsError::Auth(e.to_string()))?;
        let jwt = encode(&header, &claims, &encoding_key)
            .map_err(|e| SheetsError::Auth(e.to_string()))?;

        let response = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await
            .map_err(|e| SheetsError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .map_err(|e| SheetsError::Http(e.to_string()))?;
            return Err(SheetsError::Auth(format!(
                "Token exchange failed ({}): {}",
                status, text
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| SheetsError::Http(e.to_string()))?;
        Ok(token_response.access_token)
    }

    /// Fetches the title of the spreadsheet's first worksheet.
    async fn first_sheet_title(
        &self,
        token: &str,
        spreadsheet_id: &str,
    ) -> Result<String, SheetsError> {
        let url = format!("{}/{}?fields=sheets.properties", SHEETS_API, spreadsheet_id);

        tracing::debug!(spreadsheet_id, "Resolving first worksheet");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SheetsError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .map_err(|e| SheetsError::Http(e.to_string()))?;
            return Err(SheetsError::Api(status, text));
        }

        let spreadsheet: Spreadsheet = response
            .json()
            .await
            .map_err(|e| SheetsError::Http(e.to_string()))?;

        spreadsheet
            .sheets
            .into_iter()
            .next()
            .map(|s| s.properties.title)
            .ok_or(SheetsError::NoWorksheets)
    }

    /// A1-notation range covering the whole worksheet, quoted so titles with
    /// spaces survive.
    fn worksheet_range(title: &str) -> String {
        format!("'{}'", title.replace('\'', "''"))
    }
}

impl Default for GoogleSheetsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SheetsClient for GoogleSheetsClient {
    async fn append_row(
        &self,
        key: &ServiceAccountKey,
        spreadsheet_id: &str,
        row: &[CellValue],
    ) -> Result<AppendReceipt, SheetsError> {
        let token = self.access_token(key).await?;
        let range = Self::worksheet_range(&self.first_sheet_title(&token, spreadsheet_id).await?);

        let url = format!(
            "{}/{}/values/{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            SHEETS_API, spreadsheet_id, range
        );

        tracing::debug!(spreadsheet_id, %range, "Appending row");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&AppendRequest { values: vec![row] })
            .send()
            .await
            .map_err(|e| SheetsError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .map_err(|e| SheetsError::Http(e.to_string()))?;
            return Err(SheetsError::Api(status, text));
        }

        let append: AppendResponse = response
            .json()
            .await
            .map_err(|e| SheetsError::Http(e.to_string()))?;

        tracing::info!(
            spreadsheet_id,
            range = %append.updates.updated_range,
            "Row appended"
        );

        Ok(AppendReceipt {
            updated_range: append.updates.updated_range,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_id_from_url() {
        let url = "https://docs.google.com/spreadsheets/d/1abc123xyz/edit#gid=0";
        assert_eq!(
            GoogleSheetsClient::extract_spreadsheet_id(url),
            Some("1abc123xyz".to_string())
        );
    }

    #[test]
    fn test_extract_id_passthrough() {
        assert_eq!(
            GoogleSheetsClient::extract_spreadsheet_id("1abc123xyz"),
            Some("1abc123xyz".to_string())
        );
    }

    #[test]
    fn test_extract_id_rejects_junk() {
        assert_eq!(GoogleSheetsClient::extract_spreadsheet_id(""), None);
        assert_eq!(
            GoogleSheetsClient::extract_spreadsheet_id("not a spreadsheet"),
            None
        );
        assert_eq!(
            GoogleSheetsClient::extract_spreadsheet_id(
                "https://docs.google.com/document/d/1abc/edit"
            ),
            None
        );
    }

    #[test]
    fn test_worksheet_range_quoting() {
        assert_eq!(GoogleSheetsClient::worksheet_range("Hoja 1"), "'Hoja 1'");
        assert_eq!(
            GoogleSheetsClient::worksheet_range("Ventas'24"),
            "'Ventas''24'"
        );
    }

    #[test]
    fn test_append_response_parsing() {
        let json = r#"{
            "spreadsheetId": "abc123",
            "updates": {
                "spreadsheetId": "abc123",
                "updatedRange": "'Hoja 1'!A7:H7",
                "updatedRows": 1,
                "updatedColumns": 8,
                "updatedCells": 8
            }
        }"#;
        let parsed: AppendResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.updates.updated_range, "'Hoja 1'!A7:H7");
    }

    #[test]
    fn test_spreadsheet_metadata_parsing() {
        let json = r#"{
            "sheets": [
                {"properties": {"sheetId": 0, "title": "Hoja 1", "index": 0}},
                {"properties": {"sheetId": 99, "title": "Otra", "index": 1}}
            ]
        }"#;
        let parsed: Spreadsheet = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.sheets[0].properties.title, "Hoja 1");
    }
}
