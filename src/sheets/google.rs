//! Google Sheets REST backend
//!
//! Talks to the Sheets v4 API with `reqwest`. The store is used from the
//! synchronous poll thread, so it owns a small tokio runtime and blocks on
//! each request.

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use super::{Rgb, SheetRow, SheetStore};
use crate::config::SheetSettings;
use crate::error::SheetError;

const BACKGROUND_FIELDS: &str = "userEnteredFormat.backgroundColor";

/// Body of a `values.get` response
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Sheets v4 client authenticated with a bearer access token
pub struct GoogleSheetsStore {
    client: Client,
    runtime: Runtime,
    base_url: Url,
    access_token: String,
}

impl GoogleSheetsStore {
    /// Create a store against `base_url` (normally `https://sheets.googleapis.com`)
    pub fn new(base_url: &str, access_token: impl Into<String>) -> Result<Self, SheetError> {
        let base_url = Url::parse(base_url).map_err(|e| SheetError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SheetError::InvalidUrl(base_url.to_string()));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SheetError::Transport(format!("failed to start HTTP runtime: {e}")))?;

        let client = Client::builder()
            .user_agent(concat!("auto-marking/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SheetError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            runtime,
            base_url,
            access_token: access_token.into(),
        })
    }

    /// Create a store from config, reading the access token from the configured variable
    pub fn from_settings(settings: &SheetSettings) -> Result<Self, SheetError> {
        let token = std::env::var(&settings.access_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SheetError::MissingCredentials(settings.access_token_env.clone()))?;

        Self::new(&settings.api_base_url, token)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SheetError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SheetError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<Url, SheetError> {
        self.url(&["v4", "spreadsheets", spreadsheet_id, "values", range])
    }

    fn batch_update_url(&self, spreadsheet_id: &str) -> Result<Url, SheetError> {
        let segment = format!("{spreadsheet_id}:batchUpdate");
        self.url(&["v4", "spreadsheets", &segment])
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SheetError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| SheetError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read error body for HTTP {}: {}", status, e);
                String::new()
            }
        };
        Err(classify_status(status.as_u16(), &body))
    }
}

impl SheetStore for GoogleSheetsStore {
    fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<SheetRow>, SheetError> {
        let url = self.values_url(spreadsheet_id, range)?;
        debug!("GET {}", url);

        self.runtime.block_on(async {
            let response = self.send(self.client.get(url)).await?;
            let body: ValueRange = response
                .json()
                .await
                .map_err(|e| SheetError::Decode(e.to_string()))?;
            Ok(rows_from_values(body.values))
        })
    }

    fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[SheetRow],
    ) -> Result<(), SheetError> {
        let mut url = self.values_url(spreadsheet_id, range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        debug!("PUT {} ({} rows)", url, values.len());

        let body = value_range_body(range, values);
        self.runtime.block_on(async {
            self.send(self.client.put(url).json(&body)).await?;
            Ok(())
        })
    }

    fn set_cell_color(
        &self,
        spreadsheet_id: &str,
        sheet_tab_id: i64,
        row: usize,
        column: usize,
        color_hex: &str,
    ) -> Result<(), SheetError> {
        let color = Rgb::from_hex(color_hex)?;
        let url = self.batch_update_url(spreadsheet_id)?;
        debug!("POST {} (row {}, column {})", url, row, column);

        let body = json!({ "requests": [repeat_cell_request(sheet_tab_id, row, column, color)] });
        self.runtime.block_on(async {
            self.send(self.client.post(url).json(&body)).await?;
            Ok(())
        })
    }
}

/// Map a failed HTTP status to a transient or permanent error
pub fn classify_status(status: u16, body: &str) -> SheetError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        429 | 503 => SheetError::Transient { status, message },
        _ => SheetError::Permanent { status, message },
    }
}

fn rows_from_values(values: Vec<Vec<Value>>) -> Vec<SheetRow> {
    values
        .into_iter()
        .map(|row| row.into_iter().map(cell_to_string).collect())
        .collect()
}

fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn value_range_body(range: &str, values: &[SheetRow]) -> Value {
    json!({
        "range": range,
        "majorDimension": "ROWS",
        "values": values,
    })
}

/// `repeatCell` request covering exactly one cell
fn repeat_cell_request(sheet_tab_id: i64, row: usize, column: usize, color: Rgb) -> Value {
    json!({
        "repeatCell": {
            "range": {
                "sheetId": sheet_tab_id,
                "startRowIndex": row,
                "endRowIndex": row + 1,
                "startColumnIndex": column,
                "endColumnIndex": column + 1,
            },
            "cell": {
                "userEnteredFormat": {
                    "backgroundColor": color,
                },
            },
            "fields": BACKGROUND_FIELDS,
        }
    })
}
