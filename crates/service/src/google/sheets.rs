use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{check_status, endpoint, read_json, TokenProvider};
use crate::errors::ServiceError;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

/// Tab metadata as returned by `spreadsheets.get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
}

/// The subset of the Sheets v4 API the record service uses.
///
/// Ranges are A1 strings that already include the sheet name.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// `values.get`; an empty range yields an empty matrix.
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<Value>>, ServiceError>;
    /// `values.append` with `RAW` input and `INSERT_ROWS`; returns the raw API response.
    async fn append_values(&self, range: &str, rows: Vec<Vec<Value>>) -> Result<Value, ServiceError>;
    /// `values.update` with `RAW` input.
    async fn update_values(&self, range: &str, rows: Vec<Vec<Value>>) -> Result<(), ServiceError>;
    /// Tab list from spreadsheet metadata.
    async fn list_sheets(&self) -> Result<Vec<SheetProperties>, ServiceError>;
    /// One `batchUpdate` with a `deleteDimension` over rows `[start, end)` (0-based).
    async fn delete_rows(&self, sheet_id: i64, start: usize, end: usize) -> Result<(), ServiceError>;
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

/// reqwest-backed [`SheetsApi`] bound to one spreadsheet.
pub struct GoogleSheetsClient {
    http: reqwest::Client,
    tokens: Arc<TokenProvider>,
    spreadsheet_id: String,
    base_url: String,
}

impl GoogleSheetsClient {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenProvider>, spreadsheet_id: &str) -> Self {
        Self { http, tokens, spreadsheet_id: spreadsheet_id.to_string(), base_url: SHEETS_BASE_URL.to_string() }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn spreadsheet_id(&self) -> &str { &self.spreadsheet_id }

    fn values_url(&self, range: &str) -> Result<reqwest::Url, ServiceError> {
        endpoint(&self.base_url, &["spreadsheets", &self.spreadsheet_id, "values", range])
    }
}

#[async_trait]
impl SheetsApi for GoogleSheetsClient {
    #[instrument(skip(self))]
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<Value>>, ServiceError> {
        let token = self.tokens.access_token().await?;
        let resp = self.http.get(self.values_url(range)?).bearer_auth(token).send().await?;
        let body: ValueRange = read_json(resp).await?;
        debug!(rows = body.values.len(), "values fetched");
        Ok(body.values)
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn append_values(&self, range: &str, rows: Vec<Vec<Value>>) -> Result<Value, ServiceError> {
        let token = self.tokens.access_token().await?;
        let url = self.values_url(&format!("{range}:append"))?;
        let resp = self
            .http
            .post(url)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .bearer_auth(token)
            .json(&json!({ "values": rows }))
            .send()
            .await?;
        read_json(resp).await
    }

    #[instrument(skip(self, rows))]
    async fn update_values(&self, range: &str, rows: Vec<Vec<Value>>) -> Result<(), ServiceError> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .put(self.values_url(range)?)
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token)
            .json(&json!({ "values": rows }))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_sheets(&self) -> Result<Vec<SheetProperties>, ServiceError> {
        let token = self.tokens.access_token().await?;
        let url = endpoint(&self.base_url, &["spreadsheets", &self.spreadsheet_id])?;
        let resp = self
            .http
            .get(url)
            .query(&[("fields", "sheets.properties(sheetId,title)")])
            .bearer_auth(token)
            .send()
            .await?;
        let meta: SpreadsheetMeta = read_json(resp).await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties).collect())
    }

    #[instrument(skip(self))]
    async fn delete_rows(&self, sheet_id: i64, start: usize, end: usize) -> Result<(), ServiceError> {
        let token = self.tokens.access_token().await?;
        let url = endpoint(&self.base_url, &["spreadsheets", &format!("{}:batchUpdate", self.spreadsheet_id)])?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&delete_rows_request(sheet_id, start, end))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}

fn delete_rows_request(sheet_id: i64, start: usize, end: usize) -> Value {
    json!({
        "requests": [{
            "deleteDimension": {
                "range": {
                    "sheetId": sheet_id,
                    "dimension": "ROWS",
                    "startIndex": start,
                    "endIndex": end,
                }
            }
        }]
    })
}
