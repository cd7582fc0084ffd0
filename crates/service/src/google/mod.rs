//! Thin REST clients for the Google Sheets v4 and Drive v3 APIs.
//!
//! Each API sits behind a trait (`SheetsApi`, `DriveApi`) so the record
//! service can run against the in-memory implementations in [`mock`].

pub mod auth;
pub mod sheets;
pub mod drive;
pub mod mock;

use std::sync::Arc;

use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::ServiceError;

pub use auth::{ServiceAccount, TokenProvider};
pub use drive::{DriveApi, GoogleDriveClient, UploadedFile};
pub use sheets::{GoogleSheetsClient, SheetProperties, SheetsApi};

/// OAuth scopes requested for the service account: read/write spreadsheets and drive files.
pub const SCOPES: &str = "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";

/// Build both clients on top of one HTTP connection pool and one token cache.
pub fn build_clients(account: ServiceAccount, spreadsheet_id: &str) -> (Arc<GoogleSheetsClient>, Arc<GoogleDriveClient>) {
    let http = reqwest::Client::new();
    let tokens = Arc::new(TokenProvider::new(account, http.clone(), SCOPES));
    let sheets = Arc::new(GoogleSheetsClient::new(http.clone(), Arc::clone(&tokens), spreadsheet_id));
    let drive = Arc::new(GoogleDriveClient::new(http, tokens));
    (sheets, drive)
}

/// Append raw path segments to a base URL, percent-encoding each one.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ServiceError> {
    let mut url = Url::parse(base).map_err(|e| ServiceError::Upstream(format!("invalid base url {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| ServiceError::Upstream(format!("base url cannot carry a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Decode a successful JSON response, or turn an error status into [`ServiceError::Upstream`].
pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ServiceError> {
    let resp = check_status(resp).await?;
    resp.json::<T>().await.map_err(|e| ServiceError::Upstream(format!("malformed response: {e}")))
}

pub(crate) async fn check_status(resp: Response) -> Result<Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), %body, "upstream error response");
    Err(ServiceError::Upstream(upstream_message(status.as_u16(), &body)))
}

/// Pull the human-readable message out of a Google error body.
///
/// Handles both the API shape (`{"error": {"message": ..}}`) and the OAuth
/// token endpoint shape (`{"error": "..", "error_description": ".."}`).
pub(crate) fn upstream_message(status: u16, body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    if let Some(v) = parsed {
        if let Some(msg) = v.pointer("/error/message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
        if let Some(desc) = v.get("error_description").and_then(|m| m.as_str()) {
            return desc.to_string();
        }
        if let Some(err) = v.get("error").and_then(|m| m.as_str()) {
            return err.to_string();
        }
    }
    if body.trim().is_empty() {
        format!("upstream returned status {status}")
    } else {
        body.trim().to_string()
    }
}
