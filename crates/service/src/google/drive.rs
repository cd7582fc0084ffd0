use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use super::{check_status, endpoint, read_json, TokenProvider};
use crate::errors::ServiceError;

const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl UploadedFile {
    /// Shareable "view" link for the stored file.
    pub fn view_link(&self) -> String {
        format!("https://drive.google.com/file/d/{}/view", self.id)
    }
}

/// Binary storage backed by Google Drive.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Store `bytes` as a publicly readable file, optionally inside `folder_id`.
    async fn upload(&self, name: &str, mime_type: &str, bytes: Vec<u8>, folder_id: Option<&str>) -> Result<UploadedFile, ServiceError>;
}

pub struct GoogleDriveClient {
    http: reqwest::Client,
    tokens: Arc<TokenProvider>,
    base_url: String,
    upload_url: String,
}

impl GoogleDriveClient {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenProvider>) -> Self {
        Self { http, tokens, base_url: DRIVE_BASE_URL.to_string(), upload_url: DRIVE_UPLOAD_URL.to_string() }
    }

    pub fn with_base_urls(mut self, base_url: &str, upload_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self.upload_url = upload_url.to_string();
        self
    }
}

#[async_trait]
impl DriveApi for GoogleDriveClient {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, name: &str, mime_type: &str, bytes: Vec<u8>, folder_id: Option<&str>) -> Result<UploadedFile, ServiceError> {
        let token = self.tokens.access_token().await?;

        // metadata and media in one request, so the file is created directly in its folder
        let boundary = boundary_for(&bytes);
        let body = related_body(&boundary, &file_metadata(name, folder_id), mime_type, &bytes);
        let resp = self
            .http
            .post(endpoint(&self.upload_url, &["files"])?)
            .query(&[("uploadType", "multipart"), ("fields", "id,name")])
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, format!("multipart/related; boundary={boundary}"))
            .body(body)
            .send()
            .await?;
        let file: UploadedFile = read_json(resp).await?;

        if let Err(e) = self.share_publicly(&token, &file.id).await {
            self.discard(&token, &file.id).await;
            return Err(e);
        }

        info!(file_id = %file.id, name = %file.name, folder = ?folder_id, "file uploaded to drive");
        Ok(file)
    }
}

impl GoogleDriveClient {
    async fn share_publicly(&self, token: &str, file_id: &str) -> Result<(), ServiceError> {
        let resp = self
            .http
            .post(endpoint(&self.base_url, &["files", file_id, "permissions"])?)
            .bearer_auth(token)
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Best-effort removal of a file that could not be shared.
    async fn discard(&self, token: &str, file_id: &str) {
        let result = match endpoint(&self.base_url, &["files", file_id]) {
            Ok(url) => match self.http.delete(url).bearer_auth(token).send().await {
                Ok(resp) => check_status(resp).await.map(|_| ()),
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => info!(%file_id, "unshared upload removed"),
            Err(e) => warn!(%file_id, error = %e, "failed to remove unshared upload"),
        }
    }
}

fn file_metadata(name: &str, folder_id: Option<&str>) -> Value {
    let mut meta = json!({ "name": name });
    if let Some(folder) = folder_id {
        meta["parents"] = json!([folder]);
    }
    meta
}

/// A boundary string that does not occur inside `bytes`.
fn boundary_for(bytes: &[u8]) -> String {
    let mut n = 0u32;
    loop {
        let candidate = format!("sheet_records_part_{n}");
        let needle = candidate.as_bytes();
        if bytes.len() < needle.len() || !bytes.windows(needle.len()).any(|w| w == needle) {
            return candidate;
        }
        n += 1;
    }
}

/// `multipart/related` body: JSON metadata part, then the media part.
fn related_body(boundary: &str, metadata: &Value, mime_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n").as_bytes());
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}\r\nContent-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
