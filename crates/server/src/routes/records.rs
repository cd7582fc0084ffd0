use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use common::types::Message;
use service::records::{AddInput, AddOutcome, DeleteInput, EditInput, ImageUpload, SaveImageLinkInput};

use crate::errors::ApiError;
use crate::state::AppState;

/// Multipart field carrying the uploaded file.
const IMAGE_FIELD: &str = "image";

#[derive(Debug, Deserialize)]
pub struct DataQuery {
    pub sheet: Option<String>,
    pub range: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutput {
    pub success: bool,
    pub drive_link: String,
}

// body/query rejections are reported in the same `{"error"}` shape as everything else
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(v)| v).map_err(|e| ApiError::new(e.status(), e.body_text()))
}

pub async fn get_data(
    State(state): State<AppState>,
    query: Result<Query<DataQuery>, QueryRejection>,
) -> Result<Json<Vec<Vec<Value>>>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::new(e.status(), e.body_text()))?;
    let rows = state.records.fetch_rows(q.sheet.as_deref(), q.range.as_deref()).await?;
    Ok(Json(rows))
}

pub async fn add(
    State(state): State<AppState>,
    payload: Result<Json<AddInput>, JsonRejection>,
) -> Result<Json<AddOutcome>, ApiError> {
    let input = body(payload)?;
    Ok(Json(state.records.add(input).await?))
}

pub async fn edit(
    State(state): State<AppState>,
    payload: Result<Json<EditInput>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    state.records.edit_row(body(payload)?).await?;
    Ok(Json(Message::new("Edited successfully")))
}

pub async fn delete(
    State(state): State<AppState>,
    payload: Result<Json<DeleteInput>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    state.records.delete_row(body(payload)?).await?;
    Ok(Json(Message::new("Row deleted successfully")))
}

pub async fn save_image_link(
    State(state): State<AppState>,
    payload: Result<Json<SaveImageLinkInput>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    state.records.save_image_link(body(payload)?).await?;
    Ok(Json(Message::new("Image link saved successfully")))
}

/// Takes the first `image` field; other fields are ignored.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadOutput>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::new(e.status(), e.body_text()))?;
    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        image = Some(ImageUpload { file_name, content_type, bytes: bytes.to_vec() });
        break;
    }

    let image = image.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    info!(file_name = ?image.file_name, size = image.bytes.len(), "image upload received");
    let drive_link = state.records.upload_image(image).await?;
    Ok(Json(UploadOutput { success: true, drive_link }))
}
