use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument};

use super::domain::{cell_text, AddInput, AddOutcome, DeleteInput, EditInput, ImageUpload, NewRow, ProductInput, SaveImageLinkInput};
use super::links::rewrite_column;
use super::schema::{self, generic, product};
use crate::a1::{cell, columns, qualify, A1Range};
use crate::errors::ServiceError;
use crate::google::{DriveApi, SheetsApi};

/// Per-deployment knobs for the record operations.
#[derive(Debug, Clone)]
pub struct RecordSettings {
    pub default_sheet: String,
    pub default_range: String,
    pub drive_folder_id: Option<String>,
}

impl Default for RecordSettings {
    fn default() -> Self {
        Self { default_sheet: "Sheet1".into(), default_range: "A1:M".into(), drive_folder_id: None }
    }
}

/// Translates record operations into Sheets/Drive calls.
///
/// Holds no sheet data between calls; every operation reads what it needs
/// and writes back immediately. Row lookups are a linear scan of column A
/// (first exact match wins) and nothing guards the window between that read
/// and the following write.
pub struct RecordService {
    sheets: Arc<dyn SheetsApi>,
    drive: Arc<dyn DriveApi>,
    settings: RecordSettings,
}

/// Index of the first row whose identifier cell equals `id`.
pub fn find_row(rows: &[Vec<Value>], id: &str) -> Option<usize> {
    rows.iter()
        .position(|row| row.get(schema::IDENTIFIER).is_some_and(|c| cell_text(c) == id))
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn present_value(value: Option<&Value>) -> Option<String> {
    value.map(cell_text).filter(|v| !v.trim().is_empty())
}

impl RecordService {
    pub fn new(sheets: Arc<dyn SheetsApi>, drive: Arc<dyn DriveApi>, settings: RecordSettings) -> Self {
        Self { sheets, drive, settings }
    }

    pub fn settings(&self) -> &RecordSettings { &self.settings }

    fn sheet_or_default<'a>(&'a self, sheet: Option<&'a str>) -> &'a str {
        present(sheet).unwrap_or(&self.settings.default_sheet)
    }

    /// Read `range` (default from settings) of `sheet`, rewriting Drive view
    /// links in the picture column into direct image links.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use serde_json::json;
    /// use service::google::mock::{InMemoryDrive, InMemorySheets};
    /// use service::records::{RecordService, RecordSettings};
    ///
    /// let mut row = vec![json!(""); 10];
    /// row[0] = json!("SKU-1");
    /// row[9] = json!("https://drive.google.com/file/d/abc123/view");
    /// let sheets = Arc::new(InMemorySheets::new().with_sheet("Products", vec![row]));
    /// let svc = RecordService::new(sheets, Arc::new(InMemoryDrive::new()), RecordSettings::default());
    /// let rows = tokio_test::block_on(svc.fetch_rows(Some("Products"), None)).unwrap();
    /// assert_eq!(rows[0][9], json!("https://lh3.googleusercontent.com/d/abc123=w500"));
    /// ```
    #[instrument(skip(self))]
    pub async fn fetch_rows(&self, sheet: Option<&str>, range: Option<&str>) -> Result<Vec<Vec<Value>>, ServiceError> {
        let sheet = present(sheet).ok_or_else(|| ServiceError::Validation("Sheet is required".into()))?;
        let range = present(range).map(str::trim).unwrap_or(&self.settings.default_range);
        let parsed = A1Range::parse(range)?;
        if parsed.sheet.is_some() {
            return Err(ServiceError::Validation("Range must not name a sheet; pass it as `sheet`".into()));
        }

        let mut rows = self.sheets.get_values(&qualify(sheet, range)).await?;
        if parsed.covers_column(product::PICTURE_URL) {
            rewrite_column(&mut rows, product::PICTURE_URL - parsed.first_column());
        }
        info!(event = "rows_fetched", %sheet, %range, rows = rows.len());
        Ok(rows)
    }

    /// Append a row; dispatches on whether the body carries `text`.
    pub async fn add(&self, input: AddInput) -> Result<AddOutcome, ServiceError> {
        match input.into_new_row() {
            NewRow::Text { sheet, text } => {
                let data = self.append_text(sheet.as_deref(), &text).await?;
                Ok(AddOutcome { message: "Added successfully".into(), data: Some(data) })
            }
            NewRow::Product { sheet, product } => {
                self.append_product(sheet.as_deref(), &product).await?;
                Ok(AddOutcome { message: "Product added successfully".into(), data: None })
            }
        }
    }

    /// Append `[timestamp_ms, text]`; the timestamp becomes the row's id.
    #[instrument(skip(self, text))]
    pub async fn append_text(&self, sheet: Option<&str>, text: &str) -> Result<Value, ServiceError> {
        let text = present(Some(text)).ok_or_else(|| ServiceError::Validation("Text is required".into()))?;
        let sheet = self.sheet_or_default(sheet);
        let id = Utc::now().timestamp_millis();

        let mut row = vec![Value::Null; generic::WIDTH];
        row[generic::ID] = Value::from(id);
        row[generic::TEXT] = Value::from(text);
        let resp = self.sheets.append_values(&columns(sheet, generic::ID, generic::TEXT), vec![row]).await?;
        info!(event = "row_appended", %sheet, id);
        Ok(resp)
    }

    #[instrument(skip(self, input))]
    pub async fn append_product(&self, sheet: Option<&str>, input: &ProductInput) -> Result<(), ServiceError> {
        let (Some(sheet), Some(sku), Some(_)) = (present(sheet), present_value(input.sku.as_ref()), present_value(input.product_name.as_ref())) else {
            return Err(ServiceError::Validation("Sheet, SKU and Product Name are required".into()));
        };
        self.sheets
            .append_values(&columns(sheet, 0, product::WIDTH - 1), vec![input.to_row()])
            .await?;
        info!(event = "product_appended", %sheet, %sku);
        Ok(())
    }

    /// Overwrite the text column of the row whose id matches.
    #[instrument(skip(self, input))]
    pub async fn edit_row(&self, input: EditInput) -> Result<(), ServiceError> {
        let (Some(id), Some(text)) = (present_value(input.id.as_ref()), present(input.text.as_deref())) else {
            return Err(ServiceError::Validation("ID and Text are required".into()));
        };
        let sheet = self.sheet_or_default(input.sheet.as_deref());

        let rows = self.sheets.get_values(&columns(sheet, generic::ID, generic::TEXT)).await?;
        if rows.is_empty() {
            return Err(ServiceError::NotFound("No data found".into()));
        }
        let idx = find_row(&rows, &id).ok_or_else(|| ServiceError::not_found("ID"))?;

        // rows were read from row 1, so the 0-based index maps to A1 row idx + 1
        self.sheets
            .update_values(&cell(sheet, generic::TEXT, idx + 1), vec![vec![Value::from(text)]])
            .await?;
        info!(event = "row_edited", %sheet, %id, row = idx + 1);
        Ok(())
    }

    /// Remove the first row whose SKU matches, shifting later rows up.
    #[instrument(skip(self, input))]
    pub async fn delete_row(&self, input: DeleteInput) -> Result<(), ServiceError> {
        let (Some(sheet), Some(sku)) = (present(input.sheet.as_deref()), present_value(input.sku.as_ref())) else {
            return Err(ServiceError::Validation("Sheet and SKU are required".into()));
        };

        let tabs = self.sheets.list_sheets().await?;
        let tab = tabs
            .iter()
            .find(|t| t.title == sheet)
            .ok_or_else(|| ServiceError::not_found("Sheet"))?;

        let rows = self.sheets.get_values(&columns(sheet, product::SKU, product::SKU)).await?;
        let idx = find_row(&rows, &sku).ok_or_else(|| ServiceError::not_found("SKU"))?;

        self.sheets.delete_rows(tab.sheet_id, idx, idx + 1).await?;
        info!(event = "row_deleted", %sheet, sheet_id = tab.sheet_id, %sku, row = idx + 1);
        Ok(())
    }

    /// Store an image in Drive and return its shareable view link.
    #[instrument(skip(self, upload), fields(size = upload.bytes.len()))]
    pub async fn upload_image(&self, upload: ImageUpload) -> Result<String, ServiceError> {
        if upload.bytes.is_empty() {
            return Err(ServiceError::Validation("No file uploaded".into()));
        }
        let original = present(upload.file_name.as_deref()).unwrap_or("image");
        let name = format!("{}-{}", Utc::now().timestamp_millis(), original);
        let mime = present(upload.content_type.as_deref()).unwrap_or("application/octet-stream");

        let file = self
            .drive
            .upload(&name, mime, upload.bytes, self.settings.drive_folder_id.as_deref())
            .await?;
        let link = file.view_link();
        info!(event = "image_uploaded", file_id = %file.id, %link);
        Ok(link)
    }

    /// Write `pictureUrl` into the picture column of the row whose SKU matches.
    #[instrument(skip(self, input))]
    pub async fn save_image_link(&self, input: SaveImageLinkInput) -> Result<(), ServiceError> {
        let (Some(sheet), Some(sku), Some(url)) =
            (present(input.sheet.as_deref()), present_value(input.sku.as_ref()), present(input.picture_url.as_deref()))
        else {
            return Err(ServiceError::Validation("Sheet, SKU and Picture URL are required".into()));
        };

        let rows = self.sheets.get_values(&columns(sheet, product::SKU, product::SKU)).await?;
        let idx = find_row(&rows, &sku).ok_or_else(|| ServiceError::not_found("SKU"))?;

        self.sheets
            .update_values(&cell(sheet, product::PICTURE_URL, idx + 1), vec![vec![Value::from(url)]])
            .await?;
        info!(event = "image_link_saved", %sheet, %sku, row = idx + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::mock::{InMemoryDrive, InMemorySheets};
    use serde_json::json;

    fn s(v: &str) -> Value { json!(v) }

    fn product_row(sku: &str, name: &str) -> Vec<Value> {
        let mut row = vec![s(""); product::WIDTH];
        row[product::SKU] = s(sku);
        row[product::PRODUCT_NAME] = s(name);
        row
    }

    fn fixture() -> (Arc<InMemorySheets>, Arc<InMemoryDrive>, RecordService) {
        let sheets = Arc::new(
            InMemorySheets::new()
                .with_sheet("Sheet1", vec![vec![s("1700000000001"), s("first")], vec![s("1700000000002"), s("second")]])
                .with_sheet(
                    "Products",
                    vec![
                        product::HEADERS.iter().map(|h| s(h)).collect(),
                        product_row("SKU-1", "Runner"),
                        product_row("SKU-2", "Walker"),
                        product_row("SKU-3", "Hiker"),
                    ],
                ),
        );
        let drive = Arc::new(InMemoryDrive::new());
        let settings = RecordSettings { drive_folder_id: Some("folder-9".into()), ..RecordSettings::default() };
        let svc = RecordService::new(sheets.clone(), drive.clone(), settings);
        (sheets, drive, svc)
    }

    #[test]
    fn find_row_is_exact_and_first_match() {
        let rows = vec![vec![s("A-10")], vec![], vec![s("A-1")], vec![s("A-1")]];
        assert_eq!(find_row(&rows, "A-1"), Some(2));
        assert_eq!(find_row(&rows, "a-1"), None);
        assert_eq!(find_row(&rows, "A-"), None);
        assert_eq!(find_row(&[vec![json!(42)]], "42"), Some(0));
    }

    #[tokio::test]
    async fn append_text_adds_exactly_one_row() {
        let (sheets, _, svc) = fixture();
        let before = svc.fetch_rows(Some("Sheet1"), Some("A:B")).await.unwrap().len();
        let out = svc.add(AddInput { text: Some("third".into()), ..AddInput::default() }).await.unwrap();
        assert_eq!(out.message, "Added successfully");
        assert!(out.data.is_some());

        let rows = sheets.rows("Sheet1");
        assert_eq!(rows.len(), before + 1);
        assert_eq!(rows[before][generic::TEXT], s("third"));
        assert!(rows[before][generic::ID].as_i64().is_some_and(|id| id > 1_700_000_000_000));
    }

    #[tokio::test]
    async fn append_product_lays_out_columns() {
        let (sheets, _, svc) = fixture();
        let product = ProductInput { sku: Some(s("SKU-4")), product_name: Some(s("Sprinter")), kga_price: Some(json!(990)), ..Default::default() };
        svc.append_product(Some("Products"), &product).await.unwrap();

        let rows = sheets.rows("Products");
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[4][product::SKU], s("SKU-4"));
        assert_eq!(rows[4][product::KGA_PRICE], json!(990));
        assert_eq!(rows[4].len(), product::WIDTH);
    }

    #[tokio::test]
    async fn missing_required_fields_make_no_calls() {
        let (sheets, drive, svc) = fixture();
        let cases = vec![
            svc.add(AddInput { text: Some("  ".into()), ..AddInput::default() }).await.unwrap_err(),
            svc.add(AddInput { sheet: Some("Products".into()), ..AddInput::default() }).await.unwrap_err(),
            svc.edit_row(EditInput { id: Some(json!("1")), ..EditInput::default() }).await.unwrap_err(),
            svc.delete_row(DeleteInput { sheet: Some("Products".into()), sku: None }).await.unwrap_err(),
            svc.save_image_link(SaveImageLinkInput { sheet: Some("Products".into()), sku: Some(s("SKU-1")), picture_url: None }).await.unwrap_err(),
            svc.upload_image(ImageUpload::default()).await.unwrap_err(),
            svc.fetch_rows(None, None).await.unwrap_err(),
        ];
        for err in cases {
            assert!(matches!(err, ServiceError::Validation(_)), "unexpected {err:?}");
        }
        assert_eq!(sheets.calls(), 0);
        assert!(drive.files().is_empty());
    }

    #[tokio::test]
    async fn edit_changes_only_the_text_cell() {
        let (sheets, _, svc) = fixture();
        let before = sheets.rows("Sheet1");
        svc.edit_row(EditInput { sheet: None, id: Some(json!(1700000000002u64)), text: Some("updated".into()) })
            .await
            .unwrap();

        let after = sheets.rows("Sheet1");
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1][generic::ID], before[1][generic::ID]);
        assert_eq!(after[1][generic::TEXT], s("updated"));
        assert_eq!(sheets.rows("Products").len(), 4);
    }

    #[tokio::test]
    async fn edit_unknown_id_is_not_found_without_writes() {
        let (sheets, _, svc) = fixture();
        let before = sheets.rows("Sheet1");
        let err = svc
            .edit_row(EditInput { sheet: None, id: Some(s("999")), text: Some("x".into()) })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "ID not found"));
        assert_eq!(sheets.rows("Sheet1"), before);
    }

    #[tokio::test]
    async fn edit_on_empty_sheet_reports_no_data() {
        let sheets = Arc::new(InMemorySheets::new().with_sheet("Sheet1", vec![]));
        let svc = RecordService::new(sheets, Arc::new(InMemoryDrive::new()), RecordSettings::default());
        let err = svc
            .edit_row(EditInput { sheet: None, id: Some(s("1")), text: Some("x".into()) })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "No data found"));
    }

    #[tokio::test]
    async fn delete_removes_one_row_and_shifts_the_rest() {
        let (sheets, _, svc) = fixture();
        svc.delete_row(DeleteInput { sheet: Some("Products".into()), sku: Some(s("SKU-2")) }).await.unwrap();

        let rows = sheets.rows("Products");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][product::SKU], s("SKU"));
        assert_eq!(rows[1][product::SKU], s("SKU-1"));
        assert_eq!(rows[2][product::SKU], s("SKU-3"));
        assert_eq!(sheets.rows("Sheet1").len(), 2);
    }

    #[tokio::test]
    async fn delete_unknown_sku_or_sheet_is_not_found() {
        let (sheets, _, svc) = fixture();
        let err = svc.delete_row(DeleteInput { sheet: Some("Products".into()), sku: Some(s("SKU-404")) }).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "SKU not found"));
        let err = svc.delete_row(DeleteInput { sheet: Some("Archive".into()), sku: Some(s("SKU-1")) }).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "Sheet not found"));
        assert_eq!(sheets.rows("Products").len(), 4);
    }

    #[tokio::test]
    async fn fetch_rewrites_picture_column_relative_to_range_start() {
        let (sheets, _, svc) = fixture();
        sheets
            .update_values("Products!J3", vec![vec![s("https://drive.google.com/file/d/PIC2/view?usp=sharing")]])
            .await
            .unwrap();

        let full = svc.fetch_rows(Some("Products"), None).await.unwrap();
        assert_eq!(full[2][product::PICTURE_URL], s("https://lh3.googleusercontent.com/d/PIC2=w500"));
        assert_eq!(full[0][product::PICTURE_URL], s("Picture URL"));

        let narrow = svc.fetch_rows(Some("Products"), Some("I2:J3")).await.unwrap();
        assert_eq!(narrow[1][1], s("https://lh3.googleusercontent.com/d/PIC2=w500"));

        let raw = svc.fetch_rows(Some("Products"), Some("A:B")).await.unwrap();
        assert_eq!(raw.len(), 4);
    }

    #[tokio::test]
    async fn fetch_reversed_range_still_rewrites_pictures() {
        let (_, _, svc) = fixture();
        let rows = svc.fetch_rows(Some("Products"), Some("J3:I2")).await.unwrap();
        assert_eq!(rows[1][1], s("https://lh3.googleusercontent.com/d/PIC2=w500"));
    }

    #[tokio::test]
    async fn fetch_rejects_out_of_bounds_column_without_calling_sheets() {
        let (sheets, _, svc) = fixture();
        let err = svc.fetch_rows(Some("Products"), Some("A1:ZZZZZZZZZZZZZZZZZZZZ")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(sheets.calls(), 0);
    }

    #[tokio::test]
    async fn fetch_rejects_sheet_qualified_range() {
        let (_, _, svc) = fixture();
        let err = svc.fetch_rows(Some("Products"), Some("Sheet1!A:B")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn save_image_link_writes_column_j() {
        let (sheets, _, svc) = fixture();
        svc.save_image_link(SaveImageLinkInput {
            sheet: Some("Products".into()),
            sku: Some(s("SKU-3")),
            picture_url: Some("https://drive.google.com/file/d/NEW/view".into()),
        })
        .await
        .unwrap();
        let rows = sheets.rows("Products");
        assert_eq!(rows[3][product::PICTURE_URL], s("https://drive.google.com/file/d/NEW/view"));
        assert_eq!(rows[2][product::PICTURE_URL], s(""));
    }

    #[tokio::test]
    async fn upload_goes_to_configured_folder() {
        let (_, drive, svc) = fixture();
        let link = svc
            .upload_image(ImageUpload { file_name: Some("shoe.png".into()), content_type: Some("image/png".into()), bytes: vec![1, 2, 3] })
            .await
            .unwrap();
        assert_eq!(link, "https://drive.google.com/file/d/file-1/view");

        let files = drive.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].folder_id.as_deref(), Some("folder-9"));
        assert_eq!(files[0].mime_type, "image/png");
        assert!(files[0].file.name.ends_with("-shoe.png"));
    }

    #[tokio::test]
    async fn upstream_failures_surface_verbatim() {
        let (sheets, _, svc) = fixture();
        sheets.fail_with("Quota exceeded for quota metric 'Read requests'");
        let err = svc.fetch_rows(Some("Products"), None).await.unwrap_err();
        assert_eq!(err.to_string(), "Quota exceeded for quota metric 'Read requests'");
    }
}
