//! In-memory stand-ins for the Google APIs, used by tests and doc examples.
//!
//! `InMemorySheets` interprets A1 ranges against plain row vectors, so the
//! record service can be exercised end to end without a network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::drive::{DriveApi, UploadedFile};
use super::sheets::{SheetProperties, SheetsApi};
use crate::a1::A1Range;
use crate::errors::ServiceError;

struct MockSheet {
    props: SheetProperties,
    rows: Vec<Vec<Value>>,
}

#[derive(Default)]
pub struct InMemorySheets {
    sheets: Mutex<Vec<MockSheet>>,
    calls: AtomicUsize,
    fail_with: Mutex<Option<String>>,
}

impl InMemorySheets {
    pub fn new() -> Self { Self::default() }

    /// Add a tab. Sheet ids start well above zero so a hardcoded `0` never matches by accident.
    pub fn with_sheet(self, title: &str, rows: Vec<Vec<Value>>) -> Self {
        {
            let mut sheets = self.sheets.lock().unwrap();
            let sheet_id = 1000 + sheets.len() as i64 * 7;
            sheets.push(MockSheet { props: SheetProperties { sheet_id, title: title.to_string() }, rows });
        }
        self
    }

    /// Snapshot of a tab's rows (empty when the tab does not exist).
    pub fn rows(&self, title: &str) -> Vec<Vec<Value>> {
        let sheets = self.sheets.lock().unwrap();
        sheets.iter().find(|s| s.props.title == title).map(|s| s.rows.clone()).unwrap_or_default()
    }

    /// Number of API calls made so far.
    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    /// Make every following call fail with `message`, as an upstream error.
    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }

    fn enter(&self) -> Result<(), ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_with.lock().unwrap().as_ref() {
            Some(msg) => Err(ServiceError::Upstream(msg.clone())),
            None => Ok(()),
        }
    }

    fn with_tab<T>(&self, range: &A1Range, raw: &str, f: impl FnOnce(&mut MockSheet) -> T) -> Result<T, ServiceError> {
        let mut sheets = self.sheets.lock().unwrap();
        let tab = match &range.sheet {
            Some(name) => sheets.iter_mut().find(|s| &s.props.title == name),
            None => sheets.first_mut(),
        };
        match tab {
            Some(tab) => Ok(f(tab)),
            None => Err(ServiceError::Upstream(format!("Unable to parse range: {raw}"))),
        }
    }
}

fn is_blank(cell: &Value) -> bool {
    match cell {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl SheetsApi for InMemorySheets {
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<Value>>, ServiceError> {
        self.enter()?;
        let r = A1Range::parse(range).map_err(|_| ServiceError::Upstream(format!("Unable to parse range: {range}")))?;
        self.with_tab(&r, range, |tab| {
            let first_row = r.first_row() - 1;
            let last_row = r.last_row().map_or(tab.rows.len(), |l| l.min(tab.rows.len()));
            let first_col = r.first_column();
            let mut out: Vec<Vec<Value>> = tab
                .rows
                .iter()
                .take(last_row)
                .skip(first_row)
                .map(|row| {
                    let end = r.last_column().map_or(row.len(), |l| (l + 1).min(row.len()));
                    let mut cells: Vec<Value> = row.get(first_col..end).map(|c| c.to_vec()).unwrap_or_default();
                    while cells.last().is_some_and(is_blank) {
                        cells.pop();
                    }
                    cells
                })
                .collect();
            while out.last().is_some_and(|row| row.is_empty()) {
                out.pop();
            }
            out
        })
    }

    async fn append_values(&self, range: &str, rows: Vec<Vec<Value>>) -> Result<Value, ServiceError> {
        self.enter()?;
        let r = A1Range::parse(range).map_err(|_| ServiceError::Upstream(format!("Unable to parse range: {range}")))?;
        self.with_tab(&r, range, |tab| {
            let count = rows.len();
            let start = tab.rows.len() + 1;
            tab.rows.extend(rows);
            json!({
                "spreadsheetId": "in-memory",
                "tableRange": tab.props.title,
                "updates": { "updatedRows": count, "updatedRange": format!("{}!A{}", tab.props.title, start) }
            })
        })
    }

    async fn update_values(&self, range: &str, rows: Vec<Vec<Value>>) -> Result<(), ServiceError> {
        self.enter()?;
        let r = A1Range::parse(range).map_err(|_| ServiceError::Upstream(format!("Unable to parse range: {range}")))?;
        self.with_tab(&r, range, |tab| {
            let row0 = r.first_row() - 1;
            let col0 = r.first_column();
            for (i, values) in rows.into_iter().enumerate() {
                if tab.rows.len() <= row0 + i {
                    tab.rows.resize(row0 + i + 1, Vec::new());
                }
                let target = &mut tab.rows[row0 + i];
                for (j, v) in values.into_iter().enumerate() {
                    if target.len() <= col0 + j {
                        target.resize(col0 + j + 1, Value::String(String::new()));
                    }
                    target[col0 + j] = v;
                }
            }
        })
    }

    async fn list_sheets(&self) -> Result<Vec<SheetProperties>, ServiceError> {
        self.enter()?;
        let sheets = self.sheets.lock().unwrap();
        Ok(sheets.iter().map(|s| s.props.clone()).collect())
    }

    async fn delete_rows(&self, sheet_id: i64, start: usize, end: usize) -> Result<(), ServiceError> {
        self.enter()?;
        let mut sheets = self.sheets.lock().unwrap();
        let tab = sheets
            .iter_mut()
            .find(|s| s.props.sheet_id == sheet_id)
            .ok_or_else(|| ServiceError::Upstream(format!("No grid with id: {sheet_id}")))?;
        let end = end.min(tab.rows.len());
        if start < end {
            tab.rows.drain(start..end);
        }
        Ok(())
    }
}

/// One stored upload.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file: UploadedFile,
    pub mime_type: String,
    pub folder_id: Option<String>,
    pub size: usize,
}

#[derive(Default)]
pub struct InMemoryDrive {
    files: Mutex<Vec<StoredFile>>,
    fail_with: Mutex<Option<String>>,
}

impl InMemoryDrive {
    pub fn new() -> Self { Self::default() }

    pub fn files(&self) -> Vec<StoredFile> { self.files.lock().unwrap().clone() }

    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl DriveApi for InMemoryDrive {
    async fn upload(&self, name: &str, mime_type: &str, bytes: Vec<u8>, folder_id: Option<&str>) -> Result<UploadedFile, ServiceError> {
        if let Some(msg) = self.fail_with.lock().unwrap().as_ref() {
            return Err(ServiceError::Upstream(msg.clone()));
        }
        let mut files = self.files.lock().unwrap();
        let file = UploadedFile { id: format!("file-{}", files.len() + 1), name: name.to_string() };
        files.push(StoredFile {
            file: file.clone(),
            mime_type: mime_type.to_string(),
            folder_id: folder_id.map(str::to_string),
            size: bytes.len(),
        });
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value { Value::String(v.to_string()) }

    fn sheet() -> InMemorySheets {
        InMemorySheets::new().with_sheet(
            "Sheet1",
            vec![vec![s("1"), s("one"), s("x")], vec![s("2"), s("two")], vec![s("3"), s("three")]],
        )
    }

    #[tokio::test]
    async fn get_slices_columns_and_rows() {
        let api = sheet();
        assert_eq!(api.get_values("Sheet1!A:B").await.unwrap()[0], vec![s("1"), s("one")]);
        assert_eq!(api.get_values("Sheet1!B2:B3").await.unwrap(), vec![vec![s("two")], vec![s("three")]]);
        assert!(api.get_values("Sheet1!D:E").await.unwrap().is_empty());
        assert_eq!(api.calls(), 3);
    }

    #[tokio::test]
    async fn unknown_tab_is_upstream_error() {
        let err = sheet().get_values("Nope!A:B").await.unwrap_err();
        assert_eq!(err.to_string(), "Unable to parse range: Nope!A:B");
    }

    #[tokio::test]
    async fn update_pads_short_rows() {
        let api = sheet();
        api.update_values("Sheet1!J2", vec![vec![s("pic")]]).await.unwrap();
        let rows = api.rows("Sheet1");
        assert_eq!(rows[1].len(), 10);
        assert_eq!(rows[1][9], s("pic"));
        assert_eq!(rows[1][2], s(""));
    }

    #[tokio::test]
    async fn delete_drains_half_open_range() {
        let api = sheet();
        let id = api.list_sheets().await.unwrap()[0].sheet_id;
        api.delete_rows(id, 1, 2).await.unwrap();
        let rows = api.rows("Sheet1");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], s("3"));
        assert!(api.delete_rows(0, 0, 1).await.is_err());
    }
}
