use serde_json::Value;

const DIRECT_IMAGE_PREFIX: &str = "https://lh3.googleusercontent.com/d/";
const DIRECT_IMAGE_WIDTH: &str = "=w500";

/// Rewrite a Drive "view" link (`.../d/<ID>/view...`) into a direct image link.
///
/// Anything that does not carry an id between `/d/` and `/view` is returned unchanged.
pub fn drive_direct_link(url: &str) -> String {
    match drive_file_id(url) {
        Some(id) => format!("{DIRECT_IMAGE_PREFIX}{id}{DIRECT_IMAGE_WIDTH}"),
        None => url.to_string(),
    }
}

fn drive_file_id(url: &str) -> Option<&str> {
    let start = url.find("/d/")? + 3;
    let rest = &url[start..];
    let end = rest.find("/view")?;
    let id = &rest[..end];
    (!id.is_empty()).then_some(id)
}

/// Convert the cell at `col` in every row that has one.
///
/// Null cells become empty strings; numbers and other non-string cells are left alone.
pub fn rewrite_column(rows: &mut [Vec<Value>], col: usize) {
    for row in rows.iter_mut() {
        match row.get_mut(col) {
            Some(Value::String(url)) => *url = drive_direct_link(url),
            Some(cell @ Value::Null) => *cell = Value::String(String::new()),
            _ => {}
        }
    }
}
