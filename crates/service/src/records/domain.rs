use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::product;

/// Body of `POST /add`. Carries either `text` (timestamp-keyed row) or product fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddInput {
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(flatten)]
    pub product: ProductInput,
}

/// Product row fields. Values are kept as JSON so numeric prices stay numeric in the sheet.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    #[serde(default)]
    pub sku: Option<Value>,
    #[serde(default)]
    pub size: Option<Value>,
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub product_name: Option<Value>,
    #[serde(default)]
    pub smer: Option<Value>,
    #[serde(default)]
    pub smer_updated_price: Option<Value>,
    #[serde(default)]
    pub kga_price: Option<Value>,
    #[serde(default)]
    pub picture_url: Option<Value>,
    #[serde(default)]
    pub shop_link: Option<Value>,
    #[serde(default)]
    pub lazada_link: Option<Value>,
    #[serde(default)]
    pub tiktok_link: Option<Value>,
}

impl ProductInput {
    /// Cells in column order; absent fields become empty cells.
    pub fn to_row(&self) -> Vec<Value> {
        let mut row = vec![Value::String(String::new()); product::WIDTH];
        let fields = [
            (product::SKU, &self.sku),
            (product::SIZE, &self.size),
            (product::CODE, &self.code),
            (product::PRODUCT_NAME, &self.product_name),
            (product::SMER, &self.smer),
            (product::SMER_UPDATED_PRICE, &self.smer_updated_price),
            (product::KGA_PRICE, &self.kga_price),
            (product::SHOP_LINK, &self.shop_link),
            (product::LAZADA_LINK, &self.lazada_link),
            (product::PICTURE_URL, &self.picture_url),
            (product::TIKTOK_LINK, &self.tiktok_link),
        ];
        for (col, value) in fields {
            match value {
                Some(Value::Null) | None => {}
                Some(v) => row[col] = v.clone(),
            }
        }
        row
    }
}

/// What an [`AddInput`] resolves to.
#[derive(Debug, Clone)]
pub enum NewRow {
    Text { sheet: Option<String>, text: String },
    Product { sheet: Option<String>, product: ProductInput },
}

impl AddInput {
    pub fn into_new_row(self) -> NewRow {
        match self.text {
            Some(text) => NewRow::Text { sheet: self.sheet, text },
            None => NewRow::Product { sheet: self.sheet, product: self.product },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddOutcome {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Body of `POST /edit`. `id` may arrive as a string or a number.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditInput {
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteInput {
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub sku: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveImageLinkInput {
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub sku: Option<Value>,
    #[serde(default)]
    pub picture_url: Option<String>,
}

/// A file received from a multipart upload.
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// String form of a cell or identifier, used for every identifier comparison.
///
/// Integral numbers render without a fractional part, so `1700000000000` and
/// `1700000000000.0` both compare equal to the sheet's `"1700000000000"`.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_with_text_is_a_text_row() {
        let input: AddInput = serde_json::from_value(json!({"text": "hello"})).unwrap();
        assert!(matches!(input.into_new_row(), NewRow::Text { ref text, sheet: None } if text == "hello"));
    }

    #[test]
    fn add_without_text_is_a_product_row() {
        let input: AddInput = serde_json::from_value(json!({
            "sheet": "Products",
            "sku": "SKU-9",
            "productName": "Runner",
            "kgaPrice": 1299,
            "pictureUrl": "https://drive.google.com/file/d/abc/view",
            "tiktokLink": null
        }))
        .unwrap();
        let NewRow::Product { sheet, product: p } = input.into_new_row() else {
            panic!("expected product row");
        };
        assert_eq!(sheet.as_deref(), Some("Products"));
        let row = p.to_row();
        assert_eq!(row.len(), product::WIDTH);
        assert_eq!(row[product::SKU], json!("SKU-9"));
        assert_eq!(row[product::PRODUCT_NAME], json!("Runner"));
        assert_eq!(row[product::KGA_PRICE], json!(1299));
        assert_eq!(row[product::PICTURE_URL], json!("https://drive.google.com/file/d/abc/view"));
        assert_eq!(row[product::TIKTOK_LINK], json!(""));
    }

    #[test]
    fn cell_text_normalizes_numbers() {
        assert_eq!(cell_text(&json!(1700000000000u64)), "1700000000000");
        assert_eq!(cell_text(&json!(1700000000000.0)), "1700000000000");
        assert_eq!(cell_text(&json!(12.5)), "12.5");
        assert_eq!(cell_text(&json!("SKU-1")), "SKU-1");
        assert_eq!(cell_text(&json!(true)), "true");
        assert_eq!(cell_text(&Value::Null), "");
    }

    #[test]
    fn save_image_link_uses_camel_case() {
        let input: SaveImageLinkInput =
            serde_json::from_value(json!({"sheet": "S", "sku": "A1", "pictureUrl": "u"})).unwrap();
        assert_eq!(input.picture_url.as_deref(), Some("u"));
    }
}
