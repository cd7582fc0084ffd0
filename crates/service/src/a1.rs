//! A1-notation helpers.
//!
//! Ranges are addressed the way the Sheets API expects them: `Sheet1!A1:M`,
//! `'My Sheet'!B7`. Columns are 0-based here (`A` = 0); rows stay 1-based as
//! written in the notation.

use crate::errors::ServiceError;

/// One side of a range. Either part may be omitted (`A` is a whole column, `3` a whole row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellRef {
    pub col: Option<usize>,
    pub row: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A1Range {
    pub sheet: Option<String>,
    pub start: CellRef,
    pub end: Option<CellRef>,
}

/// Columns a sheet can address, `A` through `ZZZ`.
pub const MAX_COLUMNS: usize = 18_278;

/// `A` -> 0, `Z` -> 25, `AA` -> 26. `None` past [`MAX_COLUMNS`].
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut idx = 0usize;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        idx = idx.checked_mul(26)?.checked_add(digit)?;
        if idx > MAX_COLUMNS {
            return None;
        }
    }
    Some(idx - 1)
}

/// Inverse of [`column_index`].
pub fn column_letters(mut idx: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push((b'A' + (idx % 26) as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    out.iter().rev().collect()
}

/// Prefix `cells` with the sheet name, always quoted so names like `A1` stay unambiguous.
pub fn qualify(sheet: &str, cells: &str) -> String {
    format!("'{}'!{cells}", sheet.replace('\'', "''"))
}

/// Address of a single cell, e.g. `cell(sheet, 1, 4)` -> `'Sheet1'!B4`.
pub fn cell(sheet: &str, col: usize, row: usize) -> String {
    qualify(sheet, &format!("{}{}", column_letters(col), row))
}

/// Whole-column span, e.g. `columns(sheet, 0, 1)` -> `'Sheet1'!A:B`.
pub fn columns(sheet: &str, first: usize, last: usize) -> String {
    qualify(sheet, &format!("{}:{}", column_letters(first), column_letters(last)))
}

impl A1Range {
    pub fn parse(input: &str) -> Result<Self, ServiceError> {
        let input = input.trim();
        let (sheet, cells) = split_sheet(input)?;
        let (mut start, end) = match cells.split_once(':') {
            Some((a, b)) => (parse_cell(a, input)?, Some(parse_cell(b, input)?)),
            None => (parse_cell(cells, input)?, None),
        };
        // `M1:A` reads the same as `A1:M`
        let end = end.map(|mut end| {
            if let (Some(a), Some(b)) = (start.col, end.col) {
                start.col = Some(a.min(b));
                end.col = Some(a.max(b));
            }
            if let (Some(a), Some(b)) = (start.row, end.row) {
                start.row = Some(a.min(b));
                end.row = Some(a.max(b));
            }
            end
        });
        Ok(Self { sheet, start, end })
    }

    /// First column covered by the range; a row-only range starts at `A`.
    pub fn first_column(&self) -> usize {
        self.start.col.unwrap_or(0)
    }

    /// Last column covered, `None` when the range is open to the right.
    pub fn last_column(&self) -> Option<usize> {
        match self.end {
            Some(end) => end.col,
            None => self.start.col,
        }
    }

    pub fn covers_column(&self, col: usize) -> bool {
        col >= self.first_column() && self.last_column().map_or(true, |last| col <= last)
    }

    /// First row (1-based) covered by the range.
    pub fn first_row(&self) -> usize {
        self.start.row.unwrap_or(1)
    }

    /// Last row (1-based) covered, `None` when open-ended.
    pub fn last_row(&self) -> Option<usize> {
        match self.end {
            Some(end) => end.row,
            None => self.start.row,
        }
    }
}

fn split_sheet(input: &str) -> Result<(Option<String>, &str), ServiceError> {
    if let Some(rest) = input.strip_prefix('\'') {
        let mut name = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                    name.push('\'');
                    continue;
                }
                let after = &rest[i + 1..];
                return match after.strip_prefix('!') {
                    Some(cells) => Ok((Some(name), cells)),
                    None => Err(invalid(input)),
                };
            }
            name.push(c);
        }
        return Err(invalid(input));
    }
    match input.rfind('!') {
        Some(pos) => Ok((Some(input[..pos].to_string()), &input[pos + 1..])),
        None => Ok((None, input)),
    }
}

fn parse_cell(s: &str, whole: &str) -> Result<CellRef, ServiceError> {
    let s = s.trim().replace('$', "");
    let split = s.find(|c: char| c.is_ascii_digit()).unwrap_or(s.len());
    let (letters, digits) = s.split_at(split);
    let col = if letters.is_empty() {
        None
    } else {
        Some(column_index(letters).ok_or_else(|| invalid(whole))?)
    };
    let row = if digits.is_empty() {
        None
    } else {
        match digits.parse::<usize>() {
            Ok(r) if r >= 1 => Some(r),
            _ => return Err(invalid(whole)),
        }
    };
    if col.is_none() && row.is_none() {
        return Err(invalid(whole));
    }
    Ok(CellRef { col, row })
}

fn invalid(input: &str) -> ServiceError {
    ServiceError::Validation(format!("invalid range: {input}"))
}
