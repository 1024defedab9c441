//! Delimited-text decoding.

use crate::error::IngestionResult;
use crate::types::CellValue;

use super::Table;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decode delimited text into a single untyped [`Table`] named `Sheet1`.
///
/// Rules:
///
/// - No header assumption: the header row is picked later by [`super::table_to_records`].
/// - Rows may have different lengths.
/// - Invalid UTF-8 is replaced rather than rejected.
/// - Each cell is typed by [`infer_cell`].
pub fn read_delimited_table(content: &[u8], delimiter: u8) -> IngestionResult<Table> {
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content);

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for result in rdr.byte_records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(|raw| infer_cell(&String::from_utf8_lossy(raw)))
                .collect(),
        );
    }

    Ok(Table::new("Sheet1", rows))
}

/// Type a raw text cell: blank -> empty, `true`/`false` -> bool, numeric -> number, else text.
pub fn infer_cell(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }

    if trimmed.eq_ignore_ascii_case("true") {
        return CellValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return CellValue::Bool(false);
    }

    if looks_numeric(trimmed) {
        if let Ok(n) = trimmed.parse::<f64>() {
            return CellValue::Number(n);
        }
    }

    CellValue::Text(trimmed.to_owned())
}

// `f64::from_str` also accepts "inf"/"NaN"; those stay text.
fn looks_numeric(s: &str) -> bool {
    s.bytes()
        .any(|b| b.is_ascii_digit())
        && s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
}
