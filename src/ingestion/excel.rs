#![cfg(feature = "excel")]

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::error::IngestionResult;
use crate::types::CellValue;

use super::Table;

/// Decode every sheet of an in-memory workbook (`.xlsx`, `.xls`, `.xlsb`, `.ods`, ...).
///
/// Sheets are returned in workbook order. The container type is sniffed from the content, so the
/// file name does not matter here.
pub fn read_workbook_tables(content: &[u8]) -> IngestionResult<Vec<Table>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(content.to_vec()))?;
    let names = workbook.sheet_names().to_vec();

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook.worksheet_range(&name)?;
        tables.push(range_to_table(name, &range));
    }
    Ok(tables)
}

/// Decode only the first sheet of an in-memory workbook.
///
/// Returns `Ok(None)` for a workbook without sheets.
pub fn read_first_workbook_table(content: &[u8]) -> IngestionResult<Option<Table>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(content.to_vec()))?;
    let Some(name) = workbook.sheet_names().first().cloned() else {
        return Ok(None);
    };
    let range = workbook.worksheet_range(&name)?;
    Ok(Some(range_to_table(name, &range)))
}

fn range_to_table(name: String, range: &calamine::Range<Data>) -> Table {
    let rows = range
        .rows()
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();
    Table::new(name, rows)
}

fn convert_cell(c: &Data) -> CellValue {
    match c {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::DateTime(_) | Data::Error(_) => CellValue::Text(c.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{convert_cell, read_workbook_tables};
    use crate::error::IngestionError;
    use crate::types::CellValue;
    use calamine::Data;

    #[test]
    fn converts_scalar_cells() {
        assert_eq!(convert_cell(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(convert_cell(&Data::Bool(false)), CellValue::Bool(false));
        assert_eq!(convert_cell(&Data::Empty), CellValue::Empty);
        assert_eq!(
            convert_cell(&Data::String("x".to_string())),
            CellValue::Text("x".to_string())
        );
    }

    #[test]
    fn garbage_content_is_an_excel_error() {
        let err = read_workbook_tables(b"PK\x03\x04 definitely not a zip archive").unwrap_err();
        let IngestionError::Excel(inner) = &err else {
            panic!("expected an excel error, got {err:?}");
        };
        // Surfaced verbatim, no prefix.
        assert_eq!(err.to_string(), inner.to_string());
    }
}
