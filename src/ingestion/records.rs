//! Conversion of an untyped [`Table`] into column-keyed [`Record`]s.

use std::collections::HashSet;

use crate::types::{CellValue, Record};

use super::Table;

/// Placeholder name for a blank header cell.
pub const EMPTY_HEADER: &str = "__EMPTY";

/// Convert a decoded table into records.
///
/// - The first row with a non-blank cell is the header row; rows above it are ignored.
/// - Blank header cells are named `__EMPTY`, `__EMPTY_1`, ...; repeated names get `_1`, `_2`, ...
/// - Fully blank data rows are skipped.
/// - Every record carries every column, in header order; missing trailing cells are
///   [`CellValue::Empty`].
///
/// A table without a header row, or with only a header row, yields no records.
pub fn table_to_records(table: &Table) -> Vec<Record> {
    let Some(header_idx) = table
        .rows
        .iter()
        .position(|row| row.iter().any(|c| !c.is_blank()))
    else {
        return Vec::new();
    };

    let width = table.rows[header_idx..]
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(0);
    let columns = header_names(&table.rows[header_idx], width);

    table.rows[header_idx + 1..]
        .iter()
        .filter(|row| row.iter().any(|c| !c.is_blank()))
        .map(|row| {
            Record::new(
                columns
                    .iter()
                    .enumerate()
                    .map(|(j, name)| (name.clone(), row.get(j).cloned().unwrap_or_default()))
                    .collect(),
            )
        })
        .collect()
}

fn header_names(header: &[CellValue], width: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(width);
    let mut out = Vec::with_capacity(width);

    for j in 0..width {
        let base = match header.get(j) {
            Some(c) if !c.is_blank() => c.to_string().trim().to_owned(),
            _ => EMPTY_HEADER.to_owned(),
        };

        let mut name = base.clone();
        let mut n = 0usize;
        while seen.contains(&name) {
            n += 1;
            name = format!("{base}_{n}");
        }
        seen.insert(name.clone());
        out.push(name);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::table_to_records;
    use crate::ingestion::Table;
    use crate::types::CellValue;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn header_row_is_first_non_blank_row() {
        let table = Table::new(
            "Sheet1",
            vec![
                vec![CellValue::Empty, CellValue::Empty],
                vec![text("id"), text("name")],
                vec![CellValue::Number(1.0), text("Ada")],
            ],
        );
        let records = table_to_records(&table);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].columns().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(records[0].get("name"), Some(&text("Ada")));
    }

    #[test]
    fn blank_and_duplicate_headers_are_renamed() {
        let table = Table::new(
            "Sheet1",
            vec![
                vec![text("a"), CellValue::Empty, text("a"), CellValue::Empty],
                vec![text("1"), text("2"), text("3"), text("4")],
            ],
        );
        let records = table_to_records(&table);
        assert_eq!(
            records[0].columns().collect::<Vec<_>>(),
            vec!["a", "__EMPTY", "a_1", "__EMPTY_1"]
        );
    }

    #[test]
    fn short_rows_are_padded_and_blank_rows_skipped() {
        let table = Table::new(
            "Sheet1",
            vec![
                vec![text("x"), text("y")],
                vec![CellValue::Number(1.0)],
                vec![CellValue::Empty, text("  ")],
                vec![CellValue::Number(2.0), CellValue::Number(3.0)],
            ],
        );
        let records = table_to_records(&table);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("y"), Some(&CellValue::Empty));
        assert_eq!(records[1].get("y"), Some(&CellValue::Number(3.0)));
    }

    #[test]
    fn header_only_table_has_no_records() {
        let table = Table::new("Sheet1", vec![vec![text("id")]]);
        assert!(table_to_records(&table).is_empty());
        assert!(table_to_records(&Table::new("Empty", Vec::new())).is_empty());
    }

    #[test]
    fn numeric_headers_use_display_form() {
        let table = Table::new(
            "Sheet1",
            vec![
                vec![CellValue::Number(2024.0), CellValue::Bool(true)],
                vec![text("a"), text("b")],
            ],
        );
        let records = table_to_records(&table);
        assert_eq!(records[0].columns().collect::<Vec<_>>(), vec!["2024", "true"]);
    }
}
