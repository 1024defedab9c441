#![cfg(feature = "excel_test_writer")]

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rust_grid_ingest::ingestion::excel::read_workbook_tables;
use rust_grid_ingest::ingestion::{ingest_source, IngestionOptions, SourceFile, WorkbookDecoder};
use rust_grid_ingest::types::CellValue;
use rust_grid_ingest::IngestionError;

fn tmp_file(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("rust-grid-ingest-{name}-{nanos}.xlsx"))
}

fn write_people_multi_sheet_xlsx(path: &PathBuf, first_sheet_empty: bool) {
    use rust_xlsxwriter::Workbook;

    let mut wb = Workbook::new();

    // Sheet1: 2 rows (or nothing but a header)
    let ws1 = wb.add_worksheet();
    ws1.set_name("Sheet1").unwrap();
    ws1.write_string(0, 0, "id").unwrap();
    ws1.write_string(0, 1, "name").unwrap();
    ws1.write_string(0, 2, "active").unwrap();
    if !first_sheet_empty {
        ws1.write_number(1, 0, 1).unwrap();
        ws1.write_string(1, 1, "Ada").unwrap();
        ws1.write_boolean(1, 2, true).unwrap();
        ws1.write_number(2, 0, 2).unwrap();
        ws1.write_string(2, 1, "Grace").unwrap();
    }

    // Second: never consumed
    let ws2 = wb.add_worksheet();
    ws2.set_name("Second").unwrap();
    ws2.write_string(0, 0, "other").unwrap();
    ws2.write_number(1, 0, 3).unwrap();

    wb.save(path).unwrap();
}

#[test]
fn ingest_excel_uses_first_sheet_only() {
    let path = tmp_file("people");
    write_people_multi_sheet_xlsx(&path, false);

    let ds = ingest_source(
        &WorkbookDecoder::new(),
        &SourceFile::from_path(&path),
        &IngestionOptions::default(),
    )
    .unwrap();

    assert_eq!(ds.row_count(), 2);
    assert_eq!(ds.columns(), vec!["id", "name", "active"]);
    assert_eq!(ds.records()[0].get("id"), Some(&CellValue::Number(1.0)));
    assert_eq!(ds.records()[0].get("active"), Some(&CellValue::Bool(true)));
    assert_eq!(ds.records()[1].get("active"), Some(&CellValue::Empty));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn read_workbook_tables_returns_every_sheet_in_order() {
    let path = tmp_file("tables");
    write_people_multi_sheet_xlsx(&path, false);

    let bytes = std::fs::read(&path).unwrap();
    let tables = read_workbook_tables(&bytes).unwrap();
    let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Sheet1", "Second"]);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn header_only_first_sheet_is_empty_result() {
    let path = tmp_file("header-only");
    write_people_multi_sheet_xlsx(&path, true);

    let err = ingest_source(
        &WorkbookDecoder::new(),
        &SourceFile::from_path(&path),
        &IngestionOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, IngestionError::EmptyResult));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn workbook_detected_by_content_without_extension() {
    let path = tmp_file("sniffed");
    write_people_multi_sheet_xlsx(&path, false);

    let bytes = std::fs::read(&path).unwrap();
    let ds = ingest_source(
        &WorkbookDecoder::new(),
        &SourceFile::from_bytes("upload", bytes),
        &IngestionOptions::default(),
    )
    .unwrap();
    assert_eq!(ds.row_count(), 2);

    let _ = std::fs::remove_file(&path);
}
