//! Decoding of workbooks and delimited text into records.
//!
//! The coordinator never decodes by itself: it is handed a [`TabularDecoder`] and runs it on the
//! execution unit. [`WorkbookDecoder`] is the stock implementation:
//!
//! - delimited text ([`csv`]) for `.csv` / `.tsv`
//! - workbooks ([`excel`], feature `excel`) for `.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods`
//!
//! [`decode_first_table`] applies the structural rules shared by every decoder (first table only,
//! no tables and zero records are failures) and [`ingest_source`] adds file reading, format
//! detection and [`IngestionObserver`] reporting on top.

pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub mod observability;
pub mod records;
pub mod source;
pub mod unified;

use crate::error::IngestionResult;
use crate::types::{CellValue, Record};

pub use observability::{
    CompositeObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats, TracingObserver,
};
pub use records::table_to_records;
pub use source::SourceFile;
pub use unified::{
    decode_first_table, ingest_source, IngestionOptions, IngestionRequest, SourceFormat, WorkbookDecoder,
};

/// One decoded sheet/table: untyped rows exactly as the source lays them out.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Sheet name (`Sheet1` for delimited text).
    pub name: String,
    /// Row-major cells; rows may have different lengths.
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// Turns raw file content into tables, and tables into records.
///
/// Implementations must be stateless between calls: one execution unit may call them once and
/// is then discarded.
pub trait TabularDecoder: Send + Sync {
    /// Decode every table in `content`, in source order.
    fn read_tables(&self, content: &[u8], format: SourceFormat) -> IngestionResult<Vec<Table>>;

    /// Decode only the first table. `Ok(None)` means the source has no tables.
    fn first_table(&self, content: &[u8], format: SourceFormat) -> IngestionResult<Option<Table>> {
        Ok(self.read_tables(content, format)?.into_iter().next())
    }

    /// Convert a table into records. Defaults to [`table_to_records`].
    fn to_records(&self, table: &Table) -> IngestionResult<Vec<Record>> {
        Ok(table_to_records(table))
    }
}
