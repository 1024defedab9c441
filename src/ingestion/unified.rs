//! Unified decode entrypoint.
//!
//! Most callers go through [`crate::coordinator::IngestionCoordinator`], which runs
//! [`IngestionRequest::run`] on an execution unit. [`ingest_source`] is the same pipeline without
//! the background thread:
//!
//! - If [`IngestionOptions::format`] is `None`, the format is inferred from the file extension,
//!   falling back to sniffing the content.
//! - Only the first table is consumed.
//! - If an [`super::observability::IngestionObserver`] is provided, success/failure/alerts are
//!   reported to it.

use std::fmt;
use std::sync::Arc;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{Dataset, JobId};

use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats};
use super::source::SourceFile;
use super::{csv, Table, TabularDecoder};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Comma-separated values.
    Csv,
    /// Tab-separated values.
    Tsv,
    /// Spreadsheet/workbook formats (decoded only with the `excel` feature).
    Excel,
}

impl SourceFormat {
    /// Extensions offered to users in a file picker. Advisory only; nothing enforces it.
    pub const ACCEPTED_EXTENSIONS: &'static [&'static str] = &["xlsx", "xls", "csv"];

    /// Parse a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "txt" => Some(Self::Csv),
            "tsv" | "tab" => Some(Self::Tsv),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            _ => None,
        }
    }

    /// Guess the format from the leading bytes: ZIP and OLE containers are workbooks, anything
    /// else is treated as comma-separated text.
    pub fn sniff(content: &[u8]) -> Self {
        if content.starts_with(ZIP_MAGIC) || content.starts_with(OLE_MAGIC) {
            Self::Excel
        } else {
            Self::Csv
        }
    }

    /// Extension first, content second.
    pub fn detect(extension: Option<&str>, content: &[u8]) -> Self {
        extension
            .and_then(Self::from_extension)
            .unwrap_or_else(|| Self::sniff(content))
    }
}

/// Options controlling decoding and its reporting.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct IngestionOptions {
    /// If `None`, detect the format per file.
    pub format: Option<SourceFormat>,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("format", &self.format)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            format: None,
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// The stock [`TabularDecoder`]: `csv` for delimited text, `calamine` for workbooks.
#[derive(Debug, Clone, Default)]
pub struct WorkbookDecoder {
    /// Overrides the delimiter implied by the format (`,` for CSV, tab for TSV).
    pub csv_delimiter: Option<u8>,
}

impl WorkbookDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn delimiter_for(&self, format: SourceFormat) -> u8 {
        self.csv_delimiter.unwrap_or(match format {
            SourceFormat::Tsv => b'\t',
            _ => b',',
        })
    }
}

impl TabularDecoder for WorkbookDecoder {
    fn read_tables(&self, content: &[u8], format: SourceFormat) -> IngestionResult<Vec<Table>> {
        match format {
            SourceFormat::Csv | SourceFormat::Tsv => {
                Ok(vec![csv::read_delimited_table(content, self.delimiter_for(format))?])
            }
            SourceFormat::Excel => read_workbook_dispatch(content),
        }
    }

    fn first_table(&self, content: &[u8], format: SourceFormat) -> IngestionResult<Option<Table>> {
        match format {
            SourceFormat::Csv | SourceFormat::Tsv => {
                Ok(Some(csv::read_delimited_table(content, self.delimiter_for(format))?))
            }
            SourceFormat::Excel => read_first_workbook_dispatch(content),
        }
    }
}

fn read_workbook_dispatch(content: &[u8]) -> IngestionResult<Vec<Table>> {
    // Avoid unused warnings when the feature is off.
    let _ = content;

    #[cfg(feature = "excel")]
    {
        super::excel::read_workbook_tables(content)
    }

    #[cfg(not(feature = "excel"))]
    {
        Err(excel_disabled())
    }
}

fn read_first_workbook_dispatch(content: &[u8]) -> IngestionResult<Option<Table>> {
    let _ = content;

    #[cfg(feature = "excel")]
    {
        super::excel::read_first_workbook_table(content)
    }

    #[cfg(not(feature = "excel"))]
    {
        Err(excel_disabled())
    }
}

#[cfg(not(feature = "excel"))]
fn excel_disabled() -> IngestionError {
    IngestionError::decode("workbook decoding not enabled (enable cargo feature 'excel')")
}

/// Decode the first table of `content` into a [`Dataset`].
///
/// Fails with [`IngestionError::NoTables`] when the decoder finds no tables and with
/// [`IngestionError::EmptyResult`] when the first table has no records.
pub fn decode_first_table(
    decoder: &dyn TabularDecoder,
    content: &[u8],
    format: SourceFormat,
) -> IngestionResult<Dataset> {
    let table = decoder
        .first_table(content, format)?
        .ok_or(IngestionError::NoTables)?;
    let records = decoder.to_records(&table)?;
    Dataset::new(records)
}

/// Read, detect and decode `source` on the calling thread.
///
/// # Examples
///
/// ```no_run
/// use rust_grid_ingest::ingestion::{ingest_source, IngestionOptions, SourceFile, WorkbookDecoder};
///
/// # fn main() -> Result<(), rust_grid_ingest::IngestionError> {
/// let decoder = WorkbookDecoder::new();
/// let ds = ingest_source(&decoder, &SourceFile::from_path("people.xlsx"), &IngestionOptions::default())?;
/// println!("rows={} columns={:?}", ds.row_count(), ds.columns());
/// # Ok(())
/// # }
/// ```
pub fn ingest_source(
    decoder: &dyn TabularDecoder,
    source: &SourceFile,
    options: &IngestionOptions,
) -> IngestionResult<Dataset> {
    let (ctx, result) = decode_for_job(JobId(0), decoder, source, options);
    report_outcome(options, &ctx, &result);
    result
}

fn decode_for_job(
    job: JobId,
    decoder: &dyn TabularDecoder,
    source: &SourceFile,
    options: &IngestionOptions,
) -> (IngestionContext, IngestionResult<Dataset>) {
    let mut ctx = IngestionContext {
        job,
        source: source.name().to_owned(),
        format: options.format,
    };

    let result = source.read_all().and_then(|bytes| {
        let fmt = options
            .format
            .unwrap_or_else(|| SourceFormat::detect(source.extension(), &bytes));
        ctx.format = Some(fmt);
        tracing::debug!(%job, source = %source.name(), format = ?fmt, bytes = bytes.len(), "decoding");
        decode_first_table(decoder, &bytes, fmt)
    });

    (ctx, result)
}

fn report_outcome(options: &IngestionOptions, ctx: &IngestionContext, result: &IngestionResult<Dataset>) {
    let Some(obs) = options.observer.as_ref() else {
        return;
    };
    match result {
        Ok(ds) => obs.on_success(
            ctx,
            IngestionStats {
                rows: ds.row_count(),
                columns: ds.column_count(),
            },
        ),
        Err(e) => report_failure(obs.as_ref(), ctx, options.alert_at_or_above, e),
    }
}

pub(crate) fn report_failure(
    obs: &dyn IngestionObserver,
    ctx: &IngestionContext,
    alert_at_or_above: IngestionSeverity,
    e: &IngestionError,
) {
    let sev = severity_for_error(e);
    obs.on_failure(ctx, sev, e);
    if sev >= alert_at_or_above {
        obs.on_alert(ctx, sev, e);
    }
}

pub(crate) fn severity_for_error(e: &IngestionError) -> IngestionSeverity {
    match e {
        IngestionError::Unreadable { .. }
        | IngestionError::WorkerStart { .. }
        | IngestionError::WorkerCrashed { .. }
        | IngestionError::WorkerProtocol { .. } => IngestionSeverity::Critical,
        IngestionError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => IngestionSeverity::Critical,
            _ => IngestionSeverity::Error,
        },
        #[cfg(feature = "excel")]
        IngestionError::Excel(_) => IngestionSeverity::Error,
        IngestionError::EmptyContent
        | IngestionError::Decode { .. }
        | IngestionError::NoTables
        | IngestionError::EmptyResult => IngestionSeverity::Error,
    }
}

/// Owned description of one decode, as shipped to an execution unit.
#[derive(Clone)]
pub struct IngestionRequest {
    /// Submission the request belongs to.
    pub job: JobId,
    /// File to decode.
    pub source: SourceFile,
    /// Options controlling decoding.
    pub options: IngestionOptions,
}

impl fmt::Debug for IngestionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionRequest")
            .field("job", &self.job)
            .field("source", &self.source)
            .field("options", &self.options)
            .finish()
    }
}

impl IngestionRequest {
    /// Execute the request with `decoder` and report the outcome to the observer.
    pub fn run(&self, decoder: &dyn TabularDecoder) -> IngestionResult<Dataset> {
        let (ctx, result) = self.decode(decoder);
        self.report(&ctx, &result);
        result
    }

    /// Execute the request without notifying the observer.
    ///
    /// Pair with [`Self::report`] when the outcome may still be discarded.
    pub fn decode(&self, decoder: &dyn TabularDecoder) -> (IngestionContext, IngestionResult<Dataset>) {
        decode_for_job(self.job, decoder, &self.source, &self.options)
    }

    /// Report an outcome produced by [`Self::decode`] to the configured observer, if any.
    pub fn report(&self, ctx: &IngestionContext, result: &IngestionResult<Dataset>) {
        report_outcome(&self.options, ctx, result);
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_first_table, SourceFormat, WorkbookDecoder};
    use crate::error::{IngestionError, IngestionResult};
    use crate::ingestion::{Table, TabularDecoder};

    struct NoTablesDecoder;

    impl TabularDecoder for NoTablesDecoder {
        fn read_tables(&self, _content: &[u8], _format: SourceFormat) -> IngestionResult<Vec<Table>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(SourceFormat::from_extension("XLSX"), Some(SourceFormat::Excel));
        assert_eq!(SourceFormat::from_extension("tsv"), Some(SourceFormat::Tsv));
        assert_eq!(SourceFormat::from_extension("pdf"), None);
    }

    #[test]
    fn detect_falls_back_to_content() {
        assert_eq!(SourceFormat::detect(None, b"PK\x03\x04rest"), SourceFormat::Excel);
        assert_eq!(SourceFormat::detect(Some("bin"), b"a,b\n1,2\n"), SourceFormat::Csv);
        assert_eq!(SourceFormat::detect(Some("csv"), b"PK\x03\x04"), SourceFormat::Csv);
    }

    #[test]
    fn no_tables_is_structural_error() {
        let err = decode_first_table(&NoTablesDecoder, b"x", SourceFormat::Csv).unwrap_err();
        assert!(matches!(err, IngestionError::NoTables));
    }

    #[test]
    fn header_only_csv_is_empty_result() {
        let err = decode_first_table(&WorkbookDecoder::new(), b"id,name\n", SourceFormat::Csv).unwrap_err();
        assert!(matches!(err, IngestionError::EmptyResult));
    }

    #[test]
    fn delimiter_override_applies_to_csv() {
        let decoder = WorkbookDecoder {
            csv_delimiter: Some(b';'),
        };
        let ds = decode_first_table(&decoder, b"a;b\n1;2\n", SourceFormat::Csv).unwrap();
        assert_eq!(ds.columns(), vec!["a", "b"]);
    }
}
