//! `rust-grid-ingest` loads a workbook or delimited-text file in the background and turns it
//! into grid cells ready for a spreadsheet widget.
//!
//! The pipeline is:
//!
//! 1. [`coordinator::IngestionCoordinator::submit`] takes a [`ingestion::SourceFile`] and moves
//!    to [`coordinator::Phase::Loading`].
//! 2. A single-use [`execution::ExecutionUnit`] reads the file on its own thread and decodes the
//!    first sheet with the injected [`ingestion::TabularDecoder`].
//! 3. The reply becomes a [`types::Dataset`] ([`coordinator::Phase::Success`]) or an error
//!    message ([`coordinator::Phase::Error`]).
//! 4. [`grid::project`] turns the dataset into header and data [`grid::CellEntry`]s.
//!
//! Only one job is ever in flight: submitting again, or calling
//! [`coordinator::IngestionCoordinator::reset`], tears the running unit down and its result is
//! never observed.
//!
//! ## What you can load
//!
//! **File formats (detected by extension, then by content):**
//!
//! - **Delimited text**: `.csv`, `.tsv`
//! - **Workbooks** (Cargo feature `excel`, on by default): `.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods`
//!
//! Cells are typed [`types::CellValue`]s: empty, bool, number or text.
//!
//! ## Quick example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rust_grid_ingest::coordinator::{CoordinatorOptions, IngestionCoordinator, Phase};
//! use rust_grid_ingest::ingestion::{SourceFile, WorkbookDecoder};
//!
//! let mut coordinator = IngestionCoordinator::new(Arc::new(WorkbookDecoder::new()), CoordinatorOptions::default());
//! coordinator.submit(SourceFile::from_path("sales.csv"));
//!
//! // A UI loop would call `poll()` once per frame instead.
//! if coordinator.wait() == Phase::Success {
//!     let grid = coordinator.grid().unwrap();
//!     println!("{} header cells, {} data cells", grid.headers().len(), grid.data_entries().len());
//! } else {
//!     eprintln!("{}", coordinator.error_message().unwrap_or_default());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: job lifecycle and the phase/dataset/error state
//! - [`execution`]: the isolated execution unit, its protocol, observer hooks and metrics
//! - [`ingestion`]: decoders, format detection and ingestion observers
//! - [`grid`]: dataset to grid cell projection
//! - [`types`]: records, datasets and cell values
//! - [`error`]: error types used across the crate

pub mod coordinator;
pub mod error;
pub mod execution;
pub mod grid;
pub mod ingestion;
pub mod types;

pub use error::{ErrorKind, IngestionError, IngestionResult};
