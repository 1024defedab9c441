//! Projection of a [`Dataset`] into grid cells.
//!
//! The grid is a dense, row-major list of [`CellEntry`] values: one header row followed by one row
//! per record. It is rebuilt from scratch whenever the dataset changes.

use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;

use crate::types::{CellValue, Dataset, Record};

/// A single grid cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellEntry {
    /// 0-based row; row 0 holds the headers.
    pub row: usize,
    /// 0-based column, in dataset column order.
    pub col: usize,
    /// Raw value (the column name for header cells).
    pub value: CellValue,
    /// Display string.
    pub display: String,
    /// Header cells are rendered bold.
    pub header: bool,
}

/// Options for [`project_with`].
#[derive(Debug, Clone)]
pub struct ProjectionOptions {
    /// Datasets with at least this many records are projected in parallel.
    pub parallel_threshold: usize,
    /// Records per parallel chunk.
    pub chunk_size: usize,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            parallel_threshold: 16_384,
            chunk_size: 4_096,
        }
    }
}

/// Rendering-ready cells of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    entries: Vec<CellEntry>,
    rows: usize,
    cols: usize,
}

impl Grid {
    /// All cells, row-major, headers first.
    pub fn entries(&self) -> &[CellEntry] {
        &self.entries
    }

    /// Number of grid rows, including the header row.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cell at `(row, col)`, if inside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<&CellEntry> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.entries.get(row * self.cols + col)
    }

    /// The header row.
    pub fn headers(&self) -> &[CellEntry] {
        &self.entries[..self.cols]
    }

    /// Every cell below the header row.
    pub fn data_entries(&self) -> &[CellEntry] {
        &self.entries[self.cols..]
    }

    /// The grid in the widget's `celldata` shape.
    ///
    /// Header cells carry `{"v": name, "m": name, "bl": 1}`; data cells carry the raw value.
    pub fn to_celldata(&self) -> serde_json::Value {
        self.entries
            .iter()
            .map(|e| {
                if e.header {
                    json!({ "r": e.row, "c": e.col, "v": { "v": e.value, "m": e.display, "bl": 1 } })
                } else {
                    json!({ "r": e.row, "c": e.col, "v": e.value })
                }
            })
            .collect()
    }
}

/// Project `dataset` into a [`Grid`] with default options.
///
/// Columns come from the first record. Row 0 holds one header cell per column; record `i` lands
/// on row `i + 1`. A record missing a column yields an empty cell.
pub fn project(dataset: &Dataset) -> Grid {
    project_with(dataset, &ProjectionOptions::default())
}

/// Project `dataset` into a [`Grid`].
///
/// The output does not depend on `opts`; they only decide whether records are converted in
/// parallel chunks.
pub fn project_with(dataset: &Dataset, opts: &ProjectionOptions) -> Grid {
    let columns: Vec<String> = dataset.columns().into_iter().map(str::to_owned).collect();
    let cols = columns.len();
    let records = dataset.records();

    let mut entries = Vec::with_capacity(cols * (records.len() + 1));
    entries.extend(columns.iter().enumerate().map(|(col, name)| CellEntry {
        row: 0,
        col,
        value: CellValue::Text(name.clone()),
        display: name.clone(),
        header: true,
    }));

    let chunk_size = opts.chunk_size.max(1);
    if records.len() >= opts.parallel_threshold {
        let per_chunk: Vec<Vec<CellEntry>> = records
            .par_chunks(chunk_size)
            .enumerate()
            .map(|(chunk_idx, chunk)| project_rows(chunk, chunk_idx * chunk_size, &columns))
            .collect();
        entries.extend(per_chunk.into_iter().flatten());
    } else {
        entries.extend(project_rows(records, 0, &columns));
    }

    Grid {
        entries,
        rows: records.len() + 1,
        cols,
    }
}

fn project_rows(records: &[Record], first_index: usize, columns: &[String]) -> Vec<CellEntry> {
    let mut out = Vec::with_capacity(records.len() * columns.len());
    for (offset, record) in records.iter().enumerate() {
        let row = first_index + offset + 1;
        for (col, name) in columns.iter().enumerate() {
            let value = record.get(name).cloned().unwrap_or_default();
            out.push(CellEntry {
                row,
                col,
                display: value.to_string(),
                value,
                header: false,
            });
        }
    }
    out
}
