use thiserror::Error;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type returned by decoding, the execution unit and the coordinator.
///
/// Every failure of a submission ends up as one of these variants and is then rendered into the
/// coordinator's error message.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The source could not be read (missing file, permission denied, ...).
    #[error("The file could not be read by the worker.")]
    Unreadable {
        #[source]
        source: std::io::Error,
    },

    /// The source was read but contained no bytes.
    #[error("Failed to read file. It might be empty or corrupted.")]
    EmptyContent,

    #[cfg(feature = "excel")]
    /// Workbook decoding error (feature-gated behind `excel`).
    #[error("{0}")]
    Excel(#[from] calamine::Error),

    /// Delimited-text decoding error.
    #[error("{0}")]
    Csv(#[from] csv::Error),

    /// The content could not be decoded for a reason not covered by the decoder errors above.
    #[error("{message}")]
    Decode { message: String },

    /// The decoded source has no sheets/tables.
    #[error("The Excel/CSV file does not contain any sheets.")]
    NoTables,

    /// The first table decoded to zero records.
    #[error("The selected file is empty or could not be parsed into a usable format.")]
    EmptyResult,

    /// The execution unit could not be started.
    #[error("Failed to initialize the data processing worker: {source}")]
    WorkerStart {
        #[source]
        source: std::io::Error,
    },

    /// The execution unit died without sending a response.
    #[error("A worker error occurred: {detail}. This may be due to runtime limitations.")]
    WorkerCrashed { detail: String },

    /// The execution unit was driven outside its one-message protocol.
    #[error("worker protocol violation: {message}")]
    WorkerProtocol { message: String },
}

/// Coarse classification of an [`IngestionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unreadable content.
    Decode,
    /// No tables, or zero records.
    Structural,
    /// The isolated execution unit failed to start or crashed.
    ExecutionContext,
}

impl IngestionError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unreadable { .. } | Self::EmptyContent | Self::Csv(_) | Self::Decode { .. } => {
                ErrorKind::Decode
            }
            #[cfg(feature = "excel")]
            Self::Excel(_) => ErrorKind::Decode,
            Self::NoTables | Self::EmptyResult => ErrorKind::Structural,
            Self::WorkerStart { .. } | Self::WorkerCrashed { .. } | Self::WorkerProtocol { .. } => {
                ErrorKind::ExecutionContext
            }
        }
    }

    #[cfg(any(test, not(feature = "excel")))]
    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, IngestionError};

    #[test]
    fn structural_errors_carry_fixed_messages() {
        assert_eq!(
            IngestionError::NoTables.to_string(),
            "The Excel/CSV file does not contain any sheets."
        );
        assert_eq!(IngestionError::EmptyResult.kind(), ErrorKind::Structural);
    }

    #[test]
    fn worker_failures_are_execution_context_errors() {
        let err = IngestionError::WorkerCrashed {
            detail: "boom".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::ExecutionContext);
        assert!(err.to_string().contains("boom"));
        assert!(err.to_string().contains("runtime limitations"));
    }

    #[test]
    fn decode_errors_surface_message_verbatim() {
        let err = IngestionError::decode("unsupported content");
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.to_string(), "unsupported content");
    }

    #[test]
    fn decoder_errors_are_not_prefixed() {
        let csv_err = csv::ReaderBuilder::new()
            .from_reader("a,b\n1,2,3\n".as_bytes())
            .records()
            .find_map(Result::err)
            .unwrap();
        let expected = csv_err.to_string();
        assert_eq!(IngestionError::from(csv_err).to_string(), expected);
    }
}
