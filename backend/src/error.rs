//! Error types for the Starload ETL pipeline.
//!
//! Each stage returns its own error type and converts into the top-level
//! [`PipelineError`] through `From`, so `?` works across stage boundaries:
//!
//! - [`CsvError`] - decoding/parsing a single CSV payload
//! - [`SourceError`] - the object-storage-like source collaborator
//! - [`SinkError`] - the warehouse-like sink collaborator
//! - [`SchemaError`] - required columns or typed values missing from an input
//! - [`DateParseError`] - a date not in `DD/MM/YYYY` form
//! - [`PipelineError`] - top-level run errors

use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors while decoding one CSV payload.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read the payload.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Payload could not be decoded to text.
    #[error("Failed to decode content: {0}")]
    EncodingError(String),

    /// Malformed record.
    #[error("Invalid CSV format at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Empty payload.
    #[error("CSV file is empty")]
    EmptyFile,

    /// Header row present but blank.
    #[error("No headers found in CSV")]
    NoHeaders,
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or_default();
        CsvError::ParseError {
            line,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Collaborator Errors
// =============================================================================

/// Errors from the dataset source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The named object does not exist.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// IO error while reading.
    #[error("Source IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source could not be reached or listed.
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the warehouse sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// IO error while persisting.
    #[error("Sink IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Table could not be encoded for the sink.
    #[error("Failed to encode table: {0}")]
    Encode(String),

    /// The warehouse refused the table.
    #[error("Table '{table}' rejected: {message}")]
    Rejected { table: String, message: String },
}

// =============================================================================
// Input Validation Errors
// =============================================================================

/// An input dataset does not have the shape the transformation expects.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A required column is absent.
    #[error("Dataset '{dataset}' is missing required column '{column}'")]
    MissingColumn { dataset: String, column: String },

    /// A value could not be converted to its typed field.
    #[error("Dataset '{dataset}', line {line}, column '{column}' (value '{value}'): {message}")]
    InvalidValue {
        dataset: String,
        line: usize,
        column: String,
        value: String,
        message: String,
    },

    /// The payload is not readable CSV.
    #[error("Dataset '{dataset}' is not valid CSV: {source}")]
    Malformed {
        dataset: String,
        #[source]
        source: CsvError,
    },
}

/// A date value does not match the expected format.
#[derive(Debug, Error)]
#[error("Cannot parse date '{value}' with format '{format}'")]
pub struct DateParseError {
    pub value: String,
    pub format: &'static str,
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level run errors.
///
/// Returned by [`crate::transform::pipeline::try_run`] and folded into a failed
/// [`crate::transform::pipeline::RunReport`] by [`crate::transform::pipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// One or more required datasets are not in the source catalogue.
    #[error("Missing required input file(s): {}", .missing.join(", "))]
    MissingInput { missing: Vec<String> },

    /// The source failed while listing or reading.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// An input dataset has the wrong shape.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A date could not be parsed while building the time dimension.
    #[error("Date parse error: {0}")]
    DateParse(#[from] DateParseError),

    /// The warehouse failed to persist a table.
    #[error("Failed to write table '{table}': {source}")]
    SinkWrite {
        table: String,
        #[source]
        source: SinkError,
    },

    /// The trigger descriptor could not be read.
    #[error("Invalid trigger event: {0}")]
    InvalidTrigger(String),
}

impl PipelineError {
    /// Name of the error kind, as reported to the caller.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MissingInput { .. } => "MissingInputError",
            PipelineError::Source(_) => "SourceError",
            PipelineError::Schema(_) => "SchemaError",
            PipelineError::DateParse(_) => "DateParseError",
            PipelineError::SinkWrite { .. } => "SinkWriteError",
            PipelineError::InvalidTrigger(_) => "TriggerError",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for validation.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let schema_err = SchemaError::MissingColumn {
            dataset: "orders".into(),
            column: "Ship Date".into(),
        };
        let pipeline_err: PipelineError = schema_err.into();
        assert_eq!(pipeline_err.kind(), "SchemaError");
        assert!(pipeline_err.to_string().contains("Ship Date"));

        let date_err = DateParseError {
            value: "2020-01-01".into(),
            format: "%d/%m/%Y",
        };
        let pipeline_err: PipelineError = date_err.into();
        assert_eq!(pipeline_err.kind(), "DateParseError");
        assert!(pipeline_err.to_string().contains("2020-01-01"));
    }

    #[test]
    fn test_missing_input_lists_files() {
        let err = PipelineError::MissingInput {
            missing: vec!["ordersdf.csv".into(), "productsdf.csv".into()],
        };
        assert_eq!(err.kind(), "MissingInputError");
        assert_eq!(
            err.to_string(),
            "Missing required input file(s): ordersdf.csv, productsdf.csv"
        );
    }

    #[test]
    fn test_sink_write_format() {
        let err = PipelineError::SinkWrite {
            table: "sales_fact".into(),
            source: SinkError::Rejected {
                table: "sales_fact".into(),
                message: "quota exceeded".into(),
            },
        };
        assert_eq!(err.kind(), "SinkWriteError");
        let msg = err.to_string();
        assert!(msg.contains("sales_fact"));
        assert!(msg.contains("quota exceeded"));
    }

    #[test]
    fn test_invalid_value_format() {
        let err = SchemaError::InvalidValue {
            dataset: "orderdetails".into(),
            line: 7,
            column: "Sales".into(),
            value: "abc".into(),
            message: "expected a number".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 7"));
        assert!(msg.contains("column 'Sales'"));
        assert!(msg.contains("value 'abc'"));
    }
}
