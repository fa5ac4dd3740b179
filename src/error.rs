// 🚨 Engine Errors - one variant per failure class
//
// Parse and EmptyResult are recoverable (skip the file, keep going).
// Schema and Lookup abort the requested operation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed or unsupported input document
    #[error("Failed to parse {file}: {reason}")]
    Parse { file: String, reason: String },

    /// Price reference is missing required columns
    #[error("Price reference is missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    /// A person record lacks a field the extraction needs
    #[error("Record {record}: missing or invalid field '{path}'")]
    Lookup { record: String, path: String },

    /// A whole source produced no rows after filtering
    #[error("Filtered purchase history is empty for source: {source_name}")]
    EmptyResult { source_name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl EngineError {
    pub fn lookup(record: impl Into<String>, path: impl Into<String>) -> Self {
        EngineError::Lookup {
            record: record.into(),
            path: path.into(),
        }
    }

    pub fn parse(file: impl Into<String>, reason: impl ToString) -> Self {
        EngineError::Parse {
            file: file.into(),
            reason: reason.to_string(),
        }
    }

    /// Fatal errors abort the whole operation; the rest are surfaced as warnings
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            EngineError::Parse { .. } | EngineError::EmptyResult { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
