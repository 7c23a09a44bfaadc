//! Error types for column addressing.

use thiserror::Error;

/// Result type for column operations.
pub type ColumnResult<T> = Result<T, ColumnError>;

/// Errors that can occur while validating columns or parsing ranges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnError {
    /// The column list is empty or contains a malformed column token.
    #[error("columns are invalid")]
    ColumnsInvalid,

    /// The column list is not strictly increasing (this includes duplicates).
    #[error("columns are not in order")]
    ColumnsNotInOrder,

    /// A single column token is malformed.
    #[error("invalid column name: {0:?}")]
    InvalidColumn(String),

    /// A range string could not be parsed.
    #[error("invalid range: {0:?}")]
    InvalidRange(String),
}
