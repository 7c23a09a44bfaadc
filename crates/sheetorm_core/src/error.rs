//! Error types for sheetorm core.

use sheetorm_column::ColumnError;
use thiserror::Error;

/// Result type for sheet operations.
pub type SheetResult<T> = Result<T, SheetError>;

/// HTTP status the spreadsheet service uses for rate limiting.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// HTTP status the spreadsheet service sporadically returns under load.
pub const STATUS_SERVICE_UNAVAILABLE: u16 = 503;

/// Errors that can occur while resolving, reading or updating records.
///
/// Every error is scoped to the call that produced it. Cache failures never
/// show up here: caches degrade to a miss instead.
#[derive(Debug, Error)]
pub enum SheetError {
    /// No row holds the requested UID.
    #[error("record with uid {uid:?} not found in the sheet")]
    RecordNotFound {
        /// The first UID that could not be resolved.
        uid: String,
    },

    /// An empty UID was supplied where one is required.
    #[error("empty uid provided where uid expected")]
    EmptyUid,

    /// The same record appears more than once in one update batch.
    #[error("record {uid:?} is updated multiple times in the same request")]
    MultiUpdate {
        /// The duplicated UID.
        uid: String,
    },

    /// The row fetched for a UID holds a different UID, even after a fresh read.
    #[error("inconsistent data: requested uid {requested:?}, sheet returned {returned:?}")]
    InconsistentData {
        /// The UID that was asked for.
        requested: String,
        /// The UID found in the fetched row.
        returned: String,
    },

    /// The UID column is not a member of the record's column list.
    #[error("the uid column {column:?} is invalid")]
    InvalidUidColumn {
        /// The rejected column.
        column: String,
    },

    /// Column list, column token or range is malformed.
    #[error(transparent)]
    Column(#[from] ColumnError),

    /// The structure configuration is invalid.
    #[error("structure config of sheet is invalid: {message}")]
    ConfigInvalid {
        /// What is wrong with it.
        message: String,
    },

    /// A numeric cell does not fit into the target field type.
    #[error("value {value:?} in column {column} overflows the field type")]
    Overflow {
        /// Column the value was read from.
        column: String,
        /// The raw cell value.
        value: String,
    },

    /// A cell could not be decoded into the target field type.
    #[error("cannot decode column {column}: {message}")]
    Codec {
        /// Column the value was read from.
        column: String,
        /// Description of the failure.
        message: String,
    },

    /// The remote service or network failed.
    #[error("transport error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transport {
        /// HTTP status code, if the failure came from the service.
        status: Option<u16>,
        /// Error message.
        message: String,
    },

    /// The service returned a response that does not match the request.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl SheetError {
    /// Creates a transport error without a status code.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Creates a transport error carrying an HTTP status.
    pub fn transport_status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates an inconsistent data error.
    pub fn inconsistent(requested: impl Into<String>, returned: impl Into<String>) -> Self {
        Self::InconsistentData {
            requested: requested.into(),
            returned: returned.into(),
        }
    }

    /// Creates a config invalid error.
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Codec {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Returns the HTTP status of a transport error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns true if the service asked us to slow down (HTTP 429).
    pub fn is_too_many_requests(&self) -> bool {
        self.status() == Some(STATUS_TOO_MANY_REQUESTS)
    }

    /// Returns true if the service was temporarily unavailable (HTTP 503).
    pub fn is_service_unavailable(&self) -> bool {
        self.status() == Some(STATUS_SERVICE_UNAVAILABLE)
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        self.is_too_many_requests() || self.is_service_unavailable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SheetError::transport_status(429, "slow down").is_retryable());
        assert!(SheetError::transport_status(503, "unavailable").is_retryable());
        assert!(!SheetError::transport_status(500, "internal").is_retryable());
        assert!(!SheetError::transport_status(403, "forbidden").is_retryable());
        assert!(!SheetError::transport("connection reset").is_retryable());
        assert!(!SheetError::Cancelled.is_retryable());
        assert!(!SheetError::EmptyUid.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SheetError::transport_status(429, "quota exceeded");
        assert_eq!(err.to_string(), "transport error (status 429): quota exceeded");

        let err = SheetError::transport("dns failure");
        assert_eq!(err.to_string(), "transport error: dns failure");

        let err = SheetError::inconsistent("1", "2");
        assert!(err.to_string().contains("\"1\""));
        assert!(err.to_string().contains("\"2\""));
    }

    #[test]
    fn column_errors_convert() {
        let err: SheetError = ColumnError::ColumnsNotInOrder.into();
        assert!(matches!(err, SheetError::Column(ColumnError::ColumnsNotInOrder)));
        assert_eq!(err.to_string(), "columns are not in order");
    }
}
