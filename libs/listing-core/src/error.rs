use thiserror::Error;

/// Caller mistakes detected before any store access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown filter field: {0}")]
    UnknownField(String),

    #[error("unsupported sort field: {0}")]
    InvalidSortField(String),

    #[error("invalid sort direction: {0}")]
    InvalidSortDirection(String),

    #[error("{field} out of range: {detail}")]
    OutOfRange { field: String, detail: String },

    #[error("{field} accepts at most {max} values")]
    TooManyValues { field: String, max: usize },

    #[error("{field} must be at least {min} characters")]
    QueryTooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    QueryTooLong { field: String, max: usize },

    #[error("{field} must not be empty")]
    EmptyValue { field: String },

    #[error("{field} is not a valid {expected}")]
    InvalidValue { field: String, expected: &'static str },
}

impl ValidationError {
    pub fn out_of_range(field: impl Into<String>, detail: impl Into<String>) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            detail: detail.into(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::UnknownField(_) => "UNKNOWN_FIELD",
            ValidationError::InvalidSortField(_) => "INVALID_SORT_FIELD",
            ValidationError::InvalidSortDirection(_) => "INVALID_SORT_DIRECTION",
            ValidationError::OutOfRange { .. } => "OUT_OF_RANGE",
            ValidationError::TooManyValues { .. } => "TOO_MANY_VALUES",
            ValidationError::QueryTooShort { .. } => "QUERY_TOO_SHORT",
            ValidationError::QueryTooLong { .. } => "QUERY_TOO_LONG",
            ValidationError::EmptyValue { .. } => "EMPTY_VALUE",
            ValidationError::InvalidValue { .. } => "INVALID_VALUE",
        }
    }
}

/// Precise reason a cursor was rejected. Logged, never returned to callers:
/// every variant collapses into [`Error::InvalidCursor`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CursorError {
    #[error("invalid base64url encoding")]
    InvalidBase64,
    #[error("malformed json")]
    InvalidJson,
    #[error("unsupported version")]
    InvalidVersion,
    #[error("empty or invalid keys")]
    InvalidKeys,
    #[error("empty or invalid sort fields")]
    InvalidFields,
    #[error("missing or invalid signature")]
    InvalidSignature,
    #[error("sort does not match request")]
    SortMismatch,
    #[error("filter does not match request")]
    FilterMismatch,
    #[error("key {index} is not a valid {expected}")]
    InvalidKeyValue { index: usize, expected: &'static str },
}

/// Public error surface of the listing core. Storage variants carry no
/// store-level detail; that is logged where the failure is caught.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid pagination cursor")]
    InvalidCursor,

    #[error("storage temporarily unavailable")]
    StorageTimeout,

    #[error("storage error")]
    Storage,

    #[error("request cancelled")]
    Cancelled,
}

impl From<CursorError> for Error {
    fn from(_: CursorError) -> Self {
        Error::InvalidCursor
    }
}

impl Error {
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::InvalidCursor)
    }
}
