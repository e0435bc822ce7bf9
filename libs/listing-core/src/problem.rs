use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ValidationError};

/// RFC 9457 Problem Details, the shape handed to the transport layer for
/// every listing error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    pub code: String,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            type_url: "about:blank".to_string(),
            title: title.into(),
            status: status.as_u16(),
            detail: detail.into(),
            instance: String::new(),
            code: String::new(),
        }
    }

    pub fn with_instance(mut self, uri: impl Into<String>) -> Self {
        self.instance = uri.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }
}

/// Non-standard "client closed request".
const CLIENT_CLOSED_REQUEST: u16 = 499;

impl Error {
    /// Map to a Problem. Validation details name the field and constraint;
    /// storage problems are generic.
    pub fn to_problem(&self, instance: &str) -> Problem {
        match self {
            Error::Validation(v) => validation_problem(v).with_instance(instance),
            Error::InvalidCursor => Problem::new(
                StatusCode::BAD_REQUEST,
                "Invalid Cursor",
                "invalid pagination cursor",
            )
            .with_code("INVALID_CURSOR")
            .with_instance(instance),
            Error::StorageTimeout => Problem::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Temporarily Unavailable",
                "the service is temporarily unavailable, retry later",
            )
            .with_code("STORAGE_TIMEOUT")
            .with_instance(instance),
            Error::Storage => Problem::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Error",
                "an internal error occurred",
            )
            .with_code("STORAGE_ERROR")
            .with_instance(instance),
            Error::Cancelled => Problem::new(
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                    .unwrap_or(StatusCode::REQUEST_TIMEOUT),
                "Request Cancelled",
                "the request was cancelled",
            )
            .with_code("CANCELLED")
            .with_instance(instance),
        }
    }
}

fn validation_problem(v: &ValidationError) -> Problem {
    let status = match v {
        ValidationError::OutOfRange { .. } | ValidationError::TooManyValues { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::BAD_REQUEST,
    };
    Problem::new(status, "Validation Error", v.to_string()).with_code(v.code())
}
