//! Error taxonomy and JSON error responses
//!
//! Only two failures are fatal to a registration: the allocator running out
//! of attempts and config file I/O. Reload failures are logged where they
//! happen and never reach the caller, and a service without a resolvable
//! target is silently omitted rather than failing the request.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Fatal registration failures surfaced to the caller
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Every candidate identifier collided within the attempt budget
    #[error("could not allocate a unique tenant identity")]
    IdentityExhausted,

    /// Reading, writing, or replacing the config file failed
    #[error("config file update failed: {0}")]
    ConfigIo(#[from] anyhow::Error),
}

impl RegistryError {
    /// Stable machine-readable error code for the response body
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::IdentityExhausted => "id_generation_failed",
            RegistryError::ConfigIo(_) => "config_write_failed",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::IdentityExhausted => StatusCode::INTERNAL_SERVER_ERROR,
            RegistryError::ConfigIo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body: `{"error": code, "details": message}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"{}","details":"{}"}}"#,
                self.error,
                self.details.replace('"', "\\\"")
            )
        })
    }
}

/// Build a JSON error response
pub fn json_error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response<Full<Bytes>> {
    let body = ErrorBody::new(error, details).to_json();
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("valid response with StatusCode enum and static header")
}
