use openssl::error::ErrorStack;
use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeError;
use std::path::PathBuf;
use thiserror::Error;

/// Represents everything that can go wrong during a single attempt of a remote call.
///
/// # Variants
///
/// - `RequestFailed`: The HTTP request itself failed (connection refused, DNS, TLS, timeout). Wrapped errors from the `reqwest` library.
/// - `HttpStatus`: The server answered with a non-success status and no recognizable API error body.
/// - `Api`: The service answered with an error `Code` in its JSON body, e.g. `InvalidAccessKeyId.NotFound`.
/// - `SerdeError`: The response body could not be decoded as JSON, or did not have the expected shape.
/// - `ErrorStack`: Computing the HMAC request signature failed inside OpenSSL.
#[derive(Debug, Error)]
pub enum AliyunError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] ReqwestError),

    #[error("Unexpected HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("{code}: {message} (request id: {request_id})")]
    Api {
        code: String,
        message: String,
        request_id: String,
    },

    #[error("Failed to decode response: {0}")]
    SerdeError(#[from] SerdeError),

    #[error("Failed to sign request: {0}")]
    ErrorStack(#[from] ErrorStack),
}

/// Errors that end a deployment run.
///
/// A `RemoteCall` error is only produced after the whole retry budget has been spent,
/// so by the time one reaches the caller there is nothing left to retry.
#[derive(Debug, Error)]
pub enum DeployErrors {
    #[error("{action} failed after {attempts} attempt(s)")]
    RemoteCall {
        action: String,
        attempts: u32,
        #[source]
        source: AliyunError,
    },

    #[error("Error in opening/reading file {}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid deployment state: {0}")]
    InvalidState(String),

    #[error("Unexpected response to {action}")]
    UnexpectedResponse {
        action: String,
        #[source]
        source: SerdeError,
    },
}
