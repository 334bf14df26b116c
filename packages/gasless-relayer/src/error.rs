//! Error types for the relayer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::fmt;

/// Relayer error type.
#[derive(Debug)]
pub enum Error {
    /// Configuration or startup error. Fatal at boot.
    Config(String),
    /// Ledger RPC communication error. Transient.
    Rpc(String),
    /// Faucet top-up request failed.
    Faucet(String),
    /// External quote service error (pool builder or aggregator).
    Quote(String),
    /// Sweep strategy execution failed.
    Sweep(String),
    /// Integrity violation (message token or instruction mismatch).
    Integrity(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "config error: {msg}"),
            Error::Rpc(msg) => write!(f, "rpc error: {msg}"),
            Error::Faucet(msg) => write!(f, "faucet error: {msg}"),
            Error::Quote(msg) => write!(f, "quote error: {msg}"),
            Error::Sweep(msg) => write!(f, "sweep error: {msg}"),
            Error::Integrity(msg) => write!(f, "integrity error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<relay_integrity::IntegrityError> for Error {
    fn from(e: relay_integrity::IntegrityError) -> Self {
        Error::Integrity(e.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Config(_) | Error::Sweep(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Rpc(_) | Error::Faucet(_) | Error::Quote(_) => StatusCode::BAD_GATEWAY,
            Error::Integrity(_) => StatusCode::FORBIDDEN,
        };
        // Infrastructure details stay in logs.
        let message = match &self {
            Error::Integrity(_) => self.to_string(),
            Error::Config(_) | Error::Sweep(_) => "Internal error".to_string(),
            Error::Rpc(_) | Error::Faucet(_) | Error::Quote(_) => {
                "Upstream service temporarily unavailable".to_string()
            }
        };
        let body = serde_json::json!({
            "success": false,
            "error": message
        });
        (status, Json(body)).into_response()
    }
}
