//! Error types for the relay service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::fmt;

/// Relay error type.
///
/// Variants map onto the HTTP surface: bad input is the caller's fault (400),
/// an economic rejection is routine and retryable (429), chain failures
/// surface the provider message (502).
#[derive(Debug)]
pub enum Error {
    /// Configuration or startup error.
    Config(String),
    /// Malformed request input.
    Input(String),
    /// Kill switch: relaying this purchase would not be profitable right now.
    Economic {
        fee_earned_usd: f64,
        gas_cost_usd: f64,
    },
    /// Permit submission or confirmation failure.
    Permit(String),
    /// RPC read failure (gas estimate, receipt query, chain head).
    Rpc(String),
    /// Transaction broadcast failure.
    Broadcast(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "config error: {msg}"),
            Error::Input(msg) => write!(f, "invalid request: {msg}"),
            Error::Economic {
                fee_earned_usd,
                gas_cost_usd,
            } => write!(
                f,
                "network congested: gas would cost ${gas_cost_usd:.4} against a ${fee_earned_usd:.4} fee; try again later or pay gas directly"
            ),
            Error::Permit(msg) => write!(f, "permit error: {msg}"),
            Error::Rpc(msg) => write!(f, "rpc error: {msg}"),
            Error::Broadcast(msg) => write!(f, "broadcast error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Input(_) => StatusCode::BAD_REQUEST,
            Error::Economic { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Permit(_) | Error::Rpc(_) | Error::Broadcast(_) => StatusCode::BAD_GATEWAY,
        };
        let mut body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
        });
        if let Error::Economic {
            fee_earned_usd,
            gas_cost_usd,
        } = &self
        {
            body["feeEarnedUsd"] = (*fee_earned_usd).into();
            body["gasCostUsd"] = (*gas_cost_usd).into();
        }
        (status, Json(body)).into_response()
    }
}
