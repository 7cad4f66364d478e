//! Response envelope and error mapping

use std::fmt;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::event::EventError;
use crate::ledger::LedgerError;
use crate::pix::PixError;
use crate::rpc::{RpcCode, RpcStatus};
use crate::transaction::TransactionLogError;

/// Unified API response wrapper
///
/// - code: 0 = success, otherwise the HTTP status
/// - msg: short description
/// - data: payload on success
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Error leaving the gateway
#[derive(Debug)]
pub struct ApiError {
    pub rpc: RpcCode,
    pub msg: String,
}

impl ApiError {
    pub fn new(rpc: RpcCode, msg: impl Into<String>) -> Self {
        Self {
            rpc,
            msg: msg.into(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::new(RpcCode::InvalidArgument, msg)
    }

    /// Client errors keep their message; server-side ones get the generic text
    fn classify<E: RpcStatus + fmt::Display>(e: &E) -> Self {
        let rpc = e.rpc_code();
        if rpc.http_status() >= 500 {
            tracing::error!(code = %rpc, error = %e, "Backend error");
            Self::new(rpc, rpc.generic_message())
        } else {
            Self::new(rpc, e.to_string())
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.rpc.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ApiResponse::<()>::error(status.as_u16() as i32, self.msg))).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        Self::classify(&e)
    }
}

impl From<TransactionLogError> for ApiError {
    fn from(e: TransactionLogError) -> Self {
        Self::classify(&e)
    }
}

impl From<PixError> for ApiError {
    fn from(e: PixError) -> Self {
        Self::classify(&e)
    }
}

impl From<EventError> for ApiError {
    fn from(e: EventError) -> Self {
        let rpc = match &e {
            EventError::Decode(_) => RpcCode::InvalidArgument,
            EventError::PublishExhausted { .. } | EventError::Transport(_) | EventError::Closed => {
                RpcCode::Unavailable
            }
            EventError::Encode(_) | EventError::Handler(_) => RpcCode::Internal,
        };
        tracing::error!(code = %rpc, error = %e, "Event publish error");
        Self::new(rpc, rpc.generic_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_generic() {
        let err = ApiError::from(LedgerError::Database("password authentication failed for user pix".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.msg, "service unavailable");
    }

    #[test]
    fn test_client_errors_keep_message() {
        let err = ApiError::from(LedgerError::DuplicateKey);
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.msg, "key already exists");
    }

    #[test]
    fn test_event_errors() {
        let err = ApiError::from(EventError::PublishExhausted {
            attempts: 4,
            reason: "broker down".into(),
        });
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.msg.contains("broker"));
    }
}
