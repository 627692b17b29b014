//! Envelope responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::error::{GateError, GateResult};
use crate::protocol::Envelope;

/// Failure details left on a response for the audit log.
#[derive(Debug, Clone)]
pub(crate) struct FailureNote {
    pub code: &'static str,
    pub message: String,
}

pub(crate) fn success(msg: &str, data: serde_json::Value) -> Response {
    (StatusCode::OK, Json(Envelope::success(msg, data))).into_response()
}

/// Turn an error into an envelope.
///
/// Request-shape errors get HTTP 400; everything else is reported through
/// `success: false` with HTTP 200.
pub(crate) fn failure(err: &GateError) -> Response {
    if err.code() == "INTERNAL_ERROR" {
        error!(error = %err, "Request failed with internal error");
    }

    let status = if err.is_malformed_request() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };

    let mut response = (status, Json(Envelope::from_error(err))).into_response();
    response.extensions_mut().insert(FailureNote {
        code: err.code(),
        message: err.to_string(),
    });
    response
}

pub(crate) fn from_result(msg: &str, result: GateResult<serde_json::Value>) -> Response {
    match result {
        Ok(data) => success(msg, data),
        Err(err) => failure(&err),
    }
}
