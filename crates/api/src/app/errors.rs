use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use brigade_core::DomainError;
use brigade_infra::command_dispatcher::DispatchError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Domain(e) => domain_error_to_response(e),
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Deserialize(msg) => {
            tracing::error!(error = %msg, "stored event could not be deserialized");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => {
            tracing::error!(error = %e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    let (status, code) = match err {
        DomainError::InvalidTransition(_) => (StatusCode::CONFLICT, "invalid_transition"),
        DomainError::UnroutableItem(_) => (StatusCode::UNPROCESSABLE_ENTITY, "unroutable_item"),
        DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        DomainError::Overpayment { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "overpayment"),
        DomainError::SplitMismatch { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "split_mismatch"),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        DomainError::SupervisorApprovalRequired(_) => {
            (StatusCode::FORBIDDEN, "supervisor_approval_required")
        }
        DomainError::InvariantViolation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation"),
        DomainError::InvalidId(_) => (StatusCode::BAD_REQUEST, "invalid_id"),
    };
    json_error(status, code, message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path segment with the type's `FromStr`, answering 400 on failure.
pub fn parse_path<T>(raw: &str, what: &'static str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr,
{
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what}: '{raw}'")))
}
