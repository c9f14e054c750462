//! API error type and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error body across all endpoints and
//! maps the internal error taxonomy to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use skylark_core::SkylarkError;
use skylark_dialogue::DialogueError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid input.
    BadRequest(String),
    /// 401 Unauthorized - caller identity could not be established.
    Unauthorized(String),
    /// 403 Forbidden - caller identity established but not allowed.
    Forbidden(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 409 Conflict - state conflict (e.g., booking already cancelled).
    Conflict(String),
    /// 429 Too Many Requests - rate limit exceeded.
    RateLimited,
    /// 502 Bad Gateway - an upstream collaborator failed.
    BadGateway(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "too_many_requests",
                "Rate limit exceeded".to_string(),
            ),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<SkylarkError> for ApiError {
    fn from(err: SkylarkError) -> Self {
        match err {
            SkylarkError::Validation(msg) => ApiError::BadRequest(msg),
            SkylarkError::NotFound(msg) => ApiError::NotFound(msg),
            SkylarkError::Conflict(msg) => ApiError::Conflict(msg),
            SkylarkError::RateLimited => ApiError::RateLimited,
            SkylarkError::Authentication(msg) => ApiError::Unauthorized(msg),
            SkylarkError::Authorization(msg) => ApiError::Forbidden(msg),
            SkylarkError::ExternalService { service, reason } => {
                ApiError::BadGateway(format!("'{service}' failed: {reason}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DialogueError> for ApiError {
    fn from(err: DialogueError) -> Self {
        ApiError::from(SkylarkError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn rendered(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_codes_per_variant() {
        let cases = [
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (ApiError::BadGateway("x".into()), StatusCode::BAD_GATEWAY),
            (
                ApiError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let (status, _) = rendered(err).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn test_body_shape() {
        let (_, body) = rendered(ApiError::NotFound("session 's9'".into())).await;
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], "session 's9'");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_taxonomy_mapping() {
        let (status, body) =
            rendered(SkylarkError::Validation("message must not be empty".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");

        let (status, _) = rendered(
            SkylarkError::ExternalService {
                service: "flight-search".into(),
                reason: "circuit open".into(),
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, _) = rendered(SkylarkError::Storage("lock poisoned".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_dialogue_errors_map_through_taxonomy() {
        let (status, _) = rendered(DialogueError::EmptyMessage.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = rendered(
            DialogueError::IncompleteBooking {
                missing: "passenger_info".into(),
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("passenger_info"));
    }
}
