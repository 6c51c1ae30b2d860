use axum::{http::StatusCode, response::IntoResponse, Json};
use smscore::lifecycle::StateError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal,
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "database error");
        ApiError::Internal
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "internal error");
        ApiError::Internal
    }
}

/// State-machine violations surface as conflicts, missing-field guards as
/// bad requests.
impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::MissingReason => ApiError::BadRequest(err.to_string()),
            StateError::EmptyAudience
            | StateError::InvalidTransition { .. }
            | StateError::Immutable(_) => ApiError::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "state_conflict", msg),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Unexpected error".to_string(),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: ErrorBody {
                    code: code.to_string(),
                    message,
                },
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use smscore::types::CampaignStatus;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_state_conflict_response() {
        rt().block_on(async {
            let err: ApiError = StateError::Immutable(CampaignStatus::Running).into();
            let response = err.into_response();

            assert_eq!(response.status(), StatusCode::CONFLICT);

            let body = to_bytes(response.into_body(), 1024).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

            assert_eq!(json["error"]["code"], "state_conflict");
            assert_eq!(
                json["error"]["message"],
                "campaign is running and cannot be modified"
            );
        });
    }

    #[test]
    fn test_missing_reason_is_bad_request() {
        rt().block_on(async {
            let err: ApiError = StateError::MissingReason.into();
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        });
    }

    #[test]
    fn test_not_found_response() {
        rt().block_on(async {
            let err = ApiError::NotFound("campaign not found".to_string());
            let response = err.into_response();

            assert_eq!(response.status(), StatusCode::NOT_FOUND);

            let body = to_bytes(response.into_body(), 1024).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["error"]["code"], "not_found");
        });
    }
}
