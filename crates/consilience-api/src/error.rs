//! HTTP error mapping.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};

use consilience_core::defaults;
use consilience_core::Error;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    RateLimited { retry_after_secs: u64 },
    Internal {
        error: String,
        details: Option<String>,
    },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::AnalysisNotFound(_) => ApiError::NotFound("Analysis not found".to_string()),
            Error::NoDocuments(_) => ApiError::NotFound("No papers found for analysis".to_string()),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::RateLimited { retry_after_secs } => ApiError::RateLimited { retry_after_secs },
            Error::Synthesis(msg) => ApiError::Internal {
                error: msg,
                details: None,
            },
            Error::Database(sqlx_err) => {
                let msg = sqlx_err.to_string();
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    return ApiError::Conflict("An analysis with this id already exists".to_string());
                }
                ApiError::Internal {
                    error: defaults::SYNTHESIS_FAILED_MESSAGE.to_string(),
                    details: Some(msg),
                }
            }
            other => ApiError::Internal {
                error: "An unexpected error occurred".to_string(),
                details: Some(other.to_string()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        match self {
            ApiError::RateLimited { retry_after_secs } => {
                let body = Json(serde_json::json!({
                    "error": Error::RateLimited { retry_after_secs }.to_string(),
                    "retryAfterSeconds": retry_after_secs,
                }));
                let mut response = (status, body).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            ApiError::Internal { error, details } => {
                let mut body = serde_json::json!({ "error": error });
                if let Some(details) = details {
                    body["details"] = serde_json::Value::String(details);
                }
                (status, Json(body)).into_response()
            }
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Conflict(msg) => {
                (status, Json(serde_json::json!({ "error": msg }))).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping_status_codes() {
        assert_eq!(
            ApiError::from(Error::AnalysisNotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(Error::NoDocuments("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(Error::InvalidInput("bad".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(Error::RateLimited {
                retry_after_secs: 12
            })
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::from(Error::Inference("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limited_response_sets_retry_after() {
        let response = ApiError::RateLimited {
            retry_after_secs: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn test_synthesis_error_keeps_message() {
        match ApiError::from(Error::Synthesis(defaults::TIMEOUT_MESSAGE.to_string())) {
            ApiError::Internal { error, details } => {
                assert_eq!(error, defaults::TIMEOUT_MESSAGE);
                assert!(details.is_none());
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
