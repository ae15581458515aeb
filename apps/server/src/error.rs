use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use marketcache_core::errors::{Error as CoreError, ErrorKind};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("{0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    kind: &'static str,
    message: String,
}

fn status_for(kind: ErrorKind) -> (StatusCode, &'static str) {
    match kind {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, "validation"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "notFound"),
        ErrorKind::Conflict => (StatusCode::CONFLICT, "conflict"),
        ErrorKind::ProviderRateLimit => (StatusCode::TOO_MANY_REQUESTS, "providerRateLimit"),
        ErrorKind::ProviderDailyLimit => (StatusCode::SERVICE_UNAVAILABLE, "providerDailyLimit"),
        ErrorKind::ProviderUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "providerUnavailable"),
        ErrorKind::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
        ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, retry_after) = match &self {
            ApiError::Core(e) => {
                let (status, kind) = status_for(e.kind());
                (status, kind, e.retry_after())
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation", None),
        };
        if status.is_server_error() {
            tracing::warn!("Request failed: {}", self);
        }

        let body = Json(ErrorBody {
            code: status.as_u16(),
            kind,
            message: self.to_string(),
        });
        let mut response = (status, body).into_response();
        if let Some(wait) = retry_after {
            // Round up so clients never retry early.
            let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use marketcache_market_data::ProviderError;
    use std::time::Duration;

    #[test]
    fn test_rate_limit_carries_retry_after() {
        let err = ApiError::from(CoreError::Provider(ProviderError::RateLimited {
            retry_after: Duration::from_millis(1500),
        }));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoreError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (CoreError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CoreError::Conflict("busy".into()), StatusCode::CONFLICT),
            (
                CoreError::Provider(ProviderError::DailyLimitExceeded {
                    message: "quota".into(),
                }),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (CoreError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
            assert!(response.headers().get(header::RETRY_AFTER).is_none());
        }
    }
}
