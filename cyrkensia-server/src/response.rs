//! Error responses and redirects

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::{debug, error};

use cyrkensia_core::{Error, ErrorClass};

pub const AUTH_REALM: &str = r#"Basic realm="Cyrkensia""#;

/// Per-request failure, rendered as `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    NotFound,
    Unauthorized,
    RangeNotSatisfiable(u64),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ApiError::NotFound => "not found",
            ApiError::Unauthorized => "unauthorized",
            ApiError::RangeNotSatisfiable(_) => "range not satisfiable",
            ApiError::Internal(_) => "internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(json!({ "error": self.message() }))).into_response();
        let headers = response.headers_mut();
        match &self {
            ApiError::Unauthorized => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(AUTH_REALM));
            }
            ApiError::RangeNotSatisfiable(size) => {
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                    headers.insert(header::CONTENT_RANGE, value);
                }
            }
            ApiError::Internal(detail) => error!("Request failed: {}", detail),
            ApiError::NotFound => {}
        }
        response
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err.class() {
            ErrorClass::NotFound => {
                // Traversal attempts land here too; only the log tells them apart
                debug!("Not found: {}", err);
                ApiError::NotFound
            }
            ErrorClass::Unauthorized => ApiError::Unauthorized,
            ErrorClass::Internal => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Error::from(err).into()
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("blocking task failed: {}", err))
    }
}

/// 301 Moved Permanently
pub fn redirect(location: &'static str) -> Response {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, HeaderValue::from_static(location))],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_carries_challenge() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], AUTH_REALM);
        assert_eq!(body_json(response).await["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_range_not_satisfiable_reports_size() {
        let response = ApiError::RangeNotSatisfiable(1234).into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1234");
    }

    #[test]
    fn test_core_errors_mapped_by_class() {
        assert!(matches!(ApiError::from(Error::PathSecurity("..".into())), ApiError::NotFound));
        assert!(matches!(ApiError::from(Error::NotFound("x".into())), ApiError::NotFound));
        assert!(matches!(ApiError::from(Error::AuthDenied), ApiError::Unauthorized));
        assert!(matches!(
            ApiError::from(Error::CatalogIo { path: "/x".into(), reason: "boom".into() }),
            ApiError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn test_internal_detail_not_leaked() {
        let response = ApiError::Internal("/srv/secret/path exploded".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "internal server error");
    }

    #[test]
    fn test_redirect_is_permanent() {
        let response = redirect("https://example.org/");
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "https://example.org/");
    }
}
