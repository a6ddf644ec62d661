use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use usageledger_core::error::{CatalogueError, QueryError, StoreError};
use usageledger_security::AuthzError;

/// Errors the HTTP layer maps directly to a status code and, where the
/// contract names one, a specific cache header (§4.8, §7).
pub enum ApiError {
    Authz(AuthzError),
    Query(QueryError),
    Catalogue(CatalogueError),
    SkuNotFound,
}

impl From<AuthzError> for ApiError {
    fn from(e: AuthzError) -> Self {
        ApiError::Authz(e)
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        ApiError::Query(e)
    }
}

impl From<CatalogueError> for ApiError {
    fn from(e: CatalogueError) -> Self {
        ApiError::Catalogue(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Authz(e) => {
                let status = if e.is_bad_request() { StatusCode::BAD_REQUEST } else { StatusCode::UNAUTHORIZED };
                tracing::info!(error = %e, "authz failure");
                (status, axum::Json(json!({ "detail": e.to_string() }))).into_response()
            }
            ApiError::SkuNotFound => {
                let mut response =
                    (StatusCode::NOT_FOUND, axum::Json(json!({ "detail": "SKU not known" }))).into_response();
                response
                    .headers_mut()
                    .insert(axum::http::header::CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
                response
            }
            ApiError::Query(QueryError::Store(StoreError::Transient(e))) => {
                tracing::warn!(error = %e, "transient store error serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(json!({ "detail": "internal error" })))
                    .into_response()
            }
            ApiError::Query(e) => {
                tracing::warn!(error = %e, "query error serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(json!({ "detail": "internal error" })))
                    .into_response()
            }
            ApiError::Catalogue(e) => {
                tracing::warn!(error = %e, "catalogue error serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(json!({ "detail": "internal error" })))
                    .into_response()
            }
        }
    }
}
