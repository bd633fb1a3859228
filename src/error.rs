use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the mercado-gateway service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // ── Request Errors ──────────────────────────────────────────────────
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Authorization header required")]
    Unauthorized,

    #[error("Invalid state parameter")]
    InvalidState,

    #[error("{0} not found")]
    NotFound(String),

    // ── Configuration ───────────────────────────────────────────────────
    #[error("Mercado Livre credentials not configured")]
    NotConfigured,

    // ── OAuth Errors ────────────────────────────────────────────────────
    #[error("Token exchange failed")]
    TokenExchange(String),

    #[error("Token refresh failed")]
    TokenRefresh(String),

    // ── Upstream Errors ─────────────────────────────────────────────────
    /// Network-level failure reaching the marketplace after exhausting retries.
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),

    /// Upstream answered with a non-success status; passed through unchanged.
    #[error("Mercado Livre API error")]
    Upstream { status: u16, details: String },

    // ── Internal ────────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, details) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", None),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            ApiError::InvalidState => (StatusCode::BAD_REQUEST, "invalid_state", None),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),
            ApiError::NotConfigured => (StatusCode::SERVICE_UNAVAILABLE, "not_configured", None),
            ApiError::TokenExchange(d) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "token_exchange_failed",
                Some(d.clone()),
            ),
            ApiError::TokenRefresh(d) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "token_refresh_failed",
                Some(d.clone()),
            ),
            ApiError::UpstreamFetch(_) => (StatusCode::BAD_GATEWAY, "upstream_fetch_failed", None),
            ApiError::Upstream { status, details } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                "upstream_error",
                Some(details.clone()),
            ),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        };

        let mut error = json!({
            "code": code,
            "message": self.to_string(),
        });
        if let Some(details) = details {
            error["details"] = json!(details);
        }

        (status, axum::Json(json!({ "error": error }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}
