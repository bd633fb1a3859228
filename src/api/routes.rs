//! Endpoint handlers for the Mercado Livre integration.
//!
//! All handlers receive `SharedState` via Axum state extraction. Proxied
//! product endpoints run the same pipeline: resolve identity → consult the
//! response cache → fetch upstream → on a policy-agent block, substitute the
//! local catalog → populate the cache.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use url::Url;

use crate::cache::ResponseCache;
use crate::error::ApiError;
use crate::identity;
use crate::oauth::{self, urlencoding, TokenSet};
use crate::store::TokenRecord;
use crate::upstream::{classify_upstream_error, FetchOptions, UpstreamErrorKind};
use crate::{AppState, SharedState};

pub fn ml_router(state: SharedState) -> Router {
    Router::new()
        // ── OAuth flow ───────────────────────────────────────────────────
        .route("/auth", get(ml_auth))
        .route("/callback", get(ml_callback))
        .route("/token", post(ml_token))
        .route("/refresh", post(ml_refresh))
        .route("/user", get(ml_user))
        .route("/revoke", post(ml_revoke))
        // ── Proxied products ─────────────────────────────────────────────
        .route("/products/search", get(products_search))
        .route("/products/{id}", get(product_detail))
        .route("/products/category/{category_id}", get(category_search))
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

pub async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "mercado-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// OAuth Endpoints
// =============================================================================

#[derive(Deserialize)]
struct AuthQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// GET /api/ml/auth — Start the OAuth flow for a user.
async fn ml_auth(
    State(state): State<SharedState>,
    Query(q): Query<AuthQuery>,
) -> Result<Json<Value>, ApiError> {
    let user_id = q
        .user_id
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("userId required".into()))?;

    let (auth_url, csrf_state) = oauth::initiate_authorization(&state, user_id).await?;

    Ok(Json(json!({ "authUrl": auth_url, "state": csrf_state })))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /api/ml/callback — OAuth redirect target.
///
/// This path is browser-navigated, so failures past basic validation are
/// surfaced as redirects carrying `?ml_error=<reason>` rather than JSON.
async fn ml_callback(
    State(state): State<SharedState>,
    Query(q): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    if let Some(provider_error) = q.error {
        warn!("ML OAuth authorize step rejected: {provider_error}");
        return Ok(error_redirect(&state, &provider_error));
    }

    let (Some(code), Some(csrf_state)) = (q.code, q.state) else {
        return Err(ApiError::BadRequest("code and state required".into()));
    };

    match oauth::handle_callback(&state, &code, &csrf_state).await {
        Ok((user_id, tokens)) => {
            let url = format!(
                "{}?access_token={}&refresh_token={}&expires_in={}&userId={}",
                state.config.success_redirect,
                urlencoding(&tokens.access_token),
                urlencoding(tokens.refresh_token.as_deref().unwrap_or_default()),
                tokens.expires_in.unwrap_or(0),
                urlencoding(&user_id),
            );
            Ok(Redirect::temporary(&url).into_response())
        }
        Err(e @ (ApiError::InvalidState | ApiError::BadRequest(_))) => Err(e),
        Err(ApiError::TokenExchange(details)) => {
            warn!("ML token exchange failed: {details}");
            Ok(error_redirect(&state, "token_exchange_failed"))
        }
        Err(e) => {
            warn!("ML callback error: {e}");
            Ok(error_redirect(&state, "internal_error"))
        }
    }
}

fn error_redirect(state: &AppState, reason: &str) -> Response {
    let url = format!(
        "{}?ml_error={}",
        state.config.error_redirect,
        urlencoding(reason)
    );
    Redirect::temporary(&url).into_response()
}

#[derive(Deserialize)]
struct TokenBody {
    code: Option<String>,
    #[serde(rename = "redirectUri")]
    redirect_uri: Option<String>,
    // Pre-obtained token persistence path.
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
    user_id: Option<String>,
}

/// POST /api/ml/token — Exchange an authorization code, or persist a token
/// the caller already obtained out of band.
async fn ml_token(
    State(state): State<SharedState>,
    Json(body): Json<TokenBody>,
) -> Result<Json<Value>, ApiError> {
    if let Some(code) = body.code.as_deref() {
        let tokens = oauth::exchange_code(&state, code, body.redirect_uri.as_deref()).await?;
        return Ok(Json(json!(tokens)));
    }

    if let Some(access_token) = body.access_token {
        let user_id = body
            .user_id
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("user_id required to persist a token".into()))?;

        let tokens = TokenSet {
            access_token,
            refresh_token: body.refresh_token,
            token_type: body.token_type,
            expires_in: body.expires_in,
            scope: body.scope,
            user_id: None,
        };
        state
            .tokens
            .put(TokenRecord::from_token_set(user_id, &tokens))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        return Ok(Json(json!({ "ok": true })));
    }

    Err(ApiError::BadRequest(
        "either code or access_token required".into(),
    ))
}

#[derive(Deserialize)]
struct RefreshBody {
    refresh_token: Option<String>,
}

/// POST /api/ml/refresh — Refresh an access token.
async fn ml_refresh(
    State(state): State<SharedState>,
    Json(body): Json<RefreshBody>,
) -> Result<Json<Value>, ApiError> {
    let refresh_token = body
        .refresh_token
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("refresh_token required".into()))?;

    let tokens = oauth::refresh(&state, refresh_token).await?;
    Ok(Json(json!(tokens)))
}

/// GET /api/ml/user — Fetch the upstream profile for the presented bearer.
async fn ml_user(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let authorization = raw_authorization(&headers).ok_or(ApiError::Unauthorized)?;

    let url = format!("{}/users/me", state.config.ml_api_base);
    let response = state
        .upstream
        .fetch(&url, Some(authorization), FetchOptions::default())
        .await?;

    if !response.is_success() {
        return Err(ApiError::Upstream {
            status: response.status,
            details: response.body,
        });
    }

    Ok(Json(response.json()))
}

/// POST /api/ml/revoke — Informational revoke.
///
/// Mercado Livre has no revoke endpoint; the token expires naturally. The
/// acknowledgement is local only.
async fn ml_revoke(headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    raw_authorization(&headers).ok_or(ApiError::Unauthorized)?;

    Ok(Json(json!({
        "success": true,
        "message": "Token will expire naturally",
    })))
}

// =============================================================================
// Proxied Product Endpoints
// =============================================================================

const DEFAULT_LIMIT: usize = 50;

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
    category: Option<String>,
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// GET /api/ml/products/search — Proxied, cached product search.
async fn products_search(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Value>, ApiError> {
    let query = q
        .q
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Query parameter \"q\" is required".into()))?;
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT);
    let offset = q.offset.unwrap_or(0);

    let mut url = parse_url(&state.config.search_url())?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("q", query);
        pairs.append_pair("limit", &limit.to_string());
        pairs.append_pair("offset", &offset.to_string());
        if let Some(category) = q.category.as_deref() {
            pairs.append_pair("category", category);
        }
    }

    proxied_search(
        &state,
        &headers,
        url,
        q.user_id.as_deref(),
        query,
        limit,
        offset,
    )
    .await
}

#[derive(Deserialize)]
struct DetailQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// GET /api/ml/products/{id} — Proxied, cached product detail.
async fn product_detail(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(q): Query<DetailQuery>,
) -> Result<Json<Value>, ApiError> {
    let url = state.config.item_url(&id);

    let resolved = identity::resolve(
        state.verifier.as_deref(),
        state.tokens.as_ref(),
        &headers,
        q.user_id.as_deref(),
    )
    .await;

    let key = ResponseCache::key(&url, resolved.identity.cache_partition());
    if let Some(hit) = state.cache.get(&key).await {
        return Ok(Json(hit));
    }

    // Only the resolved token may shape this response: an inbound bearer the
    // resolver could not attribute would be cached under `public`.
    let response = state
        .upstream
        .fetch(
            &url,
            None,
            FetchOptions {
                bearer: resolved.bearer(),
                ..Default::default()
            },
        )
        .await?;

    if response.is_success() {
        let payload = response.json();
        state
            .cache
            .put(key, payload.clone(), state.detail_cache_ttl())
            .await;
        return Ok(Json(payload));
    }

    match classify_upstream_error(response.status, &response.body) {
        UpstreamErrorKind::PolicyBlocked => {
            warn!("ML policy block on product {id}, serving local catalog");
            let payload = state
                .catalog
                .product_detail(&id)
                .ok_or_else(|| ApiError::NotFound("Product".into()))?;
            state
                .cache
                .put(key, payload.clone(), state.detail_cache_ttl())
                .await;
            Ok(Json(payload))
        }
        UpstreamErrorKind::Other => Err(ApiError::Upstream {
            status: response.status,
            details: response.body,
        }),
    }
}

#[derive(Deserialize)]
struct CategoryQuery {
    limit: Option<usize>,
    offset: Option<usize>,
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// GET /api/ml/products/category/{category_id} — Proxied category search.
async fn category_search(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(category_id): Path<String>,
    Query(q): Query<CategoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT);
    let offset = q.offset.unwrap_or(0);

    let mut url = parse_url(&state.config.search_url())?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("category", &category_id);
        pairs.append_pair("limit", &limit.to_string());
        pairs.append_pair("offset", &offset.to_string());
    }

    proxied_search(
        &state,
        &headers,
        url,
        q.user_id.as_deref(),
        &category_id,
        limit,
        offset,
    )
    .await
}

// =============================================================================
// Proxy pipeline
// =============================================================================

/// Shared pipeline for the search-shaped endpoints: cache lookup, resilient
/// fetch, policy-block substitution with the local catalog, cache populate.
#[allow(clippy::too_many_arguments)]
async fn proxied_search(
    state: &AppState,
    headers: &HeaderMap,
    url: Url,
    explicit_user_id: Option<&str>,
    fallback_query: &str,
    limit: usize,
    offset: usize,
) -> Result<Json<Value>, ApiError> {
    let resolved = identity::resolve(
        state.verifier.as_deref(),
        state.tokens.as_ref(),
        headers,
        explicit_user_id,
    )
    .await;

    let key = ResponseCache::key(url.as_str(), resolved.identity.cache_partition());
    if let Some(hit) = state.cache.get(&key).await {
        return Ok(Json(hit));
    }

    // Same rule as product detail: never forward an inbound bearer the
    // resolver could not attribute, or its response would land in the
    // `public` partition.
    let response = state
        .upstream
        .fetch(
            url.as_str(),
            None,
            FetchOptions {
                bearer: resolved.bearer(),
                ..Default::default()
            },
        )
        .await?;

    let payload = if response.is_success() {
        normalize_search(response.json())
    } else {
        match classify_upstream_error(response.status, &response.body) {
            UpstreamErrorKind::PolicyBlocked => {
                warn!("ML policy block on search, serving local catalog");
                state.catalog.search(fallback_query, limit, offset)
            }
            UpstreamErrorKind::Other => {
                return Err(ApiError::Upstream {
                    status: response.status,
                    details: response.body,
                });
            }
        }
    };

    state
        .cache
        .put(key, payload.clone(), state.search_cache_ttl())
        .await;
    Ok(Json(payload))
}

/// Normalize an upstream search payload to the stable shape the frontend
/// consumes, tolerating missing fields.
fn normalize_search(data: Value) -> Value {
    let total = data["paging"]["total"].as_u64().unwrap_or(0);
    json!({
        "results": data.get("results").cloned().unwrap_or_else(|| json!([])),
        "paging": data.get("paging").cloned().unwrap_or_else(|| json!({})),
        "filters": data.get("filters").cloned().unwrap_or_else(|| json!([])),
        "available_filters": data.get("available_filters").cloned().unwrap_or_else(|| json!([])),
        "total": total,
    })
}

fn raw_authorization(headers: &HeaderMap) -> Option<&str> {
    headers.get("authorization").and_then(|v| v.to_str().ok())
}

fn parse_url(raw: &str) -> Result<Url, ApiError> {
    Url::parse(raw).map_err(|e| ApiError::Internal(format!("invalid upstream URL {raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_search_tolerates_missing_fields() {
        let normalized = normalize_search(json!({}));
        assert_eq!(normalized["results"], json!([]));
        assert_eq!(normalized["total"], 0);
    }

    #[test]
    fn normalize_search_lifts_total_from_paging() {
        let normalized = normalize_search(json!({
            "results": [{"id": "MLB1"}],
            "paging": {"total": 1234, "limit": 50, "offset": 0},
        }));
        assert_eq!(normalized["total"], 1234);
        assert_eq!(normalized["results"][0]["id"], "MLB1");
    }
}
