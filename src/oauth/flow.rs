//! Authorization-code flow orchestration: authorize → callback → token
//! exchange → refresh, plus the best-effort token persistence that follows
//! a successful exchange.

use tracing::{error, info};

use super::TokenSet;
use crate::error::ApiError;
use crate::store::TokenRecord;
use crate::AppState;

/// Start an authorization flow for `user_id`: issue a CSRF state token and
/// build the provider authorization URL. Per-user state machine:
/// `Unauthenticated → PendingAuthorization`.
pub async fn initiate_authorization(
    app: &AppState,
    user_id: &str,
) -> Result<(String, String), ApiError> {
    if user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("userId required".into()));
    }
    if !app.oauth.is_configured() {
        return Err(ApiError::NotConfigured);
    }

    let state = app.states.issue(user_id).await;
    let auth_url = app.oauth.authorization_url(&state)?;

    info!("ML OAuth initiated for userId={user_id}, state={state}");
    Ok((auth_url, state))
}

/// Complete the flow after the provider redirect: consume the state token
/// (single use — a replay can never match), exchange the code, and persist
/// the resulting tokens under the user recovered from the pending state.
pub async fn handle_callback(
    app: &AppState,
    code: &str,
    state: &str,
) -> Result<(String, TokenSet), ApiError> {
    let user_id = app.states.take(state).await.ok_or(ApiError::InvalidState)?;

    let tokens = app.oauth.exchange_code(&app.upstream, code, None).await?;
    persist_tokens(app, &user_id, &tokens).await;

    info!("ML OAuth successful for userId={user_id}");
    Ok((user_id, tokens))
}

/// Direct code exchange for API callers that manage their own redirect URI.
pub async fn exchange_code(
    app: &AppState,
    code: &str,
    redirect_uri: Option<&str>,
) -> Result<TokenSet, ApiError> {
    app.oauth
        .exchange_code(&app.upstream, code, redirect_uri)
        .await
}

/// Refresh an access token. A rejection leaves any stored record untouched;
/// the session is over and the user must re-run the authorize flow.
pub async fn refresh(app: &AppState, refresh_token: &str) -> Result<TokenSet, ApiError> {
    app.oauth.refresh_token(&app.upstream, refresh_token).await
}

/// Persist tokens for `user_id`. Persistence is best-effort: a storage
/// failure is logged and swallowed, because the OAuth exchange itself
/// already succeeded and the caller still gets the tokens.
pub async fn persist_tokens(app: &AppState, user_id: &str, tokens: &TokenSet) {
    let record = TokenRecord::from_token_set(user_id, tokens);
    if let Err(e) = app.tokens.put(record).await {
        error!("Failed to persist ML tokens for userId={user_id}: {e}");
    }
}
