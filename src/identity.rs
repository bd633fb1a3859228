//! Best-effort identity resolution for proxied requests.
//!
//! The resolved identity selects the stored OAuth token and partitions the
//! response cache. Resolution never fails: every rung degrades to the next,
//! down to anonymous, so public browsing keeps working when the identity
//! service is unavailable.

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::store::{TokenRecord, TokenStore};

/// How much trust the resolved identity carries.
///
/// `Unverified` comes from the plain `userId`/`x-user-id` convenience path:
/// good enough to partition caches and pick a stored token, never good
/// enough for an authorization decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Verified(String),
    Unverified(String),
    Anonymous,
}

impl Identity {
    /// Cache-partition label for this identity.
    pub fn cache_partition(&self) -> &str {
        match self {
            Identity::Verified(id) | Identity::Unverified(id) => id,
            Identity::Anonymous => crate::cache::PUBLIC_PARTITION,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::Verified(id) | Identity::Unverified(id) => Some(id),
            Identity::Anonymous => None,
        }
    }
}

/// Identity plus the stored token record it maps to, if any.
pub struct ResolvedIdentity {
    pub identity: Identity,
    pub token: Option<TokenRecord>,
}

impl ResolvedIdentity {
    pub fn anonymous() -> Self {
        Self {
            identity: Identity::Anonymous,
            token: None,
        }
    }

    /// Access token to attach to the proxied request, when one is stored.
    pub fn bearer(&self) -> Option<String> {
        self.token.as_ref().map(|t| t.access_token.clone())
    }
}

/// External identity-verification collaborator: accepts a bearer credential
/// and answers with the user id it belongs to, or rejects it.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_bearer(&self, token: &str) -> Result<String, ApiError>;
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    user_id: String,
}

/// HTTP-backed verifier posting `{"token": ...}` to the configured endpoint.
pub struct HttpIdentityVerifier {
    http: reqwest::Client,
    verify_url: String,
}

impl HttpIdentityVerifier {
    pub fn new(verify_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            verify_url,
        }
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify_bearer(&self, token: &str) -> Result<String, ApiError> {
        let response = self
            .http
            .post(&self.verify_url)
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await
            .map_err(|e| ApiError::Internal(format!("identity service unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(ApiError::Unauthorized);
        }

        let verified: VerifyResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Internal(format!("malformed identity response: {e}")))?;

        Ok(verified.user_id)
    }
}

/// Resolve the caller's identity, first match wins:
///
/// 1. Bearer credential in the Authorization header, checked against the
///    verifier collaborator.
/// 2. Explicit `userId` query parameter or `x-user-id` header (unverified).
/// 3. Anonymous.
pub async fn resolve(
    verifier: Option<&dyn IdentityVerifier>,
    tokens: &dyn TokenStore,
    headers: &HeaderMap,
    explicit_user_id: Option<&str>,
) -> ResolvedIdentity {
    if let (Some(verifier), Some(bearer)) = (verifier, bearer_from(headers)) {
        match verifier.verify_bearer(bearer).await {
            Ok(user_id) => {
                let token = tokens.get(&user_id).await.unwrap_or_default();
                return ResolvedIdentity {
                    identity: Identity::Verified(user_id),
                    token,
                };
            }
            Err(e) => debug!("Bearer verification failed, degrading: {e}"),
        }
    }

    let candidate = explicit_user_id
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get("x-user-id")
                .and_then(|v| v.to_str().ok())
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        });

    if let Some(user_id) = candidate {
        let token = tokens.get(&user_id).await.unwrap_or_default();
        return ResolvedIdentity {
            identity: Identity::Unverified(user_id),
            token,
        };
    }

    ResolvedIdentity::anonymous()
}

/// Strip the `Bearer ` prefix from an Authorization header, if present.
pub fn bearer_from(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
