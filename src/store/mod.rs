//! Per-user persistence of Mercado Livre OAuth tokens.
//!
//! The store is injected behind a trait so handlers never depend on a
//! concrete backend; the process ships with an in-memory map, and a shared
//! external store can be slotted in for horizontally scaled deployments.

mod memory;

pub use memory::MemoryTokenStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::oauth::TokenSet;

/// Stored OAuth tokens for one connected user. Upserted whenever a code
/// exchange or refresh succeeds; removed only by an explicit disconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub scope: Option<String>,
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Build a record from a token-endpoint response, stamping expiry from
    /// the current wall clock.
    pub fn from_token_set(user_id: &str, tokens: &TokenSet) -> Self {
        let now = Utc::now();
        let expires_in = tokens.expires_in.unwrap_or(0);

        TokenRecord {
            user_id: user_id.to_string(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            token_type: tokens
                .token_type
                .clone()
                .unwrap_or_else(|| "Bearer".into()),
            scope: tokens.scope.clone(),
            expires_in,
            expires_at: now + chrono::Duration::seconds(expires_in as i64),
            updated_at: now,
        }
    }
}

/// Storage-layer failure. The memory backend is infallible, but callers
/// treat persistence as best-effort, so the trait surfaces errors instead of
/// panicking inside a backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Token store backend error: {0}")]
    Backend(String),
}

/// Durable (for the process lifetime, at minimum) token storage keyed by
/// user id. Single-key upserts and deletes only; no cross-key transactions.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<TokenRecord>, StoreError>;
    async fn put(&self, record: TokenRecord) -> Result<(), StoreError>;
    async fn delete(&self, user_id: &str) -> Result<(), StoreError>;
}
