pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod oauth;
pub mod store;
pub mod upstream;

pub use config::Config;
pub use error::ApiError;

use std::sync::Arc;
use std::time::Duration;

use cache::ResponseCache;
use catalog::LocalCatalog;
use identity::{HttpIdentityVerifier, IdentityVerifier};
use oauth::{MlOAuthClient, StateStore};
use store::{MemoryTokenStore, TokenStore};
use upstream::UpstreamClient;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub oauth: MlOAuthClient,
    pub states: StateStore,
    pub tokens: Arc<dyn TokenStore>,
    pub cache: ResponseCache,
    pub catalog: LocalCatalog,
    pub upstream: UpstreamClient,
    pub verifier: Option<Arc<dyn IdentityVerifier>>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: Config, catalog: LocalCatalog) -> Self {
        let oauth = MlOAuthClient::from_config(&config);
        let upstream = UpstreamClient::new(
            config.fetch_retries,
            Duration::from_millis(config.fetch_base_delay_ms),
        );
        let verifier: Option<Arc<dyn IdentityVerifier>> = config
            .identity_verify_url
            .clone()
            .map(|url| Arc::new(HttpIdentityVerifier::new(url)) as Arc<dyn IdentityVerifier>);

        Self {
            config,
            oauth,
            states: StateStore::default(),
            tokens: Arc::new(MemoryTokenStore::default()),
            cache: ResponseCache::default(),
            catalog,
            upstream,
            verifier,
        }
    }

    pub fn search_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.config.search_cache_ttl_secs)
    }

    pub fn detail_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.config.detail_cache_ttl_secs)
    }
}
