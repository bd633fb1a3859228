use anyhow::{Context, Result};

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    pub base_url: String,

    // ── Mercado Livre OAuth ─────────────────────────────────────────────
    pub ml_client_id: Option<String>,
    pub ml_client_secret: Option<String>,
    pub ml_redirect_uri: String,
    pub ml_auth_url: String,
    pub ml_token_url: String,

    // ── Mercado Livre API ───────────────────────────────────────────────
    pub ml_api_base: String,
    pub ml_site_id: String,

    // ── Post-OAuth browser redirects ────────────────────────────────────
    /// Frontend page that receives the token triple after a successful flow.
    pub success_redirect: String,
    /// Frontend page that receives `?ml_error=<reason>` on failure.
    pub error_redirect: String,

    // ── Collaborators ───────────────────────────────────────────────────
    /// Identity-verification service endpoint (POST, bearer in the body).
    /// When absent, bearer credentials are not verified and resolution
    /// degrades to the explicit-id path.
    pub identity_verify_url: Option<String>,
    /// JSON file holding the local parts dataset used as fallback.
    pub local_parts_path: Option<String>,

    // ── Proxy tuning ────────────────────────────────────────────────────
    pub search_cache_ttl_secs: u64,
    pub detail_cache_ttl_secs: u64,
    pub fetch_retries: u32,
    pub fetch_base_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3001".into());

        Ok(Config {
            base_url: base_url.clone(),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3001".into())
                .parse()
                .context("Invalid PORT")?,

            ml_client_id: std::env::var("MERCADO_LIVRE_CLIENT_ID").ok(),
            ml_client_secret: std::env::var("MERCADO_LIVRE_CLIENT_SECRET").ok(),
            ml_redirect_uri: std::env::var("MERCADO_LIVRE_REDIRECT_URI")
                .unwrap_or_else(|_| format!("{base_url}/api/ml/callback")),
            ml_auth_url: std::env::var("MERCADO_LIVRE_AUTH_URL")
                .unwrap_or_else(|_| "https://auth.mercadolivre.com.br/authorization".into()),
            ml_token_url: std::env::var("MERCADO_LIVRE_TOKEN_URL")
                .unwrap_or_else(|_| "https://api.mercadolibre.com/oauth/token".into()),

            ml_api_base: std::env::var("MERCADO_LIVRE_API_BASE")
                .unwrap_or_else(|_| "https://api.mercadolibre.com".into()),
            ml_site_id: std::env::var("MERCADO_LIVRE_SITE_ID").unwrap_or_else(|_| "MLB".into()),

            success_redirect: std::env::var("ML_SUCCESS_REDIRECT")
                .unwrap_or_else(|_| "https://garagemsmart.com.br/#/ml/callback".into()),
            error_redirect: std::env::var("ML_ERROR_REDIRECT")
                .unwrap_or_else(|_| "https://garagemsmart.com.br/#/configuracoes".into()),

            identity_verify_url: std::env::var("IDENTITY_VERIFY_URL").ok(),
            local_parts_path: std::env::var("LOCAL_PARTS_PATH").ok(),

            search_cache_ttl_secs: env_u64("SEARCH_CACHE_TTL_SECS", 300)?,
            detail_cache_ttl_secs: env_u64("DETAIL_CACHE_TTL_SECS", 600)?,
            fetch_retries: env_u64("FETCH_RETRIES", 2)? as u32,
            fetch_base_delay_ms: env_u64("FETCH_BASE_DELAY_MS", 400)?,
        })
    }

    /// Upstream search URL for the configured site, e.g.
    /// `https://api.mercadolibre.com/sites/MLB/search`.
    pub fn search_url(&self) -> String {
        format!("{}/sites/{}/search", self.ml_api_base, self.ml_site_id)
    }

    /// Upstream item-detail URL for a product id.
    pub fn item_url(&self, id: &str) -> String {
        format!("{}/items/{}", self.ml_api_base, id)
    }
}

impl Default for Config {
    /// Localhost defaults with no credentials configured; primarily a base
    /// for tests to override.
    fn default() -> Self {
        let base_url = "http://localhost:3001".to_string();
        Config {
            host: "127.0.0.1".into(),
            port: 3001,
            ml_client_id: None,
            ml_client_secret: None,
            ml_redirect_uri: format!("{base_url}/api/ml/callback"),
            ml_auth_url: "https://auth.mercadolivre.com.br/authorization".into(),
            ml_token_url: "https://api.mercadolibre.com/oauth/token".into(),
            ml_api_base: "https://api.mercadolibre.com".into(),
            ml_site_id: "MLB".into(),
            success_redirect: "https://garagemsmart.com.br/#/ml/callback".into(),
            error_redirect: "https://garagemsmart.com.br/#/configuracoes".into(),
            identity_verify_url: None,
            local_parts_path: None,
            search_cache_ttl_secs: 300,
            detail_cache_ttl_secs: 600,
            fetch_retries: 2,
            fetch_base_delay_ms: 400,
            base_url,
        }
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(v) => v.parse().with_context(|| format!("Invalid {name}")),
        Err(_) => Ok(default),
    }
}
