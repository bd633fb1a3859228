use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ApiError;
use crate::upstream::{FetchOptions, UpstreamClient};

/// A set of tokens returned by the Mercado Livre token endpoint after a code
/// exchange or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
    /// Numeric Mercado Livre account id, echoed back by the token endpoint.
    pub user_id: Option<i64>,
}

/// Mercado Livre OAuth 2.0 client.
///
/// Quirks:
/// - No PKCE on the classic authorization-code flow.
/// - Token responses carry a numeric `user_id` for the ML account.
/// - There is no revoke endpoint; tokens expire naturally (~6h).
pub struct MlOAuthClient {
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_url: String,
    token_url: String,
    redirect_uri: String,
}

impl MlOAuthClient {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client_id: config.ml_client_id.clone(),
            client_secret: config.ml_client_secret.clone(),
            auth_url: config.ml_auth_url.clone(),
            token_url: config.ml_token_url.clone(),
            redirect_uri: config.ml_redirect_uri.clone(),
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    fn credentials(&self) -> Result<(&str, &str), ApiError> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(ApiError::NotConfigured),
        }
    }

    /// Build the authorization URL the end user is redirected to.
    pub fn authorization_url(&self, state: &str) -> Result<String, ApiError> {
        let (client_id, _) = self.credentials()?;

        Ok(format!(
            "{base}?response_type=code\
             &client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &state={state}",
            base = self.auth_url,
            client_id = urlencoding(client_id),
            redirect_uri = urlencoding(&self.redirect_uri),
            state = urlencoding(state),
        ))
    }

    /// Exchange an authorization code for tokens
    /// (`grant_type=authorization_code`).
    pub async fn exchange_code(
        &self,
        upstream: &UpstreamClient,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<TokenSet, ApiError> {
        let (client_id, client_secret) = self.credentials()?;
        let redirect_uri = redirect_uri.unwrap_or(&self.redirect_uri);

        let form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("client_id", client_id.to_string()),
            ("client_secret", client_secret.to_string()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
        ];

        self.token_request(upstream, form, ApiError::TokenExchange)
            .await
    }

    /// Obtain a fresh access token (`grant_type=refresh_token`). A rejection
    /// here is terminal for the session; the caller must re-authorize.
    pub async fn refresh_token(
        &self,
        upstream: &UpstreamClient,
        refresh_token: &str,
    ) -> Result<TokenSet, ApiError> {
        let (client_id, client_secret) = self.credentials()?;

        let form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("client_id", client_id.to_string()),
            ("client_secret", client_secret.to_string()),
            ("refresh_token", refresh_token.to_string()),
        ];

        self.token_request(upstream, form, ApiError::TokenRefresh)
            .await
    }

    async fn token_request(
        &self,
        upstream: &UpstreamClient,
        form: Vec<(&'static str, String)>,
        reject: fn(String) -> ApiError,
    ) -> Result<TokenSet, ApiError> {
        let response = upstream
            .fetch(
                &self.token_url,
                None,
                FetchOptions {
                    method: Method::POST,
                    form: Some(form),
                    ..Default::default()
                },
            )
            .await?;

        if !response.is_success() {
            return Err(reject(response.body));
        }

        serde_json::from_str(&response.body)
            .map_err(|e| reject(format!("malformed token response: {e}")))
    }
}

/// Percent-encode a query-string value.
pub(crate) fn urlencoding(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
