use std::time::Duration;

use reqwest::Method;
use tracing::warn;

use crate::error::ApiError;

/// Extra attempts after the first, unless the caller overrides.
const DEFAULT_RETRIES: u32 = 2;
/// First backoff sleep; doubles on each subsequent attempt.
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(400);
/// Hard per-attempt deadline so a hung upstream cannot stall a request
/// beyond the retry loop.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default request headers, applied unless the caller overrides the name.
const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("Accept", "application/json"),
    ("User-Agent", "Garagem-Smart-App/1.0"),
    ("Accept-Language", "pt-BR,pt;q=0.9,en;q=0.5"),
    ("Referer", "https://www.mercadolivre.com.br/"),
];

/// Options for a single upstream fetch.
pub struct FetchOptions {
    pub method: Method,
    /// Extra attempts beyond the first; `None` uses the client default.
    pub retries: Option<u32>,
    /// Header overrides; names given here suppress the matching default.
    pub headers: Vec<(&'static str, String)>,
    /// Bearer token to attach. Takes precedence over the inbound
    /// Authorization header.
    pub bearer: Option<String>,
    /// Form-encoded body (token-endpoint posts).
    pub form: Option<Vec<(&'static str, String)>>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            retries: None,
            headers: Vec::new(),
            bearer: None,
            form: None,
        }
    }
}

/// A completed upstream exchange. Non-success statuses are returned here for
/// the caller to classify, never raised as errors.
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// HTTP client for the marketplace with uniform resilience semantics:
/// default headers, optional bearer attachment, and retry-with-backoff on
/// 5xx responses and network-level failures. 4xx responses are returned to
/// the caller immediately, without retrying.
pub struct UpstreamClient {
    http: reqwest::Client,
    retries: u32,
    base_delay: Duration,
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES, DEFAULT_BASE_DELAY)
    }
}

impl UpstreamClient {
    /// Panics if the underlying HTTP client cannot be constructed (TLS
    /// backend failure); the per-attempt deadline is mandatory.
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("HTTP client construction failed");

        Self {
            http,
            retries,
            base_delay,
        }
    }

    /// Perform the request, retrying transient failures.
    ///
    /// `inbound_authorization` is the Authorization header of the request
    /// being proxied; it is forwarded only when `options.bearer` is absent.
    pub async fn fetch(
        &self,
        url: &str,
        inbound_authorization: Option<&str>,
        options: FetchOptions,
    ) -> Result<UpstreamResponse, ApiError> {
        let retries = options.retries.unwrap_or(self.retries);
        let mut attempt: u32 = 0;

        loop {
            let request = self.build_request(url, inbound_authorization, &options);

            let outcome = match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    if status < 500 {
                        return Ok(UpstreamResponse { status, body });
                    }
                    if attempt >= retries {
                        // Exhausted: the last 5xx goes back to the caller.
                        return Ok(UpstreamResponse { status, body });
                    }
                    format!("upstream returned {status}")
                }
                Err(e) => {
                    if attempt >= retries {
                        return Err(ApiError::UpstreamFetch(e.to_string()));
                    }
                    e.to_string()
                }
            };

            let delay = self.base_delay * 2u32.pow(attempt);
            warn!(
                "Upstream fetch attempt {}/{} failed ({outcome}), retrying in {delay:?}: {url}",
                attempt + 1,
                retries + 1,
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn build_request(
        &self,
        url: &str,
        inbound_authorization: Option<&str>,
        options: &FetchOptions,
    ) -> reqwest::RequestBuilder {
        let mut request = self.http.request(options.method.clone(), url);

        for (name, value) in DEFAULT_HEADERS {
            let overridden = options
                .headers
                .iter()
                .any(|(n, _)| n.eq_ignore_ascii_case(name));
            if !overridden {
                request = request.header(*name, *value);
            }
        }
        for (name, value) in &options.headers {
            request = request.header(*name, value);
        }

        if let Some(bearer) = &options.bearer {
            request = request.bearer_auth(bearer);
        } else if let Some(auth) = inbound_authorization {
            request = request.header("Authorization", auth);
        }

        if let Some(form) = &options.form {
            request = request.form(form);
        }

        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn fast_client() -> UpstreamClient {
        UpstreamClient::new(2, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn persistent_500_is_retried_exactly_retries_plus_one_times() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/search");
                then.status(500).body("boom");
            })
            .await;

        let response = fast_client()
            .fetch(&server.url("/search"), None, FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(response.status, 500);
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn client_errors_are_never_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/search");
                then.status(403).body(r#"{"code":"PA_UNAUTHORIZED_RESULT_FROM_POLICIES"}"#);
            })
            .await;

        let response = fast_client()
            .fetch(&server.url("/search"), None, FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(response.status, 403);
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn recovers_when_a_later_attempt_succeeds() {
        let server = MockServer::start_async().await;
        let failing = server
            .mock_async(|when, then| {
                when.method(GET).path("/flaky");
                then.status(502);
            })
            .await;

        let client = fast_client();
        let handle = {
            let url = server.url("/flaky");
            tokio::spawn(async move { client.fetch(&url, None, FetchOptions::default()).await })
        };

        // Let the first attempt fail, then swap in a healthy endpoint.
        tokio::time::sleep(Duration::from_millis(5)).await;
        failing.delete_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/flaky");
                then.status(200).body(r#"{"ok":true}"#);
            })
            .await;

        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn explicit_bearer_takes_precedence_over_inbound_header() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/me")
                    .header("Authorization", "Bearer explicit-token");
                then.status(200).body("{}");
            })
            .await;

        fast_client()
            .fetch(
                &server.url("/me"),
                Some("Bearer inbound-token"),
                FetchOptions {
                    bearer: Some("explicit-token".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn inbound_authorization_is_forwarded_when_no_bearer_given() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/me")
                    .header("Authorization", "Bearer inbound-token")
                    .header("Accept", "application/json");
                then.status(200).body("{}");
            })
            .await;

        fast_client()
            .fetch(
                &server.url("/me"),
                Some("Bearer inbound-token"),
                FetchOptions::default(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn network_failure_surfaces_as_upstream_fetch_error() {
        // Nothing listens on this port.
        let result = UpstreamClient::new(0, Duration::from_millis(1))
            .fetch("http://127.0.0.1:1/down", None, FetchOptions::default())
            .await;

        assert!(matches!(result, Err(ApiError::UpstreamFetch(_))));
    }
}
