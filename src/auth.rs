//! Bearer token providers.
//!
//! [`ClientCredentialsTokenProvider`] runs the OAuth2 client-credentials grant
//! and caches the token until shortly before it expires. The cache lives in
//! the provider, behind a `tokio::sync::Mutex`, so concurrent callers share
//! one token request.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::GraphConfig;
use crate::error::SyncError;
use crate::traits::TokenProvider;

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    renew_at: Instant,
}

pub struct ClientCredentialsTokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    renewal_margin: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsTokenProvider {
    pub fn new(http: reqwest::Client, config: &GraphConfig) -> Self {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            config.login_endpoint.trim_end_matches('/'),
            config.tenant_id
        );
        Self {
            http,
            token_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            renewal_margin: Duration::from_secs(config.token_renewal_margin_secs),
            cached: Mutex::new(None),
        }
    }

    async fn request_token(&self) -> Result<TokenResponse, SyncError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| SyncError::Auth(format!("invalid token response: {}", e)))
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsTokenProvider {
    async fn token(&self) -> Result<String, SyncError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.renew_at {
                return Ok(token.value.clone());
            }
        }

        let response = self.request_token().await?;
        let lifetime =
            Duration::from_secs(response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS));
        let renew_at = Instant::now() + lifetime.saturating_sub(self.renewal_margin);
        debug!(expires_in = lifetime.as_secs(), "acquired access token");

        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            renew_at,
        });
        Ok(response.access_token)
    }
}

/// A fixed, pre-acquired bearer token.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String, SyncError> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn graph_config(login_endpoint: &str, margin: u64) -> GraphConfig {
        GraphConfig {
            tenant_id: "tenant-1".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            endpoint: "http://unused".to_string(),
            login_endpoint: login_endpoint.to_string(),
            timeout_secs: 5,
            token_renewal_margin_secs: margin,
        }
    }

    #[tokio::test]
    async fn token_is_cached_between_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=client-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-abc",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider =
            ClientCredentialsTokenProvider::new(reqwest::Client::new(), &graph_config(&server.uri(), 300));
        assert_eq!(provider.token().await.unwrap(), "tok-abc");
        assert_eq!(provider.token().await.unwrap(), "tok-abc");
    }

    #[tokio::test]
    async fn token_inside_renewal_margin_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "short-lived",
                "expires_in": 60
            })))
            .expect(2)
            .mount(&server)
            .await;

        let provider =
            ClientCredentialsTokenProvider::new(reqwest::Client::new(), &graph_config(&server.uri(), 300));
        provider.token().await.unwrap();
        provider.token().await.unwrap();
    }

    #[tokio::test]
    async fn rejected_credentials_surface_as_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let provider =
            ClientCredentialsTokenProvider::new(reqwest::Client::new(), &graph_config(&server.uri(), 300));
        let err = provider.token().await.unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));
        assert!(err.to_string().contains("invalid_client"));
    }

    #[tokio::test]
    async fn static_token() {
        let provider = StaticTokenProvider::new("fixed");
        assert_eq!(provider.token().await.unwrap(), "fixed");
    }
}
