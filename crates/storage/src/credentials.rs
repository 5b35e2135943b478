// Access tokens for the remote backends
//
// Every remote call asks its token source for a bearer token. Sources are
// expected to cache; a failure to produce a token fails the in-flight call.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{Result, StorageError};

const DEFAULT_METADATA_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before they expire
const REFRESH_MARGIN_SECS: i64 = 60;

#[async_trait]
pub trait AccessTokenSource: Send + Sync + 'static {
    async fn access_token(&self) -> Result<String>;
}

/// A fixed token, for local testing against a real endpoint
#[derive(Clone)]
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenSource")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl AccessTokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String> {
        if self.token.is_empty() {
            return Err(StorageError::credentials("static access token is empty"));
        }
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Service-account token from the compute metadata server, cached until
/// shortly before expiry
pub struct MetadataServerTokenSource {
    client: reqwest::Client,
    url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataServerTokenSource {
    pub fn new() -> Self {
        Self::with_url(DEFAULT_METADATA_URL)
    }

    /// Use a custom token endpoint
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| StorageError::credentials(format!("metadata server unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::credentials(format!(
                "metadata server returned {}",
                status.as_u16()
            )));
        }

        let body: MetadataTokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::credentials(format!("invalid token response: {e}")))?;
        if body.access_token.is_empty() {
            return Err(StorageError::credentials(
                "metadata server returned an empty token",
            ));
        }

        let expires_at = Duration::try_seconds(body.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                StorageError::credentials(format!(
                    "token lifetime out of range: {}s",
                    body.expires_in
                ))
            })?;

        Ok(CachedToken {
            value: body.access_token,
            expires_at,
        })
    }
}

impl Default for MetadataServerTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessTokenSource for MetadataServerTokenSource {
    async fn access_token(&self) -> Result<String> {
        // Held across the fetch so concurrent callers share one refresh.
        let mut cached = self.cached.lock().await;
        let refresh_at = Utc::now() + Duration::seconds(REFRESH_MARGIN_SECS);
        if let Some(token) = cached.as_ref() {
            if token.expires_at > refresh_at {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("Fetching access token from metadata server");
        let token = self.fetch().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_static_token() {
        let source = StaticTokenSource::new("abc");
        assert_eq!(source.access_token().await.unwrap(), "abc");

        let empty = StaticTokenSource::new("");
        assert!(matches!(
            empty.access_token().await,
            Err(StorageError::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn test_metadata_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "tok-1", "expires_in": 3600})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let source = MetadataServerTokenSource::with_url(format!("{}/token", server.uri()));
        assert_eq!(source.access_token().await.unwrap(), "tok-1");
        assert_eq!(source.access_token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn test_metadata_token_near_expiry_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "short", "expires_in": 30})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let source = MetadataServerTokenSource::with_url(format!("{}/token", server.uri()));
        source.access_token().await.unwrap();
        source.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_range_lifetime_is_credential_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "tok", "expires_in": i64::MAX})),
            )
            .mount(&server)
            .await;

        let source = MetadataServerTokenSource::with_url(format!("{}/token", server.uri()));
        let err = source.access_token().await.unwrap_err();
        assert!(matches!(err, StorageError::Credentials(_)));
    }

    #[tokio::test]
    async fn test_metadata_failure_is_credential_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = MetadataServerTokenSource::with_url(format!("{}/token", server.uri()));
        let err = source.access_token().await.unwrap_err();
        assert!(matches!(err, StorageError::Credentials(_)));
        assert!(err.is_remote_failure());
    }
}
