//! Bearer-token acquisition for the Obelisk APIs.
//!
//! Obelisk uses the OAuth 2.0 client-credentials grant. [`TokenManager`]
//! exchanges the client id and secret for a short-lived bearer token, caches
//! it and refreshes it just before it expires.
//!
//! # Thread Safety
//!
//! The cache sits behind a single async mutex that is held for the whole
//! exchange. Concurrent callers that find the token stale queue up on the
//! lock; the first one performs the exchange and the rest find the fresh
//! token when they get in, so N callers cost one exchange.
//!
//! # Example
//!
//! ```no_run
//! use integrations_obelisk::auth::{AuthProvider, TokenManager};
//! use integrations_obelisk::config::ObeliskConfig;
//! use integrations_obelisk::transport::ReqwestTransport;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ObeliskConfig::builder().credentials("id", "secret").build()?;
//! let transport = Arc::new(ReqwestTransport::with_settings(
//!     Duration::from_secs(10),
//!     "my-app/1.0",
//! )?);
//! let manager = TokenManager::new(&config, transport);
//!
//! let token = manager.get_access_token().await?;
//! println!("{}", token.authorization_header());
//! # Ok(())
//! # }
//! ```

use crate::config::ObeliskConfig;
use crate::errors::{AuthenticationError, ObeliskResult};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport, RequestBody};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

/// OAuth grant type used by every Obelisk deployment.
pub const GRANT_TYPE: &str = "client_credentials";

/// Client id and secret.
#[derive(Clone)]
pub struct Credentials {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: SecretString,
}

impl Credentials {
    /// Creates new credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        }
    }

    /// `Basic` authorization header value for the token endpoint.
    pub fn basic_header(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.client_secret.expose_secret());
        format!("Basic {}", STANDARD.encode(raw))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Bearer token with its absolute expiry.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The token string.
    pub token: SecretString,

    /// Expiration time.
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Creates a new access token.
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: SecretString::new(token.into()),
            expires_at,
        }
    }

    /// True if the token is still usable for at least `grace` from now.
    pub fn is_valid(&self, grace: Duration) -> bool {
        let grace = chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::MAX);
        match Utc::now().checked_add_signed(grace) {
            Some(deadline) => self.expires_at > deadline,
            None => false,
        }
    }

    /// True if both values hold the same token string.
    pub fn same_token(&self, other: &AccessToken) -> bool {
        self.token.expose_secret() == other.token.expose_secret()
    }

    /// Returns the authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

/// Authentication provider abstraction.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Returns a token valid beyond the grace period, exchanging credentials
    /// if needed.
    async fn get_access_token(&self) -> ObeliskResult<AccessToken>;

    /// Replaces `rejected` after the server refused it.
    ///
    /// If another caller already replaced it, the newer token is returned
    /// without a second exchange.
    async fn refresh_token(&self, rejected: &AccessToken) -> ObeliskResult<AccessToken>;
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Client-credentials token manager with a single-flight cache.
///
/// The manager never retries a failed exchange on its own. Rejections and
/// malformed responses surface as [`AuthenticationError`]; transport
/// failures surface as transient errors so the caller's retry policy can
/// decide.
pub struct TokenManager {
    credentials: Credentials,
    token_url: Url,
    use_json: bool,
    grace_period: Duration,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
    cache: Mutex<Option<AccessToken>>,
}

impl TokenManager {
    /// Creates a token manager for the configured deployment.
    pub fn new(config: &ObeliskConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            credentials: config.credentials.clone(),
            token_url: config.token_url.clone(),
            use_json: config.kind.use_json_auth(),
            grace_period: config.grace_period,
            timeout: config.timeout,
            transport,
            cache: Mutex::new(None),
        }
    }

    /// The grace period in use.
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Returns the cached token without refreshing it.
    pub async fn cached_token(&self) -> Option<AccessToken> {
        self.cache.lock().await.clone()
    }

    #[cfg(test)]
    pub(crate) async fn seed(&self, token: AccessToken) {
        *self.cache.lock().await = Some(token);
    }

    async fn exchange(&self) -> ObeliskResult<AccessToken> {
        let mut request = HttpRequest::new(HttpMethod::Post, self.token_url.clone());
        request.timeout = Some(self.timeout);

        let basic = HeaderValue::from_str(&self.credentials.basic_header()).map_err(|e| {
            AuthenticationError::InvalidCredentials(format!(
                "Credentials cannot be used in a header: {}",
                e
            ))
        })?;
        request.headers.insert(AUTHORIZATION, basic);
        request
            .headers
            .insert(ACCEPT, HeaderValue::from_static("application/json"));

        let payload = TokenRequest {
            grant_type: GRANT_TYPE,
        };
        let body = if self.use_json {
            request
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            serde_json::to_vec(&payload).map_err(|e| {
                AuthenticationError::InvalidCredentials(format!("Failed to encode body: {}", e))
            })?
        } else {
            request.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
            serde_urlencoded::to_string(&payload)
                .map_err(|e| {
                    AuthenticationError::InvalidCredentials(format!(
                        "Failed to encode body: {}",
                        e
                    ))
                })?
                .into_bytes()
        };
        request.body = RequestBody::Bytes(Bytes::from(body));

        debug!(token_url = %self.token_url, "Exchanging client credentials");

        let response = self.transport.send(request).await?;

        if !response.status.is_success() {
            return Err(AuthenticationError::Rejected {
                status: response.status.as_u16(),
                message: response.text(),
            }
            .into());
        }

        let parsed: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| AuthenticationError::MalformedResponse(e.to_string()))?;

        if parsed.access_token.is_empty() {
            return Err(
                AuthenticationError::MalformedResponse("Empty access token".to_string()).into(),
            );
        }

        let expires_at = chrono::Duration::try_seconds(parsed.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthenticationError::MalformedResponse(format!(
                    "expires_in out of range: {}",
                    parsed.expires_in
                ))
            })?;
        let token = AccessToken::new(parsed.access_token, expires_at);

        if !token.is_valid(self.grace_period) {
            return Err(AuthenticationError::MalformedResponse(format!(
                "Token lifetime of {}s does not exceed the {}s grace period",
                parsed.expires_in,
                self.grace_period.as_secs()
            ))
            .into());
        }

        debug!(expires_at = %token.expires_at, "Obtained access token");
        Ok(token)
    }

    /// Stores `fresh` unless the cache already holds a token that lives at
    /// least as long, and returns whatever the cache holds afterwards.
    fn store(cache: &mut Option<AccessToken>, fresh: AccessToken) -> AccessToken {
        match cache {
            Some(current) if current.expires_at >= fresh.expires_at => current.clone(),
            _ => {
                *cache = Some(fresh.clone());
                fresh
            }
        }
    }
}

#[async_trait]
impl AuthProvider for TokenManager {
    async fn get_access_token(&self) -> ObeliskResult<AccessToken> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref() {
            if token.is_valid(self.grace_period) {
                return Ok(token.clone());
            }
        }

        let fresh = self.exchange().await?;
        Ok(Self::store(&mut cache, fresh))
    }

    async fn refresh_token(&self, rejected: &AccessToken) -> ObeliskResult<AccessToken> {
        let mut cache = self.cache.lock().await;
        if let Some(current) = cache.as_ref() {
            if !current.same_token(rejected) && current.is_valid(self.grace_period) {
                debug!("Token already refreshed by another caller");
                return Ok(current.clone());
            }
            if current.same_token(rejected) {
                *cache = None;
            }
        }

        let fresh = self.exchange().await?;
        Ok(Self::store(&mut cache, fresh))
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("credentials", &self.credentials)
            .field("token_url", &self.token_url.as_str())
            .field("use_json", &self.use_json)
            .field("grace_period", &self.grace_period)
            .finish_non_exhaustive()
    }
}
