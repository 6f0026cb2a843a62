//! Configuration for the Obelisk client.

use crate::auth::Credentials;
use crate::errors::{ConfigurationError, ObeliskError, ObeliskResult};
use crate::resilience::RetryPolicy;
use secrecy::ExposeSecret;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Environment variable holding the client id.
pub const CLIENT_ID_ENV: &str = "OBELISK_CLIENT_ID";

/// Environment variable holding the client secret.
pub const CLIENT_SECRET_ENV: &str = "OBELISK_CLIENT_SECRET";

/// Default grace period before token expiry at which a token is refreshed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Obelisk deployment flavour.
///
/// Each deployment has its own token endpoint, API root, token request
/// encoding and server-side page cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObeliskKind {
    /// Obelisk v3 ("classic").
    Classic,
    /// Obelisk high-frequency storage.
    Hfs,
    /// Obelisk CORE.
    Core,
}

impl ObeliskKind {
    /// Default OAuth token endpoint.
    pub fn token_url(&self) -> &'static str {
        match self {
            ObeliskKind::Classic => "https://obelisk.ilabt.imec.be/api/v3/auth/token",
            ObeliskKind::Hfs => {
                "https://obelisk-hfs.discover.ilabt.imec.be/auth/realms/obelisk-hfs/protocol/openid-connect/token"
            }
            ObeliskKind::Core => {
                "https://auth.obelisk.discover.ilabt.imec.be/realms/obelisk/protocol/openid-connect/token"
            }
        }
    }

    /// Default API root.
    pub fn root_url(&self) -> &'static str {
        match self {
            ObeliskKind::Classic => "https://obelisk.ilabt.imec.be/api/v3",
            ObeliskKind::Hfs => "https://obelisk-hfs.discover.ilabt.imec.be",
            ObeliskKind::Core => "https://obelisk.discover.ilabt.imec.be/datasets",
        }
    }

    /// Whether the token request body is JSON rather than form-encoded.
    pub fn use_json_auth(&self) -> bool {
        matches!(self, ObeliskKind::Classic)
    }

    /// Maximum number of items the server returns in one page.
    pub fn page_cap(&self) -> usize {
        match self {
            ObeliskKind::Core => 250,
            ObeliskKind::Classic | ObeliskKind::Hfs => 2500,
        }
    }
}

impl fmt::Display for ObeliskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObeliskKind::Classic => "classic",
            ObeliskKind::Hfs => "hfs",
            ObeliskKind::Core => "core",
        };
        f.write_str(name)
    }
}

/// Configuration for the Obelisk client.
#[derive(Debug, Clone)]
pub struct ObeliskConfig {
    /// Deployment flavour.
    pub kind: ObeliskKind,

    /// Client credentials used for the token exchange.
    pub credentials: Credentials,

    /// API root.
    pub base_url: Url,

    /// OAuth token endpoint.
    pub token_url: Url,

    /// Timeout for a single HTTP request.
    pub timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// How long before expiry a cached token is considered stale.
    pub grace_period: Duration,

    /// Retry policy for transient failures.
    pub retry_policy: RetryPolicy,

    /// Maximum page size requested from the server.
    pub page_cap: usize,

    /// User agent string.
    pub user_agent: String,
}

impl ObeliskConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ObeliskConfigBuilder {
        ObeliskConfigBuilder::new()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ObeliskResult<()> {
        if self.credentials.client_id.is_empty()
            || self.credentials.client_secret.expose_secret().is_empty()
        {
            return Err(ObeliskError::Configuration(
                ConfigurationError::MissingCredentials(
                    "Client id and secret must not be empty".to_string(),
                ),
            ));
        }

        for (name, url) in [("Base URL", &self.base_url), ("Token URL", &self.token_url)] {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ObeliskError::configuration(format!(
                    "{} must use http or https",
                    name
                )));
            }
        }

        if self.page_cap == 0 {
            return Err(ObeliskError::configuration("Page cap must be positive"));
        }

        if self.timeout.is_zero() {
            return Err(ObeliskError::configuration("Timeout must be positive"));
        }

        Ok(())
    }
}

/// Builder for ObeliskConfig.
pub struct ObeliskConfigBuilder {
    kind: ObeliskKind,
    credentials: Option<Credentials>,
    base_url: Option<String>,
    token_url: Option<String>,
    timeout: Duration,
    connect_timeout: Duration,
    grace_period: Duration,
    retry_policy: RetryPolicy,
    page_cap: Option<usize>,
    user_agent: Option<String>,
}

impl ObeliskConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            kind: ObeliskKind::Core,
            credentials: None,
            base_url: None,
            token_url: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            grace_period: DEFAULT_GRACE_PERIOD,
            retry_policy: RetryPolicy::NoRetry,
            page_cap: None,
            user_agent: None,
        }
    }

    /// Sets the deployment flavour.
    pub fn kind(mut self, kind: ObeliskKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the client credentials.
    pub fn credentials(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(client_id, client_secret));
        self
    }

    /// Reads credentials from `OBELISK_CLIENT_ID` and `OBELISK_CLIENT_SECRET`
    /// when both are set.
    pub fn from_env(mut self) -> Self {
        if let (Ok(id), Ok(secret)) = (
            std::env::var(CLIENT_ID_ENV),
            std::env::var(CLIENT_SECRET_ENV),
        ) {
            self.credentials = Some(Credentials::new(id, secret));
        }
        self
    }

    /// Overrides the API root.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Overrides the token endpoint.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the token grace period.
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Sets the retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Overrides the page cap of the deployment.
    pub fn page_cap(mut self, cap: usize) -> Self {
        self.page_cap = Some(cap);
        self
    }

    /// Sets the user agent string.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ObeliskResult<ObeliskConfig> {
        let credentials = self.credentials.ok_or_else(|| {
            ObeliskError::Configuration(ConfigurationError::MissingCredentials(
                "Client credentials are required".to_string(),
            ))
        })?;

        let base_url = parse_url(
            self.base_url.as_deref().unwrap_or(self.kind.root_url()),
            "base URL",
        )?;
        let token_url = parse_url(
            self.token_url.as_deref().unwrap_or(self.kind.token_url()),
            "token URL",
        )?;

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("integrations-obelisk/{}", env!("CARGO_PKG_VERSION")));

        let config = ObeliskConfig {
            kind: self.kind,
            credentials,
            base_url,
            token_url,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            grace_period: self.grace_period,
            retry_policy: self.retry_policy,
            page_cap: self.page_cap.unwrap_or(self.kind.page_cap()),
            user_agent,
        };

        config.validate()?;

        Ok(config)
    }
}

impl Default for ObeliskConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_url(raw: &str, what: &str) -> ObeliskResult<Url> {
    Url::parse(raw).map_err(|e| ObeliskError::configuration(format!("Invalid {}: {}", what, e)))
}
