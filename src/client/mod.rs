//! Obelisk API client implementation.

use crate::auth::{AuthProvider, TokenManager};
use crate::config::{ObeliskConfig, ObeliskConfigBuilder, ObeliskKind};
use crate::errors::{ObeliskError, ObeliskResult};
use crate::resilience::RetryPolicy;
use crate::services::{CatalogService, CoreService, EventsService, ServiceContext};
use crate::transport::{HttpTransport, ReqwestTransport};
use std::sync::Arc;
use std::time::Duration;

mod executor;
pub use executor::{decode, expect_status, map_status, ApiRequest, RequestExecutor};

/// Asynchronous Obelisk client.
///
/// The client owns its transport and token cache. Services handed out by
/// [`core`](Self::core), [`events`](Self::events) and
/// [`catalog`](Self::catalog) share both, so a token fetched for one is
/// reused by all.
///
/// # Example
///
/// ```no_run
/// use integrations_obelisk::{ObeliskClient, ObeliskKind, QueryParams, DataType};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ObeliskClient::builder()
///     .kind(ObeliskKind::Core)
///     .credentials("client_id", "client_secret")
///     .build()?;
///
/// let params = QueryParams::new("my-dataset")
///     .data_type(DataType::Number)
///     .limit(500);
/// let points = client.core()?.query(&params).await?;
/// # Ok(())
/// # }
/// ```
pub struct ObeliskClient {
    config: ObeliskConfig,
    auth: Arc<TokenManager>,
    ctx: ServiceContext,
}

impl ObeliskClient {
    /// Creates a client that talks HTTP through reqwest.
    pub fn new(config: ObeliskConfig) -> ObeliskResult<Self> {
        config.validate()?;

        let transport = ReqwestTransport::with_settings(config.connect_timeout, &config.user_agent)
            .map_err(|e| ObeliskError::configuration(format!("Failed to create transport: {}", e)))?;

        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a client on top of a custom transport.
    pub fn with_transport(config: ObeliskConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let auth = Arc::new(TokenManager::new(&config, transport.clone()));
        let executor = Arc::new(RequestExecutor::new(
            &config,
            transport,
            auth.clone() as Arc<dyn AuthProvider>,
        ));
        let ctx = ServiceContext::new(&config, executor);

        Self { config, auth, ctx }
    }

    /// Creates a client for `kind` with credentials from the environment.
    pub fn from_env(kind: ObeliskKind) -> ObeliskResult<Self> {
        Self::builder().kind(kind).from_env().build()
    }

    /// Creates a new client builder.
    pub fn builder() -> ObeliskClientBuilder {
        ObeliskClientBuilder::new()
    }

    /// CORE query and ingest service.
    ///
    /// Fails with a configuration error on Classic and HFS clients.
    pub fn core(&self) -> ObeliskResult<CoreService> {
        self.ctx.require("core", &[ObeliskKind::Core])?;
        Ok(CoreService::new(self.ctx.clone()))
    }

    /// Events query and ingest service.
    ///
    /// Fails with a configuration error on CORE clients.
    pub fn events(&self) -> ObeliskResult<EventsService> {
        self.ctx
            .require("events", &[ObeliskKind::Classic, ObeliskKind::Hfs])?;
        Ok(EventsService::new(self.ctx.clone()))
    }

    /// Dataset metadata service. CORE only.
    pub fn catalog(&self) -> ObeliskResult<CatalogService> {
        self.ctx.require("catalog", &[ObeliskKind::Core])?;
        Ok(CatalogService::new(self.ctx.clone()))
    }

    /// Gets the configuration.
    pub fn config(&self) -> &ObeliskConfig {
        &self.config
    }

    /// Deployment flavour this client talks to.
    pub fn kind(&self) -> ObeliskKind {
        self.config.kind
    }

    /// Token cache shared by all services of this client.
    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.auth
    }

    /// Gets the request executor (for advanced use cases).
    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.ctx.executor
    }
}

impl std::fmt::Debug for ObeliskClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObeliskClient")
            .field("kind", &self.config.kind)
            .field("base_url", &self.config.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Builder for ObeliskClient.
pub struct ObeliskClientBuilder {
    config_builder: ObeliskConfigBuilder,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl ObeliskClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            config_builder: ObeliskConfig::builder(),
            transport: None,
        }
    }

    /// Sets the deployment flavour.
    pub fn kind(mut self, kind: ObeliskKind) -> Self {
        self.config_builder = self.config_builder.kind(kind);
        self
    }

    /// Sets the client credentials.
    pub fn credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.config_builder = self.config_builder.credentials(client_id, client_secret);
        self
    }

    /// Reads credentials from the environment.
    pub fn from_env(mut self) -> Self {
        self.config_builder = self.config_builder.from_env();
        self
    }

    /// Overrides the API root.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(url);
        self
    }

    /// Overrides the token endpoint.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.token_url(url);
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.timeout(timeout);
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.connect_timeout(timeout);
        self
    }

    /// Sets the token grace period.
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.config_builder = self.config_builder.grace_period(grace);
        self
    }

    /// Sets the retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config_builder = self.config_builder.retry_policy(policy);
        self
    }

    /// Overrides the page cap.
    pub fn page_cap(mut self, cap: usize) -> Self {
        self.config_builder = self.config_builder.page_cap(cap);
        self
    }

    /// Sets the user agent.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.user_agent(ua);
        self
    }

    /// Uses a custom transport instead of reqwest.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client.
    pub fn build(self) -> ObeliskResult<ObeliskClient> {
        let config = self.config_builder.build()?;
        match self.transport {
            Some(transport) => Ok(ObeliskClient::with_transport(config, transport)),
            None => ObeliskClient::new(config),
        }
    }
}

impl Default for ObeliskClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
