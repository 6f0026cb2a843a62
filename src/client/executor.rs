//! Request executor with auth, retries and status mapping.

use crate::auth::{AccessToken, AuthProvider};
use crate::config::ObeliskConfig;
use crate::errors::{
    ClientError, ObeliskError, ObeliskResult, ResponseError, TransientError,
};
use crate::request::QueryPairs;
use crate::resilience::RetryExecutor;
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody};
use bytes::Bytes;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// One logical API call, re-sent as is on every attempt.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Full URL without query string.
    pub url: Url,
    /// Query parameters.
    pub query: QueryPairs,
    /// JSON body.
    pub body: Option<Bytes>,
}

impl ApiRequest {
    /// GET request.
    pub fn get(url: Url) -> Self {
        Self {
            method: HttpMethod::Get,
            url,
            query: QueryPairs::new(),
            body: None,
        }
    }

    /// POST request with a JSON body.
    pub fn post_json<T: Serialize + ?Sized>(url: Url, body: &T) -> ObeliskResult<Self> {
        let body = serde_json::to_vec(body).map_err(|e| {
            ObeliskError::Client(ClientError::InvalidRequest(format!(
                "Failed to serialize body: {}",
                e
            )))
        })?;
        Ok(Self {
            method: HttpMethod::Post,
            url,
            query: QueryPairs::new(),
            body: Some(Bytes::from(body)),
        })
    }

    /// Sets the query parameters.
    pub fn with_query(mut self, query: QueryPairs) -> Self {
        self.query = query;
        self
    }
}

/// Executes API calls.
///
/// Every call gets a bearer token from the auth provider, goes through the
/// transport and has its status mapped to the error taxonomy. A 401 triggers
/// exactly one token refresh and one re-send inside the same attempt, so it
/// never counts against the retry budget. Transient failures are handed to
/// the retry policy.
pub struct RequestExecutor {
    base_url: Url,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
    retry: RetryExecutor,
}

impl RequestExecutor {
    /// Creates a new request executor.
    pub fn new(
        config: &ObeliskConfig,
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout: config.timeout,
            transport,
            auth,
            retry: RetryExecutor::new(config.retry_policy.clone()),
        }
    }

    /// Appends path segments to the API root.
    pub fn endpoint(&self, segments: &[&str]) -> ObeliskResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ObeliskError::configuration("Base URL cannot have path segments"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Executes a call and returns the successful response.
    pub async fn execute(&self, request: &ApiRequest) -> ObeliskResult<HttpResponse> {
        self.retry.execute(|| self.attempt(request)).await
    }

    /// Executes a call that must answer with `expected`, and decodes the
    /// JSON body.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        expected: StatusCode,
    ) -> ObeliskResult<T> {
        let response = self.execute(request).await?;
        expect_status(&response, expected)?;
        decode(&response)
    }

    async fn attempt(&self, request: &ApiRequest) -> ObeliskResult<HttpResponse> {
        let token = self.auth.get_access_token().await?;

        match self.send(request, &token).await {
            Err(err) if err.is_auth_expiry() => {
                debug!(url = %request.url, "Bearer token rejected, refreshing");
                let token = self.auth.refresh_token(&token).await?;
                self.send(request, &token).await
            }
            other => other,
        }
    }

    async fn send(&self, request: &ApiRequest, token: &AccessToken) -> ObeliskResult<HttpResponse> {
        let mut http = HttpRequest::new(request.method, request.url.clone());
        http.query = request.query.clone();
        http.timeout = Some(self.timeout);

        let bearer = HeaderValue::from_str(&token.authorization_header()).map_err(|e| {
            ObeliskError::Client(ClientError::InvalidRequest(format!(
                "Invalid auth header: {}",
                e
            )))
        })?;
        http.headers.insert(AUTHORIZATION, bearer);
        http.headers
            .insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(body) = &request.body {
            http.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            http.body = RequestBody::Bytes(body.clone());
        }

        let response = self.transport.send(http).await?;

        if response.status.is_success() {
            Ok(response)
        } else {
            Err(map_status(&response))
        }
    }
}

/// Maps a non-success response to an error.
pub fn map_status(response: &HttpResponse) -> ObeliskError {
    let status = response.status;
    let message = response.text();

    warn!(status = status.as_u16(), "Obelisk returned an error status");

    match status {
        StatusCode::UNAUTHORIZED => ObeliskError::Client(ClientError::Unauthorized { message }),
        StatusCode::NOT_FOUND => ObeliskError::Client(ClientError::NotFound { message }),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            ObeliskError::Transient(TransientError::Server {
                status: status.as_u16(),
                message,
                attempts: 1,
            })
        }
        s if s.is_server_error() => ObeliskError::Transient(TransientError::Server {
            status: s.as_u16(),
            message,
            attempts: 1,
        }),
        s if s.is_client_error() => ObeliskError::Client(ClientError::Rejected {
            status: s.as_u16(),
            message,
        }),
        s => ObeliskError::Response(ResponseError::UnexpectedStatus {
            status: s.as_u16(),
            message,
        }),
    }
}

/// Fails unless the response has exactly the `expected` status.
pub fn expect_status(response: &HttpResponse, expected: StatusCode) -> ObeliskResult<()> {
    if response.status == expected {
        return Ok(());
    }
    warn!(
        status = response.status.as_u16(),
        expected = expected.as_u16(),
        "Unexpected status code"
    );
    Err(ObeliskError::Response(ResponseError::UnexpectedStatus {
        status: response.status.as_u16(),
        message: response.text(),
    }))
}

/// Decodes a JSON response body.
pub fn decode<T: DeserializeOwned>(response: &HttpResponse) -> ObeliskResult<T> {
    serde_json::from_slice(&response.body).map_err(|e| {
        warn!(error = %e, "Response cannot be decoded");
        ObeliskError::deserialization(format!("Failed to deserialize response: {}", e))
    })
}
