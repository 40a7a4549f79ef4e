//! Resilient API client.
//!
//! Every request goes through the `BackoffExecutor`. A terminal 401/403 is
//! reported to the injected `UnauthorizedSink` before the error is returned,
//! so session recovery has been initiated by the time the caller's own error
//! handling runs.

// Author: kelexine (https://github.com/kelexine)

use crate::config::HttpConfig;
use crate::error::{RequestError, Result, SessionError};
use crate::events::UnauthorizedSink;
use crate::retry::{BackoffExecutor, ClassifyFailure, RetryConfig};
use crate::session::{DecodedSession, TokenInspector};
use crate::utils::logging::sanitize;
use parking_lot::RwLock;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use zeroize::Zeroizing;

pub struct ApiClient {
    http_client: Client,
    base_url: String,
    executor: BackoffExecutor,
    unauthorized: Arc<dyn UnauthorizedSink>,
    inspector: Arc<TokenInspector>,
    bearer_token: RwLock<Option<Zeroizing<String>>>,
}

impl ApiClient {
    /// Builds the client with connection pooling and per-attempt timeouts.
    pub fn new(
        config: &HttpConfig,
        retry: RetryConfig,
        unauthorized: Arc<dyn UnauthorizedSink>,
        inspector: Arc<TokenInspector>,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .pool_idle_timeout(Duration::from_secs(90))
            .use_rustls_tls()
            .build()
            .map_err(|e| SessionError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(
            http_client,
            &config.base_url,
            retry,
            unauthorized,
            inspector,
        ))
    }

    /// Wraps an existing `reqwest::Client`.
    pub fn with_client(
        http_client: Client,
        base_url: &str,
        retry: RetryConfig,
        unauthorized: Arc<dyn UnauthorizedSink>,
        inspector: Arc<TokenInspector>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            executor: BackoffExecutor::new(retry),
            unauthorized,
            inspector,
            bearer_token: RwLock::new(None),
        }
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sets or clears the bearer token attached to every request.
    pub fn set_bearer_token(&self, token: Option<String>) {
        *self.bearer_token.write() = token.map(Zeroizing::new);
    }

    /// Claims of the current bearer token, `None` if absent or unreadable.
    pub fn session_claims(&self) -> Option<DecodedSession> {
        let token = self.bearer_token.read();
        self.inspector.decode(token.as_deref().map(String::as_str))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, RequestError> {
        let response = self.send(Method::GET, path, None::<&()>).await?;
        decode_body(response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, RequestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(Method::POST, path, Some(body)).await?;
        decode_body(response).await
    }

    /// Sends a request under the retry policy and returns the successful
    /// response. Non-2xx responses come back as `RequestError::Status`.
    pub async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> std::result::Result<Response, RequestError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let started = Instant::now();

        let result = self
            .executor
            .execute(|| {
                let mut request = self.http_client.request(method.clone(), &url);
                if let Some(token) = self.bearer_token.read().as_deref() {
                    request = request.bearer_auth(token.as_str());
                }
                if let Some(body) = body {
                    request = request.json(body);
                }
                let method = method.as_str().to_string();

                async move {
                    let outcome = attempt(request).await;
                    let label = match &outcome {
                        Ok(_) => "success",
                        Err(e) => e.failure_class().as_str(),
                    };
                    crate::metrics::record_request_attempt(&method, label);
                    outcome
                }
            })
            .await;

        crate::metrics::record_request(
            method.as_str(),
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );

        match result {
            Err(e) if e.is_auth_failure() => {
                warn!("{} {} rejected the session: {}", method, path, e);
                // The rejected token must not outlive the teardown.
                self.set_bearer_token(None);
                self.unauthorized.report_unauthorized();
                Err(e)
            }
            Err(e) => {
                debug!("{} {} failed: {}", method, path, e);
                Err(e)
            }
            ok => ok,
        }
    }
}

async fn attempt(request: reqwest::RequestBuilder) -> std::result::Result<Response, RequestError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RequestError::Status {
        status: status.as_u16(),
        body: sanitize(&body),
    })
}

async fn decode_body<T: DeserializeOwned>(response: Response) -> std::result::Result<T, RequestError> {
    response
        .json()
        .await
        .map_err(|e| RequestError::Decode(e.to_string()))
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("retry", self.executor.config())
            .field("bearer_token", &self.bearer_token.read().as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
