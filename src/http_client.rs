use anyhow::{Context, Result};
use futures::future::BoxFuture;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;

use crate::error::{TransportError, TransportErrorKind};
use crate::request::{ApiRequest, ApiResponse};

/// Response of a request, sent when the future is first polled
pub type ResponseFuture = BoxFuture<'static, Result<ApiResponse, TransportError>>;

/// Dispatches requests to the backend.
///
/// `execute` snapshots the request and credential; nothing goes out until the returned
/// future is polled. Callers that need an ordering between requests must await them in
/// that order.
pub trait Transport: Send + Sync + 'static {
    /// Issue `request`, attaching `Authorization: Bearer <bearer>` when a bearer is given
    fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> ResponseFuture;
}

/// reqwest-backed transport with connection pooling
pub struct HttpTransport {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Backend base URL without trailing slash
    base_url: String,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(
        base_url: &str,
        max_connections: usize,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(max_connections)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(client, base_url))
    }

    /// Wrap an existing reqwest client
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn build(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<reqwest::Request, TransportError> {
        let url = self.url_for(&request.path);
        let mut builder = self.client.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        for (key, value) in &request.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                TransportError::new(TransportErrorKind::Request, &url, format!("invalid header name {}: {}", key, e))
            })?;
            if name == AUTHORIZATION {
                continue;
            }
            let value = HeaderValue::from_str(value).map_err(|e| {
                TransportError::new(TransportErrorKind::Request, &url, format!("invalid header value for {}: {}", key, e))
            })?;
            builder = builder.header(name, value);
        }

        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        builder
            .build()
            .map_err(|e| TransportError::from_reqwest(&e, &url))
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> ResponseFuture {
        let method = request.method.clone();
        let url = self.url_for(&request.path);

        tracing::debug!(
            method = %method,
            url = %url,
            authenticated = bearer.is_some(),
            "Sending HTTP request"
        );

        let built = self.build(request, bearer);
        let client = self.client.clone();

        Box::pin(async move {
            let req = built?;

            let response = client.execute(req).await.map_err(|e| {
                let err = TransportError::from_reqwest(&e, &url);
                tracing::warn!(
                    error_kind = %err.kind,
                    error = %e,
                    error_debug = ?e,
                    url = %url,
                    "HTTP request error"
                );
                err
            })?;

            let status = response.status();
            let headers = response.headers().clone();

            tracing::debug!(
                method = %method,
                url = %url,
                status = %status,
                "Received HTTP response"
            );

            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::from_reqwest(&e, &url))?;

            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        })
    }
}
