use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, header};
use serde::Serialize;
use tracing::{debug, warn};

use crate::credentials::CredentialSet;
use crate::error::{ClientError, TransportError};
use crate::normalizer::RawResponse;
use crate::signer::SignedRequest;

/// Content type the gateway routes mutating calls on. The body is still
/// a raw JSON document.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Request body encodings the gateway has been observed to accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    /// Raw JSON text declared as `application/x-www-form-urlencoded`
    RawJsonAsForm(String),
    /// Raw JSON text declared as `application/json`
    Json(String),
}

/// Description of a single upstream call, independent of signing.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Body,
}

impl OutboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// POST with a raw JSON body declared as form-urlencoded.
    pub fn post_form_json<T: Serialize>(path: impl Into<String>, body: &T) -> Result<Self, ClientError> {
        Ok(Self::new(Method::POST, path).with_body(Body::RawJsonAsForm(serde_json::to_string(body)?)))
    }

    /// DELETE with a raw JSON body declared as form-urlencoded.
    pub fn delete_form_json<T: Serialize>(path: impl Into<String>, body: &T) -> Result<Self, ClientError> {
        Ok(Self::new(Method::DELETE, path).with_body(Body::RawJsonAsForm(serde_json::to_string(body)?)))
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Read-only requests may be repeated after a timeout.
    pub fn is_safe(&self) -> bool {
        self.method.is_safe()
    }
}

/// A response together with the signature it was requested with.
///
/// The timestamp is envelope key material, so it travels with the response.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub signed: SignedRequest,
    pub response: RawResponse,
    pub attempts: u32,
}

/// Signed HTTP transport for one credential set.
pub struct HttpTransport {
    client: Client,
    credentials: Arc<CredentialSet>,
}

impl HttpTransport {
    pub fn new(credentials: Arc<CredentialSet>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(credentials.timeout())
            .connect_timeout(credentials.timeout().min(Duration::from_secs(10)))
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            credentials,
        })
    }

    /// Create with a custom client.
    pub fn with_client(client: Client, credentials: Arc<CredentialSet>) -> Self {
        Self {
            client,
            credentials,
        }
    }

    pub fn credentials(&self) -> &CredentialSet {
        &self.credentials
    }

    /// Sends the request, re-signing on every attempt.
    pub async fn send(&self, request: &OutboundRequest) -> Result<Exchange, TransportError> {
        let url = self.credentials.endpoint(&request.path);
        let policy = &self.credentials.retry;
        let safe = request.is_safe();
        let mut attempt = 1;

        loop {
            let signed = SignedRequest::now(&self.credentials);

            match self.send_once(&url, request, &signed).await {
                Ok(response) => {
                    if policy.should_retry_status(attempt, safe, response.status) {
                        let delay = policy.backoff(attempt);
                        warn!(
                            url = %url,
                            status = response.status,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying upstream request after retryable status"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    debug!(url = %url, status = response.status, attempt, "Upstream request completed");
                    return Ok(Exchange {
                        signed,
                        response,
                        attempts: attempt,
                    });
                }
                Err(err) => {
                    if policy.should_retry_error(attempt, safe, &err) {
                        let delay = policy.backoff(attempt);
                        warn!(
                            url = %url,
                            error = %err,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying upstream request after transport error"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    warn!(url = %url, error = %err, attempt, "Upstream request failed");
                    return Err(err);
                }
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        request: &OutboundRequest,
        signed: &SignedRequest,
    ) -> Result<RawResponse, TransportError> {
        let mut builder = self.client.request(request.method.clone(), url);

        for (name, value) in signed.headers(&self.credentials) {
            builder = builder.header(name, value);
        }

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            Body::Empty => builder,
            Body::RawJsonAsForm(raw) => builder
                .header(header::CONTENT_TYPE, FORM_URLENCODED)
                .body(raw.clone()),
            Body::Json(raw) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(raw.clone()),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}
