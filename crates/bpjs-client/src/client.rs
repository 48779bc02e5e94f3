use std::sync::Arc;

use crate::credentials::CredentialSet;
use crate::error::{ClientError, TransportError};
use crate::normalizer::Normalizer;
use crate::orchestrator::{Orchestrator, Strategy};
use crate::result::ApiResult;
use crate::transport::{Exchange, HttpTransport, OutboundRequest};

/// Signed transport and response normalizer for one credential set.
pub struct ApiClient {
    transport: HttpTransport,
    normalizer: Normalizer,
}

impl ApiClient {
    pub fn new(credentials: CredentialSet) -> Result<Self, ClientError> {
        let normalizer = Normalizer::new(&credentials);
        let transport = HttpTransport::new(Arc::new(credentials))?;
        Ok(Self {
            transport,
            normalizer,
        })
    }

    pub fn credentials(&self) -> &CredentialSet {
        self.transport.credentials()
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Sends without normalizing.
    pub async fn send(&self, request: &OutboundRequest) -> Result<Exchange, TransportError> {
        self.transport.send(request).await
    }

    /// Sends one request and classifies the response.
    pub async fn execute(&self, operation: &str, request: OutboundRequest) -> ApiResult {
        let outcome = self.transport.send(&request).await;
        self.normalizer.normalize(operation, outcome)
    }

    /// Starts a strategy chain for `operation`.
    pub fn orchestrate<'a>(&'a self, operation: &'a str) -> Orchestrator<'a> {
        Orchestrator::new(operation, &self.normalizer)
    }

    /// Strategy that sends a prepared request through this client.
    pub fn request_strategy<'a>(&'a self, name: &'static str, request: OutboundRequest) -> Strategy<'a> {
        Strategy::new(name, move || async move {
            self.transport
                .send(&request)
                .await
                .map_err(ClientError::from)
        })
    }
}
