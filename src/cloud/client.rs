//! The client side of the diagrams API.
//!
//! `DiagramApi` is the seam between the editor and wherever diagrams are
//! stored remotely. `HttpDiagramApi` (feature `cloud`) talks to a deployed
//! service; `InProcessApi` drives a `DiagramService` directly.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::api::service::{ClaimsVerifier, DiagramService, ServiceError, TokenVerifier};
use crate::api::{CreateDiagramRequest, DiagramPatch, DiagramSummary};
use crate::persistence::document::{DiagramDocument, parse_document};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No usable token; nothing was sent.
    #[error("Not authenticated")]
    Unauthenticated,
    /// The server rejected the token.
    #[error("Session expired")]
    SessionExpired,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the caller should be signed out.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthenticated | ApiError::SessionExpired)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthorized => ApiError::SessionExpired,
            ServiceError::NotFound => ApiError::NotFound(err.to_string()),
            ServiceError::BadRequest(msg) => ApiError::BadRequest(msg),
        }
    }
}

/// Check a fetched document the same way an imported file is checked.
pub(crate) fn checked_document(value: Value) -> Result<DiagramDocument, ApiError> {
    parse_document(value).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Remote diagram storage. Every call except `get_public` needs an access token.
#[allow(async_fn_in_trait)]
pub trait DiagramApi {
    async fn list(&self, token: &str) -> Result<Vec<DiagramSummary>, ApiError>;
    async fn get(&self, token: &str, id: &str) -> Result<DiagramDocument, ApiError>;
    async fn create(&self, token: &str, request: &CreateDiagramRequest) -> Result<DiagramSummary, ApiError>;
    async fn update(&self, token: &str, id: &str, patch: &DiagramPatch) -> Result<DiagramSummary, ApiError>;
    async fn delete(&self, token: &str, id: &str) -> Result<(), ApiError>;
    async fn get_public(&self, id: &str) -> Result<DiagramDocument, ApiError>;
}

/// `DiagramApi` over a local `DiagramService`, with no transport in between.
pub struct InProcessApi<V = ClaimsVerifier> {
    service: Arc<DiagramService>,
    verifier: V,
}

impl InProcessApi<ClaimsVerifier> {
    pub fn new(service: Arc<DiagramService>) -> Self {
        Self { service, verifier: ClaimsVerifier }
    }
}

impl<V: TokenVerifier> InProcessApi<V> {
    pub fn with_verifier(service: Arc<DiagramService>, verifier: V) -> Self {
        Self { service, verifier }
    }

    pub fn service(&self) -> &Arc<DiagramService> {
        &self.service
    }

    fn owner(&self, token: &str) -> Result<String, ApiError> {
        if token.is_empty() {
            return Err(ApiError::Unauthenticated);
        }
        self.verifier.verify(token).ok_or(ApiError::SessionExpired)
    }

    fn round_trip(doc: DiagramDocument) -> Result<DiagramDocument, ApiError> {
        let value = serde_json::to_value(&doc).map_err(|e| ApiError::Decode(e.to_string()))?;
        checked_document(value)
    }
}

impl<V: TokenVerifier> DiagramApi for InProcessApi<V> {
    async fn list(&self, token: &str) -> Result<Vec<DiagramSummary>, ApiError> {
        let owner = self.owner(token)?;
        Ok(self.service.list(&owner))
    }

    async fn get(&self, token: &str, id: &str) -> Result<DiagramDocument, ApiError> {
        let owner = self.owner(token)?;
        Self::round_trip(self.service.get(&owner, id)?)
    }

    async fn create(&self, token: &str, request: &CreateDiagramRequest) -> Result<DiagramSummary, ApiError> {
        let owner = self.owner(token)?;
        Ok(self.service.create(&owner, request.clone()))
    }

    async fn update(&self, token: &str, id: &str, patch: &DiagramPatch) -> Result<DiagramSummary, ApiError> {
        let owner = self.owner(token)?;
        Ok(self.service.update(&owner, id, patch.clone())?)
    }

    async fn delete(&self, token: &str, id: &str) -> Result<(), ApiError> {
        let owner = self.owner(token)?;
        Ok(self.service.delete(&owner, id)?)
    }

    async fn get_public(&self, id: &str) -> Result<DiagramDocument, ApiError> {
        Self::round_trip(self.service.get_public(id)?)
    }
}
