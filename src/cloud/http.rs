//! reqwest adapter for a deployed diagrams API.

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::client::{ApiError, DiagramApi, checked_document};
use crate::api::{CreateDiagramRequest, DiagramList, DiagramPatch, DiagramSummary, ErrorBody};
use crate::persistence::document::DiagramDocument;
use crate::persistence::settings::AppSettings;

fn transport(e: impl std::fmt::Display) -> ApiError {
    ApiError::Transport(e.to_string())
}

fn decode<T: DeserializeOwned>(body: Option<Value>) -> Result<T, ApiError> {
    let body = body.ok_or_else(|| ApiError::Decode("empty response".into()))?;
    serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
}

#[derive(Clone, Debug)]
pub struct HttpDiagramApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpDiagramApi {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self { client: reqwest::Client::new(), base: Url::parse(&base)? })
    }

    pub fn from_settings(settings: &AppSettings) -> anyhow::Result<Self> {
        match settings.cloud_api_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Self::new(url),
            _ => anyhow::bail!("no cloud API URL configured"),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send and map the status. `Ok(None)` means there was no body (204).
    async fn send(&self, req: RequestBuilder) -> Result<Option<Value>, ApiError> {
        let resp = req.send().await.map_err(transport)?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::SessionExpired);
        }
        if !status.is_success() {
            let message = resp
                .json::<ErrorBody>()
                .await
                .ok()
                .map(|b| b.error)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("API error: {}", status.as_u16()));
            return Err(match status {
                StatusCode::NOT_FOUND => ApiError::NotFound(message),
                StatusCode::BAD_REQUEST => ApiError::BadRequest(message),
                _ => ApiError::Status { status: status.as_u16(), message },
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let bytes = resp.bytes().await.map_err(transport)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&bytes).map(Some).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn authed(&self, req: RequestBuilder, token: &str) -> Result<Option<Value>, ApiError> {
        if token.is_empty() {
            return Err(ApiError::Unauthenticated);
        }
        self.send(req.bearer_auth(token)).await
    }
}

impl DiagramApi for HttpDiagramApi {
    async fn list(&self, token: &str) -> Result<Vec<DiagramSummary>, ApiError> {
        let req = self.client.get(self.url(&["diagrams"])?);
        let list: DiagramList = decode(self.authed(req, token).await?)?;
        Ok(list.diagrams)
    }

    async fn get(&self, token: &str, id: &str) -> Result<DiagramDocument, ApiError> {
        let req = self.client.get(self.url(&["diagrams", id])?);
        let body = self.authed(req, token).await?;
        checked_document(body.ok_or_else(|| ApiError::Decode("empty response".into()))?)
    }

    async fn create(&self, token: &str, request: &CreateDiagramRequest) -> Result<DiagramSummary, ApiError> {
        let req = self.client.post(self.url(&["diagrams"])?).json(request);
        decode(self.authed(req, token).await?)
    }

    async fn update(&self, token: &str, id: &str, patch: &DiagramPatch) -> Result<DiagramSummary, ApiError> {
        let req = self.client.put(self.url(&["diagrams", id])?).json(patch);
        decode(self.authed(req, token).await?)
    }

    async fn delete(&self, token: &str, id: &str) -> Result<(), ApiError> {
        let req = self.client.delete(self.url(&["diagrams", id])?);
        self.authed(req, token).await?;
        Ok(())
    }

    async fn get_public(&self, id: &str) -> Result<DiagramDocument, ApiError> {
        let body = self.send(self.client.get(self.url(&["public", id])?)).await?;
        checked_document(body.ok_or_else(|| ApiError::Decode("empty response".into()))?)
    }
}
