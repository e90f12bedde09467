//! The `/diagrams` persistence API: wire types shared by client and server,
//! the storage service behind it, and (feature `api`) an actix-web front end.

use serde::{Deserialize, Deserializer, Serialize};

use crate::graph_utils::graph::{Edge, Node};
use crate::persistence::document::DiagramDocument;

pub mod service;

/// Diagram metadata as listed by the API. Never carries node or edge bodies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub updated_at: String,
    pub node_count: usize,
    pub edge_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramList {
    pub diagrams: Vec<DiagramSummary>,
}

/// Body of `POST /diagrams`. Missing or `null` node and edge lists mean empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateDiagramRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub nodes: Vec<Node>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub edges: Vec<Edge>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<&DiagramDocument> for CreateDiagramRequest {
    fn from(doc: &DiagramDocument) -> Self {
        Self { name: Some(doc.name.clone()), nodes: doc.nodes.clone(), edges: doc.edges.clone() }
    }
}

/// Partial update of a stored diagram. Absent fields keep their stored value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<Edge>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

impl DiagramPatch {
    /// Replace name and content with the document's.
    pub fn content(doc: &DiagramDocument) -> Self {
        Self {
            name: Some(doc.name.clone()),
            nodes: Some(doc.nodes.clone()),
            edges: Some(doc.edges.clone()),
            is_public: None,
        }
    }

    /// Only flip the sharing flag.
    pub fn visibility(is_public: bool) -> Self {
        Self { is_public: Some(is_public), ..Default::default() }
    }

    /// Whether the stored document body has to be rewritten.
    pub fn touches_content(&self) -> bool {
        self.name.is_some() || self.nodes.is_some() || self.edges.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// Actix front end (feature-gated). Non-API builds keep `serve` so the CLI links.
#[cfg(feature = "api")]
pub mod server;

#[cfg(not(feature = "api"))]
pub mod server {
    use std::sync::Arc;

    use super::service::DiagramService;
    use crate::persistence::settings::AppSettings;

    pub fn serve(_cfg: &AppSettings, _service: Arc<DiagramService>) -> anyhow::Result<()> {
        anyhow::bail!("built without the `api` feature")
    }
}
