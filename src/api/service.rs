//! Storage behind the diagrams API.
//!
//! Metadata (owner, name, counts, timestamps, sharing flag) and content (the
//! full document) are kept in separate tables, the way the hosted deployment
//! splits them between a key-value table and an object store. Every operation
//! other than the public fetch is scoped to the caller's user id.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use super::{CreateDiagramRequest, DiagramPatch, DiagramSummary};
use crate::cloud::auth::{decode_token, is_token_expired};
use crate::graph_utils::graph::{MAX_NAME_LEN, new_document_id};
use crate::persistence::document::{DiagramDocument, DocumentMetadata, SCHEMA_VERSION, timestamp};

const DEFAULT_STORED_NAME: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Diagram not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
}

impl ServiceError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Unauthorized => 401,
            ServiceError::NotFound => 404,
            ServiceError::BadRequest(_) => 400,
        }
    }
}

/// Resolves a bearer token to the user id that owns diagrams.
pub trait TokenVerifier {
    fn verify(&self, token: &str) -> Option<String>;
}

/// Trusts the token's claims (signature checking is left to the gateway in
/// front of the service) and rejects tokens that are expired or lack `sub`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimsVerifier;

impl TokenVerifier for ClaimsVerifier {
    fn verify(&self, token: &str) -> Option<String> {
        if is_token_expired(token) {
            return None;
        }
        let sub = decode_token(token)?.get("sub")?.as_str()?.to_string();
        (!sub.is_empty()).then_some(sub)
    }
}

/// Owner id from an `Authorization: Bearer ...` header value.
pub fn owner_from_header(verifier: &dyn TokenVerifier, header: Option<&str>) -> Result<String, ServiceError> {
    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ServiceError::Unauthorized)?;
    verifier.verify(token).ok_or(ServiceError::Unauthorized)
}

/// Shape checks on an incoming create/update body before decoding it.
pub fn validate_request(body: &Value) -> Result<(), ServiceError> {
    let Some(obj) = body.as_object() else {
        return Err(ServiceError::BadRequest("Invalid request body".into()));
    };
    match obj.get("name") {
        None | Some(Value::Null) => {}
        Some(Value::String(name)) if name.chars().count() > MAX_NAME_LEN => {
            return Err(ServiceError::BadRequest(format!("Name must be {MAX_NAME_LEN} characters or less")));
        }
        Some(Value::String(_)) => {}
        Some(_) => return Err(ServiceError::BadRequest("Name must be a string".into())),
    }
    if obj.get("nodes").is_some_and(|v| !v.is_null() && !v.is_array()) {
        return Err(ServiceError::BadRequest("Nodes must be an array".into()));
    }
    if obj.get("edges").is_some_and(|v| !v.is_null() && !v.is_array()) {
        return Err(ServiceError::BadRequest("Edges must be an array".into()));
    }
    Ok(())
}

fn decode_body<T: serde::de::DeserializeOwned>(body: &Value) -> Result<T, ServiceError> {
    validate_request(body)?;
    serde_json::from_value(body.clone()).map_err(|e| ServiceError::BadRequest(format!("Invalid request body: {e}")))
}

#[derive(Debug, Clone)]
struct MetadataRecord {
    owner: String,
    id: String,
    name: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    // write order, breaks ties between equal timestamps
    seq: u64,
    node_count: usize,
    edge_count: usize,
    is_public: bool,
}

impl MetadataRecord {
    fn summary(&self) -> DiagramSummary {
        DiagramSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: Some(timestamp(self.created_at)),
            updated_at: timestamp(self.updated_at),
            node_count: self.node_count,
            edge_count: self.edge_count,
            is_public: Some(self.is_public),
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    metadata: HashMap<String, MetadataRecord>,
    // keyed by "{owner}/{id}"
    content: HashMap<String, DiagramDocument>,
    seq: u64,
}

impl Tables {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn owned(&self, owner: &str, id: &str) -> Result<&MetadataRecord, ServiceError> {
        self.metadata.get(id).filter(|m| m.owner == owner).ok_or(ServiceError::NotFound)
    }
}

fn content_key(owner: &str, id: &str) -> String {
    format!("{owner}/{id}")
}

#[derive(Debug, Default)]
pub struct DiagramService {
    tables: Mutex<Tables>,
}

impl DiagramService {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        // a panic mid-operation leaves both maps usable, so recover the guard
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The caller's diagrams, most recently updated first.
    pub fn list(&self, owner: &str) -> Vec<DiagramSummary> {
        let tables = self.tables();
        let mut records: Vec<&MetadataRecord> = tables.metadata.values().filter(|m| m.owner == owner).collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.seq.cmp(&a.seq)));
        records.into_iter().map(MetadataRecord::summary).collect()
    }

    pub fn create(&self, owner: &str, request: CreateDiagramRequest) -> DiagramSummary {
        let id = new_document_id();
        let now = OffsetDateTime::now_utc();
        let name = request.name.filter(|n| !n.is_empty()).unwrap_or_else(|| DEFAULT_STORED_NAME.to_string());
        let content = DiagramDocument {
            schema_version: Some(SCHEMA_VERSION.to_string()),
            id: Some(id.clone()),
            name: name.clone(),
            nodes: request.nodes,
            edges: request.edges,
            metadata: DocumentMetadata {
                created_at: Some(timestamp(now)),
                updated_at: Some(timestamp(now)),
                ..Default::default()
            },
        };
        let mut tables = self.tables();
        let seq = tables.next_seq();
        let record = MetadataRecord {
            owner: owner.to_string(),
            id: id.clone(),
            name,
            created_at: now,
            updated_at: now,
            seq,
            node_count: content.nodes.len(),
            edge_count: content.edges.len(),
            is_public: false,
        };
        let summary = record.summary();
        tables.content.insert(content_key(owner, &id), content);
        tables.metadata.insert(id.clone(), record);
        log::info!("created diagram {} for {}", id, owner);
        summary
    }

    pub fn create_from_json(&self, owner: &str, body: &Value) -> Result<DiagramSummary, ServiceError> {
        let request: CreateDiagramRequest = decode_body(body)?;
        Ok(self.create(owner, request))
    }

    pub fn get(&self, owner: &str, id: &str) -> Result<DiagramDocument, ServiceError> {
        let tables = self.tables();
        tables.owned(owner, id)?;
        tables.content.get(&content_key(owner, id)).cloned().ok_or(ServiceError::NotFound)
    }

    /// Apply a patch. A patch with only `is_public` leaves the stored document untouched.
    pub fn update(&self, owner: &str, id: &str, patch: DiagramPatch) -> Result<DiagramSummary, ServiceError> {
        let mut tables = self.tables();
        tables.owned(owner, id)?;
        let now = OffsetDateTime::now_utc();
        let seq = tables.next_seq();

        let counts = if patch.touches_content() {
            let key = content_key(owner, id);
            let content = tables.content.get_mut(&key).ok_or(ServiceError::NotFound)?;
            if let Some(name) = patch.name.filter(|n| !n.is_empty()) {
                content.name = name;
            }
            if let Some(nodes) = patch.nodes {
                content.nodes = nodes;
            }
            if let Some(edges) = patch.edges {
                content.edges = edges;
            }
            content.metadata.updated_at = Some(timestamp(now));
            Some((content.name.clone(), content.nodes.len(), content.edges.len()))
        } else {
            None
        };

        let record = tables.metadata.get_mut(id).ok_or(ServiceError::NotFound)?;
        if let Some((name, node_count, edge_count)) = counts {
            record.name = name;
            record.node_count = node_count;
            record.edge_count = edge_count;
        }
        if let Some(is_public) = patch.is_public {
            record.is_public = is_public;
        }
        record.updated_at = now;
        record.seq = seq;
        Ok(record.summary())
    }

    pub fn update_from_json(&self, owner: &str, id: &str, body: &Value) -> Result<DiagramSummary, ServiceError> {
        let patch: DiagramPatch = decode_body(body)?;
        self.update(owner, id, patch)
    }

    pub fn delete(&self, owner: &str, id: &str) -> Result<(), ServiceError> {
        let mut tables = self.tables();
        tables.owned(owner, id)?;
        tables.content.remove(&content_key(owner, id));
        tables.metadata.remove(id);
        log::info!("deleted diagram {} for {}", id, owner);
        Ok(())
    }

    /// Anyone may read a shared diagram. Missing and private diagrams are
    /// indistinguishable to the caller.
    pub fn get_public(&self, id: &str) -> Result<DiagramDocument, ServiceError> {
        let tables = self.tables();
        let record = tables.metadata.get(id).filter(|m| m.is_public).ok_or(ServiceError::NotFound)?;
        tables.content.get(&content_key(&record.owner, id)).cloned().ok_or(ServiceError::NotFound)
    }
}
