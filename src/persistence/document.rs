//! Portable diagram document: the JSON shape used by export files, local
//! autosave and the cloud API, plus structural validation of untrusted input.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{PulsarError, Result};
use crate::graph_utils::graph::{DEFAULT_DIAGRAM_NAME, Edge, Graph, Node, new_document_id, normalize_name};

// Schema version for future migrations
pub const SCHEMA_VERSION: &str = "1.0.0";
pub const EXPORTED_FROM: &str = "pulsar-web";

fn default_name() -> String { DEFAULT_DIAGRAM_NAME.to_string() }

pub fn timestamp(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| t.unix_timestamp().to_string())
}

pub fn timestamp_now() -> String {
    timestamp(OffsetDateTime::now_utc())
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_from: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramDocument {
    /// Present on documents stored by the diagrams API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "default_name")]
    pub name: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl DiagramDocument {
    /// Serialize a live graph, keeping its id instead of minting a new one.
    pub fn from_graph(graph: &Graph) -> Self {
        let mut doc = serialize_graph(&graph.nodes, &graph.edges, &graph.name);
        doc.id = Some(graph.id.clone());
        doc
    }

    /// Turn the document into a live graph, assigning an id when it has none.
    /// The name gets the same trimming and length cap as a rename.
    pub fn into_graph(self) -> Graph {
        Graph {
            id: self.id.filter(|id| !id.is_empty()).unwrap_or_else(new_document_id),
            name: normalize_name(&self.name).unwrap_or_else(default_name),
            nodes: self.nodes,
            edges: self.edges,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Produce an export-ready document. The id is always fresh; callers that
/// track an existing diagram id overwrite it afterwards.
pub fn serialize_graph(nodes: &[Node], edges: &[Edge], name: &str) -> DiagramDocument {
    let now = timestamp_now();
    DiagramDocument {
        schema_version: None,
        id: Some(new_document_id()),
        name: name.to_string(),
        nodes: nodes.to_vec(),
        edges: edges.to_vec(),
        metadata: DocumentMetadata {
            created_at: Some(now.clone()),
            updated_at: Some(now),
            version: Some(SCHEMA_VERSION.to_string()),
            exported_from: Some(EXPORTED_FROM.to_string()),
        },
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self { valid: errors.is_empty(), errors }
    }
}

// Mirrors what a user would call "present": null, false, 0, "" and missing all count as absent.
fn is_present(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_position(v: Option<&Value>) -> bool {
    matches!(v, Some(Value::Array(items)) if items.len() == 3 && items.iter().all(Value::is_number))
}

/// Structural validation of an untrusted document.
///
/// Missing `nodes`/`edges` arrays short-circuit; otherwise every node and edge
/// problem is collected, including duplicate ids, self-loops and repeated
/// connections between the same pair of nodes.
pub fn validate_graph(data: &Value) -> ValidationReport {
    let mut errors = Vec::new();
    let nodes = data.get("nodes").and_then(Value::as_array);
    let edges = data.get("edges").and_then(Value::as_array);
    if nodes.is_none() {
        errors.push(r#"Missing or invalid "nodes" array"#.to_string());
    }
    if edges.is_none() {
        errors.push(r#"Missing or invalid "edges" array"#.to_string());
    }
    let (Some(nodes), Some(edges)) = (nodes, edges) else {
        return ValidationReport::from_errors(errors);
    };

    let mut node_ids: Vec<&Value> = Vec::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        let id = node.get("id");
        if !is_present(id) {
            errors.push(format!(r#"Node {i}: missing "id""#));
        }
        if !is_present(node.get("label")) {
            errors.push(format!(r#"Node {i}: missing "label""#));
        }
        if !is_position(node.get("position")) {
            errors.push(format!(r#"Node {i}: "position" must be [x, y, z] array"#));
        }
        if let Some(id) = id.filter(|v| is_present(Some(*v))) {
            if node_ids.contains(&id) {
                errors.push(format!(r#"Node {i}: duplicate id "{}""#, display_value(id)));
            } else {
                node_ids.push(id);
            }
        }
    }

    let mut edge_ids: Vec<&Value> = Vec::with_capacity(edges.len());
    let mut pairs: Vec<(&Value, &Value)> = Vec::with_capacity(edges.len());
    for (i, edge) in edges.iter().enumerate() {
        let source = edge.get("source");
        let target = edge.get("target");
        match edge.get("id").filter(|v| is_present(Some(*v))) {
            None => errors.push(format!(r#"Edge {i}: missing "id""#)),
            Some(id) if edge_ids.contains(&id) => {
                errors.push(format!(r#"Edge {i}: duplicate id "{}""#, display_value(id)));
            }
            Some(id) => edge_ids.push(id),
        }
        if !is_present(source) {
            errors.push(format!(r#"Edge {i}: missing "source""#));
        }
        if !is_present(target) {
            errors.push(format!(r#"Edge {i}: missing "target""#));
        }
        if let Some(source) = source.filter(|v| is_present(Some(*v))) {
            if !node_ids.contains(&source) {
                errors.push(format!(r#"Edge {i}: source "{}" not found in nodes"#, display_value(source)));
            }
        }
        if let Some(target) = target.filter(|v| is_present(Some(*v))) {
            if !node_ids.contains(&target) {
                errors.push(format!(r#"Edge {i}: target "{}" not found in nodes"#, display_value(target)));
            }
        }
        // one edge per unordered pair, never from a node to itself
        if let (Some(a), Some(b)) = (source.filter(|v| is_present(Some(*v))), target.filter(|v| is_present(Some(*v)))) {
            if a == b {
                errors.push(format!(r#"Edge {i}: self-loop on "{}""#, display_value(a)));
            } else if pairs.iter().any(|&(x, y)| (x == a && y == b) || (x == b && y == a)) {
                errors.push(format!(
                    r#"Edge {i}: duplicate connection between "{}" and "{}""#,
                    display_value(a),
                    display_value(b)
                ));
            } else {
                pairs.push((a, b));
            }
        }
    }

    ValidationReport::from_errors(errors)
}

/// Validate an untrusted JSON value and decode it into a typed document.
pub fn parse_document(value: Value) -> Result<DiagramDocument> {
    let report = validate_graph(&value);
    if !report.valid {
        return Err(PulsarError::Validation(report.errors));
    }
    serde_json::from_value(value).map_err(|e| PulsarError::Validation(vec![format!("Invalid document: {e}")]))
}

/// Parse, validate and decode an imported file's text.
pub fn import_document(text: &str) -> Result<DiagramDocument> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| PulsarError::Validation(vec![format!("Invalid JSON: {e}")]))?;
    parse_document(value)
}

/// `pulsar-diagram-{slug}-{YYYY-MM-DD}.json` for a diagram name.
pub fn export_filename(name: &str, date: time::Date) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "untitled" } else { slug };
    format!(
        "pulsar-diagram-{}-{:04}-{:02}-{:02}.json",
        slug,
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}
