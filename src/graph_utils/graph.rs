use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::geometry::NODE_SPACING;

// Basic type aliases for clarity
pub type NodeId = String;
pub type EdgeId = String;
pub type Position = [f64; 3];
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Type tag given to nodes created from the editor.
pub const DEFAULT_NODE_TYPE: &str = "generic";
/// Type tag assumed for document nodes that do not declare one.
pub const DOCUMENT_NODE_TYPE: &str = "service";
pub const DEFAULT_NODE_COLOR: &str = "#ff9900";
pub const DEFAULT_NODE_LABEL: &str = "New Node";
pub const DEFAULT_DIAGRAM_NAME: &str = "Untitled Diagram";
pub const MAX_NAME_LEN: usize = 100;

fn default_document_node_type() -> String { DOCUMENT_NODE_TYPE.to_string() }
fn default_node_color() -> String { DEFAULT_NODE_COLOR.to_string() }
fn default_true() -> bool { true }

/// Fresh id for a node or edge created in the editor (time ordered).
pub fn new_element_id() -> String {
    Uuid::now_v7().to_string()
}

/// Trimmed and cut to [`MAX_NAME_LEN`] characters; `None` when blank.
pub fn normalize_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    (!trimmed.is_empty()).then(|| trimmed.chars().take(MAX_NAME_LEN).collect())
}

/// Fresh id for a whole diagram.
pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type", default = "default_document_node_type")]
    pub kind: String,
    pub label: String,
    pub position: Position,
    #[serde(default = "default_node_color")]
    pub color: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: &str, label: &str, position: Position, color: &str) -> Self {
        Self {
            id: id.into(),
            kind: kind.to_string(),
            label: label.to_string(),
            position,
            color: color.to_string(),
            metadata: Metadata::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStyle {
    #[default]
    Solid,
    Dashed,
}

impl EdgeStyle {
    pub fn toggled(self) -> Self {
        match self {
            EdgeStyle::Solid => EdgeStyle::Dashed,
            EdgeStyle::Dashed => EdgeStyle::Solid,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default = "default_true")]
    pub animated: bool,
    #[serde(default)]
    pub style: EdgeStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(id: impl Into<EdgeId>, source: &str, target: &str) -> Self {
        Self {
            id: id.into(),
            source: source.to_string(),
            target: target.to_string(),
            animated: true,
            style: EdgeStyle::Solid,
            label: None,
        }
    }

    /// True if this edge joins `a` and `b`, in either direction.
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Partial update for a node. `None` leaves the field untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodePatch {
    pub label: Option<String>,
    pub color: Option<String>,
    pub kind: Option<String>,
    pub position: Option<Position>,
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.color.is_none() && self.kind.is_none() && self.position.is_none()
    }
}

/// Partial update for an edge. `label: Some(None)` clears the label.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EdgePatch {
    pub label: Option<Option<String>>,
    pub style: Option<EdgeStyle>,
    pub animated: Option<bool>,
}

/// The diagram aggregate: ordered nodes and edges plus identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub id: String,
    pub name: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGRAM_NAME)
    }
}

impl Graph {
    // Instantiate a new, empty graph with a fresh id
    pub fn new(name: &str) -> Self {
        Graph {
            id: new_document_id(),
            name: name.to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// The bundled sample architecture shown on first launch.
    pub fn sample() -> Self {
        let nodes = vec![
            Node::new("api-gw", "apigateway", "API Gateway", [-6.0, 0.0, 0.0], "#ff9900"),
            Node::new("lambda1", "lambda", "Lambda", [-2.0, 0.0, 0.0], "#ff9900"),
            Node::new("dynamodb", "dynamodb", "DynamoDB", [2.0, 0.0, 0.0], "#3b48cc"),
            Node::new("eventbridge", "eventbridge", "EventBridge", [6.0, 0.0, 2.0], "#ff4f8b"),
            Node::new("s3", "s3", "S3 Bucket", [6.0, 0.0, -2.0], "#00ffff"),
        ];
        let mut dashed = Edge::new("e3", "lambda1", "eventbridge");
        dashed.style = EdgeStyle::Dashed;
        let edges = vec![
            Edge::new("e1", "api-gw", "lambda1"),
            Edge::new("e2", "lambda1", "dynamodb"),
            dashed,
            Edge::new("e4", "eventbridge", "s3"),
        ];
        Graph {
            id: new_document_id(),
            name: DEFAULT_DIAGRAM_NAME.to_string(),
            nodes,
            edges,
        }
    }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() && self.edges.is_empty() }
    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.edges.len() }

    pub fn get_node(&self, id: &str) -> Option<&Node> { self.nodes.iter().find(|n| n.id == id) }
    pub fn get_edge(&self, id: &str) -> Option<&Edge> { self.edges.iter().find(|e| e.id == id) }
    pub fn contains_node(&self, id: &str) -> bool { self.get_node(id).is_some() }

    fn get_node_mut(&mut self, id: &str) -> Option<&mut Node> { self.nodes.iter_mut().find(|n| n.id == id) }
    fn get_edge_mut(&mut self, id: &str) -> Option<&mut Edge> { self.edges.iter_mut().find(|e| e.id == id) }

    pub fn has_edge_between(&self, a: &str, b: &str) -> bool {
        self.edges.iter().any(|e| e.connects(a, b))
    }

    /// Where the next editor-created node goes: right of the node with the
    /// largest X, at that node's height and depth. An empty graph starts at the origin.
    pub fn next_node_position(&self) -> Position {
        let right_most = self
            .nodes
            .iter()
            .max_by(|a, b| a.position[0].total_cmp(&b.position[0]));
        match right_most {
            Some(n) => [n.position[0] + NODE_SPACING, n.position[1], n.position[2]],
            None => [0.0, 0.0, 0.0],
        }
    }

    // Add a default node next to the existing ones and return its new ID
    pub fn add_node(&mut self) -> NodeId {
        let id = new_element_id();
        let position = self.next_node_position();
        self.nodes.push(Node::new(id.clone(), DEFAULT_NODE_TYPE, DEFAULT_NODE_LABEL, position, DEFAULT_NODE_COLOR));
        id
    }

    /// Insert a fully formed node. Rejected when the id is already taken.
    pub fn insert_node(&mut self, node: Node) -> bool {
        if self.contains_node(&node.id) {
            return false;
        }
        self.nodes.push(node);
        true
    }

    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> bool {
        let Some(node) = self.get_node_mut(id) else { return false };
        // Blank labels would make the node unexportable
        if let Some(label) = patch.label.filter(|l| !l.trim().is_empty()) { node.label = label; }
        if let Some(color) = patch.color { node.color = color; }
        if let Some(kind) = patch.kind { node.kind = kind; }
        if let Some(position) = patch.position { node.position = position; }
        true
    }

    pub fn set_node_position(&mut self, id: &str, position: Position) -> bool {
        match self.get_node_mut(id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    // Add an edge if both ends exist, differ, and are not already connected
    pub fn add_edge(&mut self, source: &str, target: &str) -> Option<EdgeId> {
        if source == target {
            return None;
        }
        if !self.contains_node(source) || !self.contains_node(target) {
            return None;
        }
        if self.has_edge_between(source, target) {
            return None;
        }
        let id = new_element_id();
        self.edges.push(Edge::new(id.clone(), source, target));
        Some(id)
    }

    pub fn update_edge(&mut self, id: &str, patch: EdgePatch) -> bool {
        let Some(edge) = self.get_edge_mut(id) else { return false };
        if let Some(label) = patch.label { edge.label = label; }
        if let Some(style) = patch.style { edge.style = style; }
        if let Some(animated) = patch.animated { edge.animated = animated; }
        true
    }

    // Delete operations
    pub fn remove_edge(&mut self, id: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| e.id != id);
        self.edges.len() != before
    }

    pub fn remove_node(&mut self, id: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != id);
        if self.nodes.len() == before {
            return false;
        }
        // Cascade delete edges involving this node
        self.edges.retain(|e| !e.touches(id));
        true
    }

    /// Set the diagram name. Blank names are rejected; long names are cut at
    /// [`MAX_NAME_LEN`] characters.
    pub fn rename(&mut self, name: &str) -> bool {
        match normalize_name(name) {
            Some(name) => {
                self.name = name;
                true
            }
            None => false,
        }
    }

    /// Edges whose endpoints both exist. Dangling edges are skipped with a warning.
    pub fn renderable_edges(&self) -> Vec<&Edge> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.edges
            .iter()
            .filter(|e| {
                let ok = ids.contains(e.source.as_str()) && ids.contains(e.target.as_str());
                if !ok {
                    log::warn!("skipping edge {} with missing endpoint ({} -> {})", e.id, e.source, e.target);
                }
                ok
            })
            .collect()
    }

    // Fetch helpers
    pub fn find_node_ids_by_type(&self, kind: &str) -> Vec<NodeId> {
        self.nodes.iter().filter(|n| n.kind == kind).map(|n| n.id.clone()).collect()
    }

    pub fn edges_of(&self, node_id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.touches(node_id)).collect()
    }
}
