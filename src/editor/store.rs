//! The editor's state container.
//!
//! `GraphStore` owns the diagram and the interaction overlay. Consumers get it
//! by reference; changes are announced to subscribers over channels instead of
//! relying on ambient reactivity.

use std::sync::mpsc::{Receiver, Sender};

use super::camera::CameraAction;
use super::drag::DragSession;
use super::interaction::InteractionMode;
use crate::graph_utils::graph::{
    DEFAULT_DIAGRAM_NAME, Edge, EdgeId, EdgePatch, Graph, Node, NodeId, NodePatch, Position,
};
use crate::persistence::document::DiagramDocument;

#[derive(Clone, Debug, PartialEq)]
pub enum StoreEvent {
    /// Nodes, edges or the name changed in place.
    GraphChanged { revision: u64 },
    /// The whole diagram was swapped (load, import, new diagram).
    GraphReplaced { revision: u64 },
    SelectionChanged,
    CameraRequested(CameraAction),
}

impl StoreEvent {
    pub fn touches_graph(&self) -> bool {
        matches!(self, StoreEvent::GraphChanged { .. } | StoreEvent::GraphReplaced { .. })
    }
}

/// Presentation toggles driven by keyboard shortcuts. Not persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayToggles {
    pub show_labels: bool,
    pub show_icons: bool,
    pub show_shortcuts: bool,
}

impl Default for DisplayToggles {
    fn default() -> Self {
        Self { show_labels: true, show_icons: true, show_shortcuts: false }
    }
}

pub struct GraphStore {
    graph: Graph,
    pub(super) mode: InteractionMode,
    pub(super) drag: Option<DragSession>,
    camera_action: Option<CameraAction>,
    pub(super) display: DisplayToggles,
    revision: u64,
    subscribers: Vec<Sender<StoreEvent>>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new(Graph::sample())
    }
}

impl GraphStore {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            mode: InteractionMode::Idle,
            drag: None,
            camera_action: None,
            display: DisplayToggles::default(),
            revision: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn graph(&self) -> &Graph { &self.graph }
    pub fn nodes(&self) -> &[Node] { &self.graph.nodes }
    pub fn edges(&self) -> &[Edge] { &self.graph.edges }
    pub fn diagram_id(&self) -> &str { &self.graph.id }
    pub fn diagram_name(&self) -> &str { &self.graph.name }
    pub fn revision(&self) -> u64 { self.revision }
    pub fn display(&self) -> DisplayToggles { self.display }

    /// Register for change notifications. Dropped receivers are pruned lazily.
    pub fn subscribe(&mut self) -> Receiver<StoreEvent> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub(super) fn emit(&mut self, event: StoreEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(super) fn graph_changed(&mut self) {
        self.revision += 1;
        let revision = self.revision;
        self.emit(StoreEvent::GraphChanged { revision });
    }

    pub(super) fn set_mode(&mut self, mode: InteractionMode) {
        if self.mode != mode {
            self.mode = mode;
            self.emit(StoreEvent::SelectionChanged);
        }
    }

    // Graph mutations

    /// Create a default node next to the existing ones and select it.
    pub fn add_node(&mut self) -> NodeId {
        let id = self.graph.add_node();
        log::debug!("added node {}", id);
        self.graph_changed();
        self.set_mode(InteractionMode::NodeSelected(id.clone()));
        id
    }

    /// Remove a node and every edge touching it. Unknown ids are a no-op.
    pub fn delete_node(&mut self, id: &str) -> bool {
        if !self.graph.remove_node(id) {
            return false;
        }
        if self.drag.as_ref().is_some_and(|d| d.node_id == id) {
            self.drag = None;
        }
        let clears = match &self.mode {
            InteractionMode::NodeSelected(n) | InteractionMode::Connecting(n) | InteractionMode::Dragging(n) => n == id,
            // the selected edge may have been cascaded away
            InteractionMode::EdgeSelected(e) => self.graph.get_edge(e).is_none(),
            InteractionMode::Idle => false,
        };
        self.graph_changed();
        if clears {
            self.set_mode(InteractionMode::Idle);
        }
        true
    }

    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> bool {
        if patch.is_empty() || !self.graph.update_node(id, patch) {
            return false;
        }
        self.graph_changed();
        true
    }

    pub(super) fn move_node(&mut self, id: &str, position: Position) -> bool {
        if !self.graph.set_node_position(id, position) {
            return false;
        }
        self.graph_changed();
        true
    }

    /// Connect two nodes and select the new edge.
    ///
    /// Self loops, already-connected pairs (either direction) and unknown
    /// endpoints are refused with `None` and leave the store untouched.
    pub fn add_edge(&mut self, source: &str, target: &str) -> Option<EdgeId> {
        let id = self.graph.add_edge(source, target)?;
        log::debug!("added edge {} ({} -> {})", id, source, target);
        self.graph_changed();
        self.set_mode(InteractionMode::EdgeSelected(id.clone()));
        Some(id)
    }

    pub fn update_edge(&mut self, id: &str, patch: EdgePatch) -> bool {
        if !self.graph.update_edge(id, patch) {
            return false;
        }
        self.graph_changed();
        true
    }

    pub fn delete_edge(&mut self, id: &str) -> bool {
        if !self.graph.remove_edge(id) {
            return false;
        }
        self.graph_changed();
        if matches!(&self.mode, InteractionMode::EdgeSelected(e) if e == id) {
            self.set_mode(InteractionMode::Idle);
        }
        true
    }

    pub fn rename(&mut self, name: &str) -> bool {
        if !self.graph.rename(name) {
            return false;
        }
        self.graph_changed();
        true
    }

    /// Replace the whole diagram. Interaction state and pending camera actions
    /// are reset; a document without an id gets a fresh one.
    pub fn load_graph(&mut self, doc: DiagramDocument) {
        self.replace(doc.into_graph());
    }

    /// Start over with an empty, untitled diagram.
    pub fn new_diagram(&mut self) {
        self.replace(Graph::new(DEFAULT_DIAGRAM_NAME));
    }

    fn replace(&mut self, graph: Graph) {
        log::info!("loading diagram {} ({} nodes, {} edges)", graph.id, graph.node_count(), graph.edge_count());
        self.graph = graph;
        self.drag = None;
        self.camera_action = None;
        self.mode = InteractionMode::Idle;
        self.revision += 1;
        let revision = self.revision;
        self.emit(StoreEvent::GraphReplaced { revision });
        self.emit(StoreEvent::SelectionChanged);
    }

    /// The diagram as a portable document carrying the current diagram id.
    pub fn to_document(&self) -> DiagramDocument {
        DiagramDocument::from_graph(&self.graph)
    }

    // Camera requests

    /// Ask the camera to frame every node. Dropped while a node is being dragged.
    pub fn request_fit(&mut self) -> bool {
        self.request_camera(CameraAction::Fit)
    }

    /// Ask the camera to return to its home pose. Dropped while dragging.
    pub fn request_reset(&mut self) -> bool {
        self.request_camera(CameraAction::Reset)
    }

    fn request_camera(&mut self, action: CameraAction) -> bool {
        if self.drag.is_some() {
            return false;
        }
        self.camera_action = Some(action);
        self.emit(StoreEvent::CameraRequested(action));
        true
    }

    pub fn take_camera_action(&mut self) -> Option<CameraAction> {
        self.camera_action.take()
    }
}
