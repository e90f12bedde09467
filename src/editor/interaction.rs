//! Selection, connect mode and drag mode layered over the graph.
//!
//! Exactly one mode is active at a time. Input arrives as [`InteractionEvent`]s
//! (pointer and command level) or [`Key`]s and is applied through
//! [`GraphStore::dispatch`] and [`GraphStore::handle_key`].

use super::drag::{DragOutcome, DragSession};
use super::store::GraphStore;
use crate::graph_utils::geometry::{Ray, check_collision};
use crate::graph_utils::graph::{EdgeId, EdgePatch, NodeId, NodePatch};
use crate::graph_utils::services::all_services;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum InteractionMode {
    #[default]
    Idle,
    NodeSelected(NodeId),
    EdgeSelected(EdgeId),
    /// Waiting for a second node click to create an edge from this node.
    Connecting(NodeId),
    /// The node is selected and following the pointer.
    Dragging(NodeId),
}

#[derive(Clone, Debug, PartialEq)]
pub enum InteractionEvent {
    ClickNode(NodeId),
    ClickEdge(EdgeId),
    ClickEmpty,
    Escape,
    /// "Connect to..." on a node.
    ConnectFrom(NodeId),
    PointerDownNode(NodeId, Ray),
    PointerMove(Ray),
    PointerUp,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
    Delete,
    Backspace,
    Home,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MenuTarget {
    Node(NodeId),
    Edge(EdgeId),
    Background,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MenuAction {
    ConnectTo,
    SetType(String),
    DeleteNode,
    ToggleEdgeStyle,
    DeleteEdge,
    AddNode,
    FitView,
    ResetView,
}

pub const CHANGE_TYPE_MENU: &str = "Change type";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuItem {
    pub label: &'static str,
    /// Submenu the item is listed under, if any.
    pub submenu: Option<&'static str>,
    pub action: MenuAction,
}

/// Items offered by the right-click menu for `target`.
pub fn context_menu(target: &MenuTarget) -> Vec<MenuItem> {
    let item = |label, action| MenuItem { label, submenu: None, action };
    match target {
        MenuTarget::Node(_) => {
            let mut items = vec![item("Connect to...", MenuAction::ConnectTo)];
            items.extend(all_services().into_iter().map(|s| MenuItem {
                label: s.name,
                submenu: Some(CHANGE_TYPE_MENU),
                action: MenuAction::SetType(s.key.to_string()),
            }));
            items.push(item("Delete node", MenuAction::DeleteNode));
            items
        }
        MenuTarget::Edge(_) => vec![
            item("Toggle style", MenuAction::ToggleEdgeStyle),
            item("Delete edge", MenuAction::DeleteEdge),
        ],
        MenuTarget::Background => vec![
            item("Add node", MenuAction::AddNode),
            item("Fit view", MenuAction::FitView),
            item("Reset view", MenuAction::ResetView),
        ],
    }
}

impl GraphStore {
    pub fn mode(&self) -> &InteractionMode { &self.mode }

    pub fn selected_node_id(&self) -> Option<&str> {
        match &self.mode {
            InteractionMode::NodeSelected(id) | InteractionMode::Dragging(id) => Some(id),
            _ => None,
        }
    }

    pub fn selected_edge_id(&self) -> Option<&str> {
        match &self.mode {
            InteractionMode::EdgeSelected(id) => Some(id),
            _ => None,
        }
    }

    pub fn connecting_from(&self) -> Option<&str> {
        match &self.mode {
            InteractionMode::Connecting(id) => Some(id),
            _ => None,
        }
    }

    pub fn dragging_node_id(&self) -> Option<&str> {
        self.drag.as_ref().map(|d| d.node_id.as_str())
    }

    /// Whether the node under an active drag currently overlaps another node.
    pub fn drag_is_colliding(&self) -> bool {
        self.drag.as_ref().is_some_and(|d| d.colliding)
    }

    pub fn clear_selection(&mut self) {
        if self.drag.is_some() {
            self.cancel_drag();
        }
        self.set_mode(InteractionMode::Idle);
    }

    /// Apply one input event. Returns whether anything changed.
    pub fn dispatch(&mut self, event: InteractionEvent) -> bool {
        // While dragging only pointer movement, release and escape matter
        if self.drag.is_some()
            && !matches!(event, InteractionEvent::PointerMove(_) | InteractionEvent::PointerUp | InteractionEvent::Escape)
        {
            return false;
        }
        match event {
            InteractionEvent::ClickNode(id) => self.click_node(&id),
            InteractionEvent::ClickEdge(id) => {
                if self.graph().get_edge(&id).is_none() {
                    return false;
                }
                self.set_mode(InteractionMode::EdgeSelected(id));
                true
            }
            InteractionEvent::ClickEmpty | InteractionEvent::Escape => {
                let was_idle = self.mode == InteractionMode::Idle;
                self.clear_selection();
                !was_idle
            }
            InteractionEvent::ConnectFrom(id) => {
                if !self.graph().contains_node(&id) {
                    return false;
                }
                self.set_mode(InteractionMode::Connecting(id));
                true
            }
            InteractionEvent::PointerDownNode(id, ray) => self.begin_drag(&id, &ray),
            InteractionEvent::PointerMove(ray) => self.drag_to(&ray).is_some(),
            InteractionEvent::PointerUp => self.end_drag().is_some(),
            InteractionEvent::Delete => self.delete_selection(),
        }
    }

    fn click_node(&mut self, id: &str) -> bool {
        if !self.graph().contains_node(id) {
            return false;
        }
        if let InteractionMode::Connecting(from) = &self.mode {
            let from = from.clone();
            if self.add_edge(&from, id).is_none() {
                log::debug!("connection {} -> {} refused", from, id);
                self.set_mode(InteractionMode::Idle);
            }
            return true;
        }
        self.set_mode(InteractionMode::NodeSelected(id.to_string()));
        true
    }

    /// Delete whatever is selected.
    pub fn delete_selection(&mut self) -> bool {
        match self.mode.clone() {
            InteractionMode::NodeSelected(id) => self.delete_node(&id),
            InteractionMode::EdgeSelected(id) => self.delete_edge(&id),
            _ => false,
        }
    }

    /// Pointer-down on the already selected node starts a drag.
    pub fn begin_drag(&mut self, id: &str, ray: &Ray) -> bool {
        if !matches!(&self.mode, InteractionMode::NodeSelected(sel) if sel == id) {
            return false;
        }
        let Some(origin) = self.graph().get_node(id).map(|n| n.position) else { return false };
        self.drag = Some(DragSession::start(id, origin, ray));
        self.set_mode(InteractionMode::Dragging(id.to_string()));
        true
    }

    /// Follow the pointer. The node moves even onto an occupied spot so the
    /// user sees where it would land; the collision flag is returned.
    pub fn drag_to(&mut self, ray: &Ray) -> Option<bool> {
        let drag = self.drag.as_ref()?;
        let node_id = drag.node_id.clone();
        let position = drag.project(ray)?;
        let colliding = check_collision(&node_id, position, self.nodes());
        if let Some(drag) = self.drag.as_mut() {
            drag.colliding = colliding;
        }
        self.move_node(&node_id, position);
        Some(colliding)
    }

    /// Release the node: an overlapping position snaps back to where the drag began.
    pub fn end_drag(&mut self) -> Option<DragOutcome> {
        let drag = self.drag.take()?;
        let current = self.graph().get_node(&drag.node_id).map(|n| n.position)?;
        let outcome = if check_collision(&drag.node_id, current, self.nodes()) {
            log::debug!("drop of {} collides, reverting", drag.node_id);
            self.move_node(&drag.node_id, drag.origin);
            DragOutcome::Reverted(drag.origin)
        } else {
            DragOutcome::Committed(current)
        };
        self.set_mode(InteractionMode::NodeSelected(drag.node_id));
        Some(outcome)
    }

    /// Abandon a drag, restoring the original position.
    pub fn cancel_drag(&mut self) {
        if let Some(drag) = self.drag.take() {
            let moved = self.graph().get_node(&drag.node_id).is_some_and(|n| n.position != drag.origin);
            if moved {
                self.move_node(&drag.node_id, drag.origin);
            }
            self.set_mode(InteractionMode::NodeSelected(drag.node_id));
        }
    }

    /// Keyboard shortcuts. Returns whether the key was bound.
    pub fn handle_key(&mut self, key: Key) -> bool {
        match key {
            Key::Escape => {
                self.dispatch(InteractionEvent::Escape);
                true
            }
            Key::Delete | Key::Backspace => {
                self.dispatch(InteractionEvent::Delete);
                true
            }
            Key::Home => {
                self.request_reset();
                true
            }
            Key::Char(c) => match c.to_ascii_lowercase() {
                'f' => {
                    self.request_fit();
                    true
                }
                'r' => {
                    self.request_reset();
                    true
                }
                'l' => {
                    self.display.show_labels = !self.display.show_labels;
                    true
                }
                'i' => {
                    self.display.show_icons = !self.display.show_icons;
                    true
                }
                '?' => {
                    self.display.show_shortcuts = !self.display.show_shortcuts;
                    true
                }
                _ => false,
            },
        }
    }

    /// Run a context menu command against the item it was opened on.
    pub fn apply_menu_action(&mut self, target: &MenuTarget, action: MenuAction) -> bool {
        match (target, action) {
            (MenuTarget::Node(id), MenuAction::ConnectTo) => self.dispatch(InteractionEvent::ConnectFrom(id.clone())),
            (MenuTarget::Node(id), MenuAction::DeleteNode) => self.delete_node(id),
            (MenuTarget::Node(id), MenuAction::SetType(kind)) => {
                self.update_node(id, NodePatch { kind: Some(kind), ..Default::default() })
            }
            (MenuTarget::Edge(id), MenuAction::ToggleEdgeStyle) => {
                let Some(style) = self.graph().get_edge(id).map(|e| e.style.toggled()) else { return false };
                self.update_edge(id, EdgePatch { style: Some(style), ..Default::default() })
            }
            (MenuTarget::Edge(id), MenuAction::DeleteEdge) => self.delete_edge(id),
            (_, MenuAction::AddNode) => {
                self.add_node();
                true
            }
            (_, MenuAction::FitView) => self.request_fit(),
            (_, MenuAction::ResetView) => self.request_reset(),
            _ => false,
        }
    }
}
