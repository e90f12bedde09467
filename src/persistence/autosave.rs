//! Timer-driven side effects of editing: debounced autosave and tracking of
//! changes not yet synced to the cloud.
//!
//! Nothing here spawns threads. The host loop passes the current `Instant`
//! into `tick`, which keeps the behaviour deterministic under test.

use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use super::document::DiagramDocument;
use super::persist::LocalStore;
use crate::editor::store::{GraphStore, StoreEvent};
use crate::graph_utils::graph::Graph;

/// A cancellable delayed task. Scheduling again replaces the pending one, so
/// only the most recent request ever fires.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    pub fn delay(&self) -> Duration { self.delay }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True exactly once, on the first poll at or after the deadline.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Writes the current diagram to local storage a short while after the last edit.
pub struct Autosaver {
    storage: LocalStore,
    debouncer: Debouncer,
    events: Receiver<StoreEvent>,
    enabled: bool,
    last_saved: Option<PathBuf>,
}

impl Autosaver {
    /// Subscribe to `store`. Edits made before this call are not saved.
    pub fn new(storage: LocalStore, delay: Duration, store: &mut GraphStore) -> Self {
        let enabled = storage.is_available();
        if !enabled {
            log::warn!("local storage at {} is unavailable; autosave disabled", storage.dir().display());
        }
        Self {
            storage,
            debouncer: Debouncer::new(delay),
            events: store.subscribe(),
            enabled,
            last_saved: None,
        }
    }

    pub fn is_enabled(&self) -> bool { self.enabled }
    pub fn is_pending(&self) -> bool { self.debouncer.is_pending() }
    pub fn last_saved(&self) -> Option<&PathBuf> { self.last_saved.as_ref() }

    /// Drain store events and save if the debounce window has elapsed.
    /// Returns the written path when a save happened.
    pub fn tick(&mut self, store: &GraphStore, now: Instant) -> Option<PathBuf> {
        let mut touched = false;
        while let Ok(event) = self.events.try_recv() {
            touched |= event.touches_graph();
        }
        if !self.enabled {
            return None;
        }
        if touched {
            self.debouncer.schedule(now);
        }
        if self.debouncer.poll(now) {
            return self.save(store.graph());
        }
        None
    }

    /// Save right away if a save is pending (e.g. before shutdown).
    pub fn flush(&mut self, store: &GraphStore) -> Option<PathBuf> {
        if !self.enabled || !self.debouncer.is_pending() {
            return None;
        }
        self.debouncer.cancel();
        self.save(store.graph())
    }

    /// Drop any pending save without writing.
    pub fn cancel(&mut self) {
        self.debouncer.cancel();
    }

    /// Start an empty diagram, keeping a timestamped backup of the current one
    /// unless it is empty. Returns the backup path.
    pub fn new_diagram(&mut self, store: &mut GraphStore) -> Option<PathBuf> {
        let backup = if self.enabled && !store.graph().is_empty() {
            match self.storage.save_versioned(&store.to_document()) {
                Ok(path) => Some(path),
                Err(e) => {
                    log::warn!("could not back up {} before starting over: {}", store.diagram_id(), e);
                    None
                }
            }
        } else {
            None
        };
        store.new_diagram();
        backup
    }

    fn save(&mut self, graph: &Graph) -> Option<PathBuf> {
        match self.storage.save_document(&DiagramDocument::from_graph(graph)) {
            Ok(path) => {
                log::debug!("autosaved {} to {}", graph.id, path.display());
                self.last_saved = Some(path.clone());
                Some(path)
            }
            Err(e) => {
                log::warn!("autosave failed, disabling: {}", e);
                self.enabled = false;
                None
            }
        }
    }
}

fn snapshot(graph: &Graph) -> String {
    serde_json::to_string(&(&graph.nodes, &graph.edges, &graph.name)).unwrap_or_default()
}

/// Remembers the last synced content of the diagram and reports divergence.
#[derive(Debug, Clone)]
pub struct ChangeTracker {
    last_synced: String,
    dirty: bool,
}

impl ChangeTracker {
    pub fn new(graph: &Graph) -> Self {
        Self { last_synced: snapshot(graph), dirty: false }
    }

    /// Compare against the last synced state. Only signed-in users accumulate
    /// unsaved changes; once dirty, the flag stays until [`mark_synced`].
    ///
    /// [`mark_synced`]: ChangeTracker::mark_synced
    pub fn observe(&mut self, graph: &Graph, authenticated: bool) -> bool {
        if authenticated && !self.dirty && snapshot(graph) != self.last_synced {
            self.dirty = true;
        }
        self.dirty
    }

    pub fn mark_synced(&mut self, graph: &Graph) {
        self.last_synced = snapshot(graph);
        self.dirty = false;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Forget unsaved changes without taking a new snapshot (sign-out).
    pub fn reset(&mut self) {
        self.dirty = false;
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }
}
