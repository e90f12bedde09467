//! Cloud state for the signed-in user: the list of stored diagrams, which one
//! is open, and whether the open one has unsynced edits.
//!
//! Methods take `&mut self`, so a session has at most one request in flight.

use super::auth::AuthSession;
use super::client::{ApiError, DiagramApi};
use crate::api::{CreateDiagramRequest, DiagramPatch, DiagramSummary};
use crate::editor::store::GraphStore;
use crate::error::Result;
use crate::graph_utils::graph::Graph;
use crate::persistence::autosave::ChangeTracker;

#[derive(Debug, Clone)]
pub struct CloudSession {
    diagrams: Vec<DiagramSummary>,
    current_cloud_id: Option<String>,
    tracker: ChangeTracker,
    is_loading: bool,
    error: Option<String>,
}

impl CloudSession {
    pub fn new(graph: &Graph) -> Self {
        Self {
            diagrams: Vec::new(),
            current_cloud_id: None,
            tracker: ChangeTracker::new(graph),
            is_loading: false,
            error: None,
        }
    }

    pub fn diagrams(&self) -> &[DiagramSummary] { &self.diagrams }
    pub fn current_cloud_id(&self) -> Option<&str> { self.current_cloud_id.as_deref() }
    pub fn is_loading(&self) -> bool { self.is_loading }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
    pub fn has_unsaved_changes(&self) -> bool { self.tracker.has_unsaved_changes() }

    /// Compare the live graph with what was last synced. Call after edits.
    pub fn track_changes(&mut self, graph: &Graph, auth: &AuthSession) -> bool {
        self.tracker.observe(graph, auth.is_authenticated())
    }

    /// Stop associating the open diagram with a cloud copy (e.g. after "new diagram").
    pub fn detach(&mut self, graph: &Graph) {
        self.current_cloud_id = None;
        self.tracker.mark_synced(graph);
    }

    /// Drop everything cloud related (sign-out).
    pub fn clear(&mut self) {
        self.diagrams.clear();
        self.current_cloud_id = None;
        self.tracker.reset();
        self.is_loading = false;
        self.error = None;
    }

    fn begin(&mut self, auth: &mut AuthSession) -> std::result::Result<String, ApiError> {
        self.error = None;
        match auth.access_token() {
            Some(token) => {
                self.is_loading = true;
                Ok(token)
            }
            None => Err(self.failed(auth, ApiError::Unauthenticated)),
        }
    }

    fn failed(&mut self, auth: &mut AuthSession, err: ApiError) -> ApiError {
        if err.is_auth_failure() {
            if auth.is_authenticated() {
                log::info!("signing out: {}", err);
            }
            auth.logout();
            self.clear();
        }
        log::warn!("cloud request failed: {}", err);
        self.error = Some(err.to_string());
        self.is_loading = false;
        err
    }

    async fn refresh<A: DiagramApi>(&mut self, api: &A, auth: &mut AuthSession, token: &str) {
        match api.list(token).await {
            Ok(diagrams) => self.diagrams = diagrams,
            Err(e) => {
                self.failed(auth, e);
            }
        }
    }

    pub async fn fetch_diagrams<A: DiagramApi>(&mut self, api: &A, auth: &mut AuthSession) -> Result<&[DiagramSummary]> {
        let token = self.begin(auth)?;
        match api.list(&token).await {
            Ok(diagrams) => {
                self.diagrams = diagrams;
                self.is_loading = false;
                Ok(&self.diagrams)
            }
            Err(e) => Err(self.failed(auth, e).into()),
        }
    }

    /// Fetch a stored diagram and load it into the editor.
    pub async fn open_diagram<A: DiagramApi>(
        &mut self,
        api: &A,
        auth: &mut AuthSession,
        id: &str,
        store: &mut GraphStore,
    ) -> Result<()> {
        let token = self.begin(auth)?;
        match api.get(&token, id).await {
            Ok(doc) => {
                store.load_graph(doc);
                self.current_cloud_id = Some(id.to_string());
                self.tracker.mark_synced(store.graph());
                self.is_loading = false;
                Ok(())
            }
            Err(e) => Err(self.failed(auth, e).into()),
        }
    }

    /// Create the diagram remotely, or update the cloud copy it was opened
    /// from, then refresh the list. A failure leaves the changes unsaved.
    pub async fn save_diagram<A: DiagramApi>(
        &mut self,
        api: &A,
        auth: &mut AuthSession,
        store: &GraphStore,
    ) -> Result<DiagramSummary> {
        let token = match self.begin(auth) {
            Ok(token) => token,
            Err(e) => {
                self.tracker.mark_dirty();
                return Err(e.into());
            }
        };
        let doc = store.to_document();
        let result = match self.current_cloud_id.clone() {
            Some(id) => api.update(&token, &id, &DiagramPatch::content(&doc)).await,
            None => api.create(&token, &CreateDiagramRequest::from(&doc)).await,
        };
        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                let err = self.failed(auth, e);
                self.tracker.mark_dirty();
                return Err(err.into());
            }
        };
        log::info!("saved diagram {} to the cloud", summary.id);
        self.current_cloud_id = Some(summary.id.clone());
        self.refresh(api, auth, &token).await;
        self.tracker.mark_synced(store.graph());
        self.is_loading = false;
        Ok(summary)
    }

    pub async fn delete_diagram<A: DiagramApi>(&mut self, api: &A, auth: &mut AuthSession, id: &str) -> Result<()> {
        let token = self.begin(auth)?;
        if let Err(e) = api.delete(&token, id).await {
            return Err(self.failed(auth, e).into());
        }
        if self.current_cloud_id.as_deref() == Some(id) {
            self.current_cloud_id = None;
        }
        self.refresh(api, auth, &token).await;
        self.is_loading = false;
        Ok(())
    }

    /// Share or unshare a stored diagram. Only the metadata changes.
    pub async fn set_public<A: DiagramApi>(
        &mut self,
        api: &A,
        auth: &mut AuthSession,
        id: &str,
        is_public: bool,
    ) -> Result<DiagramSummary> {
        let token = self.begin(auth)?;
        match api.update(&token, id, &DiagramPatch::visibility(is_public)).await {
            Ok(summary) => {
                if let Some(entry) = self.diagrams.iter_mut().find(|d| d.id == summary.id) {
                    *entry = summary.clone();
                }
                self.is_loading = false;
                Ok(summary)
            }
            Err(e) => Err(self.failed(auth, e).into()),
        }
    }
}
