//! Live progress of an in-flight query or retrieve
//!
//! A [`Progress`] is a cheap handle: clones share the same tracker. The
//! transport layer is the single writer; the orchestrator and the caller
//! read it at any time, including from other threads while the operation
//! is running.

use std::sync::{Arc, Mutex, PoisonError};

use dicom_object::InMemDicomObject;
use tokio::sync::watch;

use crate::types::status;

/// Point-in-time copy of the tracker counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Number of pending C-FIND responses carrying a match
    pub matches_received: u32,
    /// Sub-operations (stored instances) completed
    pub completed_suboperations: u32,
    /// Sub-operations that failed
    pub failed_suboperations: u32,
    /// Sub-operations completed with a warning
    pub warning_suboperations: u32,
    /// Sub-operations still outstanding
    pub remaining_suboperations: u32,
    /// Last DIMSE status reported by the peer
    pub status: Option<u16>,
    /// Error comment (0000,0902) of the last failed response
    pub error_comment: Option<String>,
    /// Set once the association has been torn down
    pub completed: bool,
}

impl ProgressSnapshot {
    /// Status is still pending or was never reported
    pub fn is_unsettled(&self) -> bool {
        self.status.map_or(true, status::is_pending)
    }
}

/// Shared progress tracker
#[derive(Clone)]
pub struct Progress {
    state: Arc<watch::Sender<ProgressSnapshot>>,
    responses: Arc<Mutex<Vec<InMemDicomObject>>>,
}

impl Progress {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());
        Self {
            state: Arc::new(tx),
            responses: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every update
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.state.subscribe()
    }

    /// Apply an arbitrary change and notify subscribers
    pub fn update(&self, f: impl FnOnce(&mut ProgressSnapshot)) {
        self.state.send_modify(f);
    }

    /// Record one matching response, keeping its identifier when available
    pub fn match_received(&self, identifier: Option<InMemDicomObject>) {
        if let Some(obj) = identifier {
            self.push_response(obj);
        }
        self.update(|s| {
            s.matches_received += 1;
            s.status = Some(status::PENDING);
        });
    }

    /// Keep an identifier whose match was already counted
    pub fn push_response(&self, identifier: InMemDicomObject) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(identifier);
    }

    /// Record the sub-operation counters of a C-GET response
    pub fn set_suboperations(&self, completed: u32, failed: u32, warning: u32, remaining: u32) {
        self.update(|s| {
            s.completed_suboperations = completed;
            s.failed_suboperations = failed;
            s.warning_suboperations = warning;
            s.remaining_suboperations = remaining;
        });
    }

    pub fn set_status(&self, code: u16) {
        self.update(|s| s.status = Some(code));
    }

    pub fn set_error_comment(&self, comment: impl Into<String>) {
        let comment = comment.into();
        self.update(|s| s.error_comment = Some(comment));
    }

    /// Final flush once the association is gone; later reads see `completed`
    pub fn complete(&self) {
        self.update(|s| s.completed = true);
    }

    /// Identifiers of the matches received so far
    pub fn responses(&self) -> Vec<InMemDicomObject> {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True when both handles point at the same tracker
    pub fn same_tracker(&self, other: &Progress) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("snapshot", &*self.state.borrow())
            .finish()
    }
}
