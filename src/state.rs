//! Final outcome of a query or retrieve operation

use std::sync::Arc;

use dicom_object::InMemDicomObject;
use dimse::{status, DimseStatus, Progress, ProgressSnapshot};

use crate::error::OpError;

/// Outcome of one operation: final status, summary message, the failure
/// that ended it (if any) and the tracker it reported into.
#[derive(Debug, Clone)]
pub struct OperationResult {
    status: u16,
    message: Option<String>,
    error: Option<Arc<OpError>>,
    progress: Option<Progress>,
}

impl OperationResult {
    /// Result of an operation that never reached the transport
    pub(crate) fn unable_to_process(context: &str, error: OpError, progress: Option<Progress>) -> Self {
        Self {
            status: status::UNABLE_TO_PROCESS,
            message: Some(format!("{}: {}", context, error)),
            error: Some(Arc::new(error)),
            progress,
        }
    }

    /// Compose the result from the tracker once the association is gone.
    ///
    /// `time_message` is only kept when nothing failed. A failed operation
    /// keeps the status the peer reported; when none was reported, or it
    /// was still pending, the status becomes unable-to-process.
    pub(crate) fn build(progress: Progress, time_message: Option<String>, error: Option<OpError>) -> Self {
        let snap = progress.snapshot();
        let mut parts: Vec<String> = Vec::new();
        let mut failed = false;

        if snap.failed_suboperations > 0 {
            failed = true;
            parts.push(format!(
                "{}/{} operations have failed.",
                snap.failed_suboperations,
                snap.failed_suboperations + snap.completed_suboperations
            ));
        } else if snap.remaining_suboperations > 0 {
            parts.push(format!("{} operations remain.", snap.remaining_suboperations));
        } else if snap.warning_suboperations > 0 {
            parts.push(format!(
                "{} operations have a warning status.",
                snap.warning_suboperations
            ));
        }

        if let Some(err) = &error {
            failed = true;
            parts.push(err.to_string());
        }

        if let Some(comment) = snap.error_comment.as_deref().filter(|c| !c.trim().is_empty()) {
            failed = true;
            parts.push(format!("DICOM error: {}", comment));
        }

        if let Some(code) = snap.status {
            if let DimseStatus::Failure(_) = DimseStatus::from_code(code) {
                failed = true;
                parts.push(format!("DICOM status: 0x{:04X}", code));
            }
        }

        let status = match snap.status {
            Some(code) if !status::is_pending(code) => code,
            _ if failed => status::UNABLE_TO_PROCESS,
            _ => status::SUCCESS,
        };

        if !failed {
            parts.extend(time_message);
        }

        let message = if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        };

        Self {
            status,
            message,
            error: error.map(Arc::new),
            progress: Some(progress),
        }
    }

    /// DIMSE status code
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn dimse_status(&self) -> DimseStatus {
        DimseStatus::from_code(self.status)
    }

    /// Summary of the operation: elapsed time on success, the cause on failure
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Failure that ended the operation
    pub fn error(&self) -> Option<&OpError> {
        self.error.as_deref()
    }

    /// No failure and a success, warning or cancel status. A cancel only
    /// answers the C-CANCEL sent once the requested number of matches came in.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
            && match self.dimse_status() {
                DimseStatus::Cancel => true,
                other => other.is_successful(),
            }
    }

    /// Tracker of the operation, absent when no client was ever created
    pub fn progress(&self) -> Option<&Progress> {
        self.progress.as_ref()
    }

    /// Snapshot of the tracker, default counters when there is none
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.progress
            .as_ref()
            .map(Progress::snapshot)
            .unwrap_or_default()
    }

    /// Identifiers of the C-FIND matches
    pub fn responses(&self) -> Vec<InMemDicomObject> {
        self.progress
            .as_ref()
            .map(Progress::responses)
            .unwrap_or_default()
    }
}
