//! Workflow error taxonomy.

use super::Stage;
use crate::backend::BackendError;
use crate::task::{TaskName, UnknownTaskError};

/// Errors surfaced by [`super::WorkflowController`].
///
/// Collaborator failures (`Registration`, `TaskVerification`, `Submission`,
/// `Claim`) leave the session state unchanged and may be retried by the
/// user. `Precondition` and `UnknownTask` mean the caller invoked an
/// operation out of sequence or with a bad name.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    #[error("Registration failed: {0}")]
    Registration(#[source] BackendError),

    #[error("Verification of {task} failed: {source}")]
    TaskVerification {
        task: TaskName,
        #[source]
        source: BackendError,
    },

    #[error("Proof submission failed: {0}")]
    Submission(#[source] BackendError),

    #[error("Badge claim failed: {0}")]
    Claim(#[source] BackendError),

    #[error("Not allowed while {stage}: {reason}")]
    Precondition { stage: Stage, reason: String },

    #[error(transparent)]
    UnknownTask(#[from] UnknownTaskError),
}

impl WorkflowError {
    pub(crate) fn precondition(stage: Stage, reason: impl Into<String>) -> Self {
        WorkflowError::Precondition {
            stage,
            reason: reason.into(),
        }
    }

    /// The collaborator failure behind this error, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            WorkflowError::Registration(e)
            | WorkflowError::Submission(e)
            | WorkflowError::Claim(e)
            | WorkflowError::TaskVerification { source: e, .. } => Some(e),
            WorkflowError::Precondition { .. } | WorkflowError::UnknownTask(_) => None,
        }
    }

    /// Stable identifier for clients.
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::Registration(_) => "registration_error",
            WorkflowError::TaskVerification { .. } => "task_verification_error",
            WorkflowError::Submission(_) => "submission_error",
            WorkflowError::Claim(_) => "claim_error",
            WorkflowError::Precondition { .. } => "precondition_error",
            WorkflowError::UnknownTask(_) => "unknown_task_error",
        }
    }
}
