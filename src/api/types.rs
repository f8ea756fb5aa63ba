//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::TaskName;
use crate::workflow::{WorkflowError, WorkflowSnapshot};

/// Request to register the session's participant.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    /// Email address the badge is issued to
    pub email: String,
}

/// Request to submit the promotional post.
#[derive(Debug, Clone, Deserialize)]
pub struct ProofRequest {
    /// URL of the published post
    pub proof_url: String,
}

/// A failed operation, kept on the session until dismissed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Error code (e.g. "claim_error")
    pub kind: String,

    /// Human-readable message
    pub message: String,
}

impl From<&WorkflowError> for Notice {
    fn from(err: &WorkflowError) -> Self {
        Self {
            kind: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// One checklist row as rendered by the landing page.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistEntry {
    pub task: TaskName,
    pub title: String,
    pub description: String,

    /// Where the user performs the task, if configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    pub completed: bool,
}

/// Full session state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    /// Session identifier
    pub id: Uuid,

    #[serde(flatten)]
    pub snapshot: WorkflowSnapshot,

    /// Whether an operation is in flight for this session
    pub busy: bool,

    /// Last collaborator failure, until dismissed or superseded
    pub notice: Option<Notice>,

    pub checklist: Vec<ChecklistEntry>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Collaborator binding ("supabase" or "memory")
    pub backend: String,

    /// Number of live sessions
    pub sessions: usize,
}
