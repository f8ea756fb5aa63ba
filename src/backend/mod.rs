//! Persistence collaborator for the badge campaign.
//!
//! The workflow never talks to storage directly; it goes through
//! [`BadgeBackend`]. Two bindings exist:
//! - `supabase`: PostgREST table on a hosted Supabase project
//! - `memory`: process-local records (development and tests)

pub mod memory;
pub mod supabase;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::InMemoryBadgeBackend;
pub use supabase::SupabaseBadgeBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::task::TaskName;

/// Badge metadata returned by a successful claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeClaim {
    pub badge_name: String,
    /// Badge number assigned by the collaborator, if it numbers badges
    pub serial: Option<u64>,
    pub claimed_at: DateTime<Utc>,
}

#[async_trait]
pub trait BadgeBackend: Send + Sync {
    /// Short identifier of the binding (e.g. "supabase").
    fn id(&self) -> &str;

    /// Create the participant record for `email`.
    async fn register(&self, email: &str) -> Result<(), BackendError>;

    /// Record completion of a social task.
    async fn update_task_progress(&self, email: &str, task: TaskName) -> Result<(), BackendError>;

    /// Record the URL of the promotional post.
    async fn submit_proof(&self, email: &str, proof_url: &str) -> Result<(), BackendError>;

    /// Issue the badge.
    async fn claim_badge(&self, email: &str) -> Result<BadgeClaim, BackendError>;
}

/// Errors raised by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Participant already registered: {0}")]
    Duplicate(String),

    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rejected by backend (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Whether re-issuing the same call may succeed without changing input.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Unavailable(err.to_string())
    }
}

/// Map a failed HTTP response to an error kind.
pub fn classify_http_status(status: u16, body: &str) -> BackendError {
    let message = body.trim().to_string();
    match status {
        409 => BackendError::Duplicate(message),
        408 | 429 | 500..=599 => BackendError::Unavailable(format!("HTTP {}: {}", status, message)),
        _ => BackendError::Rejected { status, message },
    }
}

/// Check that `raw` is an absolute http(s) URL.
pub fn validate_proof_url(raw: &str) -> Result<Url, BackendError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| BackendError::InvalidInput(format!("invalid proof URL {:?}: {}", raw, e)))?;
    let web = matches!(url.scheme(), "http" | "https") && url.host_str().is_some();
    if !web {
        return Err(BackendError::InvalidInput(format!(
            "proof URL must be http(s): {}",
            raw
        )));
    }
    Ok(url)
}

/// Check that `raw` looks like an email address: a single `@` between a
/// non-empty local part and domain, and no whitespace.
pub fn validate_email(raw: &str) -> Result<(), BackendError> {
    let invalid = || BackendError::InvalidInput(format!("invalid email address: {:?}", raw));
    if raw.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    match raw.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(())
        }
        _ => Err(invalid()),
    }
}

/// Reject tasks that cannot be recorded through `update_task_progress`.
pub(crate) fn ensure_social_task(task: TaskName) -> Result<(), BackendError> {
    if task.is_social() {
        Ok(())
    } else {
        Err(BackendError::InvalidInput(format!(
            "task {} is not updated through task progress",
            task
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        assert_eq!(
            classify_http_status(409, "duplicate key"),
            BackendError::Duplicate("duplicate key".to_string())
        );
        assert!(classify_http_status(503, "").is_transient());
        assert!(classify_http_status(429, "").is_transient());
        assert_eq!(
            classify_http_status(403, " denied "),
            BackendError::Rejected {
                status: 403,
                message: "denied".to_string()
            }
        );
    }

    #[test]
    fn test_validate_proof_url() {
        assert!(validate_proof_url("https://x.com/user/status/1").is_ok());
        assert!(validate_proof_url(" http://example.com/post ").is_ok());
        assert!(matches!(
            validate_proof_url("not a url"),
            Err(BackendError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_proof_url("ftp://example.com/post"),
            Err(BackendError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@b.com").is_ok());
        assert!(validate_email("first.last+tag@example.co.uk").is_ok());
        for raw in ["", "not-an-email", "@b.com", "a@", "a@b@c.com", "a b@c.com"] {
            assert!(
                matches!(validate_email(raw), Err(BackendError::InvalidInput(_))),
                "{:?} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_only_social_tasks_accepted() {
        assert!(ensure_social_task(TaskName::ChatJoin).is_ok());
        assert!(ensure_social_task(TaskName::Email).is_err());
        assert!(ensure_social_task(TaskName::SharePost).is_err());
    }
}
