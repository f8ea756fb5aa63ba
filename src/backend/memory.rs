//! In-memory badge backend (non-persistent).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    ensure_social_task, validate_email, validate_proof_url, BackendError, BadgeBackend, BadgeClaim,
};
use crate::task::{TaskName, TaskSet};

#[derive(Debug, Clone, Default)]
struct ParticipantRecord {
    tasks: TaskSet,
    proof_url: Option<String>,
    claim: Option<BadgeClaim>,
}

#[derive(Debug, Default)]
struct Records {
    participants: HashMap<String, ParticipantRecord>,
    next_serial: u64,
}

#[derive(Clone)]
pub struct InMemoryBadgeBackend {
    badge_name: String,
    records: Arc<RwLock<Records>>,
}

impl InMemoryBadgeBackend {
    pub fn new(badge_name: impl Into<String>) -> Self {
        Self {
            badge_name: badge_name.into(),
            records: Arc::new(RwLock::new(Records {
                participants: HashMap::new(),
                next_serial: 1,
            })),
        }
    }

    /// Completion flags recorded for `email`, if registered.
    pub async fn recorded_tasks(&self, email: &str) -> Option<TaskSet> {
        self.records
            .read()
            .await
            .participants
            .get(email)
            .map(|r| r.tasks)
    }

    pub async fn proof_url(&self, email: &str) -> Option<String> {
        self.records
            .read()
            .await
            .participants
            .get(email)
            .and_then(|r| r.proof_url.clone())
    }

    pub async fn participant_count(&self) -> usize {
        self.records.read().await.participants.len()
    }
}

#[async_trait]
impl BadgeBackend for InMemoryBadgeBackend {
    fn id(&self) -> &str {
        "memory"
    }

    async fn register(&self, email: &str) -> Result<(), BackendError> {
        validate_email(email)?;
        let mut records = self.records.write().await;
        if records.participants.contains_key(email) {
            return Err(BackendError::Duplicate(email.to_string()));
        }
        let mut record = ParticipantRecord::default();
        record.tasks.mark(TaskName::Email);
        records.participants.insert(email.to_string(), record);
        Ok(())
    }

    async fn update_task_progress(&self, email: &str, task: TaskName) -> Result<(), BackendError> {
        ensure_social_task(task)?;
        let mut records = self.records.write().await;
        let record = records
            .participants
            .get_mut(email)
            .ok_or_else(|| BackendError::UnknownParticipant(email.to_string()))?;
        record.tasks.mark(task);
        Ok(())
    }

    async fn submit_proof(&self, email: &str, proof_url: &str) -> Result<(), BackendError> {
        let url = validate_proof_url(proof_url)?;
        let mut records = self.records.write().await;
        let record = records
            .participants
            .get_mut(email)
            .ok_or_else(|| BackendError::UnknownParticipant(email.to_string()))?;
        record.tasks.mark(TaskName::SharePost);
        record.proof_url = Some(url.to_string());
        Ok(())
    }

    async fn claim_badge(&self, email: &str) -> Result<BadgeClaim, BackendError> {
        let mut records = self.records.write().await;
        let serial = records.next_serial;
        let record = records
            .participants
            .get_mut(email)
            .ok_or_else(|| BackendError::UnknownParticipant(email.to_string()))?;

        // Claiming twice returns the badge issued the first time.
        if let Some(claim) = &record.claim {
            return Ok(claim.clone());
        }
        if !record.tasks.progress().all_complete {
            return Err(BackendError::Rejected {
                status: 403,
                message: format!("tasks incomplete for {}", email),
            });
        }

        let claim = BadgeClaim {
            badge_name: self.badge_name.clone(),
            serial: Some(serial),
            claimed_at: Utc::now(),
        };
        record.claim = Some(claim.clone());
        records.next_serial += 1;
        Ok(claim)
    }
}
