//! Scripted collaborator for tests: records calls, fails or blocks on demand.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use super::{BackendError, BadgeBackend, BadgeClaim};
use crate::task::TaskName;

/// Handles for a blocked operation.
#[derive(Clone, Default)]
pub struct Gate {
    /// Signalled once the operation has started
    pub entered: Arc<Notify>,
    /// Notify to let the operation finish
    pub release: Arc<Notify>,
}

#[derive(Default)]
pub struct ScriptedBackend {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<&'static str, BackendError>>,
    gates: Mutex<HashMap<&'static str, Gate>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `op` fail with `error` until `recover`.
    pub fn fail(&self, op: &'static str, error: BackendError) {
        self.failures.lock().unwrap().insert(op, error);
    }

    pub fn recover(&self, op: &'static str) {
        self.failures.lock().unwrap().remove(op);
    }

    /// Block the next calls to `op` until the returned gate is released.
    pub fn gate(&self, op: &'static str) -> Gate {
        let gate = Gate::default();
        self.gates.lock().unwrap().insert(op, gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, op: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split(':').next() == Some(op))
            .count()
    }

    async fn enter(&self, op: &'static str, detail: &str) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(format!("{}:{}", op, detail));
        let gate = self.gates.lock().unwrap().get(op).cloned();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        match self.failures.lock().unwrap().get(op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BadgeBackend for ScriptedBackend {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn register(&self, email: &str) -> Result<(), BackendError> {
        self.enter("register", email).await
    }

    async fn update_task_progress(&self, email: &str, task: TaskName) -> Result<(), BackendError> {
        self.enter("update_task_progress", &format!("{}/{}", email, task))
            .await
    }

    async fn submit_proof(&self, email: &str, proof_url: &str) -> Result<(), BackendError> {
        self.enter("submit_proof", &format!("{} {}", email, proof_url))
            .await
    }

    async fn claim_badge(&self, email: &str) -> Result<BadgeClaim, BackendError> {
        self.enter("claim_badge", email).await?;
        Ok(BadgeClaim {
            badge_name: "Test Badge".to_string(),
            serial: Some(1),
            claimed_at: Utc::now(),
        })
    }
}
