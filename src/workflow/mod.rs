//! Badge claim workflow.
//!
//! Sequences the user's actions (register, verify, submit proof, claim) into
//! collaborator calls and applies the resulting transitions to the session's
//! participant and task ledger.
//!
//! # State Machine
//! ```text
//! Unregistered -> Registered -> InProgress -> ReadyToClaim -> Claimed
//!                          \______________________/
//! ```
//! The stage is derived from the participant, the task ledger and the claim;
//! it is never stored. Every operation takes `&mut self`, so at most one
//! collaborator call is in flight per controller.

mod error;

pub use error::WorkflowError;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{BadgeBackend, BadgeClaim};
use crate::task::{Progress, TaskName, TaskSet};

/// One campaign entrant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Identity used for every collaborator call; empty until registered
    pub email: String,
    pub registered: bool,
}

/// Outcome of a successful badge claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResult {
    pub claimed: bool,
    pub badge: BadgeClaim,
}

/// Lifecycle stage of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// No email confirmed yet
    Unregistered,
    /// Email confirmed, no other task done
    Registered,
    /// Some, but not all, of the remaining tasks done
    InProgress,
    /// Every task done, badge not issued
    ReadyToClaim,
    /// Badge issued (terminal)
    Claimed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Unregistered => "unregistered",
            Stage::Registered => "registered",
            Stage::InProgress => "in_progress",
            Stage::ReadyToClaim => "ready_to_claim",
            Stage::Claimed => "claimed",
        }
    }

    /// Stages from which tasks can still be completed.
    fn accepts_tasks(&self) -> bool {
        matches!(self, Stage::Registered | Stage::InProgress)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialisable view of a session, for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub stage: Stage,
    pub email: Option<String>,
    pub tasks: TaskSet,
    pub progress: Progress,
    pub claim: Option<ClaimResult>,
}

/// Drives one participant through the campaign.
pub struct WorkflowController {
    backend: Arc<dyn BadgeBackend>,
    participant: Participant,
    tasks: TaskSet,
    claim: Option<ClaimResult>,
}

impl WorkflowController {
    pub fn new(backend: Arc<dyn BadgeBackend>) -> Self {
        Self {
            backend,
            participant: Participant::default(),
            tasks: TaskSet::new(),
            claim: None,
        }
    }

    pub fn stage(&self) -> Stage {
        if !self.participant.registered {
            return Stage::Unregistered;
        }
        if self.claim.is_some() {
            return Stage::Claimed;
        }
        let progress = self.tasks.progress();
        if progress.all_complete {
            Stage::ReadyToClaim
        } else if progress.completed > 1 {
            Stage::InProgress
        } else {
            Stage::Registered
        }
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    pub fn progress(&self) -> Progress {
        self.tasks.progress()
    }

    pub fn claim(&self) -> Option<&ClaimResult> {
        self.claim.as_ref()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            stage: self.stage(),
            email: self
                .participant
                .registered
                .then(|| self.participant.email.clone()),
            tasks: self.tasks,
            progress: self.progress(),
            claim: self.claim.clone(),
        }
    }

    /// Register `email` with the collaborator.
    ///
    /// # Precondition
    /// `stage() == Unregistered` and `email` is non-empty after trimming.
    ///
    /// # Postcondition
    /// On success the email is the session identity and the `email` task is
    /// complete. On failure nothing is retained.
    pub async fn register(&mut self, email: &str) -> Result<Progress, WorkflowError> {
        let stage = self.stage();
        if stage != Stage::Unregistered {
            return Err(WorkflowError::precondition(stage, "already registered"));
        }
        let email = email.trim();
        if email.is_empty() {
            return Err(WorkflowError::precondition(stage, "email is required"));
        }

        debug!(email = %email, "Registering participant");
        if let Err(e) = self.backend.register(email).await {
            warn!(email = %email, error = %e, "Registration failed");
            return Err(WorkflowError::Registration(e));
        }

        self.participant = Participant {
            email: email.to_string(),
            registered: true,
        };
        self.tasks.mark(TaskName::Email);
        info!(email = %email, "Participant registered");
        Ok(self.progress())
    }

    /// Verify one of the social tasks.
    ///
    /// Verification trusts the client: a successful collaborator update is
    /// enough to complete the task.
    ///
    /// # Errors
    /// - `UnknownTask` if `name` is not a checklist task
    /// - `Precondition` outside Registered/InProgress, or for a task that is
    ///   not verified this way
    /// - `TaskVerification` if the collaborator call fails
    pub async fn verify_task(&mut self, name: &str) -> Result<Progress, WorkflowError> {
        let task: TaskName = name.parse()?;
        let stage = self.stage();
        if !stage.accepts_tasks() {
            return Err(WorkflowError::precondition(
                stage,
                format!("cannot verify {}", task),
            ));
        }
        if !task.is_social() {
            return Err(WorkflowError::precondition(
                stage,
                format!("{} is not completed by verification", task),
            ));
        }
        if self.tasks.is_complete(task) {
            debug!(task = %task, "Task already verified");
            return Ok(self.progress());
        }

        let email = self.participant.email.clone();
        if let Err(e) = self.backend.update_task_progress(&email, task).await {
            warn!(email = %email, task = %task, error = %e, "Task verification failed");
            return Err(WorkflowError::TaskVerification { task, source: e });
        }

        self.tasks.mark(task);
        let progress = self.progress();
        info!(
            email = %email,
            task = %task,
            completed = progress.completed,
            "Task verified"
        );
        Ok(progress)
    }

    /// Submit the URL of the promotional post.
    ///
    /// The URL is not kept locally on failure; the caller resupplies it.
    pub async fn submit_proof(&mut self, proof_url: &str) -> Result<Progress, WorkflowError> {
        let stage = self.stage();
        if !stage.accepts_tasks() {
            return Err(WorkflowError::precondition(
                stage,
                "cannot submit proof",
            ));
        }
        let proof_url = proof_url.trim();
        if proof_url.is_empty() {
            return Err(WorkflowError::precondition(stage, "proof URL is required"));
        }

        let email = self.participant.email.clone();
        if let Err(e) = self.backend.submit_proof(&email, proof_url).await {
            warn!(email = %email, error = %e, "Proof submission failed");
            return Err(WorkflowError::Submission(e));
        }

        self.tasks.mark(TaskName::SharePost);
        let progress = self.progress();
        info!(email = %email, completed = progress.completed, "Proof submitted");
        Ok(progress)
    }

    /// Claim the badge.
    ///
    /// # Precondition
    /// `stage() == ReadyToClaim`; otherwise no collaborator call is made.
    pub async fn claim_badge(&mut self) -> Result<ClaimResult, WorkflowError> {
        let stage = self.stage();
        if stage != Stage::ReadyToClaim {
            return Err(WorkflowError::precondition(
                stage,
                "all tasks must be complete before claiming",
            ));
        }

        let email = self.participant.email.clone();
        let badge = match self.backend.claim_badge(&email).await {
            Ok(badge) => badge,
            Err(e) => {
                warn!(email = %email, error = %e, "Badge claim failed");
                return Err(WorkflowError::Claim(e));
            }
        };

        info!(
            email = %email,
            badge = %badge.badge_name,
            serial = ?badge.serial,
            "Badge claimed"
        );
        let result = ClaimResult {
            claimed: true,
            badge,
        };
        self.claim = Some(result.clone());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::ScriptedBackend;
    use crate::backend::BackendError;

    const PROOF: &str = "https://x.com/user/status/1";

    fn controller() -> (Arc<ScriptedBackend>, WorkflowController) {
        let backend = Arc::new(ScriptedBackend::new());
        let controller = WorkflowController::new(backend.clone());
        (backend, controller)
    }

    fn as_tuple(p: Progress) -> (usize, usize, u8, bool) {
        (p.completed, p.total, p.percent, p.all_complete)
    }

    #[tokio::test]
    async fn test_register_round_trip() {
        let (backend, mut wf) = controller();
        assert_eq!(wf.stage(), Stage::Unregistered);

        let progress = wf.register("a@b.com").await.unwrap();

        assert_eq!(wf.stage(), Stage::Registered);
        assert_eq!(as_tuple(progress), (1, 5, 20, false));
        assert_eq!(
            *wf.tasks(),
            TaskSet {
                email: true,
                ..TaskSet::default()
            }
        );
        assert_eq!(wf.participant().email, "a@b.com");
        assert_eq!(backend.calls(), vec!["register:a@b.com".to_string()]);
    }

    #[tokio::test]
    async fn test_full_scenario_reaches_claimed() {
        let (backend, mut wf) = controller();
        wf.register("a@b.com").await.unwrap();
        wf.verify_task("social_follow").await.unwrap();
        assert_eq!(wf.stage(), Stage::InProgress);
        wf.verify_task("chat_join").await.unwrap();
        wf.verify_task("community_join").await.unwrap();
        let progress = wf.submit_proof(PROOF).await.unwrap();

        assert_eq!(as_tuple(progress), (5, 5, 100, true));
        assert_eq!(wf.stage(), Stage::ReadyToClaim);

        let result = wf.claim_badge().await.unwrap();
        assert!(result.claimed);
        assert_eq!(result.badge.serial, Some(1));
        assert_eq!(wf.stage(), Stage::Claimed);
        assert_eq!(wf.claim(), Some(&result));
        assert_eq!(backend.calls_to("claim_badge"), 1);
    }

    #[tokio::test]
    async fn test_completed_count_grows_by_one_per_task() {
        let (_backend, mut wf) = controller();
        wf.register("a@b.com").await.unwrap();
        for (n, task) in ["community_join", "social_follow", "chat_join"]
            .iter()
            .enumerate()
        {
            let progress = wf.verify_task(task).await.unwrap();
            assert_eq!(progress.completed, 1 + n + 1);
        }
        assert_eq!(wf.submit_proof(PROOF).await.unwrap().completed, 5);
    }

    #[tokio::test]
    async fn test_proof_first_then_social_tasks() {
        let (_backend, mut wf) = controller();
        wf.register("a@b.com").await.unwrap();

        let progress = wf.submit_proof(PROOF).await.unwrap();
        assert_eq!(progress.completed, 2);
        assert_eq!(wf.stage(), Stage::InProgress);

        for (n, task) in ["community_join", "chat_join", "social_follow"]
            .iter()
            .enumerate()
        {
            let progress = wf.verify_task(task).await.unwrap();
            assert_eq!(progress.completed, 2 + n + 1);
        }
        assert_eq!(as_tuple(wf.progress()), (5, 5, 100, true));
        assert_eq!(wf.stage(), Stage::ReadyToClaim);
    }

    #[tokio::test]
    async fn test_claim_before_ready_is_precondition() {
        let (backend, mut wf) = controller();
        wf.register("a@b.com").await.unwrap();

        let err = wf.claim_badge().await.unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Precondition {
                stage: Stage::Registered,
                ..
            }
        ));
        assert_eq!(wf.stage(), Stage::Registered);
        assert_eq!(wf.progress().completed, 1);
        assert_eq!(backend.calls_to("claim_badge"), 0);
    }

    #[tokio::test]
    async fn test_claim_from_unregistered_and_claimed_is_precondition() {
        let (backend, mut wf) = controller();
        assert!(matches!(
            wf.claim_badge().await,
            Err(WorkflowError::Precondition { .. })
        ));

        wf.register("a@b.com").await.unwrap();
        for task in TaskName::SOCIAL {
            wf.verify_task(task.as_str()).await.unwrap();
        }
        wf.submit_proof(PROOF).await.unwrap();
        wf.claim_badge().await.unwrap();

        assert!(matches!(
            wf.claim_badge().await,
            Err(WorkflowError::Precondition {
                stage: Stage::Claimed,
                ..
            })
        ));
        assert_eq!(backend.calls_to("claim_badge"), 1);
    }

    #[tokio::test]
    async fn test_unknown_task_leaves_state_unchanged() {
        let (backend, mut wf) = controller();
        wf.register("a@b.com").await.unwrap();
        let before = wf.snapshot();

        let err = wf.verify_task("unknown_task").await.unwrap_err();

        assert!(matches!(err, WorkflowError::UnknownTask(_)));
        assert_eq!(err.code(), "unknown_task_error");
        assert_eq!(wf.snapshot(), before);
        assert_eq!(backend.calls_to("update_task_progress"), 0);
    }

    #[tokio::test]
    async fn test_tasks_rejected_while_unregistered() {
        let (backend, mut wf) = controller();

        assert!(matches!(
            wf.verify_task("chat_join").await,
            Err(WorkflowError::Precondition {
                stage: Stage::Unregistered,
                ..
            })
        ));
        assert!(matches!(
            wf.submit_proof(PROOF).await,
            Err(WorkflowError::Precondition { .. })
        ));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_register_twice_is_precondition() {
        let (backend, mut wf) = controller();
        wf.register("a@b.com").await.unwrap();
        assert!(matches!(
            wf.register("c@d.com").await,
            Err(WorkflowError::Precondition { .. })
        ));
        assert_eq!(wf.participant().email, "a@b.com");
        assert_eq!(backend.calls_to("register"), 1);
    }

    #[tokio::test]
    async fn test_empty_inputs_make_no_call() {
        let (backend, mut wf) = controller();
        assert!(matches!(
            wf.register("   ").await,
            Err(WorkflowError::Precondition { .. })
        ));
        wf.register(" a@b.com ").await.unwrap();
        assert_eq!(wf.participant().email, "a@b.com");
        assert!(matches!(
            wf.submit_proof("").await,
            Err(WorkflowError::Precondition { .. })
        ));
        assert_eq!(backend.calls_to("submit_proof"), 0);
    }

    #[tokio::test]
    async fn test_registration_failure_retains_nothing() {
        let (backend, mut wf) = controller();
        backend.fail("register", BackendError::Duplicate("a@b.com".to_string()));

        let err = wf.register("a@b.com").await.unwrap_err();

        assert!(matches!(err, WorkflowError::Registration(BackendError::Duplicate(_))));
        assert_eq!(wf.stage(), Stage::Unregistered);
        assert_eq!(*wf.participant(), Participant::default());
        assert_eq!(wf.progress().completed, 0);

        backend.recover("register");
        wf.register("a@b.com").await.unwrap();
        assert_eq!(wf.stage(), Stage::Registered);
    }

    #[tokio::test]
    async fn test_verification_failure_is_retriable() {
        let (backend, mut wf) = controller();
        wf.register("a@b.com").await.unwrap();
        backend.fail(
            "update_task_progress",
            BackendError::Unavailable("timeout".to_string()),
        );

        let err = wf.verify_task("discord").await.unwrap_err();
        match &err {
            WorkflowError::TaskVerification { task, source } => {
                assert_eq!(*task, TaskName::CommunityJoin);
                assert!(source.is_transient());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!wf.tasks().community_join);

        backend.recover("update_task_progress");
        wf.verify_task("discord").await.unwrap();
        assert!(wf.tasks().community_join);
        assert_eq!(backend.calls_to("update_task_progress"), 2);
    }

    #[tokio::test]
    async fn test_submission_failure_keeps_flag_false() {
        let (backend, mut wf) = controller();
        wf.register("a@b.com").await.unwrap();
        backend.fail(
            "submit_proof",
            BackendError::InvalidInput("bad url".to_string()),
        );

        assert!(matches!(
            wf.submit_proof(PROOF).await,
            Err(WorkflowError::Submission(_))
        ));
        assert!(!wf.tasks().share_post);
    }

    #[tokio::test]
    async fn test_claim_failure_stays_ready() {
        let (backend, mut wf) = controller();
        wf.register("a@b.com").await.unwrap();
        for task in TaskName::SOCIAL {
            wf.verify_task(task.as_str()).await.unwrap();
        }
        wf.submit_proof(PROOF).await.unwrap();
        backend.fail(
            "claim_badge",
            BackendError::Rejected {
                status: 403,
                message: "closed".to_string(),
            },
        );

        assert!(matches!(wf.claim_badge().await, Err(WorkflowError::Claim(_))));
        assert_eq!(wf.stage(), Stage::ReadyToClaim);
        assert!(wf.claim().is_none());

        backend.recover("claim_badge");
        assert!(wf.claim_badge().await.unwrap().claimed);
        assert_eq!(wf.stage(), Stage::Claimed);
    }

    #[tokio::test]
    async fn test_verify_completed_task_skips_call() {
        let (backend, mut wf) = controller();
        wf.register("a@b.com").await.unwrap();
        wf.verify_task("chat_join").await.unwrap();
        let progress = wf.verify_task("telegram").await.unwrap();
        assert_eq!(progress.completed, 2);
        assert_eq!(backend.calls_to("update_task_progress"), 1);
    }

    #[tokio::test]
    async fn test_verify_non_social_task_is_precondition() {
        let (backend, mut wf) = controller();
        wf.register("a@b.com").await.unwrap();
        assert!(matches!(
            wf.verify_task("share_post").await,
            Err(WorkflowError::Precondition { .. })
        ));
        assert!(matches!(
            wf.verify_task("email").await,
            Err(WorkflowError::Precondition { .. })
        ));
        assert_eq!(backend.calls_to("update_task_progress"), 0);
    }

    #[tokio::test]
    async fn test_snapshot_hides_email_until_registered() {
        let (_backend, mut wf) = controller();
        assert_eq!(wf.snapshot().email, None);
        wf.register("a@b.com").await.unwrap();
        let snapshot = wf.snapshot();
        assert_eq!(snapshot.email.as_deref(), Some("a@b.com"));
        assert_eq!(snapshot.stage, Stage::Registered);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["stage"], "registered");
        assert_eq!(json["progress"]["percent"], 20);
    }
}
