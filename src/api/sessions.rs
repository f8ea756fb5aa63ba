//! Session endpoints: one badge workflow per browser session.
//!
//! Each session owns a `WorkflowController` behind an async mutex. A mutating
//! request takes the lock with `try_lock_owned`; if another operation holds it
//! the request is refused with 409 instead of queueing, so at most one
//! operation is in flight per session. The operation itself runs on a spawned
//! task that owns the lock: once issued it completes and its transition is
//! applied even if the client goes away. Reads never touch the lock: they
//! serve the view published after the last operation and an atomic busy flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use crate::backend::BackendError;
use crate::config::TaskLinks;
use crate::task::TaskName;
use crate::workflow::{WorkflowController, WorkflowError, WorkflowSnapshot};

use super::routes::AppState;
use super::types::{ChecklistEntry, Notice, ProofRequest, RegisterRequest, SessionView};

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

/// State published after each operation, readable while the next one runs.
struct Published {
    snapshot: WorkflowSnapshot,
    notice: Option<Notice>,
}

/// A mutating workflow request.
enum Operation {
    Register(String),
    VerifyTask(String),
    SubmitProof(String),
    ClaimBadge,
}

impl Operation {
    async fn apply(self, controller: &mut WorkflowController) -> Result<(), WorkflowError> {
        match self {
            Operation::Register(email) => controller.register(&email).await.map(|_| ()),
            Operation::VerifyTask(task) => controller.verify_task(&task).await.map(|_| ()),
            Operation::SubmitProof(url) => controller.submit_proof(&url).await.map(|_| ()),
            Operation::ClaimBadge => controller.claim_badge().await.map(|_| ()),
        }
    }
}

/// Clears the busy flag when the operation ends, panics included.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SessionSlot {
    id: Uuid,
    controller: Arc<Mutex<WorkflowController>>,
    busy: AtomicBool,
    published: RwLock<Published>,
    last_touched: RwLock<Instant>,
}

impl SessionSlot {
    pub fn new(controller: WorkflowController) -> Self {
        let snapshot = controller.snapshot();
        Self {
            id: Uuid::new_v4(),
            controller: Arc::new(Mutex::new(controller)),
            busy: AtomicBool::new(false),
            published: RwLock::new(Published {
                snapshot,
                notice: None,
            }),
            last_touched: RwLock::new(Instant::now()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// An operation is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub async fn touch(&self) {
        *self.last_touched.write().await = Instant::now();
    }

    /// Time since the last request for this session, as of `now`.
    pub async fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_touched.read().await)
    }

    /// Run `operation` on a task detached from the request.
    ///
    /// The transition and the published view are applied even if the caller
    /// stops waiting.
    async fn run(self: Arc<Self>, operation: Operation) -> Result<(), (StatusCode, String)> {
        let controller = Arc::clone(&self.controller)
            .try_lock_owned()
            .map_err(|_| busy(self.id))?;
        self.busy.store(true, Ordering::SeqCst);

        let slot = Arc::clone(&self);
        let task = tokio::spawn(async move {
            let mut controller = controller;
            // Declared after the lock so the flag clears before the lock is released.
            let _busy = BusyGuard(&slot.busy);
            let outcome = operation.apply(&mut controller).await;
            slot.publish(&controller, &outcome).await;
            outcome
        });

        task.await
            .map_err(|e| {
                tracing::error!(session = %self.id, error = %e, "Session operation aborted");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Session operation aborted".to_string(),
                )
            })?
            .map_err(workflow_error)
    }

    /// Publish the controller's state after an operation.
    ///
    /// A collaborator failure replaces the notice; a success clears it;
    /// caller misuse leaves it alone.
    async fn publish<T>(&self, controller: &WorkflowController, outcome: &Result<T, WorkflowError>) {
        let mut published = self.published.write().await;
        published.snapshot = controller.snapshot();
        match outcome {
            Ok(_) => published.notice = None,
            Err(err) if err.backend_error().is_some() => {
                published.notice = Some(Notice::from(err));
            }
            Err(_) => {}
        }
    }

    pub async fn view(&self, links: &TaskLinks) -> SessionView {
        let published = self.published.read().await;
        let checklist = published
            .snapshot
            .tasks
            .entries()
            .map(|(task, completed)| checklist_entry(task, completed, links))
            .collect();
        SessionView {
            id: self.id,
            snapshot: published.snapshot.clone(),
            busy: self.is_busy(),
            notice: published.notice.clone(),
            checklist,
        }
    }
}

fn checklist_entry(task: TaskName, completed: bool, links: &TaskLinks) -> ChecklistEntry {
    ChecklistEntry {
        task,
        title: task.title().to_string(),
        description: task.description().to_string(),
        link: links.for_task(task).map(str::to_string),
        completed,
    }
}

/// Create the session API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_session))
        .route("/:id", get(get_session))
        .route("/:id", delete(end_session))
        .route("/:id/register", post(register))
        .route("/:id/tasks/:task/verify", post(verify_task))
        .route("/:id/proof", post(submit_proof))
        .route("/:id/claim", post(claim_badge))
        .route("/:id/notice", delete(dismiss_notice))
}

/// HTTP status for a workflow failure.
pub fn error_status(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::Precondition { .. } => StatusCode::CONFLICT,
        WorkflowError::UnknownTask(_) => StatusCode::BAD_REQUEST,
        _ => match err.backend_error() {
            Some(BackendError::Duplicate(_)) => StatusCode::CONFLICT,
            Some(BackendError::InvalidInput(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Some(BackendError::UnknownParticipant(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_GATEWAY,
        },
    }
}

fn workflow_error(err: WorkflowError) -> (StatusCode, String) {
    (error_status(&err), err.to_string())
}

/// Look up a session and mark it as recently used.
async fn find_session(state: &AppState, id: Uuid) -> Result<Arc<SessionSlot>, (StatusCode, String)> {
    let slot = state
        .sessions
        .read()
        .await
        .get(&id)
        .cloned()
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Session {} not found", id)))?;
    slot.touch().await;
    Ok(slot)
}

fn busy(id: Uuid) -> (StatusCode, String) {
    (
        StatusCode::CONFLICT,
        format!("Session {} is busy with another operation", id),
    )
}

async fn run_operation(state: &AppState, id: Uuid, operation: Operation) -> ApiResult<SessionView> {
    let slot = find_session(state, id).await?;
    Arc::clone(&slot).run(operation).await?;
    Ok(Json(slot.view(&state.config.task_links).await))
}

/// POST /api/sessions
async fn create_session(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    let slot = Arc::new(SessionSlot::new(WorkflowController::new(Arc::clone(
        &state.backend,
    ))));
    state.sessions.write().await.insert(slot.id(), Arc::clone(&slot));
    tracing::debug!(session = %slot.id(), "Session created");
    Json(slot.view(&state.config.task_links).await)
}

/// GET /api/sessions/:id
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionView> {
    let slot = find_session(&state, id).await?;
    Ok(Json(slot.view(&state.config.task_links).await))
}

/// DELETE /api/sessions/:id
async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.sessions.write().await.remove(&id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err((StatusCode::NOT_FOUND, format!("Session {} not found", id))),
    }
}

/// POST /api/sessions/:id/register
async fn register(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<SessionView> {
    run_operation(&state, id, Operation::Register(req.email)).await
}

/// POST /api/sessions/:id/tasks/:task/verify
async fn verify_task(
    State(state): State<Arc<AppState>>,
    Path((id, task)): Path<(Uuid, String)>,
) -> ApiResult<SessionView> {
    run_operation(&state, id, Operation::VerifyTask(task)).await
}

/// POST /api/sessions/:id/proof
async fn submit_proof(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProofRequest>,
) -> ApiResult<SessionView> {
    run_operation(&state, id, Operation::SubmitProof(req.proof_url)).await
}

/// POST /api/sessions/:id/claim
async fn claim_badge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionView> {
    run_operation(&state, id, Operation::ClaimBadge).await
}

/// DELETE /api/sessions/:id/notice
async fn dismiss_notice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionView> {
    let slot = find_session(&state, id).await?;
    slot.published.write().await.notice = None;
    Ok(Json(slot.view(&state.config.task_links).await))
}
