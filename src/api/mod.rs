//! HTTP API for the badge landing page.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `POST /api/sessions` - Start a session
//! - `GET /api/sessions/{id}` - Session state (stage, tasks, progress, claim, notice)
//! - `DELETE /api/sessions/{id}` - End a session
//! - `POST /api/sessions/{id}/register` - Register the participant's email
//! - `POST /api/sessions/{id}/tasks/{task}/verify` - Verify a social task
//! - `POST /api/sessions/{id}/proof` - Submit the promotional post URL
//! - `POST /api/sessions/{id}/claim` - Claim the badge
//! - `DELETE /api/sessions/{id}/notice` - Dismiss the failure notice

mod routes;
mod sessions;
pub mod types;

pub use routes::{build_backend, router, serve, start_cleanup_task, AppState};
pub use sessions::{error_status, SessionSlot};
pub use types::*;
