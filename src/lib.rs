//! # Badge Claim
//!
//! Campaign service behind a "claim your badge" landing page.
//!
//! A participant registers an email, completes a fixed checklist of social
//! tasks, and once every task is done may claim a cosmetic badge. Persistence
//! belongs to an external collaborator (a Supabase table, or process memory
//! in development); this crate orchestrates the calls and tracks progress.
//!
//! ## Architecture
//!
//! ```text
//!   browser ──HTTP──▶ api (one session per visitor)
//!                      │
//!                      ▼
//!              WorkflowController ──▶ TaskSet (progress)
//!                      │
//!                      ▼
//!                BadgeBackend ──▶ Supabase PostgREST / in-memory
//! ```
//!
//! ## Modules
//! - `task`: checklist names and the completion ledger
//! - `workflow`: register → verify/submit → claim state machine
//! - `backend`: collaborator trait and its bindings
//! - `api`: HTTP surface with per-session busy flag and notices

pub mod api;
pub mod backend;
pub mod config;
pub mod task;
pub mod workflow;

pub use backend::{BackendError, BadgeBackend, BadgeClaim};
pub use config::Config;
pub use task::{Progress, TaskName, TaskSet};
pub use workflow::{ClaimResult, Stage, WorkflowController, WorkflowError};
