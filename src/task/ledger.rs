//! Completion ledger for one participant's checklist.
//!
//! # Invariants
//! - Flags only move from `false` to `true`; nothing un-completes a task.
//! - Progress is recomputed from the flags on every call.

use serde::{Deserialize, Serialize};

use super::{TaskName, UnknownTaskError};

/// The five completion flags of a participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSet {
    pub email: bool,
    pub social_follow: bool,
    pub chat_join: bool,
    pub community_join: bool,
    pub share_post: bool,
}

/// Derived progress metrics.
///
/// # Invariants
/// - `completed <= total`
/// - `all_complete == (completed == total)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// `completed / total * 100`, exact since `total` divides 100
    pub percent: u8,
    pub all_complete: bool,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete(&self, task: TaskName) -> bool {
        match task {
            TaskName::Email => self.email,
            TaskName::SocialFollow => self.social_follow,
            TaskName::ChatJoin => self.chat_join,
            TaskName::CommunityJoin => self.community_join,
            TaskName::SharePost => self.share_post,
        }
    }

    /// Set the flag for `task`. Marking a completed task again is a no-op.
    pub fn mark(&mut self, task: TaskName) {
        let flag = match task {
            TaskName::Email => &mut self.email,
            TaskName::SocialFollow => &mut self.social_follow,
            TaskName::ChatJoin => &mut self.chat_join,
            TaskName::CommunityJoin => &mut self.community_join,
            TaskName::SharePost => &mut self.share_post,
        };
        *flag = true;
    }

    /// Set the flag for a task given by name.
    ///
    /// # Errors
    /// Returns `UnknownTaskError` if `name` is not a checklist task; the set
    /// is left unchanged in that case.
    pub fn mark_complete(&mut self, name: &str) -> Result<TaskName, UnknownTaskError> {
        let task: TaskName = name.parse()?;
        self.mark(task);
        Ok(task)
    }

    pub fn progress(&self) -> Progress {
        let total = TaskName::ALL.len();
        let completed = TaskName::ALL
            .iter()
            .filter(|task| self.is_complete(**task))
            .count();
        Progress {
            completed,
            total,
            percent: (completed * 100 / total) as u8,
            all_complete: completed == total,
        }
    }

    /// Completion flags in checklist order.
    pub fn entries(&self) -> impl Iterator<Item = (TaskName, bool)> + '_ {
        TaskName::ALL
            .into_iter()
            .map(move |task| (task, self.is_complete(task)))
    }
}
