//! Task module - the fixed campaign checklist and its completion ledger.
//!
//! The checklist is closed: five named tasks, each completed at most once.
//! Everything here is pure state; no I/O happens in this module.

mod ledger;

pub use ledger::{Progress, TaskSet};

use serde::{Deserialize, Serialize};

/// One entry of the campaign checklist.
///
/// The wire name (`as_str`) is what the collaborator and the HTTP API use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskName {
    /// Pre-registration with an email address
    Email,
    /// Follow the project on the social network
    SocialFollow,
    /// Join the chat community
    ChatJoin,
    /// Join the voice/community server
    CommunityJoin,
    /// Post the promotional message and submit its URL
    SharePost,
}

impl TaskName {
    /// All tasks in checklist order.
    pub const ALL: [TaskName; 5] = [
        TaskName::Email,
        TaskName::SocialFollow,
        TaskName::ChatJoin,
        TaskName::CommunityJoin,
        TaskName::SharePost,
    ];

    /// Tasks completed through a plain "verify" action.
    pub const SOCIAL: [TaskName; 3] = [
        TaskName::SocialFollow,
        TaskName::ChatJoin,
        TaskName::CommunityJoin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskName::Email => "email",
            TaskName::SocialFollow => "social_follow",
            TaskName::ChatJoin => "chat_join",
            TaskName::CommunityJoin => "community_join",
            TaskName::SharePost => "share_post",
        }
    }

    /// Display title shown on the landing page.
    pub fn title(&self) -> &'static str {
        match self {
            TaskName::Email => "Pre-register email",
            TaskName::SocialFollow => "Follow on X",
            TaskName::ChatJoin => "Join Telegram",
            TaskName::CommunityJoin => "Join Discord",
            TaskName::SharePost => "Tweet badge link",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TaskName::Email => "Register the email address the badge is issued to",
            TaskName::SocialFollow => "Follow the official account for campaign updates",
            TaskName::ChatJoin => "Join the community chat group",
            TaskName::CommunityJoin => "Join the community server",
            TaskName::SharePost => "Post the badge link and paste the post URL",
        }
    }

    /// Whether this task is completed through `verify` (as opposed to
    /// registration or proof submission).
    pub fn is_social(&self) -> bool {
        Self::SOCIAL.contains(self)
    }
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskName {
    type Err = UnknownTaskError;

    /// Parse a task name. Also accepts the landing page's legacy names
    /// (`twitter`, `telegram`, `discord`, `tweet`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(TaskName::Email),
            "social_follow" | "twitter" => Ok(TaskName::SocialFollow),
            "chat_join" | "telegram" => Ok(TaskName::ChatJoin),
            "community_join" | "discord" => Ok(TaskName::CommunityJoin),
            "share_post" | "tweet" => Ok(TaskName::SharePost),
            _ => Err(UnknownTaskError(s.to_string())),
        }
    }
}

/// The name does not match any checklist task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown task: {0}")]
pub struct UnknownTaskError(pub String);
