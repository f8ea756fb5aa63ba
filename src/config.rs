//! Configuration management for the badge claim service.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `BADGE_BACKEND` - Optional. `supabase` or `memory`. Defaults to `supabase`
//!   when `SUPABASE_URL` is set, `memory` otherwise.
//! - `SUPABASE_URL` - Supabase project URL. Required for the `supabase` backend.
//! - `SUPABASE_KEY` - API key sent as `apikey`/Bearer. Required for the `supabase` backend.
//! - `BADGE_TABLE` - Optional. PostgREST table of participants. Defaults to `badge_participants`.
//! - `BADGE_NAME` - Optional. Display name of the issued badge. Defaults to `Early Supporter Badge`.
//! - `SOCIAL_FOLLOW_URL`, `CHAT_JOIN_URL`, `COMMUNITY_JOIN_URL` - Optional.
//!   Action links shown next to the social tasks.
//! - `SESSION_TTL_SECS` - Optional. Idle time after which a session is dropped.
//!   Defaults to `3600`.

use std::time::Duration;

use thiserror::Error;

use crate::task::TaskName;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Which collaborator binding serves the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Process-local records, lost on restart
    Memory,
    Supabase {
        url: String,
        api_key: String,
        table: String,
    },
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Memory => "memory",
            BackendConfig::Supabase { .. } => "supabase",
        }
    }
}

/// Optional links for the social tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskLinks {
    pub social_follow: Option<String>,
    pub chat_join: Option<String>,
    pub community_join: Option<String>,
}

impl TaskLinks {
    pub fn for_task(&self, task: TaskName) -> Option<&str> {
        match task {
            TaskName::SocialFollow => self.social_follow.as_deref(),
            TaskName::ChatJoin => self.chat_join.as_deref(),
            TaskName::CommunityJoin => self.community_join.as_deref(),
            TaskName::Email | TaskName::SharePost => None,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Collaborator binding
    pub backend: BackendConfig,

    /// Display name of the issued badge
    pub badge_name: String,

    pub task_links: TaskLinks,

    /// Idle sessions older than this are evicted
    pub session_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if the Supabase backend is selected
    /// without `SUPABASE_URL`/`SUPABASE_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` (an environment stand-in).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = get("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = get("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let supabase_url = get("SUPABASE_URL");
        let kind = get("BADGE_BACKEND")
            .map(|v| v.trim().to_lowercase())
            .unwrap_or_else(|| {
                if supabase_url.is_some() {
                    "supabase".to_string()
                } else {
                    "memory".to_string()
                }
            });

        let backend = match kind.as_str() {
            "memory" => BackendConfig::Memory,
            "supabase" => BackendConfig::Supabase {
                url: supabase_url
                    .ok_or_else(|| ConfigError::MissingEnvVar("SUPABASE_URL".to_string()))?,
                api_key: get("SUPABASE_KEY")
                    .ok_or_else(|| ConfigError::MissingEnvVar("SUPABASE_KEY".to_string()))?,
                table: get("BADGE_TABLE").unwrap_or_else(|| "badge_participants".to_string()),
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "BADGE_BACKEND".to_string(),
                    format!("expected `supabase` or `memory`, got `{}`", other),
                ))
            }
        };

        let badge_name = get("BADGE_NAME").unwrap_or_else(|| "Early Supporter Badge".to_string());

        let task_links = TaskLinks {
            social_follow: get("SOCIAL_FOLLOW_URL"),
            chat_join: get("CHAT_JOIN_URL"),
            community_join: get("COMMUNITY_JOIN_URL"),
        };

        let ttl_secs: u64 = get("SESSION_TTL_SECS")
            .unwrap_or_else(|| "3600".to_string())
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue("SESSION_TTL_SECS".to_string(), format!("{}", e)))?;
        if ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            host,
            port,
            backend,
            badge_name,
            task_links,
            session_ttl: Duration::from_secs(ttl_secs),
        })
    }

    /// Create a config backed by the in-memory collaborator (useful for testing).
    pub fn in_memory() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            backend: BackendConfig::Memory,
            badge_name: "Early Supporter Badge".to_string(),
            task_links: TaskLinks::default(),
            session_ttl: Duration::from_secs(3600),
        }
    }
}
