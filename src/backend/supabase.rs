//! Supabase binding over the PostgREST API.
//!
//! One row per participant in `table`, keyed by a unique `email` column:
//!
//! ```text
//! id bigint identity | email text unique | social_follow bool | chat_join bool
//! community_join bool | share_post bool | share_post_url text
//! badge_claimed bool | claimed_at timestamptz
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;

use super::{
    classify_http_status, ensure_social_task, validate_email, validate_proof_url, BackendError,
    BadgeBackend, BadgeClaim,
};
use crate::task::TaskName;

/// Row fields read back from PostgREST.
#[derive(Debug, Deserialize)]
struct ParticipantRow {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    claimed_at: Option<DateTime<Utc>>,
}

/// Supabase client for the participants table.
pub struct SupabaseBadgeBackend {
    client: Client,
    url: String,
    api_key: String,
    table: String,
    badge_name: String,
}

impl SupabaseBadgeBackend {
    pub fn new(url: &str, api_key: &str, table: &str, badge_name: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
            badge_name: badge_name.to_string(),
        }
    }

    /// Get the PostgREST URL of the participants table.
    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url, self.table)
    }

    /// Table URL filtered to one participant.
    fn participant_url(&self, email: &str) -> String {
        format!(
            "{}?email=eq.{}",
            self.table_url(),
            urlencoding::encode(email)
        )
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
    }

    /// Read the body, turning a non-2xx status into an error.
    async fn read_body(resp: Response) -> Result<String, BackendError> {
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(classify_http_status(status.as_u16(), &text));
        }
        Ok(text)
    }

    /// PATCH the participant's row and return the updated rows.
    ///
    /// An empty representation means no row matched the email.
    async fn patch_participant(
        &self,
        email: &str,
        body: serde_json::Value,
    ) -> Result<ParticipantRow, BackendError> {
        let resp = self
            .authed(self.client.patch(self.participant_url(email)))
            .json(&body)
            .send()
            .await?;

        let text = Self::read_body(resp).await?;
        let rows: Vec<ParticipantRow> =
            serde_json::from_str(&text).map_err(|e| BackendError::Malformed(e.to_string()))?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::UnknownParticipant(email.to_string()))
    }
}

#[async_trait]
impl BadgeBackend for SupabaseBadgeBackend {
    fn id(&self) -> &str {
        "supabase"
    }

    async fn register(&self, email: &str) -> Result<(), BackendError> {
        validate_email(email)?;
        let body = serde_json::json!({ "email": email });

        let resp = self
            .authed(self.client.post(self.table_url()))
            .json(&body)
            .send()
            .await?;

        match Self::read_body(resp).await {
            Ok(_) => Ok(()),
            Err(BackendError::Duplicate(_)) => Err(BackendError::Duplicate(email.to_string())),
            Err(e) => Err(e),
        }
    }

    async fn update_task_progress(&self, email: &str, task: TaskName) -> Result<(), BackendError> {
        ensure_social_task(task)?;
        let mut body = serde_json::Map::new();
        body.insert(task.as_str().to_string(), serde_json::Value::Bool(true));
        self.patch_participant(email, serde_json::Value::Object(body))
            .await?;
        Ok(())
    }

    async fn submit_proof(&self, email: &str, proof_url: &str) -> Result<(), BackendError> {
        let url = validate_proof_url(proof_url)?;
        let body = serde_json::json!({
            "share_post": true,
            "share_post_url": url.as_str(),
        });
        self.patch_participant(email, body).await?;
        Ok(())
    }

    async fn claim_badge(&self, email: &str) -> Result<BadgeClaim, BackendError> {
        let now = Utc::now();
        let body = serde_json::json!({
            "badge_claimed": true,
            "claimed_at": now.to_rfc3339(),
        });
        let row = self.patch_participant(email, body).await?;
        Ok(BadgeClaim {
            badge_name: self.badge_name.clone(),
            serial: row.id,
            claimed_at: row.claimed_at.unwrap_or(now),
        })
    }
}
