use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use propmatch_core::context::ContextStore;
use propmatch_core::domain::context::{ConversationContext, ConversationId};
use propmatch_core::errors::ContextStoreError;

use super::RepositoryError;
use crate::DbPool;

/// Context rows shared by every process pointing at the same database.
/// Timestamps are stored as fixed-width RFC 3339 so they compare as text.
pub struct SqlContextStore {
    pool: DbPool,
    ttl: Duration,
}

impl SqlContextStore {
    pub fn new(pool: DbPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    pub async fn load_at(
        &self,
        id: &ConversationId,
        now: DateTime<Utc>,
    ) -> Result<Option<ConversationContext>, RepositoryError> {
        let row = sqlx::query(
            "SELECT payload_json, last_access_at
             FROM conversation_context
             WHERE conversation_id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut context = context_from_row(&row)?;
        if context.conversation_id != *id || context.is_expired(self.ttl, now) {
            sqlx::query("DELETE FROM conversation_context WHERE conversation_id = ?")
                .bind(id.as_str())
                .execute(&self.pool)
                .await?;
            return Ok(None);
        }

        sqlx::query("UPDATE conversation_context SET last_access_at = ? WHERE conversation_id = ?")
            .bind(timestamp(now))
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        context.last_access_time = now;
        Ok(Some(context))
    }

    pub async fn save_at(
        &self,
        context: &ConversationContext,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut stored = context.clone();
        stored.last_access_time = now;
        let payload = serde_json::to_string(&stored)
            .map_err(|error| RepositoryError::Decode(format!("context payload: {error}")))?;

        sqlx::query(
            "INSERT INTO conversation_context (conversation_id, payload_json, last_access_at, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(conversation_id) DO UPDATE SET
                payload_json = excluded.payload_json,
                last_access_at = excluded.last_access_at,
                updated_at = excluded.updated_at",
        )
        .bind(stored.conversation_id.as_str())
        .bind(payload)
        .bind(timestamp(now))
        .bind(timestamp(now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Removes rows idle for longer than the TTL; returns how many were dropped.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let cutoff = timestamp(now - self.ttl);
        let result = sqlx::query("DELETE FROM conversation_context WHERE last_access_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl ContextStore for SqlContextStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn load(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationContext>, ContextStoreError> {
        Ok(self.load_at(id, Utc::now()).await?)
    }

    async fn save(&self, context: &ConversationContext) -> Result<(), ContextStoreError> {
        Ok(self.save_at(context, Utc::now()).await?)
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn context_from_row(row: &SqliteRow) -> Result<ConversationContext, RepositoryError> {
    let payload: String = row.try_get("payload_json")?;
    let last_access_raw: String = row.try_get("last_access_at")?;

    let mut context: ConversationContext = serde_json::from_str(&payload)
        .map_err(|error| RepositoryError::Decode(format!("invalid context payload: {error}")))?;
    context.last_access_time = DateTime::parse_from_rfc3339(&last_access_raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| {
            RepositoryError::Decode(format!(
                "invalid timestamp in `last_access_at`: `{last_access_raw}` ({error})"
            ))
        })?;
    Ok(context)
}
