//! PgAgentHost: agent events and logs backed by Postgres.
//!
//! One instance is scoped to a single `agent_id`. Every read and write filters
//! on it, so several agents can share the same tables.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::host::AgentHost;
use crate::types::{AgentLog, LogLevel, StoredEvent};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Create the host tables if they do not exist yet. Idempotent.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS agent_events (
            id          BIGSERIAL    PRIMARY KEY,
            agent_id    BIGINT       NOT NULL,
            payload     JSONB        NOT NULL,
            created_at  TIMESTAMPTZ  NOT NULL DEFAULT now(),
            expires_at  TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS agent_events_agent_id_id ON agent_events (agent_id, id DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS agent_logs (
            id          BIGSERIAL    PRIMARY KEY,
            agent_id    BIGINT       NOT NULL,
            level       SMALLINT     NOT NULL,
            message     TEXT         NOT NULL,
            created_at  TIMESTAMPTZ  NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Agent host schema ready");
    Ok(())
}

// ---------------------------------------------------------------------------
// PgAgentHost
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgAgentHost {
    pool: PgPool,
    agent_id: i64,
    keep_events_for: Option<Duration>,
}

impl PgAgentHost {
    pub fn new(pool: PgPool, agent_id: i64) -> Self {
        Self {
            pool,
            agent_id,
            keep_events_for: None,
        }
    }

    /// Expire created and refreshed events `keep` from now.
    pub fn with_keep_events_for(mut self, keep: Duration) -> Self {
        self.keep_events_for = Some(keep);
        self
    }

    pub fn agent_id(&self) -> i64 {
        self.agent_id
    }

    /// The agent's log lines, newest first.
    pub async fn recent_logs(&self, limit: usize) -> Result<Vec<AgentLog>> {
        let rows = sqlx::query_as::<_, (i16, String, DateTime<Utc>)>(
            r#"
            SELECT level, message, created_at
            FROM agent_logs
            WHERE agent_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(self.agent_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(level, message, created_at)| AgentLog {
                level: LogLevel::from_i16(level),
                message,
                created_at,
            })
            .collect())
    }

    async fn write_log(&self, level: LogLevel, message: &str) {
        let result = sqlx::query(
            "INSERT INTO agent_logs (agent_id, level, message) VALUES ($1, $2, $3)",
        )
        .bind(self.agent_id)
        .bind(level.as_i16())
        .bind(message)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(error = %e, agent_id = self.agent_id, "Failed to write agent log (non-fatal)");
        }
    }
}

#[async_trait]
impl AgentHost for PgAgentHost {
    async fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query_as::<_, StoredEvent>(
            r#"
            SELECT id, payload, created_at, expires_at
            FROM agent_events
            WHERE agent_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(self.agent_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn create_event(&self, payload: Value) -> Result<StoredEvent> {
        let stored = sqlx::query_as::<_, StoredEvent>(
            r#"
            INSERT INTO agent_events (agent_id, payload, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, payload, created_at, expires_at
            "#,
        )
        .bind(self.agent_id)
        .bind(&payload)
        .bind(self.new_event_expiration_date())
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn update_expiration(
        &self,
        event_id: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE agent_events SET expires_at = $1 WHERE id = $2 AND agent_id = $3")
                .bind(expires_at)
                .bind(event_id)
                .bind(self.agent_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("agent {} has no event with id {event_id}", self.agent_id);
        }
        Ok(())
    }

    fn new_event_expiration_date(&self) -> Option<DateTime<Utc>> {
        self.keep_events_for.map(|keep| Utc::now() + keep)
    }

    async fn log(&self, message: &str) {
        info!(agent_id = self.agent_id, "{message}");
        self.write_log(LogLevel::Info, message).await;
    }

    async fn error(&self, message: &str) {
        error!(agent_id = self.agent_id, "{message}");
        self.write_log(LogLevel::Error, message).await;
    }

    async fn last_event_at(&self) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query_as::<_, (Option<DateTime<Utc>>,)>(
            "SELECT MAX(created_at) FROM agent_events WHERE agent_id = $1",
        )
        .bind(self.agent_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn last_error_log_at(&self) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query_as::<_, (Option<DateTime<Utc>>,)>(
            "SELECT MAX(created_at) FROM agent_logs WHERE agent_id = $1 AND level >= $2",
        )
        .bind(self.agent_id)
        .bind(LogLevel::Error.as_i16())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }
}

// ---------------------------------------------------------------------------
// sqlx::FromRow for StoredEvent
// ---------------------------------------------------------------------------

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredEvent {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(StoredEvent {
            id: row.try_get("id")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}
