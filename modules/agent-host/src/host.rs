// The host surface an agent is allowed to touch.
//
// Implemented by MemoryAgentHost (tests, dry runs) and PgAgentHost (postgres).
// Also implemented for `Arc<H>` so tests can keep a handle for assertions.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::StoredEvent;

#[async_trait]
pub trait AgentHost: Send + Sync {
    /// The agent's most recent events, newest first, at most `limit`.
    async fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>>;

    /// Persist a new event. Its expiration comes from `new_event_expiration_date`.
    async fn create_event(&self, payload: Value) -> Result<StoredEvent>;

    /// Replace an existing event's expiration.
    async fn update_expiration(
        &self,
        event_id: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Expiration for an event created (or refreshed) right now.
    /// `None` when the host keeps events forever.
    fn new_event_expiration_date(&self) -> Option<DateTime<Utc>>;

    /// Append an info line to the agent log.
    async fn log(&self, message: &str);

    /// Append an error line to the agent log.
    async fn error(&self, message: &str);

    /// When the agent last created an event.
    async fn last_event_at(&self) -> Result<Option<DateTime<Utc>>>;

    /// When the agent last logged an error.
    async fn last_error_log_at(&self) -> Result<Option<DateTime<Utc>>>;

    /// Resolve `{{ path }}` templates in the options against `context`.
    fn interpolated(&self, options: &Value, context: &Value) -> Value {
        crate::interpolate::interpolate(options, context)
    }
}

#[async_trait]
impl<H: AgentHost + ?Sized> AgentHost for Arc<H> {
    async fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>> {
        (**self).recent_events(limit).await
    }

    async fn create_event(&self, payload: Value) -> Result<StoredEvent> {
        (**self).create_event(payload).await
    }

    async fn update_expiration(
        &self,
        event_id: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        (**self).update_expiration(event_id, expires_at).await
    }

    fn new_event_expiration_date(&self) -> Option<DateTime<Utc>> {
        (**self).new_event_expiration_date()
    }

    async fn log(&self, message: &str) {
        (**self).log(message).await
    }

    async fn error(&self, message: &str) {
        (**self).error(message).await
    }

    async fn last_event_at(&self) -> Result<Option<DateTime<Utc>>> {
        (**self).last_event_at().await
    }

    async fn last_error_log_at(&self) -> Result<Option<DateTime<Utc>>> {
        (**self).last_error_log_at().await
    }

    fn interpolated(&self, options: &Value, context: &Value) -> Value {
        (**self).interpolated(options, context)
    }
}
