//! In-memory host for tests and dry runs. No database required.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{error, info};

use crate::host::AgentHost;
use crate::types::{AgentLog, LogLevel, StoredEvent};

/// Thread-safe in-memory host. Event ids increase from 1 in creation order.
pub struct MemoryAgentHost {
    next_id: AtomicI64,
    events: Mutex<Vec<StoredEvent>>,
    logs: Mutex<Vec<AgentLog>>,
    keep_events_for: Option<Duration>,
}

impl MemoryAgentHost {
    /// A host that keeps events forever.
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            events: Mutex::new(Vec::new()),
            logs: Mutex::new(Vec::new()),
            keep_events_for: None,
        }
    }

    /// Give every created or refreshed event an expiration `keep` from now.
    pub fn with_keep_events_for(mut self, keep: Duration) -> Self {
        self.keep_events_for = Some(keep);
        self
    }

    /// Store a payload directly, bypassing the agent. Returns the new event.
    pub fn seed(&self, payload: Value) -> StoredEvent {
        self.insert(payload, Utc::now())
    }

    /// Store a payload with an explicit creation time.
    pub fn seed_at(&self, payload: Value, created_at: DateTime<Utc>) -> StoredEvent {
        self.insert(payload, created_at)
    }

    /// All events in creation order (for test assertions).
    pub fn events(&self) -> Vec<StoredEvent> {
        self.events.lock().unwrap().clone()
    }

    /// All log lines in write order (for test assertions).
    pub fn logs(&self) -> Vec<AgentLog> {
        self.logs.lock().unwrap().clone()
    }

    /// Log messages only, in write order.
    pub fn log_messages(&self) -> Vec<String> {
        self.logs().into_iter().map(|l| l.message).collect()
    }

    fn insert(&self, payload: Value, created_at: DateTime<Utc>) -> StoredEvent {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = StoredEvent {
            id,
            payload,
            created_at,
            expires_at: self.new_event_expiration_date(),
        };
        self.events.lock().unwrap().push(stored.clone());
        stored
    }

    fn push_log(&self, level: LogLevel, message: &str) {
        self.logs.lock().unwrap().push(AgentLog {
            level,
            message: message.to_string(),
            created_at: Utc::now(),
        });
    }
}

impl Default for MemoryAgentHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentHost for MemoryAgentHost {
    async fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>> {
        let events = self.events.lock().unwrap();
        let mut recent: Vec<StoredEvent> = events.iter().cloned().collect();
        recent.sort_by(|a, b| b.id.cmp(&a.id));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn create_event(&self, payload: Value) -> Result<StoredEvent> {
        Ok(self.insert(payload, Utc::now()))
    }

    async fn update_expiration(
        &self,
        event_id: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut events = self.events.lock().unwrap();
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| anyhow!("MemoryAgentHost: no event with id {event_id}"))?;
        event.expires_at = expires_at;
        Ok(())
    }

    fn new_event_expiration_date(&self) -> Option<DateTime<Utc>> {
        self.keep_events_for.map(|keep| Utc::now() + keep)
    }

    async fn log(&self, message: &str) {
        info!(host = "memory", "{message}");
        self.push_log(LogLevel::Info, message);
    }

    async fn error(&self, message: &str) {
        error!(host = "memory", "{message}");
        self.push_log(LogLevel::Error, message);
    }

    async fn last_event_at(&self) -> Result<Option<DateTime<Utc>>> {
        let events = self.events.lock().unwrap();
        Ok(events.iter().map(|e| e.created_at).max())
    }

    async fn last_error_log_at(&self) -> Result<Option<DateTime<Utc>>> {
        let logs = self.logs.lock().unwrap();
        Ok(logs
            .iter()
            .filter(|l| l.level == LogLevel::Error)
            .map(|l| l.created_at)
            .max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn recent_events_are_newest_first_and_limited() {
        let host = MemoryAgentHost::new();
        for n in 0..5 {
            host.seed(json!({ "n": n }));
        }

        let recent = host.recent_events(3).await.unwrap();

        let ids: Vec<i64> = recent.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }

    #[tokio::test]
    async fn events_never_expire_without_retention() {
        let host = MemoryAgentHost::new();

        let event = host.create_event(json!({ "a": 1 })).await.unwrap();

        assert!(event.expires_at.is_none());
        assert!(host.new_event_expiration_date().is_none());
    }

    #[tokio::test]
    async fn retention_sets_future_expiration() {
        let host = MemoryAgentHost::new().with_keep_events_for(Duration::days(7));

        let event = host.create_event(json!({ "a": 1 })).await.unwrap();

        let expires_at = event.expires_at.expect("expiration set");
        assert!(expires_at > Utc::now() + Duration::days(6));
    }

    #[tokio::test]
    async fn update_expiration_changes_only_target_event() {
        let host = MemoryAgentHost::new();
        let first = host.seed(json!({ "a": 1 }));
        host.seed(json!({ "a": 2 }));
        let when = Utc::now() + Duration::days(1);

        host.update_expiration(first.id, Some(when)).await.unwrap();

        let events = host.events();
        assert_eq!(events[0].expires_at, Some(when));
        assert_eq!(events[1].expires_at, None);
    }

    #[tokio::test]
    async fn update_expiration_of_unknown_event_fails() {
        let host = MemoryAgentHost::new();
        assert!(host.update_expiration(42, None).await.is_err());
    }

    #[tokio::test]
    async fn error_logs_are_tracked_separately() {
        let host = MemoryAgentHost::new();
        host.log("hello").await;
        assert!(host.last_error_log_at().await.unwrap().is_none());

        host.error("boom").await;

        assert!(host.last_error_log_at().await.unwrap().is_some());
        assert_eq!(host.log_messages(), vec!["hello", "boom"]);
    }
}
