// Dedup of scraped records against the agent's recent events.
//
// The window is a single snapshot taken before the batch: records created
// earlier in the same batch are not compared against later ones.

use agent_host::{AgentHost, StoredEvent};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// How many of the most recent events a new record is compared against.
pub const UNIQUENESS_LOOK_BACK: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub created: usize,
    pub refreshed: usize,
}

/// Compact serialization used for equality, with object keys sorted at
/// every level regardless of how the map preserves insertion order.
pub fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Refresh the expiration of records already stored, create the rest.
pub async fn store_results<H>(host: &H, records: Vec<Value>) -> Result<StoreSummary>
where
    H: AgentHost + ?Sized,
{
    let snapshot: Vec<(String, StoredEvent)> = host
        .recent_events(UNIQUENESS_LOOK_BACK)
        .await?
        .into_iter()
        .map(|event| (canonical_json(&event.payload), event))
        .collect();

    let mut summary = StoreSummary::default();

    for record in records {
        let record_json = canonical_json(&record);
        match snapshot.iter().find(|(json, _)| *json == record_json) {
            Some((_, existing)) => {
                debug!(event_id = existing.id, "Record already stored, refreshing expiration");
                host.update_expiration(existing.id, host.new_event_expiration_date())
                    .await?;
                summary.refreshed += 1;
            }
            None => {
                host.create_event(record).await?;
                summary.created += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_host::MemoryAgentHost;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn canonical_json_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[tokio::test]
    async fn empty_store_creates_every_record() {
        let host = MemoryAgentHost::new();

        let summary = store_results(&host, vec![json!({"a": 1}), json!({"b": 2})])
            .await
            .unwrap();

        assert_eq!(summary, StoreSummary { created: 2, refreshed: 0 });
        assert_eq!(host.events().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_refreshes_expiration_instead_of_creating() {
        let host = MemoryAgentHost::new();
        let existing = host.seed(json!({"a": 1}));
        assert!(existing.expires_at.is_none());
        let host = host.with_keep_events_for(Duration::days(2));

        let summary = store_results(&host, vec![json!({"a": 1})]).await.unwrap();

        assert_eq!(summary, StoreSummary { created: 0, refreshed: 1 });
        let events = host.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].expires_at.is_some());
    }

    #[tokio::test]
    async fn same_batch_duplicates_are_both_created() {
        let host = MemoryAgentHost::new();

        let summary = store_results(&host, vec![json!({"a": 1}), json!({"a": 1})])
            .await
            .unwrap();

        assert_eq!(summary.created, 2);
        assert_eq!(host.events().len(), 2);
    }
}
