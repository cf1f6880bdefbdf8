//! Integration tests for PgAgentHost.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use agent_host::{migrate, AgentHost, LogLevel, PgAgentHost};
use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;

/// Get a host scoped to `agent_id` with a clean slate, or skip if no test DB is available.
async fn test_host(agent_id: i64) -> Option<PgAgentHost> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;

    migrate(&pool).await.ok()?;

    // Each test owns its agent_id, so tests can run in parallel.
    sqlx::query("DELETE FROM agent_events WHERE agent_id = $1")
        .bind(agent_id)
        .execute(&pool)
        .await
        .ok()?;
    sqlx::query("DELETE FROM agent_logs WHERE agent_id = $1")
        .bind(agent_id)
        .execute(&pool)
        .await
        .ok()?;

    Some(PgAgentHost::new(pool, agent_id))
}

#[tokio::test]
async fn create_event_round_trips_payload() {
    let Some(host) = test_host(9001).await else {
        return;
    };

    let created = host
        .create_event(json!({ "title": "Hello", "tags": ["a", "b"] }))
        .await
        .unwrap();

    let recent = host.recent_events(10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, created.id);
    assert_eq!(recent[0].payload, json!({ "title": "Hello", "tags": ["a", "b"] }));
    assert!(recent[0].expires_at.is_none());
}

#[tokio::test]
async fn recent_events_newest_first_with_limit() {
    let Some(host) = test_host(9002).await else {
        return;
    };

    for n in 0..5 {
        host.create_event(json!({ "n": n })).await.unwrap();
    }

    let recent = host.recent_events(2).await.unwrap();
    let ns: Vec<i64> = recent
        .iter()
        .map(|e| e.payload["n"].as_i64().unwrap())
        .collect();
    assert_eq!(ns, vec![4, 3]);
}

#[tokio::test]
async fn recent_events_are_scoped_to_agent() {
    let Some(host_a) = test_host(9003).await else {
        return;
    };
    let Some(host_b) = test_host(9004).await else {
        return;
    };

    host_a.create_event(json!({ "owner": "a" })).await.unwrap();

    assert_eq!(host_a.recent_events(10).await.unwrap().len(), 1);
    assert!(host_b.recent_events(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_expiration_persists() {
    let Some(host) = test_host(9005).await else {
        return;
    };
    let host = host.with_keep_events_for(Duration::days(3));

    let created = host.create_event(json!({ "a": 1 })).await.unwrap();
    assert!(created.expires_at.is_some());

    host.update_expiration(created.id, None).await.unwrap();

    let recent = host.recent_events(1).await.unwrap();
    assert!(recent[0].expires_at.is_none());
}

#[tokio::test]
async fn update_expiration_of_foreign_event_fails() {
    let Some(host_a) = test_host(9006).await else {
        return;
    };
    let Some(host_b) = test_host(9007).await else {
        return;
    };

    let created = host_a.create_event(json!({ "a": 1 })).await.unwrap();

    assert!(host_b
        .update_expiration(created.id, Some(Utc::now()))
        .await
        .is_err());
}

#[tokio::test]
async fn error_logs_feed_last_error_log_at() {
    let Some(host) = test_host(9008).await else {
        return;
    };

    host.log("just info").await;
    assert!(host.last_error_log_at().await.unwrap().is_none());

    host.error("something broke").await;
    assert!(host.last_error_log_at().await.unwrap().is_some());
}

#[tokio::test]
async fn recent_logs_read_back_levels_newest_first() {
    let Some(host) = test_host(9009).await else {
        return;
    };

    host.log("running [\"brinfo-scrape\"]").await;
    host.error("check failed: Parse error").await;

    let logs = host.recent_logs(10).await.unwrap();
    let levels: Vec<LogLevel> = logs.iter().map(|l| l.level).collect();
    assert_eq!(levels, vec![LogLevel::Error, LogLevel::Info]);
    assert_eq!(logs[0].message, "check failed: Parse error");

    assert_eq!(host.recent_logs(1).await.unwrap().len(), 1);
}
