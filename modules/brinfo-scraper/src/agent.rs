//! The brinfo scraper agent.
//!
//! Runs brinfo-scrape once per `check` or per incoming event, retrying failed
//! attempts with linear backoff, and stores the JSON it prints as events.
//! Records already present among the most recent events only get their
//! expiration refreshed.

use std::path::{Path, PathBuf};

use agent_host::{AgentHost, StoredEvent};
use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::command::{CommandResult, CommandRunner, ScrapeCommand, DEFAULT_EXECUTABLE};
use crate::dedup::{store_results, StoreSummary};
use crate::error::Result;
use crate::options::{self, ScraperOptions};
use crate::output::{truncate, ScrapeOutput};
use crate::retry::RetryPolicy;

/// How much of stdout goes into the summary log line.
const STDOUT_LOG_LIMIT: usize = 100;

/// Errors logged this close before the last event still mark the agent unhealthy.
const ERROR_LOG_GRACE_MINUTES: i64 = 2;

/// Outcome of one `handle` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleReport {
    pub attempts: u32,
    pub exit_status: Option<i32>,
    /// `None` when every attempt failed and nothing was stored.
    pub stored: Option<StoreSummary>,
}

impl HandleReport {
    pub fn succeeded(&self) -> bool {
        self.exit_status == Some(0)
    }
}

pub struct BrinfoScraperAgent<H, R> {
    host: H,
    runner: R,
    options: Value,
    executable: PathBuf,
    retry: RetryPolicy,
}

impl<H, R> BrinfoScraperAgent<H, R>
where
    H: AgentHost,
    R: CommandRunner,
{
    /// `options` are the raw, not yet interpolated agent options.
    pub fn new(host: H, runner: R, options: Value) -> Self {
        Self {
            host,
            runner,
            options,
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn options(&self) -> &Value {
        &self.options
    }

    pub fn validate_options(&self) -> Result<()> {
        options::validate_options(&self.options)
    }

    /// Scheduled run: options interpolated without any event context.
    pub async fn check(&self) -> Result<HandleReport> {
        let resolved = self
            .host
            .interpolated(&self.options, &Value::Object(Map::new()));
        let options = ScraperOptions::from_value(&resolved)?;
        self.handle(&options).await
    }

    /// One run per incoming event, in order, each with the event payload as
    /// interpolation context. Stops at the first error.
    pub async fn receive(&self, incoming: &[StoredEvent]) -> Result<Vec<HandleReport>> {
        let mut reports = Vec::with_capacity(incoming.len());
        for event in incoming {
            let resolved = self.host.interpolated(&self.options, &event.payload);
            let options = ScraperOptions::from_value(&resolved)?;
            reports.push(self.handle(&options).await?);
        }
        Ok(reports)
    }

    /// Run the scraper with resolved options and store what it prints.
    ///
    /// A command that still fails after every retry is only logged. Output
    /// that isn't valid JSON on a successful exit is returned as an error.
    pub async fn handle(&self, options: &ScraperOptions) -> Result<HandleReport> {
        options.validate()?;

        let command = ScrapeCommand::build(&self.executable, options);

        let mut attempts = 1;
        let mut result = self.run_command(&command).await;

        if !result.success() {
            for retry in 0..self.retry.retries() {
                self.host
                    .log(&format!("retrying... stderr={:?}", result.stderr))
                    .await;
                let delay = self.retry.delay_for_retry(retry);
                warn!(
                    attempt = attempts,
                    exit_status = ?result.exit_status,
                    backoff_secs = delay.as_secs_f64(),
                    "brinfo-scrape failed, retrying after backoff"
                );
                tokio::time::sleep(delay).await;

                attempts += 1;
                result = self.run_command(&command).await;
                if result.success() {
                    break;
                }
            }
        }

        self.host
            .log(&format!(
                "exit_status={} stderr={:?} stdout={:?}",
                format_exit_status(result.exit_status),
                result.stderr,
                truncate(&result.stdout, STDOUT_LOG_LIMIT),
            ))
            .await;

        if !result.success() {
            warn!(
                attempts,
                exit_status = ?result.exit_status,
                "brinfo-scrape failed on every attempt, nothing stored"
            );
            return Ok(HandleReport {
                attempts,
                exit_status: result.exit_status,
                stored: None,
            });
        }

        let records = ScrapeOutput::parse(&result.stdout)?.into_records();
        let stored = store_results(&self.host, records).await?;
        info!(
            attempts,
            created = stored.created,
            refreshed = stored.refreshed,
            "Stored scrape results"
        );

        Ok(HandleReport {
            attempts,
            exit_status: result.exit_status,
            stored: Some(stored),
        })
    }

    async fn run_command(&self, command: &ScrapeCommand) -> CommandResult {
        self.host.log(&format!("running {command:?}")).await;
        self.runner.run(command).await
    }

    /// Healthy when an event was created within the expected update period
    /// and no error has been logged since (allowing a short grace window).
    pub async fn working(&self) -> Result<bool> {
        let resolved = self
            .host
            .interpolated(&self.options, &Value::Object(Map::new()));
        let period_days = resolved
            .get("expected_update_period_in_days")
            .and_then(Value::as_i64)
            .filter(|days| *days > 0)
            .unwrap_or(1);

        let Some(last_event_at) = self.host.last_event_at().await? else {
            return Ok(false);
        };
        if last_event_at <= Utc::now() - Duration::days(period_days) {
            return Ok(false);
        }

        let recent_errors = match self.host.last_error_log_at().await? {
            Some(last_error_at) => {
                last_error_at > last_event_at - Duration::minutes(ERROR_LOG_GRACE_MINUTES)
            }
            None => false,
        };

        Ok(!recent_errors)
    }
}

fn format_exit_status(status: Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}
