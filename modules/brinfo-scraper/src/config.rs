use std::env;

use chrono::Duration;
use tracing::info;
use url::Url;

use crate::command::DEFAULT_EXECUTABLE;
use crate::error::{Result, ScraperError};

const MASK: &str = "***";
const UNPARSEABLE: &str = "(unparseable url)";

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Postgres host store. `None` runs against an in-memory host.
    pub database_url: Option<String>,
    pub agent_id: i64,
    pub scraper_bin: String,
    /// Days to keep created events. `None` keeps them forever.
    pub keep_events_for_days: Option<i64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str| -> Result<Option<i64>> {
            optional(key)
                .map(|raw| {
                    raw.trim().parse::<i64>().map_err(|_| {
                        ScraperError::Config(format!("{key} must be a number, got {raw:?}"))
                    })
                })
                .transpose()
        };

        Ok(Self {
            database_url: optional("DATABASE_URL"),
            agent_id: number("AGENT_ID")?.unwrap_or(1),
            scraper_bin: optional("BRINFO_SCRAPE_BIN")
                .unwrap_or_else(|| DEFAULT_EXECUTABLE.to_string()),
            keep_events_for_days: number("KEEP_EVENTS_FOR_DAYS")?.filter(|days| *days > 0),
        })
    }

    pub fn keep_events_for(&self) -> Option<Duration> {
        self.keep_events_for_days.map(Duration::days)
    }

    /// Log the configuration with credentials masked.
    pub fn log_redacted(&self) {
        let database_url = self
            .database_url
            .as_deref()
            .map(redact_url)
            .unwrap_or_else(|| "(memory)".to_string());
        info!(
            database_url = %database_url,
            agent_id = self.agent_id,
            scraper_bin = self.scraper_bin.as_str(),
            keep_events_for_days = ?self.keep_events_for_days,
            "Configuration loaded"
        );
    }
}

/// Mask the userinfo password and any `password` query parameter.
/// A URL that does not parse is never echoed back.
fn redact_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return UNPARSEABLE.to_string();
    };
    if url.cannot_be_a_base() {
        return UNPARSEABLE.to_string();
    }

    if url.password().is_some() && url.set_password(Some(MASK)).is_err() {
        return UNPARSEABLE.to_string();
    }

    if url.query_pairs().any(|(key, _)| key == "password") {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| {
                let value = if key == "password" {
                    MASK.to_string()
                } else {
                    value.into_owned()
                };
                (key.into_owned(), value)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    url.to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn redacts_password() {
        assert_eq!(
            redact_url("postgres://brinfo:s3cret@db:5432/huginn"),
            "postgres://brinfo:***@db:5432/huginn"
        );
    }

    #[test]
    fn password_containing_at_sign_is_fully_masked() {
        let redacted = redact_url("postgres://brinfo:p@ss@db:5432/huginn");

        assert_eq!(redacted, "postgres://brinfo:***@db:5432/huginn");
        assert!(!redacted.contains("ss@"));
    }

    #[test]
    fn password_query_parameter_is_masked() {
        let redacted = redact_url("postgres://db/huginn?user=brinfo&password=s3cret");

        assert_eq!(redacted, "postgres://db/huginn?user=brinfo&password=***");
        assert!(!redacted.contains("s3cret"));
    }

    #[test]
    fn unparseable_url_is_not_echoed() {
        assert_eq!(redact_url("brinfo:s3cret@db/huginn"), UNPARSEABLE);
        assert_eq!(redact_url("s3cret@db/huginn"), UNPARSEABLE);
    }

    #[test]
    fn leaves_urls_without_password_alone() {
        assert_eq!(redact_url("postgres://db/huginn"), "postgres://db/huginn");
        assert_eq!(redact_url("postgres://user@db/huginn"), "postgres://user@db/huginn");
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(
            config,
            Config {
                database_url: None,
                agent_id: 1,
                scraper_bin: DEFAULT_EXECUTABLE.to_string(),
                keep_events_for_days: None,
            }
        );
        assert_eq!(config.keep_events_for(), None);
    }

    #[test]
    fn reads_every_variable() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://db/huginn"),
            ("AGENT_ID", " 42 "),
            ("BRINFO_SCRAPE_BIN", "/opt/brinfo/bin/brinfo-scrape"),
            ("KEEP_EVENTS_FOR_DAYS", "3"),
        ])
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://db/huginn"));
        assert_eq!(config.agent_id, 42);
        assert_eq!(config.scraper_bin, "/opt/brinfo/bin/brinfo-scrape");
        assert_eq!(config.keep_events_for(), Some(Duration::days(3)));
    }

    #[test]
    fn non_numeric_agent_id_is_a_config_error() {
        let err = config_from(&[("AGENT_ID", "seven")]).unwrap_err();

        assert!(matches!(err, ScraperError::Config(_)));
        assert!(err.to_string().contains("AGENT_ID"));
    }

    #[test]
    fn zero_keep_days_keeps_events_forever() {
        let config = config_from(&[("KEEP_EVENTS_FOR_DAYS", "0")]).unwrap();
        assert_eq!(config.keep_events_for_days, None);

        let config = config_from(&[("KEEP_EVENTS_FOR_DAYS", "-2")]).unwrap();
        assert_eq!(config.keep_events_for(), None);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[
            ("BRINFO_SCRAPE_BIN", "   "),
            ("DATABASE_URL", ""),
            ("AGENT_ID", " "),
        ])
        .unwrap();

        assert_eq!(config.scraper_bin, DEFAULT_EXECUTABLE);
        assert_eq!(config.database_url, None);
        assert_eq!(config.agent_id, 1);
    }
}
