//! Decoding of brinfo-scrape's stdout.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// What brinfo-scrape prints on success: a list of records or a single one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScrapeOutput {
    Many(Vec<Value>),
    One(Value),
}

impl ScrapeOutput {
    /// Parse stdout. Anything that isn't valid JSON is a parse error.
    pub fn parse(stdout: &str) -> Result<Self> {
        Ok(serde_json::from_str(stdout)?)
    }

    /// Records in output order; a single record becomes a one-element list.
    pub fn into_records(self) -> Vec<Value> {
        match self {
            ScrapeOutput::Many(records) => records,
            ScrapeOutput::One(record) => vec![record],
        }
    }
}

/// Shorten `text` to at most `max` characters, ending in `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    const OMISSION: &str = "...";
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(OMISSION.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(OMISSION);
    out
}
