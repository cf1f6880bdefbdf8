//! Agent options as the user configures them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, ScraperError};

/// Resolved (already interpolated) agent options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScraperOptions {
    /// First positional argument to brinfo-scrape, e.g. `article`.
    #[serde(default)]
    pub command: String,
    /// Trailing positional arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Flag-style arguments, placed before `args`.
    #[serde(default)]
    pub opts: Vec<String>,
    /// Only consulted by the health check.
    #[serde(default = "default_update_period")]
    pub expected_update_period_in_days: u32,
}

fn default_update_period() -> u32 {
    1
}

impl ScraperOptions {
    /// Deserialize resolved options and reject anything that can't be run.
    pub fn from_value(value: &Value) -> Result<Self> {
        let options: ScraperOptions = serde_json::from_value(value.clone())
            .map_err(|e| ScraperError::Config(format!("invalid options: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(ScraperError::Config("command was not provided".to_string()));
        }
        if self.expected_update_period_in_days == 0 {
            return Err(ScraperError::Config(
                "expected_update_period_in_days must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// Raw options a freshly created agent starts with.
pub fn default_options() -> Value {
    json!({
        "expected_update_period_in_days": 1,
        "command": "article",
        "args": ["{{ url }}"],
        "opts": ["--source-guid=br-foo-bar"],
    })
}

/// Validate raw (not yet interpolated) options. Templates are left as-is, so
/// only the shape and the `command` presence are checked.
pub fn validate_options(raw: &Value) -> Result<()> {
    ScraperOptions::from_value(raw).map(|_| ())
}
