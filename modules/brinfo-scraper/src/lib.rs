pub mod agent;
pub mod command;
pub mod config;
pub mod dedup;
pub mod error;
pub mod options;
pub mod output;
pub mod retry;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use agent::{BrinfoScraperAgent, HandleReport};
pub use command::{CommandResult, CommandRunner, ProcessRunner, ScrapeCommand};
pub use config::Config;
pub use dedup::{store_results, StoreSummary, UNIQUENESS_LOOK_BACK};
pub use error::{Result, ScraperError};
pub use options::{default_options, validate_options, ScraperOptions};
pub use output::ScrapeOutput;
pub use retry::RetryPolicy;
