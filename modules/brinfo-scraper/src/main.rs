use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::Value;
use sqlx::PgPool;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use agent_host::{migrate, AgentHost, MemoryAgentHost, PgAgentHost, StoredEvent};
use brinfo_scraper::{
    default_options, validate_options, BrinfoScraperAgent, CommandRunner, Config, ProcessRunner,
};

#[derive(Parser)]
#[command(name = "brinfo-scraper")]
#[command(about = "Run brinfo-scrape and store deduplicated results as agent events")]
#[command(version)]
struct Cli {
    /// Agent options as a JSON file (built-in defaults when omitted)
    #[arg(long, global = true)]
    options: Option<PathBuf>,

    /// Keep events in memory and print them instead of persisting
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scheduled run with no incoming event
    Check,

    /// Run once per incoming event payload
    Receive {
        /// Event payload as JSON; repeatable. Reads JSON lines from stdin when omitted.
        #[arg(long = "event")]
        events: Vec<String>,
    },

    /// Validate the options without running anything
    Validate,

    /// Report whether the agent is healthy
    Working,

    /// Print the default options
    DefaultOptions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("brinfo_scraper=info".parse()?)
                .add_directive("agent_host=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let options = load_options(cli.options.as_deref())?;
    match cli.command {
        Commands::DefaultOptions => {
            println!("{}", serde_json::to_string_pretty(&default_options())?);
            return Ok(());
        }
        Commands::Validate => {
            validate_options(&options)?;
            println!("options are valid");
            return Ok(());
        }
        _ => {}
    }

    // Invalid options never reach the agent
    validate_options(&options)?;

    let config = Config::from_env()?;
    config.log_redacted();

    match (&config.database_url, cli.dry_run) {
        (Some(url), false) => {
            let pool = PgPool::connect(url)
                .await
                .context("connecting to DATABASE_URL")?;
            migrate(&pool).await?;

            let mut host = PgAgentHost::new(pool, config.agent_id);
            if let Some(keep) = config.keep_events_for() {
                host = host.with_keep_events_for(keep);
            }

            let agent = BrinfoScraperAgent::new(host, ProcessRunner, options)
                .with_executable(&config.scraper_bin);
            execute(&agent, cli.command).await
        }
        _ => {
            require_persistent_host(&cli.command)?;
            if !cli.dry_run {
                warn!("DATABASE_URL not set, events are kept in memory only");
            }

            let mut host = MemoryAgentHost::new();
            if let Some(keep) = config.keep_events_for() {
                host = host.with_keep_events_for(keep);
            }

            let agent = BrinfoScraperAgent::new(host, ProcessRunner, options)
                .with_executable(&config.scraper_bin);
            execute(&agent, cli.command).await?;

            for event in agent.host().events() {
                println!("{}", serde_json::to_string(&event)?);
            }
            Ok(())
        }
    }
}

async fn execute<H, R>(agent: &BrinfoScraperAgent<H, R>, command: Commands) -> Result<()>
where
    H: AgentHost,
    R: CommandRunner,
{
    match command {
        Commands::Check => {
            info!("Running check");
            match agent.check().await {
                Ok(report) => {
                    info!(
                        attempts = report.attempts,
                        exit_status = ?report.exit_status,
                        stored = ?report.stored,
                        "Check complete"
                    );
                    Ok(())
                }
                Err(e) => {
                    agent.host().error(&format!("check failed: {e}")).await;
                    Err(e.into())
                }
            }
        }
        Commands::Receive { events } => {
            let incoming = incoming_events(events).await?;
            info!(count = incoming.len(), "Receiving events");
            match agent.receive(&incoming).await {
                Ok(reports) => {
                    let succeeded = reports.iter().filter(|r| r.succeeded()).count();
                    info!(handled = reports.len(), succeeded, "Receive complete");
                    Ok(())
                }
                Err(e) => {
                    agent.host().error(&format!("receive failed: {e}")).await;
                    Err(e.into())
                }
            }
        }
        Commands::Working => {
            let working = agent.working().await?;
            println!("{}", if working { "working" } else { "not working" });
            Ok(())
        }
        Commands::Validate | Commands::DefaultOptions => Ok(()),
    }
}

/// An in-memory host starts empty, so its health says nothing about the agent.
fn require_persistent_host(command: &Commands) -> Result<()> {
    if matches!(command, Commands::Working) {
        anyhow::bail!(
            "`working` reads the agent's stored events and logs; set DATABASE_URL and drop --dry-run"
        );
    }
    Ok(())
}

fn load_options(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(default_options());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading options from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing options in {}", path.display()))
}

/// Payloads from `--event`, or one JSON document per stdin line.
async fn incoming_events(args: Vec<String>) -> Result<Vec<StoredEvent>> {
    let raw = if args.is_empty() {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut collected = Vec::new();
        while let Some(line) = lines.next_line().await? {
            if !line.trim().is_empty() {
                collected.push(line);
            }
        }
        collected
    } else {
        args
    };

    raw.iter()
        .enumerate()
        .map(|(i, text)| -> Result<StoredEvent> {
            let payload: Value = serde_json::from_str(text)
                .with_context(|| format!("incoming event #{} is not valid JSON", i + 1))?;
            Ok(StoredEvent {
                id: i as i64 + 1,
                payload,
                created_at: Utc::now(),
                expires_at: None,
            })
        })
        .collect()
}
