use anyhow::Context;
use background_service::RefreshService;
use clap::{Parser, Subcommand};
use database::{MemoryReportStore, ReportStore, SqliteReportStore};
use reddit_client::RedditClient;
use std::path::PathBuf;
use std::sync::Arc;
use subpulse_core::{AppConfig, CancellationSignal, CoreError, ErrorExt, ErrorReporter};

const DEFAULT_LOG_FILTER: &str =
    "subpulse=info,analysis_engine=info,reddit_client=info,database=info,background_service=info";

#[derive(Debug, Parser)]
#[command(name = "subpulse", version, about = "Keyword, sentiment and category analytics for subreddits")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep reports in memory instead of the configured database
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze a subreddit, reusing the stored report while it is fresh
    Analyze {
        name: String,
        /// Re-fetch even if the stored report is fresh
        #[arg(long)]
        force: bool,
    },
    /// Print the stored report for a subreddit
    Show { name: String },
    /// Keep reports for the given subreddits refreshed until interrupted
    Watch {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;

    let cancel = CancellationSignal::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    let source = Arc::new(RedditClient::new(config.user_agent.clone())?);
    let result = if cli.memory {
        run(&cli.command, &config, source, Arc::new(MemoryReportStore::new()), &cancel).await
    } else {
        let store = SqliteReportStore::connect(&config.database_url).await?;
        run(&cli.command, &config, source, Arc::new(store), &cancel).await
    };

    result.map_err(|e| {
        ErrorReporter::new().report_error(&e);
        anyhow::anyhow!(e.user_friendly_message())
    })
}

async fn run<R: ReportStore>(
    command: &Command,
    config: &AppConfig,
    source: Arc<RedditClient>,
    store: Arc<R>,
    cancel: &CancellationSignal,
) -> Result<(), CoreError> {
    let service = RefreshService::with_system_clock(config, source, store)?;

    match command {
        Command::Analyze { name, force } => {
            let outcome = service.ensure_fresh(name, *force, cancel).await?;
            if !outcome.persisted {
                tracing::warn!("Report for r/{} was not saved", name);
            }
            print_json(&outcome)
        }
        Command::Show { name } => match service.store().get(name).await? {
            Some(stored) => print_json(&stored),
            None => Err(CoreError::NotFound {
                resource: format!("stored report for r/{}", name),
            }),
        },
        Command::Watch { names } => {
            let result = service.run_auto_refresh(names, cancel).await;
            if let Err(e) = &result {
                e.log_error();
            }
            result
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CoreError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
