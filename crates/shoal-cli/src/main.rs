use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::config::ConfigAction;
use commands::group::GroupAction;
use commands::snapshot::SnapshotAction;

#[derive(Parser)]
#[command(
    name = "shoal",
    about = "Shoal: scaling groups that converge on a desired instance count",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Config file (default: $SHOAL_CONFIG, then ./shoal.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log provider mutations instead of performing them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Debug logging for shoal crates
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, inspect, resize and delete scaling groups
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },
    /// Manage sandbox snapshots
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
    /// Work with shoal.toml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    // Ctrl-C cancels whatever is in flight; timeouts and waits unwind cleanly.
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Config { action } => {
            commands::config::run(action, cli.config.as_deref(), cli.dry_run)
        }
        Commands::Snapshot { action } => {
            let backend = commands::Backend::open(cli.config.as_deref(), cli.dry_run)?;
            commands::snapshot::run(&backend, action)
        }
        Commands::Group { action } => {
            let backend = commands::Backend::open(cli.config.as_deref(), cli.dry_run)?;
            commands::group::run(&backend, action, &cancel).await
        }
    }
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("info,shoal=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,shoal=info"))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
