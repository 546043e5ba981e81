//! kindlb — manage the external load balancer of a kind cluster.
//!
//! # Usage
//!
//! ```text
//! kindlb create --cluster demo
//! kindlb update --cluster demo
//! kindlb ip --cluster demo
//! kindlb render --backend demo-control-plane=10.0.0.5
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "kindlb",
    about = "External load balancer for multi control-plane kind clusters",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to kindlb.toml (built-in defaults when omitted).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Run against an in-memory runtime and log the requests instead.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Create the load-balancer container if it does not exist.
    Create {
        #[arg(long)]
        cluster: String,
        /// Image to run instead of the configured default.
        #[arg(long)]
        image: Option<String>,
    },
    /// Point the load balancer at the current control-plane nodes.
    Update {
        #[arg(long)]
        cluster: String,
    },
    /// Print the load balancer's address.
    Ip {
        #[arg(long)]
        cluster: String,
    },
    /// Remove the load-balancer container.
    Delete {
        #[arg(long)]
        cluster: String,
    },
    /// Print the load balancer's state as JSON.
    Status {
        #[arg(long)]
        cluster: String,
    },
    /// Render a config for the given backends and print it.
    Render {
        /// Backend as NAME=HOST; repeatable.
        #[arg(long = "backend", value_name = "NAME=HOST")]
        backends: Vec<String>,
    },
    /// Print the effective configuration as TOML.
    Config,
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,kindlb=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Create { cluster, image } => {
            commands::lifecycle::create(&config, cli.dry_run, &cluster, image).await
        }
        Command::Update { cluster } => commands::lifecycle::update(&config, cli.dry_run, &cluster).await,
        Command::Ip { cluster } => commands::lifecycle::ip(&config, cli.dry_run, &cluster).await,
        Command::Delete { cluster } => commands::lifecycle::delete(&config, cli.dry_run, &cluster).await,
        Command::Status { cluster } => commands::lifecycle::status(&config, cli.dry_run, &cluster).await,
        Command::Render { backends } => commands::render::render(&config, &backends),
        Command::Config => commands::config::show(&config),
    }
}
