use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use immowatch::config::Config;
use immowatch::cycle::CycleContext;

mod commands;

#[derive(Parser)]
#[command(
    name = "immowatch",
    version,
    about = "Watches rental listing sites, notifies about new offers and purges gone ones",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (defaults plus environment overrides when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one crawl cycle
    Crawl,

    /// Run one availability sweep
    Sweep,

    /// Run crawl and sweep cycles on fixed intervals until interrupted
    Watch {
        /// Seconds between crawl cycles
        #[arg(long, default_value = "600")]
        crawl_interval_secs: u64,

        /// Seconds between availability sweeps
        #[arg(long, default_value = "3600")]
        sweep_interval_secs: u64,

        /// Write Prometheus metrics to this file after every cycle
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&config.logging.level, &log_format, cli.verbose)?;

    if let Err(e) = immowatch::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed, continuing without metrics");
    }

    tracing::info!("immowatch starting");

    let ctx = CycleContext::from_config(config).context("Failed to initialize")?;
    let cancel = shutdown_token();

    match cli.command {
        Commands::Crawl => commands::crawl(&ctx, cancel).await?,
        Commands::Sweep => commands::sweep(&ctx, cancel).await?,
        Commands::Watch {
            crawl_interval_secs,
            sweep_interval_secs,
            metrics_out,
        } => {
            let params = commands::WatchParams {
                crawl_interval_secs,
                sweep_interval_secs,
                metrics_out,
            };
            commands::watch(ctx, params, cancel).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Token cancelled on Ctrl-C
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Interrupt received, shutting down"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
        on_signal.cancel();
    });
    token
}

fn setup_tracing(level: &str, format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("immowatch=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(format!("immowatch={level},warn")))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
