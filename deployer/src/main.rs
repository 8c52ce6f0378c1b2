//! fwdeploy - Entry Point
//!
//! Runs the deployment manager daemon (`serve`) or talks to a running one
//! over its REST API.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use fwdeploy::app::options::AppOptions;
use fwdeploy::app::run::run;
use fwdeploy::cli::{
    commands, output, DeployCommands, EnvCommands, HealthCommands, PlanCommands, ReportCommands,
    UtilCommands,
};
use fwdeploy::http::client::HttpClient;
use fwdeploy::logs::{init_logging, LogLevel, LogOptions};
use fwdeploy::storage::settings::{Settings, DEFAULT_CONFIG_FILE};
use fwdeploy::utils::version_info;

#[derive(Parser)]
#[command(name = "fwdeploy")]
#[command(about = "Firmware deployment manager", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FWDEPLOY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Deployment manager endpoint
    #[arg(short, long, env = "FWDEPLOY_ENDPOINT", default_value = "http://127.0.0.1:5001")]
    endpoint: String,

    /// API key sent as X-API-Key
    #[arg(long, env = "FWDEPLOY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the deployment manager daemon
    Serve {
        /// Override the configured log level
        #[arg(long)]
        log_level: Option<LogLevel>,

        /// Log as JSON
        #[arg(long)]
        json_logs: bool,

        /// Also write a daily log file into this directory
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Environments
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },

    /// Deployment plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },

    /// Deployment executions
    Deploy {
        #[command(subcommand)]
        command: DeployCommands,
    },

    /// Environment health
    Health {
        #[command(subcommand)]
        command: HealthCommands,
    },

    /// Deployment metrics
    Metrics,

    /// Reports
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },

    /// Utilities
    Util {
        #[command(subcommand)]
        command: UtilCommands,
    },

    /// Print version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = dispatch(cli).await {
        output::failure(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let client = || -> anyhow::Result<HttpClient> {
        Ok(HttpClient::new(&cli.endpoint)?.with_api_key(cli.api_key.clone()))
    };

    match cli.command {
        Commands::Serve {
            log_level,
            json_logs,
            log_dir,
        } => serve(&cli.config, log_level, json_logs, log_dir).await,
        Commands::Env { command } => Ok(commands::env(command, &client()?).await?),
        Commands::Plan { command } => Ok(commands::plan(command, &client()?).await?),
        Commands::Deploy { command } => Ok(commands::deploy(command, &client()?).await?),
        Commands::Health { command } => Ok(commands::health(command, &client()?).await?),
        Commands::Metrics => Ok(commands::metrics(&client()?).await?),
        Commands::Report { command } => Ok(commands::report(command, &client()?).await?),
        Commands::Util { command } => Ok(commands::util(command)?),
        Commands::Version => {
            println!("{}", serde_json::to_string_pretty(&version_info())?);
            Ok(())
        }
    }
}

async fn serve(
    config: &std::path::Path,
    log_level: Option<LogLevel>,
    json_logs: bool,
    log_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let settings = Settings::load(config)
        .with_context(|| format!("loading configuration from {}", config.display()))?;

    let mut log_options = LogOptions {
        log_level: log_level.unwrap_or_else(|| settings.global.log_level.clone()),
        json_format: json_logs,
        ..Default::default()
    };
    if let Some(dir) = log_dir {
        log_options.log_dir = dir;
        log_options.file = true;
    }
    let _log_guard = init_logging(log_options).context("initializing logging")?;

    let options = AppOptions::from_settings(&settings);
    info!(
        "Running deployment manager for {} on {}:{}",
        settings.global.organization, options.server.host, options.server.port
    );

    if let Err(e) = run(settings, options, await_shutdown_signal()).await {
        error!("Deployment manager failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
