use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use calc_core::AppConfig;
use calc_infrastructure::init_metrics;
use clap::{Arg, Command};
use tokio::signal;
use tracing::{error, info, warn};

mod app;
mod shutdown;

use app::{AppMode, Application};
use shutdown::ShutdownManager;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("calc-scheduler")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Distributed arithmetic expression scheduler")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to a TOML config file"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("Components to run")
                .value_parser(["orchestrator", "agent", "all"])
                .default_value("all"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level, overrides observability.log_level")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("Log format, overrides observability.log_format")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mode_str = matches
        .get_one::<String>("mode")
        .map(String::as_str)
        .unwrap_or("all");

    let config = AppConfig::load(config_path).with_context(|| match config_path {
        Some(path) => format!("failed to load config file {path}"),
        None => "failed to load configuration".to_string(),
    })?;

    let log_level = matches
        .get_one::<String>("log-level")
        .unwrap_or(&config.observability.log_level);
    let log_format = matches
        .get_one::<String>("log-format")
        .unwrap_or(&config.observability.log_format);
    calc_core::init_logging(log_level, log_format)?;

    info!(mode = mode_str, config = ?config_path, "starting calc-scheduler");

    if config.observability.metrics_enabled {
        init_metrics(config.observability.metrics_port)?;
    }

    let app_mode = parse_app_mode(mode_str, &config)?;
    let app = Arc::new(Application::new(config, app_mode).await?);

    let shutdown_manager = ShutdownManager::new();
    let mut app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    tokio::select! {
        _ = wait_for_shutdown_signal() => {}
        result = &mut app_handle => {
            return match result {
                Ok(Ok(())) => {
                    info!("application exited");
                    Ok(())
                }
                Ok(Err(e)) => {
                    error!(error = %e, "application failed");
                    Err(e)
                }
                Err(e) => Err(anyhow::anyhow!("application task panicked: {e}")),
            };
        }
    }

    info!("shutting down");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, app_handle).await {
        Ok(Ok(Ok(()))) => info!("shutdown complete"),
        Ok(Ok(Err(e))) => error!(error = %e, "application failed during shutdown"),
        Ok(Err(e)) => error!(error = %e, "application task panicked"),
        Err(_) => warn!(timeout = ?SHUTDOWN_TIMEOUT, "shutdown timed out, exiting"),
    }

    Ok(())
}

/// Rejects modes whose components are disabled in the config.
fn parse_app_mode(mode_str: &str, config: &AppConfig) -> Result<AppMode> {
    let mode: AppMode = mode_str.parse()?;

    if mode.runs_orchestrator() {
        if !config.dispatcher.enabled {
            return Err(anyhow::anyhow!("orchestrator requires dispatcher.enabled"));
        }
        if !config.api.enabled {
            return Err(anyhow::anyhow!("orchestrator requires api.enabled"));
        }
    }
    if mode.runs_agent() && !config.worker.enabled {
        return Err(anyhow::anyhow!("agent mode requires worker.enabled"));
    }

    Ok(mode)
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
