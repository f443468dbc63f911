use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use super::{
    api_observability::{ApiConfig, ObservabilityConfig},
    database::DatabaseConfig,
    dispatcher_worker::{DispatcherConfig, WorkerConfig},
};

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/calc.toml", "calc.toml"];

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub dispatcher: DispatcherConfig,
    pub worker: WorkerConfig,
    pub api: ApiConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from defaults, a TOML file and the environment.
    ///
    /// Load order, later sources win:
    /// 1. built-in defaults
    /// 2. config file (`config_path`, or the first of `config/calc.toml`,
    ///    `calc.toml` that exists)
    /// 3. `CALC__SECTION__KEY` environment variables
    /// 4. the plain variables `PORT`, `TIME_ADDITION_MS`,
    ///    `TIME_SUBTRACTION_MS`, `TIME_MULTIPLICATIONS_MS`,
    ///    `TIME_DIVISIONS_MS`, `COMPUTING_POWER`, `TASK_URL`
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("database.url", defaults.database.url.clone())?
            .set_default("database.max_connections", defaults.database.max_connections as i64)?
            .set_default("dispatcher.enabled", defaults.dispatcher.enabled)?
            .set_default(
                "dispatcher.operation_times.addition_ms",
                defaults.dispatcher.operation_times.addition_ms as i64,
            )?
            .set_default(
                "dispatcher.operation_times.subtraction_ms",
                defaults.dispatcher.operation_times.subtraction_ms as i64,
            )?
            .set_default(
                "dispatcher.operation_times.multiplication_ms",
                defaults.dispatcher.operation_times.multiplication_ms as i64,
            )?
            .set_default(
                "dispatcher.operation_times.division_ms",
                defaults.dispatcher.operation_times.division_ms as i64,
            )?
            .set_default("dispatcher.reclaim_grace_ms", defaults.dispatcher.reclaim_grace_ms as i64)?
            .set_default("worker.enabled", defaults.worker.enabled)?
            .set_default("worker.agent_id", defaults.worker.agent_id.clone())?
            .set_default("worker.computing_power", defaults.worker.computing_power as i64)?
            .set_default("worker.dispatcher_url", defaults.worker.dispatcher_url.clone())?
            .set_default("worker.poll_backoff_ms", defaults.worker.poll_backoff_ms as i64)?
            .set_default("worker.poll_jitter_ms", defaults.worker.poll_jitter_ms as i64)?
            .set_default(
                "worker.request_timeout_seconds",
                defaults.worker.request_timeout_seconds as i64,
            )?
            .set_default("api.enabled", defaults.api.enabled)?
            .set_default("api.bind_address", defaults.api.bind_address.clone())?
            .set_default("api.cors_enabled", defaults.api.cors_enabled)?
            .set_default("observability.log_level", defaults.observability.log_level.clone())?
            .set_default("observability.log_format", defaults.observability.log_format.clone())?
            .set_default(
                "observability.metrics_enabled",
                defaults.observability.metrics_enabled,
            )?
            .set_default(
                "observability.metrics_port",
                defaults.observability.metrics_port as i64,
            )?;

        match config_path {
            Some(path) => {
                if !Path::new(path).exists() {
                    return Err(anyhow::anyhow!("config file not found: {}", path));
                }
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
            None => {
                if let Some(path) = DEFAULT_CONFIG_PATHS
                    .iter()
                    .find(|path| Path::new(path).exists())
                {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("CALC")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: AppConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Applies the flat environment variables understood by earlier
    /// deployments. Unparsable values are ignored with a warning.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|p| !p.is_empty()) {
            match port.parse::<u16>() {
                Ok(port) => self.api.bind_address = format!("0.0.0.0:{port}"),
                Err(_) => warn!(value = %port, "ignoring invalid PORT"),
            }
        }

        let times = &mut self.dispatcher.operation_times;
        for (key, slot) in [
            ("TIME_ADDITION_MS", &mut times.addition_ms),
            ("TIME_SUBTRACTION_MS", &mut times.subtraction_ms),
            ("TIME_MULTIPLICATIONS_MS", &mut times.multiplication_ms),
            ("TIME_DIVISIONS_MS", &mut times.division_ms),
        ] {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                match value.parse::<u64>() {
                    Ok(ms) => *slot = ms,
                    Err(_) => warn!(variable = key, value = %value, "ignoring invalid duration"),
                }
            }
        }

        if let Some(power) = lookup("COMPUTING_POWER").filter(|p| !p.is_empty()) {
            match power.parse::<usize>() {
                Ok(power) if power > 0 => self.worker.computing_power = power,
                _ => warn!(value = %power, "ignoring invalid COMPUTING_POWER"),
            }
        }

        if let Some(url) = lookup("TASK_URL").filter(|u| !u.is_empty()) {
            let base = url.trim_end_matches('/');
            let base = base.strip_suffix("/internal/task").unwrap_or(base);
            self.worker.dispatcher_url = base.to_string();
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("failed to parse TOML config")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config to TOML")
    }

    pub fn validate(&self) -> Result<()> {
        self.database
            .validate()
            .context("invalid database configuration")?;
        self.dispatcher
            .validate()
            .context("invalid dispatcher configuration")?;
        self.worker.validate().context("invalid worker configuration")?;
        self.api.validate().context("invalid api configuration")?;
        self.observability
            .validate()
            .context("invalid observability configuration")?;
        Ok(())
    }
}
