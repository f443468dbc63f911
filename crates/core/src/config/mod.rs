//! Layered application configuration.
//!
//! [`AppConfig`] merges built-in defaults, an optional TOML file and
//! environment variables, then validates every section. Each binary loads it
//! once at startup and hands the relevant sections to the components it
//! wires up.

pub mod models;

#[cfg(test)]
mod tests;

pub use models::{
    ApiConfig, AppConfig, DatabaseConfig, DispatcherConfig, ObservabilityConfig,
    OperationTimesConfig, WorkerConfig,
};
