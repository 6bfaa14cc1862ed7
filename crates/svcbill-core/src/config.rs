//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub suspension: SuspensionConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Comma-separated list of allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_cors_origins() -> String {
    "http://localhost:3000,http://127.0.0.1:3000".to_string()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply pending migrations at startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

/// Authentication configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,

    /// JWT token expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: i64,
}

fn default_jwt_expiration() -> i64 {
    1800
}

/// Suspension sweep and transition settings
#[derive(Debug, Deserialize, Clone)]
pub struct SuspensionConfig {
    /// Interval between scheduled overdue sweeps in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Run one sweep immediately when the scheduler starts
    #[serde(default = "default_true")]
    pub sweep_on_startup: bool,

    /// Maximum overdue items processed in parallel within one sweep
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,

    /// Upper bound for a single store call, in milliseconds
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,

    /// Re-reads allowed when a transition loses an optimistic version race
    #[serde(default = "default_max_transition_retries")]
    pub max_transition_retries: u32,

    /// First backoff delay after a failed sweep, in milliseconds
    #[serde(default = "default_retry_backoff_initial")]
    pub retry_backoff_initial_ms: u64,

    /// Only reactivate on payment once no other invoice of the service is overdue
    #[serde(default = "default_true")]
    pub require_settled_invoices: bool,
}

fn default_sweep_interval() -> u64 {
    86_400 // daily
}

fn default_sweep_concurrency() -> usize {
    8
}

fn default_store_timeout() -> u64 {
    5_000
}

fn default_max_transition_retries() -> u32 {
    3
}

fn default_retry_backoff_initial() -> u64 {
    1_000
}

impl SuspensionConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn retry_backoff_initial(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_initial_ms)
    }
}

impl Default for SuspensionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            sweep_on_startup: true,
            sweep_concurrency: default_sweep_concurrency(),
            store_timeout_ms: default_store_timeout(),
            max_transition_retries: default_max_transition_retries(),
            retry_backoff_initial_ms: default_retry_backoff_initial(),
            require_settled_invoices: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("server.cors_origins", default_cors_origins())?
            .set_default("database.max_connections", 10)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.run_migrations", true)?
            .set_default("auth.jwt_expiration_secs", 1800)?
            .set_default("suspension.sweep_interval_secs", 86_400)?
            .set_default("suspension.sweep_on_startup", true)?
            .set_default("suspension.sweep_concurrency", 8)?
            .set_default("suspension.store_timeout_ms", 5_000)?
            .set_default("suspension.max_transition_retries", 3)?
            .set_default("suspension.retry_backoff_initial_ms", 1_000)?
            .set_default("suspension.require_settled_invoices", true)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with SVCBILL_ prefix
            .add_source(
                Environment::with_prefix("SVCBILL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("SVCBILL").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
