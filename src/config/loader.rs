//! Configuration Loader
//!
//! Environment-aware configuration loading built on the `config` crate.
//! Handles file discovery, environment detection and source layering.

use super::error::{ConfigResult, ConfigurationError};
use super::DispatchConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Base name of the configuration files
const CONFIG_FILE_STEM: &str = "dispatch";

/// Prefix for environment variable overrides
const ENV_PREFIX: &str = "DISPATCH";

/// Loaded configuration together with the environment it was resolved for
#[derive(Debug)]
pub struct ConfigManager {
    config: DispatchConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    ///
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::build_config(&config_directory, environment)?;
        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string(&config).unwrap_or_else(|_| "[serialization error]".to_string())
        );

        info!(
            environment = %environment,
            events_queue = %config.queues.events,
            concurrency = config.consumer.concurrency,
            max_attempts = config.retry.max_attempts,
            "Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    fn build_config(config_directory: &Path, environment: &str) -> ConfigResult<DispatchConfig> {
        let base_file = config_directory.join(format!("{CONFIG_FILE_STEM}.toml"));
        let env_file = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}.toml"));

        let settings = Config::builder()
            .add_source(File::from(base_file).required(false))
            .add_source(File::from(env_file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        settings
            .try_deserialize::<DispatchConfig>()
            .map_err(|e| ConfigurationError::load_error(environment, e))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment: DISPATCH_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("DISPATCH_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// DISPATCH_CONFIG_DIR, or `config/` under the working directory
    fn default_config_directory() -> PathBuf {
        env::var("DISPATCH_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}
