//! Layered CLI configuration.
//!
//! Sources, later ones winning:
//! 1. `config/default.toml` (optional)
//! 2. `config/local.toml` (optional)
//! 3. `DOCFLOW__<SECTION>__<KEY>` environment variables
//!
//! Every field has a default, so the CLI runs with no config at all.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use engine::RunnerConfig;
use providers::{EmbeddingSettings, GenerationSettings};

pub const ENV_PREFIX: &str = "DOCFLOW";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub runner: RunnerSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub step_timeout_secs: u64,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            step_timeout_secs: 30,
        }
    }
}

impl RunnerSettings {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            step_timeout: Duration::from_secs(self.step_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load from `./config` and the environment.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        Self::load_from(Path::new("config"))
    }

    /// Load from `dir/default.toml`, `dir/local.toml` and the environment.
    pub fn load_from(dir: &Path) -> Result<Self, ::config::ConfigError> {
        let file = |name: &str| {
            ::config::File::with_name(&dir.join(name).to_string_lossy()).required(false)
        };
        let config = ::config::Config::builder()
            .add_source(file("default"))
            .add_source(file("local"))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
