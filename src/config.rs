//! Layered engine configuration.
//!
//! Sources are merged in this order, later sources overriding earlier ones:
//! 1. defaults from `EngineConfig::default()`
//! 2. `<root>/config/default.toml`
//! 3. `<root>/config/<profile>.toml`, the profile being selected by `BRICK_CONFIG`
//! 4. environment variables prefixed with `BRICK_`, `__` separating nested keys
//!    (e.g. `BRICK_ENGINE__APP`)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{BrickError, Result};
use crate::logging::{log_config_loaded, parse_log_level};

pub const DEFAULT_ENV_PREFIX: &str = "BRICK_";
pub const DEFAULT_CONFIG_DIR: &str = "config";
pub const DEFAULT_PROFILE: &str = "local";

/// Process environment relevant to the engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Configuration profile, read from `BRICK_CONFIG`
    pub config: String,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            config: DEFAULT_PROFILE.to_string(),
        }
    }
}

impl Environment {
    pub fn load(prefix: &str) -> Result<Self> {
        let env = Figment::from(Serialized::defaults(Environment::default()))
            .merge(Env::prefixed(prefix).only(&["config"]))
            .extract()?;
        Ok(env)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSection,
    pub logging: LoggingConfig,
    /// Named groups of modules, see `Engine::build_section`
    pub inject: BTreeMap<String, InjectSection>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Pattern of the application entry modules used by `Engine::start`
    pub app: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            app: "app".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectSection {
    pub pattern: String,
    #[serde(default)]
    pub ignore: Vec<String>,
}

/// Configuration loader
#[derive(Clone, Debug)]
pub struct ConfigLoader {
    root: PathBuf,
    config_dir: String,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config_dir: DEFAULT_CONFIG_DIR.to_string(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    pub fn with_config_dir(mut self, dir: impl Into<String>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    /// Load the configuration of the given environment from all sources
    pub fn load(&self, env: &Environment) -> Result<EngineConfig> {
        let dir = self.root.join(&self.config_dir);
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
        for file in [
            dir.join("default.toml"),
            dir.join(format!("{}.toml", env.config)),
        ] {
            let found = file.exists();
            log_config_loaded(&file, found);
            if found {
                figment = figment.merge(Toml::file(&file));
            }
        }
        figment = figment.merge(Env::prefixed(&self.env_prefix).split("__"));

        let config: EngineConfig = figment.extract()?;
        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &EngineConfig) -> Result<()> {
    if config.engine.app.trim().is_empty() {
        return Err(BrickError::InvalidArgument(
            "engine.app pattern is empty".to_string(),
        ));
    }
    parse_log_level(&config.logging.level)?;
    for (name, section) in &config.inject {
        if section.pattern.trim().is_empty() {
            return Err(BrickError::InvalidArgument(format!(
                "inject.{name}.pattern is empty"
            )));
        }
    }
    Ok(())
}
