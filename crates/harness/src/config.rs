//! Harness configuration
//!
//! Loaded from a TOML file in the platform config directory, with env var
//! overrides for the config path and results directory.

use anyhow::{Context, Result};
use crucible::{ComparatorConfig, GeneratorConfig, ObfuscationConfig};
use directories::ProjectDirs;
use llm::LlmConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const APP_NAME: &str = "factfind";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for experiment results
    pub results_dir: Option<PathBuf>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub obfuscation: ObfuscationConfig,
    #[serde(default)]
    pub comparator: ComparatorConfig,
}

pub fn get_config_dir() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("FACTFIND_CONFIG_PATH") {
        let path = PathBuf::from(path);
        if path.is_dir() {
            return Ok(path);
        } else if let Some(parent) = path.parent() {
            return Ok(parent.to_path_buf());
        }
    }

    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .context("Could not determine config directory")
}

pub fn get_config_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

pub fn get_results_dir(config: &Config) -> Result<PathBuf> {
    if let Ok(path) = std::env::var("FACTFIND_RESULTS_DIR") {
        return Ok(PathBuf::from(path));
    }
    if let Some(path) = &config.results_dir {
        return Ok(path.clone());
    }
    Ok(PathBuf::from("results"))
}

pub fn load_config() -> Result<Config> {
    let config_file = get_config_file()?;

    if !config_file.exists() {
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(&config_file)
        .with_context(|| format!("Failed to read config file: {}", config_file.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", config_file.display()))
}
