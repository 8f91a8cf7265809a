use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::extractor::{DEFAULT_INPUT_SIZE, DEFAULT_WORKING_SIZE};
use crate::matcher::{Threshold, DEFAULT_THRESHOLD};

const FALLBACK_PREFIX: &str = "/usr/local/etc/facematch";

static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("", "", "facematch"));

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| match option_env!("FACEMATCH_CONFIG_PATH") {
    Some(path) => PathBuf::from(path),
    None => PROJECT_DIRS
        .as_ref()
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| Path::new(FALLBACK_PREFIX).join("config.toml")),
});

pub static FACE_STORE_PATH: Lazy<PathBuf> =
    Lazy::new(|| match option_env!("FACEMATCH_STORE_PATH") {
        Some(path) => PathBuf::from(path),
        None => PROJECT_DIRS
            .as_ref()
            .map(|dirs| dirs.data_dir().join("faces.bin"))
            .unwrap_or_else(|| Path::new(FALLBACK_PREFIX).join("faces.bin")),
    });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum embedding distance still accepted as the same person.
    pub threshold: f64,
    /// Record store file; `.json` selects the JSON layout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
    /// Side of the square canonical face fed to the extractor.
    pub input_size: u32,
    /// Side the extractor resizes to before flattening.
    pub working_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            store_path: None,
            input_size: DEFAULT_INPUT_SIZE as u32,
            working_size: DEFAULT_WORKING_SIZE as u32,
        }
    }
}

impl Config {
    pub fn threshold(&self) -> Result<Threshold> {
        Threshold::new(self.threshold).context("invalid threshold in config")
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| FACE_STORE_PATH.clone())
    }

    pub fn validate(&self) -> Result<()> {
        self.threshold()?;
        if self.input_size == 0 || self.working_size == 0 {
            anyhow::bail!(
                "input_size and working_size must be positive (got {} and {})",
                self.input_size,
                self.working_size
            );
        }
        Ok(())
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(CONFIG_PATH.as_path());
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validating config {}", path.display()))?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(CONFIG_PATH.as_path());
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
