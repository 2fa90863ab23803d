//! Engine configuration: loaded from ~/.sonovm/config.yaml.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::osc::OscConfig;
use crate::source::{SourceKind, SourceSettings};
use crate::telemetry::DEFAULT_TELEMETRY_CAPACITY;
use crate::vm::stack::DEFAULT_STACK_CAPACITY;

/// Errors reading a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(serde_yaml::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config: {e}"),
            ConfigError::Parse(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Engine configuration. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Operand stack cells per tick.
    #[serde(default = "default_stack_capacity")]
    pub stack_capacity: usize,
    /// Frames buffered per telemetry tap.
    #[serde(default = "default_telemetry_capacity")]
    pub telemetry_capacity: usize,
    /// Input source selected at startup.
    #[serde(default)]
    pub source: SourceKind,
    /// Generator tuning for the synthetic sources.
    #[serde(default)]
    pub sources: SourceSettings,
    /// OSC control surface; absent means disabled.
    #[serde(default)]
    pub osc: Option<OscConfig>,
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_stack_capacity() -> usize {
    DEFAULT_STACK_CAPACITY
}

fn default_telemetry_capacity() -> usize {
    DEFAULT_TELEMETRY_CAPACITY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            stack_capacity: default_stack_capacity(),
            telemetry_capacity: default_telemetry_capacity(),
            source: SourceKind::default(),
            sources: SourceSettings::default(),
            osc: None,
        }
    }
}

impl EngineConfig {
    /// Standard location, `~/.sonovm/config.yaml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".sonovm").join("config.yaml"))
    }

    /// Load from the standard path. Returns None if the file doesn't exist
    /// or can't be used (graceful fallback).
    pub fn load() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            return None;
        }
        match Self::load_from(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(path = %path.display(), "ignoring config: {e}");
                None
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}
