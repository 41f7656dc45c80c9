//! Configuration management for cmdlog.
//!
//! The configuration file is located at `~/.cmdlog/config.toml`:
//!
//! ```toml
//! [echo]
//! uppercase = true
//!
//! [history]
//! enabled = true
//! limit = 1000
//!
//! [log]
//! level = "info"
//!
//! [[patterns]]
//! id = "get"
//! template = "GET key"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use crate::core::Pattern;
use crate::error::{ConsoleError, Result};
use crate::history::HISTORY_LIMIT;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub echo: EchoConfig,
    pub history: HistoryConfig,
    pub log: LogConfig,
    /// Patterns offered by the console
    pub patterns: Vec<Pattern>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            echo: EchoConfig::default(),
            history: HistoryConfig::default(),
            log: LogConfig::default(),
            patterns: default_patterns(),
        }
    }
}

/// Local echo of submitted commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    pub uppercase: bool,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self { uppercase: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: HISTORY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `CMDLOG_LOG` is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_patterns() -> Vec<Pattern> {
    vec![
        Pattern::new("get", "GET key"),
        Pattern::new("set", "SET key value"),
        Pattern::new("lpush", "LPUSH key element"),
        Pattern::new("lrange", "LRANGE key start stop"),
    ]
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file gives the defaults. A broken file gives the defaults
    /// plus the error, so the caller can report it once logging is up.
    pub fn load() -> (Self, Option<ConsoleError>) {
        match Self::get_config_path() {
            Some(path) => Self::load_or_default(&path),
            None => (Self::default(), None),
        }
    }

    pub fn load_or_default(path: &Path) -> (Self, Option<ConsoleError>) {
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConsoleError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConsoleError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to the default location
    #[allow(dead_code)]
    pub fn save(&self) -> Result<()> {
        let path = Self::get_config_path().ok_or(ConsoleError::NoHomeDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(ConsoleError::ConfigSerialize)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConsoleError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConsoleError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        data_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn find_pattern(&self, id: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.id.eq_ignore_ascii_case(id))
    }
}

/// `~/.cmdlog`
pub fn data_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".cmdlog"))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
