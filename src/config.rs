//! Pilot configuration.
//!
//! Loaded from `~/.neutron-pilot/config.toml`. Every key is optional; a
//! missing file means all defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::automation::{AutomationConfig, AutomationMode, HotkeyConfig};
use crate::spansh::DEFAULT_API_URL;

/// Errors loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// The map-search macro the hotkey runs by default.
///
/// Opens the galaxy map, focuses the search field, pastes the system and
/// confirms, restoring the clipboard afterwards.
const DEFAULT_SCRIPT: &str = "\
SetKeyDelay, 50, 50
send, {Numpad7}
sleep, 850
send, e
send, {Space}
ClipOld := ClipboardAll
Clipboard := system
sleep, 100
Send, ^v
Clipboard := ClipOld
ClipOld =
SetKeyDelay, 1, 2
send, {enter}";

/// Pilot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Where the game writes its journals. Defaults to the game's
    /// standard location under the home directory.
    pub journal_dir: Option<PathBuf>,

    /// Root of the plotting API.
    pub spansh_api: String,

    /// Which automation backend receives the current system.
    pub mode: AutomationMode,

    pub hotkey: HotkeySection,

    pub alerts: AlertSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HotkeySection {
    /// The script interpreter.
    pub executable: Option<PathBuf>,
    pub binding: String,
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AlertSection {
    /// Whether to raise low fuel alerts at all.
    pub fuel: bool,

    /// Alert threshold as a percentage of the fuel one maximum jump uses.
    pub fuel_modifier: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            journal_dir: None,
            spansh_api: DEFAULT_API_URL.to_string(),
            mode: AutomationMode::default(),
            hotkey: HotkeySection::default(),
            alerts: AlertSection::default(),
        }
    }
}

impl Default for HotkeySection {
    fn default() -> Self {
        Self {
            executable: None,
            binding: "F5".to_string(),
            script: DEFAULT_SCRIPT.to_string(),
        }
    }
}

impl Default for AlertSection {
    fn default() -> Self {
        Self {
            fuel: true,
            fuel_modifier: 150.0,
        }
    }
}

impl Config {
    /// Load config from `~/.neutron-pilot/config.toml`, or defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => {
                log::warn!("could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load config from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The config file path: `~/.neutron-pilot/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".neutron-pilot").join("config.toml"))
    }

    /// The configured journal directory, or the game's default.
    pub fn journal_dir(&self) -> Option<PathBuf> {
        self.journal_dir.clone().or_else(|| {
            dirs::home_dir().map(|h| {
                h.join("Saved Games")
                    .join("Frontier Developments")
                    .join("Elite Dangerous")
            })
        })
    }

    /// The automation settings as the dispatcher takes them.
    pub fn automation(&self) -> AutomationConfig {
        AutomationConfig {
            mode: self.mode,
            hotkey: HotkeyConfig {
                executable: self.hotkey.executable.clone(),
                binding: self.hotkey.binding.clone(),
                script: self.hotkey.script.clone(),
            },
        }
    }

    /// The fuel alert percentage, or zero when alerts are off.
    pub fn fuel_modifier(&self) -> f64 {
        if self.alerts.fuel {
            self.alerts.fuel_modifier
        } else {
            0.0
        }
    }
}
