//! User settings.
//!
//! A single JSON file under the platform config directory. It is read from
//! disk on every invocation so edits take effect without restarting `watch`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the tool path from the settings file.
pub const TOOL_PATH_ENV: &str = "JAVASCOOL_LIGHT_PATH";

const APP_DIR: &str = "javascool-light";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchSettings {
    #[serde(with = "humantime_serde", default = "default_debounce")]
    pub debounce: Duration,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_debounce() -> Duration {
    Duration::from_millis(500)
}

fn default_extensions() -> Vec<String> {
    vec!["jvs".to_string()]
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce: default_debounce(),
            extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Absolute path to `javascool-light.jar`.
    #[serde(
        rename = "javascool-light.path",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_path: Option<String>,
    #[serde(default)]
    pub watch: WatchSettings,
}

impl Settings {
    /// Read settings from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data)
                .with_context(|| format!("parse settings {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("read settings {}", path.display())),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data + "\n")
            .with_context(|| format!("write settings {}", path.display()))
    }

    /// The configured tool path, `None` when unset or blank.
    pub fn tool_path(&self) -> Option<&str> {
        self.tool_path.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// Where settings live and which overrides apply. Cheap to clone; holds no
/// settings values itself.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    /// Tool path from `--jar`, wins over everything.
    cli_override: Option<String>,
    /// Tool path from the environment, wins over the file.
    env_override: Option<String>,
}

impl SettingsStore {
    /// Store at the default location, with the environment override applied.
    pub fn open(cli_override: Option<String>) -> Result<Self> {
        Ok(Self::at(default_settings_path()?)
            .with_env_override(std::env::var(TOOL_PATH_ENV).ok())
            .with_cli_override(cli_override))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cli_override: None,
            env_override: None,
        }
    }

    pub fn with_cli_override(mut self, tool_path: Option<String>) -> Self {
        self.cli_override = tool_path;
        self
    }

    pub fn with_env_override(mut self, tool_path: Option<String>) -> Self {
        self.env_override = tool_path;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fresh read of the file with overrides folded in.
    pub fn load(&self) -> Result<Settings> {
        let mut settings = Settings::load_from(&self.path)?;
        let overridden = [self.cli_override.as_deref(), self.env_override.as_deref()]
            .into_iter()
            .flatten()
            .find(|p| !p.trim().is_empty());
        if let Some(p) = overridden {
            settings.tool_path = Some(p.to_string());
        }
        Ok(settings)
    }

    /// Current tool path. Read errors are logged and treated as unset.
    pub fn tool_path(&self) -> Option<String> {
        match self.load() {
            Ok(s) => s.tool_path().map(str::to_string),
            Err(e) => {
                log::warn!("{e:#}");
                None
            }
        }
    }

    /// Update only the file; overrides are untouched.
    pub fn set_tool_path(&self, tool_path: Option<String>) -> Result<()> {
        let mut settings = Settings::load_from(&self.path)?;
        settings.tool_path = tool_path;
        settings.save_to(&self.path)
    }

    /// Create the file with defaults when it does not exist yet.
    pub fn ensure_exists(&self) -> Result<()> {
        if !self.path.exists() {
            Settings::default().save_to(&self.path)?;
        }
        Ok(())
    }
}

/// `<config dir>/javascool-light/settings.json`.
pub fn default_settings_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("no config directory on this platform")?;
    Ok(base.join(APP_DIR).join(SETTINGS_FILE))
}

/// `<cache dir>/javascool-light`, where background compile output goes.
pub fn cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("no cache directory on this platform")?;
    Ok(base.join(APP_DIR))
}
