use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAMES: &[&str] = &[".erlcheck.json", "erlcheck.json"];

/// Tool locations and timeouts, optionally read from `.erlcheck.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Settings {
    /// Compiler executable
    pub erlc: PathBuf,
    /// Emulator used for the xref, script and hot-reload helpers
    pub erl: PathBuf,
    /// rebar3 executable used when the project does not ship its own
    pub rebar3: PathBuf,
    /// Limit for any single helper process
    pub subprocess_timeout_secs: u64,
    /// Limit for each remote call during hot reload
    pub rpc_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            erlc: PathBuf::from("erlc"),
            erl: PathBuf::from("erl"),
            rebar3: PathBuf::from("rebar3"),
            subprocess_timeout_secs: 300,
            rpc_timeout_ms: 10_000,
        }
    }
}

impl Settings {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let settings =
            serde_json::from_str(&contents).map_err(|source| Error::SettingsError {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(settings)
    }

    pub fn find_config_file(start_path: &Path) -> Option<PathBuf> {
        let mut current = start_path;

        loop {
            for name in CONFIG_FILE_NAMES {
                let config_path = current.join(name);
                if config_path.is_file() {
                    return Some(config_path);
                }
            }

            current = current.parent()?;
        }
    }

    /// Settings from the nearest config file above `start_path`, or defaults.
    pub fn discover(start_path: &Path) -> Result<Self> {
        match Self::find_config_file(start_path) {
            Some(path) => {
                tracing::debug!("Loading settings from {}", path.display());
                Self::load_from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn subprocess_timeout(&self) -> Duration {
        Duration::from_secs(self.subprocess_timeout_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}
