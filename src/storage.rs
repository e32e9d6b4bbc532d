use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{FreshtimeError, Result};

pub const PROJECT_CONFIG_FILE: &str = ".freshtime.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub business_id: i64,
    /// Client id (as a string) to hourly rate (as a decimal string).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub client_rates: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_currency: Option<String>,
}

impl Config {
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }
}

/// Reads and writes the global config file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_location() -> Result<Self> {
        Ok(Self::new(config_dir()?.join("config.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Config> {
        read_json(&self.path)?.ok_or_else(|| FreshtimeError::ConfigMissing {
            path: self.path.clone(),
        })
    }

    /// Like `load`, but a missing file yields `None`.
    pub fn load_existing(&self) -> Result<Option<Config>> {
        read_json(&self.path)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        write_json(&self.path, config)
    }
}

/// Per-directory defaults for logging time. Zero ids mean unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<i64>,
}

impl ProjectConfig {
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config: Option<Self> = read_json(&dir.join(PROJECT_CONFIG_FILE))?;
        Ok(config.map(Self::normalized))
    }

    pub fn load_from_cwd() -> Result<Option<Self>> {
        Self::load_from_dir(&std::env::current_dir()?)
    }

    pub fn save_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(PROJECT_CONFIG_FILE);
        write_json(&path, self)?;
        Ok(path)
    }

    fn normalized(self) -> Self {
        let set = |id: Option<i64>| id.filter(|value| *value != 0);
        Self {
            client_id: set(self.client_id),
            project_id: set(self.project_id),
            service_id: set(self.service_id),
        }
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let mut path = dirs::home_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Home directory not found"))?;
    path.push(".config");
    path.push("freshtime");
    Ok(path)
}

/// `None` when the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| FreshtimeError::ConfigInvalid {
            path: path.to_path_buf(),
            source,
        })
}

/// Pretty JSON with a trailing newline; parent directories are created.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    fs::write(path, json)?;
    Ok(())
}
