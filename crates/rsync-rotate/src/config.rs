//! `rsync-rotate` config
//!

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use rotation::RetentionPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The default name of the lock file inside the destination.
pub const LOCK_FILE_NAME: &str = ".rsync-rotate.lock";

/// How rsync is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RsyncConfig {
    /// The rsync binary, looked up on `PATH` if not absolute.
    pub binary: PathBuf,

    /// Arguments passed to rsync before the generated ones.
    pub arguments: Vec<String>,

    /// Patterns passed to rsync as `--exclude=<pattern>`.
    pub excludes: Vec<String>,

    /// Hard link unchanged files against the newest complete snapshot.
    pub link_dest: bool,

    /// rsync exit codes that count as a successful transfer.
    pub accepted_exit_codes: Vec<i32>,
}

impl Default for RsyncConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("rsync"),
            arguments: vec!["--archive".to_string(), "--delete".to_string()],
            excludes: Vec::new(),
            link_dest: true,
            accepted_exit_codes: vec![0],
        }
    }
}

/// The config for one rotating backup.
///
/// The tier counts sit at the top level of the file. Unknown keys are rejected, a mistyped count
/// must not silently fall back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ConfigFile", into = "ConfigFile")]
pub struct Config {
    /// The tree to back up. A local path or an rsync remote such as `host:/path`.
    pub source: String,

    /// The directory that holds the snapshots.
    pub destination: PathBuf,

    /// How many snapshots to keep per tier.
    pub retention: RetentionPolicy,

    /// Skip the transfer if the newest snapshot is younger than this.
    pub min_interval_minutes: Option<u64>,

    /// The lock file guarding the destination.
    pub lock_file: Option<PathBuf>,

    /// How rsync is invoked.
    pub rsync: RsyncConfig,
}

/// The layout of a config file.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    source: String,
    destination: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hourly: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    daily: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weekly: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    monthly: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    yearly: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_interval_minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lock_file: Option<PathBuf>,
    #[serde(default)]
    rsync: RsyncConfig,
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        let defaults = RetentionPolicy::default();

        Self {
            source: file.source,
            destination: file.destination,
            retention: RetentionPolicy {
                hourly: file.hourly.unwrap_or(defaults.hourly),
                daily: file.daily.unwrap_or(defaults.daily),
                weekly: file.weekly.unwrap_or(defaults.weekly),
                monthly: file.monthly.unwrap_or(defaults.monthly),
                yearly: file.yearly.unwrap_or(defaults.yearly),
            },
            min_interval_minutes: file.min_interval_minutes,
            lock_file: file.lock_file,
            rsync: file.rsync,
        }
    }
}

impl From<Config> for ConfigFile {
    fn from(config: Config) -> Self {
        Self {
            source: config.source,
            destination: config.destination,
            hourly: Some(config.retention.hourly),
            daily: Some(config.retention.daily),
            weekly: Some(config.retention.weekly),
            monthly: Some(config.retention.monthly),
            yearly: Some(config.retention.yearly),
            min_interval_minutes: config.min_interval_minutes,
            lock_file: config.lock_file,
            rsync: config.rsync,
        }
    }
}

impl Config {
    /// Tries to load a config file.
    ///
    /// Files ending in `.yaml` or `.yml` are read as YAML, everything else as TOML.
    pub fn load(file_path: &Path) -> Result<Self, LoadConfigError> {
        if !file_path.exists() {
            return Err(LoadConfigError::NoFile(file_path.to_path_buf()));
        }

        let contents = fs::read_to_string(file_path).map_err(LoadConfigError::Read)?;
        let config: Self = if is_yaml(file_path) {
            serde_yaml::from_str(&contents)?
        } else {
            toml::from_str(&contents)?
        };

        config.validate()?;

        Ok(config)
    }

    /// Tries to save the config, the format is picked the same way as [`Config::load`].
    pub fn save(&self, file_path: &Path) -> Result<(), SaveConfigError> {
        let contents = if is_yaml(file_path) {
            serde_yaml::to_string(self)?
        } else {
            toml::to_string_pretty(self)?
        };

        fs::write(file_path, contents).map_err(SaveConfigError::Write)?;

        Ok(())
    }

    /// The path of the lock file.
    pub fn lock_path(&self) -> PathBuf {
        match &self.lock_file {
            Some(lock_file) => lock_file.clone(),
            None => self.destination.join(LOCK_FILE_NAME),
        }
    }

    fn validate(&self) -> Result<(), LoadConfigError> {
        if self.source.trim().is_empty() {
            return Err(LoadConfigError::Invalid("source must not be empty"));
        }

        if self.destination.as_os_str().is_empty() {
            return Err(LoadConfigError::Invalid("destination must not be empty"));
        }

        if self.rsync.binary.as_os_str().is_empty() {
            return Err(LoadConfigError::Invalid("rsync.binary must not be empty"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: "/home/".to_string(),
            destination: PathBuf::from("/backups/home"),
            retention: RetentionPolicy::default(),
            min_interval_minutes: None,
            lock_file: None,
            rsync: RsyncConfig::default(),
        }
    }
}

fn is_yaml(file_path: &Path) -> bool {
    file_path
        .extension()
        .is_some_and(|extension| extension == "yaml" || extension == "yml")
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("The file {0:?} does not exist.")]
    NoFile(PathBuf),

    #[error("Failed to read the file:\n{0}")]
    Read(#[source] io::Error),

    #[error("Failed to deserialize the file:\n{0}")]
    DeserializeToml(#[from] toml::de::Error),

    #[error("Failed to deserialize the file:\n{0}")]
    DeserializeYaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(&'static str),
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum SaveConfigError {
    #[error("Failed to serialize the config:\n{0}")]
    SerializeToml(#[from] toml::ser::Error),

    #[error("Failed to serialize the config:\n{0}")]
    SerializeYaml(#[from] serde_yaml::Error),

    #[error("Failed to write the file:\n{0}")]
    Write(#[source] io::Error),
}
