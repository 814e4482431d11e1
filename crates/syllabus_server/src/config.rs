//! Server configuration loaded from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `SYLLABUS_PORT` | `8080` |
//! | `SYLLABUS_DB_PATH` | `syllabus.sqlite3` |
//! | `SYLLABUS_LOG_LEVEL` | `debug` in debug builds, `info` otherwise |
//! | `SYLLABUS_LOG_DIR` | `<cwd>/logs` |

use log::info;
use std::env;
use std::path::{Path, PathBuf};
use syllabus_core::default_log_level;
use thiserror::Error;

pub const PORT_VAR: &str = "SYLLABUS_PORT";
pub const DB_PATH_VAR: &str = "SYLLABUS_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "SYLLABUS_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "SYLLABUS_LOG_DIR";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_PATH: &str = "syllabus.sqlite3";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key} value `{value}`: {message}")]
    Invalid {
        key: &'static str,
        value: String,
        message: String,
    },

    #[error("cannot resolve working directory: {0}")]
    WorkingDir(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub log_level: String,
    /// Always absolute.
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds config from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match read(PORT_VAR) {
            Some(raw) => raw.trim().parse().map_err(|err: std::num::ParseIntError| {
                ConfigError::Invalid {
                    key: PORT_VAR,
                    value: raw.clone(),
                    message: err.to_string(),
                }
            })?,
            None => {
                info!("event=config_default module=server key={PORT_VAR} value={DEFAULT_PORT}");
                DEFAULT_PORT
            }
        };

        let db_path = read(DB_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let log_level = read(LOG_LEVEL_VAR)
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_else(|| default_log_level().to_string());

        let cwd = env::current_dir()?;
        let log_dir = match read(LOG_DIR_VAR) {
            Some(dir) => absolutize(&cwd, Path::new(dir.trim())),
            None => cwd.join("logs"),
        };

        Ok(Self {
            port,
            db_path,
            log_level,
            log_dir,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
