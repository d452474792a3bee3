use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::greeting::{GreetingValidator, GREETING, READ_BUFFER_BYTES};
use crate::retry::BackoffPolicy;
use crate::supervisor::SupervisorConfig;

/// Hard ceiling on how much of the config file is ever read.
pub const MAX_CONFIG_BYTES: u64 = 64 * 1024;

/// Read granularity while waiting for the JSON to become parseable.
const CHUNK_BYTES: usize = 255;

pub const DEFAULT_HOST_AND_PORT: &str = "127.0.0.1:36330";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("the config file has exceeded the maximum allowed size ({limit} bytes)")]
    SizeExceeded { limit: u64 },
    #[error("the config file is invalid JSON: {message} @ offset: {offset}")]
    InvalidJson { message: String, offset: usize },
    #[error("the config file has an invalid value: {0}")]
    Invalid(#[source] serde_json::Error),
    #[error("failed to encode config: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("could not locate the config directory: {0}")]
    Location(String),
}

/// Canary configuration loaded from `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// host:port of the FAHClient command server.
    #[serde(rename = "FAHClientHostAndPort")]
    pub fah_client_host_and_port: String,
    /// Per-attempt dial timeout in seconds.
    #[serde(rename = "ConnectTimeoutSecs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Dial attempts including the first.
    #[serde(rename = "MaxAttempts", default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Retry when the connection is refused (client may be restarting).
    #[serde(rename = "RetryRefused", default)]
    pub retry_refused: bool,
    /// Cancellation also aborts a dial that is in progress.
    #[serde(rename = "CancelAbortsDial", default = "default_true")]
    pub cancel_aborts_dial: bool,
    /// Time allowed for the greeting banner to arrive.
    #[serde(rename = "GreetingTimeoutSecs", default = "default_greeting_timeout_secs")]
    pub greeting_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    2
}

fn default_max_attempts() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_greeting_timeout_secs() -> u64 {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fah_client_host_and_port: DEFAULT_HOST_AND_PORT.to_string(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_refused: false,
            cancel_aborts_dial: true,
            greeting_timeout_secs: default_greeting_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            per_attempt_timeout: Duration::from_secs(self.connect_timeout_secs),
            max_attempts: self.max_attempts,
            backoff: BackoffPolicy::default(),
            retry_refused: self.retry_refused,
            cancel_aborts_dial: self.cancel_aborts_dial,
            greeting: GreetingValidator::new(
                GREETING,
                READ_BUFFER_BYTES,
                Duration::from_secs(self.greeting_timeout_secs),
            ),
        }
    }
}

/// Default location: `$XDG_CONFIG_HOME/fahcanary/config.json`.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fahcanary")
        .map_err(|e| ConfigError::Location(e.to_string()))?;
    xdg_dirs
        .place_config_file("config.json")
        .map_err(|e| ConfigError::Location(e.to_string()))
}

/// Load configuration, writing the default first if no file exists.
pub fn load_or_init(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        let default_cfg = AppConfig::default();
        write_to_path(path, &default_cfg)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(path)
}

pub fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_reader(file).map_err(|e| match e {
        ConfigError::Io { source, .. } => ConfigError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Incremental parse: read in small chunks, up to `MAX_CONFIG_BYTES`, and
/// retry the parse after each chunk so a file that is still being written
/// does not fail spuriously. Syntax errors only count once all readable
/// content has been consumed.
pub fn load_from_reader(reader: impl Read) -> Result<AppConfig, ConfigError> {
    let mut limited = reader.take(MAX_CONFIG_BYTES);
    let mut data: Vec<u8> = Vec::new();
    let mut chunk = [0u8; CHUNK_BYTES];

    loop {
        let n = match limited.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(ConfigError::Io {
                    path: PathBuf::new(),
                    source,
                })
            }
        };
        let at_eof = n == 0;
        data.extend_from_slice(&chunk[..n]);

        let err = match serde_json::from_slice::<AppConfig>(&data) {
            Ok(cfg) => return Ok(cfg),
            Err(e) => e,
        };
        match err.classify() {
            serde_json::error::Category::Syntax | serde_json::error::Category::Eof => {
                if !at_eof {
                    continue;
                }
                if limited.limit() == 0 {
                    return Err(ConfigError::SizeExceeded {
                        limit: MAX_CONFIG_BYTES,
                    });
                }
                return Err(ConfigError::InvalidJson {
                    offset: byte_offset(&data, err.line(), err.column()),
                    message: err.to_string(),
                });
            }
            serde_json::error::Category::Data => return Err(ConfigError::Invalid(err)),
            serde_json::error::Category::Io => return Err(ConfigError::Invalid(err)),
        }
    }
}

/// Write `cfg` as tab-indented JSON.
pub fn write_to_path(path: &Path, cfg: &AppConfig) -> Result<(), ConfigError> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    cfg.serialize(&mut ser).map_err(ConfigError::Encode)?;
    out.push(b'\n');

    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, out).map_err(io_err)
}

/// Convert serde_json's 1-based line/column into a byte offset into `data`.
fn byte_offset(data: &[u8], line: usize, column: usize) -> usize {
    let mut offset = 0usize;
    for (i, l) in data.split(|b| *b == b'\n').enumerate() {
        if i + 1 == line {
            return (offset + column).min(data.len());
        }
        offset += l.len() + 1;
    }
    data.len()
}
