use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, warn};

use crate::error::ConfigError;

/// Quit key used when the config does not name one.
pub const DEFAULT_QUIT_KEY: &str = "q";

/// Per-task join budget used when the config does not set one.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// One raw folder descriptor as it appears in the config file.
///
/// Both fields are optional at this layer so that an incomplete entry is
/// rejected by the registry (and logged) instead of failing the whole parse.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct FolderEntry {
    pub path: Option<String>,
    pub name: Option<String>,
}

/// Configuration loaded from the file passed with `--config`.
///
/// ```toml
/// consumers = 4
///
/// [[folders]]
/// path = "/srv/incoming"
/// name = "incoming"
/// ```
#[derive(Debug, Deserialize)]
pub struct WatchConfig {
    /// Folder candidates, validated later by the registry.
    pub folders: Vec<FolderEntry>,
    /// Size of the consumer pool. Defaults to the host's available parallelism.
    #[serde(default)]
    pub consumers: Option<usize>,
    /// Line the operator types to stop watching.
    #[serde(default)]
    pub quit_key: Option<String>,
    /// Deadline for joining every task at shutdown. Tasks still running when it
    /// passes are aborted.
    #[serde(default)]
    pub shutdown_timeout_secs: Option<u64>,
}

impl WatchConfig {
    /// Load the configuration from `path`.
    ///
    /// `.json` files are parsed as JSON, everything else as TOML. A missing
    /// file or a structurally invalid document is fatal.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(path, &contents)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            serde_json::from_str::<Self>(contents).map_err(|e| e.to_string())
        } else {
            toml::from_str::<Self>(contents).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Number of consumer workers to run, never less than one.
    pub fn consumer_count(&self) -> usize {
        match self.consumers {
            Some(0) => {
                warn!("consumers = 0 is not usable, running a single consumer");
                1
            }
            Some(n) => n,
            None => default_consumer_count(),
        }
    }

    pub fn quit_key(&self) -> &str {
        self.quit_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or(DEFAULT_QUIT_KEY)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

/// One consumer per logical CPU.
pub fn default_consumer_count() -> usize {
    std::thread::available_parallelism().map_or_else(
        |e| {
            error!("failed to query available parallelism: {e}");
            1
        },
        |n| n.get(),
    )
}
