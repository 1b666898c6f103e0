//! Configuration loading and management
//!
//! Defaults are overridden by `config.toml` in the data directory, which is
//! in turn overridden by `SATELA_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::session::SessionSettings;

/// Where transcripts come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// One line on stdin per finalized transcript
    Stdin,
    /// Transcripts are pushed through IPC only
    External,
    /// No recognizer available; sessions cannot start
    None,
}

impl std::str::FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "stdin" => Ok(Self::Stdin),
            "external" => Ok(Self::External),
            "none" => Ok(Self::None),
            other => Err(ConfigError::UnknownSource(other.to_string())),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HOME is not set")]
    MissingHome,

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("wake phrase must not be empty")]
    EmptyWakePhrase,

    #[error("deactivation delay ({deactivation_ms}ms) must exceed the thinking delay ({thinking_ms}ms)")]
    DeactivationTooEarly {
        deactivation_ms: u64,
        thinking_ms: u64,
    },

    #[error("unknown transcript source: {0}")]
    UnknownSource(String),
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Activation phrase
    pub wake_phrase: String,

    /// Spoken when the wake phrase is detected
    pub acknowledgement: String,

    /// Locale handed to the synthesizer
    pub locale: String,

    /// Delay between accepting a command and speaking the reply
    pub thinking_delay: Duration,

    /// Delay between starting to speak and listening again
    pub speaking_delay: Duration,

    /// Delay between accepting a farewell command and deactivating
    pub deactivation_delay: Duration,

    /// Open the session (microphone on) at startup
    pub auto_start: bool,

    /// Transcript source
    pub source: SourceKind,

    /// External program used to speak responses, if any
    pub synth_command: Option<String>,
}

/// On-disk shape of `config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    socket_path: Option<PathBuf>,
    wake_phrase: Option<String>,
    acknowledgement: Option<String>,
    locale: Option<String>,
    thinking_delay_ms: Option<u64>,
    speaking_delay_ms: Option<u64>,
    deactivation_delay_ms: Option<u64>,
    auto_start: Option<bool>,
    source: Option<SourceKind>,
    synth_command: Option<String>,
}

impl Config {
    /// Load configuration from environment, config file and defaults
    pub fn load() -> Result<Self, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::MissingHome)?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("satela");

        let mut config = Self::load_from(&data_dir)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults for a given data directory, without reading anything
    pub fn with_data_dir(data_dir: &Path) -> Self {
        let settings = SessionSettings::default();
        Self {
            socket_path: data_dir.join("daemon.sock"),
            data_dir: data_dir.to_owned(),
            wake_phrase: settings.wake_phrase,
            acknowledgement: settings.acknowledgement,
            locale: settings.locale,
            thinking_delay: settings.thinking_delay,
            speaking_delay: settings.speaking_delay,
            deactivation_delay: settings.deactivation_delay,
            auto_start: false,
            source: SourceKind::Stdin,
            synth_command: None,
        }
    }

    /// Defaults merged with `config.toml` from `data_dir`, if present
    pub fn load_from(data_dir: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::with_data_dir(data_dir);
        let path = data_dir.join("config.toml");

        if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let file: FileConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
            debug!(?path, "config file loaded");
            config.merge(file);
        }

        Ok(config)
    }

    fn merge(&mut self, file: FileConfig) {
        if let Some(v) = file.socket_path {
            self.socket_path = v;
        }
        if let Some(v) = file.wake_phrase {
            self.wake_phrase = v;
        }
        if let Some(v) = file.acknowledgement {
            self.acknowledgement = v;
        }
        if let Some(v) = file.locale {
            self.locale = v;
        }
        if let Some(v) = file.thinking_delay_ms {
            self.thinking_delay = Duration::from_millis(v);
        }
        if let Some(v) = file.speaking_delay_ms {
            self.speaking_delay = Duration::from_millis(v);
        }
        if let Some(v) = file.deactivation_delay_ms {
            self.deactivation_delay = Duration::from_millis(v);
        }
        if let Some(v) = file.auto_start {
            self.auto_start = v;
        }
        if let Some(v) = file.source {
            self.source = v;
        }
        if file.synth_command.is_some() {
            self.synth_command = file.synth_command;
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("SATELA_SOCKET") {
            self.socket_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SATELA_WAKE_PHRASE") {
            self.wake_phrase = v;
        }
        if let Ok(v) = std::env::var("SATELA_SOURCE") {
            self.source = v.parse()?;
        }
        Ok(())
    }

    /// Reject settings the session cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session_settings().validate()
    }

    /// Session timing and phrasing
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            wake_phrase: self.wake_phrase.clone(),
            acknowledgement: self.acknowledgement.clone(),
            locale: self.locale.clone(),
            thinking_delay: self.thinking_delay,
            speaking_delay: self.speaking_delay,
            deactivation_delay: self.deactivation_delay,
        }
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}
