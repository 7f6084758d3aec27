//! Bot configuration loaded from `trakbot.toml`, with CLI overrides.

use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::tracker::pivotal::DEFAULT_BASE_URL;

pub const DEFAULT_CONFIG_PATH: &str = "trakbot.toml";

/// Top-level bot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// IRC nick; also the prefix of addressed commands (`trakbot, ...`).
    #[serde(default = "default_nick")]
    pub nick: String,

    /// IRC real name.
    #[serde(default = "default_full_name")]
    pub full_name: String,

    #[serde(default = "default_server")]
    pub server: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Channels to join after connecting. A missing `#` is added.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,

    /// Directory holding one session snapshot per nick.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Token used for nicks that have not set their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_token: Option<String>,

    /// Searches with more results than this ask before listing in a channel.
    #[serde(default = "default_list_threshold")]
    pub list_threshold: usize,

    /// Default tracing filter directive (`RUST_LOG` wins when set).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub tracker: TrackerConfig,
}

/// Remote tracker API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_nick() -> String {
    "trakbot".into()
}

fn default_full_name() -> String {
    "Pivotal Tracker IRC bot".into()
}

fn default_server() -> String {
    "irc.libera.chat".into()
}

fn default_port() -> u16 {
    6667
}

fn default_channels() -> Vec<String> {
    vec!["#traktest".into()]
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".trakbot/sessions")
}

fn default_list_threshold() -> usize {
    4
}

fn default_log_level() -> String {
    "warn".into()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            nick: default_nick(),
            full_name: default_full_name(),
            server: default_server(),
            port: default_port(),
            channels: default_channels(),
            storage_dir: default_storage_dir(),
            default_token: None,
            list_threshold: default_list_threshold(),
            log_level: default_log_level(),
            tracker: TrackerConfig::default(),
        }
    }
}

/// Values given on the command line; `Some` wins over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub nick: Option<String>,
    pub server: Option<String>,
    pub port: Option<u16>,
    pub channels: Vec<String>,
    pub storage_dir: Option<PathBuf>,
    pub default_token: Option<String>,
    pub log_level: Option<String>,
}

impl BotConfig {
    /// Load config from `path`.
    ///
    /// With `path = None` the default `trakbot.toml` is read if it exists and
    /// built-in defaults are used otherwise. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_at(path, true),
            None => Self::load_at(Path::new(DEFAULT_CONFIG_PATH), false),
        }
    }

    /// Read `path`; when it is missing, fall back to defaults unless the
    /// caller named it explicitly.
    fn load_at(path: &Path, explicit: bool) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                return Ok(Self::default());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(eyre!(
                    "No config found at {}\n\nRun `trakbot init` to write one.",
                    path.display()
                ));
            }
            Err(e) => return Err(eyre!("failed to read {}: {e}", path.display())),
        };

        Self::parse(&content).wrap_err_with(|| format!("failed to parse {}", path.display()))
    }

    /// Parse TOML config text.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: BotConfig = toml::from_str(content)?;
        config.channels = normalize_channels(config.channels);
        Ok(config)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(nick) = overrides.nick {
            self.nick = nick;
        }
        if let Some(server) = overrides.server {
            self.server = server;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if !overrides.channels.is_empty() {
            self.channels = normalize_channels(overrides.channels);
        }
        if let Some(dir) = overrides.storage_dir {
            self.storage_dir = dir;
        }
        if overrides.default_token.is_some() {
            self.default_token = overrides.default_token;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
    }

    /// Render as TOML (used by `trakbot init`).
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn normalize_channels(channels: Vec<String>) -> Vec<String> {
    channels
        .into_iter()
        .map(|c| {
            let c = c.trim().to_owned();
            if c.starts_with('#') || c.starts_with('&') {
                c
            } else {
                format!("#{c}")
            }
        })
        .collect()
}
