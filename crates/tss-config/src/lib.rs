//! Configuration management for tss.
//!
//! Settings are resolved by deep-merging a partial option tree over the
//! built-in defaults (see [`Settings::resolve`]), so every field of the
//! resulting snapshot is always defined. A `tss.toml` file is auto-discovered
//! in the current directory or its parents, and CLI values can be applied on
//! top via [`CliSettings`].
//!
//! ## Example `tss.toml`
//!
//! ```toml
//! host = "localhost"
//! port = 8978
//! root = "public"
//! open = "/"            # or `false` to keep the browser closed
//! indexes = true
//!
//! [live_reload]
//! enable = true
//! port = 9572
//! directory = "public"
//! ignore = ["node_modules"]
//! ignore_dot_files = true
//! ```
//!
//! ## Environment Variable Expansion
//!
//! `host`, `root` and `live_reload.directory` support `${VAR}` and
//! `${VAR:-default}` references.

mod expand;
mod merge;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use merge::{kind_name, merge_values};

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "tss.toml";

/// Upper bound for the watch debounce window.
const MAX_DEBOUNCE_MS: u64 = 10_000;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override bind host.
    pub host: Option<String>,
    /// Override HTTP port.
    pub port: Option<u16>,
    /// Override served directory.
    pub root: Option<PathBuf>,
    /// Override the page opened after start. `Some(None)` disables opening.
    pub open: Option<Option<String>>,
    /// Override directory listings.
    pub indexes: Option<bool>,
    /// Override live reload enabled flag.
    pub live_reload_enabled: Option<bool>,
    /// Override live reload port.
    pub live_reload_port: Option<u16>,
}

/// Effective server settings.
///
/// This is the data half of the server configuration: everything that can be
/// written in `tss.toml`. Hooks, filters and middleware live next to it in
/// the server crate because they cannot be serialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Host the static server and the live reload listener bind to.
    pub host: String,
    /// Static server port.
    pub port: u16,
    /// Directory served over HTTP.
    pub root: PathBuf,
    /// Path opened in the browser once the server is up (`None` = don't open).
    #[serde(with = "open_path")]
    pub open: Option<String>,
    /// Render a listing for directories without an `index.html`.
    pub indexes: bool,
    /// Live reload settings.
    pub live_reload: LiveReloadSettings,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 8978,
            root: PathBuf::from("."),
            open: Some("/".to_owned()),
            indexes: false,
            live_reload: LiveReloadSettings::default(),
            config_path: None,
        }
    }
}

/// Live reload settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveReloadSettings {
    /// Whether live reload is enabled.
    pub enable: bool,
    /// Port of the change-notification listener.
    pub port: u16,
    /// Directory watched for changes.
    pub directory: PathBuf,
    /// Path substrings rejected by the default watch filter.
    pub ignore: Vec<String>,
    /// Skip paths with a dot-prefixed component below the watched directory.
    pub ignore_dot_files: bool,
    /// Quiet period before a burst of events on one path is reported.
    pub debounce_ms: u64,
}

impl Default for LiveReloadSettings {
    fn default() -> Self {
        Self {
            enable: true,
            port: 9572,
            directory: PathBuf::from("."),
            ignore: vec!["node_modules".to_owned()],
            ignore_dot_files: false,
            debounce_ms: 100,
        }
    }
}

/// `open` is either a path string or `false`.
mod open_path {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Path(String),
    }

    pub(super) fn serialize<S: Serializer>(
        value: &Option<String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(path) => serializer.serialize_str(path),
            None => serializer.serialize_bool(false),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            None | Some(Raw::Flag(false)) => None,
            Some(Raw::Flag(true)) => Some("/".to_owned()),
            Some(Raw::Path(path)) if path.is_empty() => None,
            Some(Raw::Path(path)) => Some(path),
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value has the wrong type for its key.
    #[error("Invalid option value: {0}")]
    Json(#[from] serde_json::Error),
    /// Options were not a mapping.
    #[error("Options must be a mapping, got {0}")]
    NotAMapping(&'static str),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Setting path (e.g., "host").
        field: String,
        /// Error message (e.g., "${`BIND_HOST`} not set").
        message: String,
    },
}

impl Settings {
    /// Resolve a partial option tree into a complete settings snapshot.
    ///
    /// `partial` is merged over the defaults with [`merge_values`]. Fails
    /// with [`ConfigError::NotAMapping`] when `partial` is not an object, and
    /// with [`ConfigError::Json`] when a value has the wrong type.
    ///
    /// # Errors
    ///
    /// See above. Nothing is returned on failure, so the caller's previous
    /// settings stay as they were.
    pub fn resolve(partial: Value) -> Result<Self, ConfigError> {
        if !partial.is_object() {
            return Err(ConfigError::NotAMapping(kind_name(&partial)));
        }

        let mut merged = serde_json::to_value(Self::default())?;
        merge_values(&mut merged, partial);
        Ok(serde_json::from_value(merged)?)
    }

    /// Load settings from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise searches
    /// for `tss.toml` in the current directory and its parents, falling back
    /// to the defaults.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails, or
    /// the merged settings fail [`Settings::validate`].
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let (mut settings, watch_pinned) = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            (Self::default(), false)
        };

        if let Some(cli) = cli_settings {
            settings.apply_cli_settings(cli, watch_pinned);
        }
        settings.validate()?;

        Ok(settings)
    }

    /// Apply CLI settings to the configuration.
    ///
    /// `watch_pinned` is set when the config file names
    /// `live_reload.directory`; otherwise the watched directory follows a
    /// root override.
    fn apply_cli_settings(&mut self, cli: &CliSettings, watch_pinned: bool) {
        if let Some(host) = &cli.host {
            self.host.clone_from(host);
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(root) = &cli.root {
            self.root.clone_from(root);
            if !watch_pinned {
                self.live_reload.directory.clone_from(root);
            }
        }
        if let Some(open) = &cli.open {
            self.open.clone_from(open);
        }
        if let Some(indexes) = cli.indexes {
            self.indexes = indexes;
        }
        if let Some(enable) = cli.live_reload_enabled {
            self.live_reload.enable = enable;
        }
        if let Some(port) = cli.live_reload_port {
            self.live_reload.port = port;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    ///
    /// Also reports whether the file sets `live_reload.directory`.
    fn load_from_file(path: &Path) -> Result<(Self, bool), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let table: toml::Table = toml::from_str(&content)?;
        let watch_pinned = table
            .get("live_reload")
            .and_then(toml::Value::as_table)
            .is_some_and(|live_reload| live_reload.contains_key("directory"));
        let mut settings = Self::resolve(serde_json::to_value(table)?)?;

        settings.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        settings.resolve_paths(config_dir);
        settings.config_path = Some(path.to_path_buf());

        Ok((settings, watch_pinned))
    }

    /// Validate configuration values.
    ///
    /// Called by [`Settings::load`] once file values and CLI overrides are
    /// both applied. Programmatic settings skip it, which lets tests bind to
    /// port 0.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Validation("host cannot be empty".to_owned()));
        }
        if self.port == 0 {
            return Err(ConfigError::Validation("port cannot be 0".to_owned()));
        }
        if let Some(open) = &self.open
            && !open.starts_with('/')
        {
            return Err(ConfigError::Validation(format!(
                "open must start with '/', got {open:?}"
            )));
        }
        self.validate_live_reload()
    }

    fn validate_live_reload(&self) -> Result<(), ConfigError> {
        let live_reload = &self.live_reload;
        if !live_reload.enable {
            return Ok(());
        }

        if live_reload.port == 0 {
            return Err(ConfigError::Validation(
                "live_reload.port cannot be 0".to_owned(),
            ));
        }
        if live_reload.port == self.port {
            return Err(ConfigError::Validation(format!(
                "live_reload.port must differ from port ({})",
                self.port
            )));
        }
        if live_reload.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Validation(format!(
                "live_reload.debounce_ms cannot exceed {MAX_DEBOUNCE_MS}"
            )));
        }

        Ok(())
    }

    /// Expand environment variable references in string settings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.host = expand::expand_env(&self.host, "host")?;
        self.root = expand_path(&self.root, "root")?;
        self.live_reload.directory =
            expand_path(&self.live_reload.directory, "live_reload.directory")?;
        Ok(())
    }

    /// Resolve relative paths against the config file's directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.root = config_dir.join(&self.root);
        self.live_reload.directory = config_dir.join(&self.live_reload.directory);
    }
}

fn expand_path(path: &Path, field: &str) -> Result<PathBuf, ConfigError> {
    match path.to_str() {
        Some(raw) => expand::expand_env(raw, field).map(PathBuf::from),
        None => Ok(path.to_path_buf()),
    }
}
