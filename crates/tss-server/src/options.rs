//! Caller-facing options and the resolved server configuration.
//!
//! [`Options`] is a partial configuration: plain values are kept as a JSON
//! tree and deep-merged over the defaults by [`Settings::resolve`], while the
//! parts that cannot be serialized (hooks, the watch filter, the change
//! callback and middleware) ride alongside it. Resolving produces a
//! [`ServerConfig`], an immutable snapshot the controller swaps in wholesale.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tss_config::{ConfigError, Settings, kind_name};

use crate::app::App;
use crate::live_reload::FileStat;
use crate::middleware::Middleware;

/// Lifecycle hook without arguments.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Called with the URL after the browser was opened.
pub type OpenHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Called with the assembled app before the static server binds.
pub type StartHook = Arc<dyn Fn(&mut App) + Send + Sync>;

/// Called with the changed path and its current and previous metadata.
pub type ChangeHook = Arc<dyn Fn(&Path, Option<&FileStat>, Option<&FileStat>) + Send + Sync>;

/// Watch filter. Returns `true` to include a path.
pub type Filter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Optional lifecycle hooks. A missing hook is a no-op.
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_start: Option<StartHook>,
    pub on_open: Option<OpenHook>,
    pub on_reload: Option<Hook>,
    pub on_restart: Option<Hook>,
    pub on_stop: Option<Hook>,
}

impl Hooks {
    pub(crate) fn start(&self, app: &mut App) {
        if let Some(hook) = &self.on_start {
            hook(app);
        }
    }

    pub(crate) fn open(&self, url: &str) {
        if let Some(hook) = &self.on_open {
            hook(url);
        }
    }

    pub(crate) fn reload(&self) {
        if let Some(hook) = &self.on_reload {
            hook();
        }
    }

    pub(crate) fn restart(&self) {
        if let Some(hook) = &self.on_restart {
            hook();
        }
    }

    pub(crate) fn stop(&self) {
        if let Some(hook) = &self.on_stop {
            hook();
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_start", &self.on_start.is_some())
            .field("on_open", &self.on_open.is_some())
            .field("on_reload", &self.on_reload.is_some())
            .field("on_restart", &self.on_restart.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

/// Partial server configuration.
///
/// ```ignore
/// let options = Options::new()
///     .root("site")
///     .port(5000)
///     .no_open()
///     .on_reload(|| tracing::info!("reloaded"));
/// server.configure(options)?;
/// ```
#[derive(Clone, Default)]
pub struct Options {
    values: Map<String, Value>,
    middleware: Option<Vec<Middleware>>,
    filter: Option<Filter>,
    callback: Option<ChangeHook>,
    hooks: Hooks,
}

impl Options {
    /// Empty options: every field falls back to its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options from a JSON-shaped partial tree, e.g. `{"port": 3000}`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotAMapping`] when `value` is not an object.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(values) => Ok(Self {
                values,
                ..Self::default()
            }),
            other => Err(ConfigError::NotAMapping(kind_name(&other))),
        }
    }

    /// Options carrying every value of a loaded settings file.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Self::from_value(serde_json::to_value(settings)?)
    }

    #[must_use]
    pub fn host(self, host: impl Into<String>) -> Self {
        self.set(&["host"], Value::String(host.into()))
    }

    #[must_use]
    pub fn port(self, port: u16) -> Self {
        self.set(&["port"], port.into())
    }

    #[must_use]
    pub fn root(self, root: impl AsRef<Path>) -> Self {
        self.set(&["root"], path_value(root.as_ref()))
    }

    /// Path opened in the browser after start.
    #[must_use]
    pub fn open(self, path: impl Into<String>) -> Self {
        self.set(&["open"], Value::String(path.into()))
    }

    /// Do not open the browser after start.
    #[must_use]
    pub fn no_open(self) -> Self {
        self.set(&["open"], Value::Bool(false))
    }

    #[must_use]
    pub fn indexes(self, enable: bool) -> Self {
        self.set(&["indexes"], Value::Bool(enable))
    }

    #[must_use]
    pub fn live_reload(self, enable: bool) -> Self {
        self.set(&["live_reload", "enable"], Value::Bool(enable))
    }

    #[must_use]
    pub fn live_reload_port(self, port: u16) -> Self {
        self.set(&["live_reload", "port"], port.into())
    }

    /// Directory watched for changes.
    #[must_use]
    pub fn watch_directory(self, directory: impl AsRef<Path>) -> Self {
        self.set(&["live_reload", "directory"], path_value(directory.as_ref()))
    }

    /// Path substrings rejected by the default watch filter.
    #[must_use]
    pub fn ignore<I, S>(self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| Value::String(pattern.into()))
            .collect();
        self.set(&["live_reload", "ignore"], Value::Array(patterns))
    }

    /// Skip dot-prefixed files and directories below the watched directory.
    #[must_use]
    pub fn ignore_dot_files(self, ignore: bool) -> Self {
        self.set(&["live_reload", "ignore_dot_files"], ignore.into())
    }

    #[must_use]
    pub fn debounce_ms(self, millis: u64) -> Self {
        self.set(&["live_reload", "debounce_ms"], millis.into())
    }

    /// Replace the default watch filter. The predicate returns `true` to
    /// include a path.
    #[must_use]
    pub fn filter(mut self, filter: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Called for every accepted change, after the broadcast.
    #[must_use]
    pub fn on_change(
        mut self,
        callback: impl Fn(&Path, Option<&FileStat>, Option<&FileStat>) + Send + Sync + 'static,
    ) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Request handlers run, in order, before static serving.
    #[must_use]
    pub fn middleware(mut self, middleware: Vec<Middleware>) -> Self {
        self.middleware = Some(middleware);
        self
    }

    #[must_use]
    pub fn on_start(mut self, hook: impl Fn(&mut App) + Send + Sync + 'static) -> Self {
        self.hooks.on_start = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_open(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hooks.on_open = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_reload(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_reload = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_restart(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_restart = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_stop(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_stop = Some(Arc::new(hook));
        self
    }

    /// Set a nested value, creating intermediate objects as needed.
    fn set(mut self, keys: &[&str], value: Value) -> Self {
        insert_nested(&mut self.values, keys, value);
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("values", &self.values)
            .field("middleware", &self.middleware.as_ref().map(Vec::len))
            .field("filter", &self.filter.is_some())
            .field("callback", &self.callback.is_some())
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Effective configuration of one server run.
#[derive(Clone)]
pub struct ServerConfig {
    /// Resolved plain settings.
    pub settings: Settings,
    pub(crate) filter: Filter,
    pub(crate) on_change: Option<ChangeHook>,
    pub(crate) middleware: Vec<Middleware>,
    pub(crate) hooks: Hooks,
}

impl ServerConfig {
    /// Resolve options over the defaults.
    ///
    /// Hooks, filter and middleware from `options` replace the defaults
    /// outright; they are never chained with earlier ones.
    pub fn resolve(options: Options) -> Result<Self, ConfigError> {
        let settings = Settings::resolve(Value::Object(options.values))?;
        let filter = options
            .filter
            .unwrap_or_else(|| ignore_filter(settings.live_reload.ignore.clone()));

        Ok(Self {
            settings,
            filter,
            on_change: options.callback,
            middleware: options.middleware.unwrap_or_default(),
            hooks: options.hooks,
        })
    }

    /// Whether `path` passes the watch filter.
    pub fn includes(&self, path: &Path) -> bool {
        (self.filter)(path)
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("settings", &self.settings)
            .field("middleware", &self.middleware.len())
            .field("on_change", &self.on_change.is_some())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// Default watch filter: include paths that contain none of `patterns`.
pub fn ignore_filter(patterns: Vec<String>) -> Filter {
    Arc::new(move |path: &Path| {
        let path = path.to_string_lossy();
        !patterns
            .iter()
            .any(|pattern| !pattern.is_empty() && path.contains(pattern.as_str()))
    })
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

fn insert_nested(map: &mut Map<String, Value>, keys: &[&str], value: Value) {
    match keys {
        [] => {}
        [last] => {
            map.insert((*last).to_owned(), value);
        }
        [first, rest @ ..] => {
            let slot = map
                .entry((*first).to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                insert_nested(inner, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_port_only_keeps_defaults() {
        let config = ServerConfig::resolve(Options::new().port(3000)).unwrap();
        assert_eq!(
            config.settings,
            Settings {
                port: 3000,
                ..Settings::default()
            }
        );
        assert!(config.middleware.is_empty());
        assert!(config.hooks.on_start.is_none());
    }

    #[test]
    fn test_from_value_port_only() {
        let options = Options::from_value(json!({"port": 3000})).unwrap();
        let config = ServerConfig::resolve(options).unwrap();
        assert_eq!(config.settings.port, 3000);
        assert_eq!(config.settings.host, "localhost");
        assert_eq!(config.settings.live_reload.port, 9572);
    }

    #[test]
    fn test_from_value_rejects_non_mapping() {
        let err = Options::from_value(json!(["port", 3000])).unwrap_err();
        assert!(matches!(err, ConfigError::NotAMapping("array")));
    }

    #[test]
    fn test_wrong_type_fails_resolution() {
        let options = Options::from_value(json!({"live_reload": {"port": "x"}})).unwrap();
        let err = ServerConfig::resolve(options).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_nested_setters_merge() {
        let options = Options::new()
            .live_reload_port(35729)
            .watch_directory("/src")
            .ignore_dot_files(true)
            .live_reload(false);
        let config = ServerConfig::resolve(options).unwrap();
        let live_reload = &config.settings.live_reload;
        assert_eq!(live_reload.port, 35729);
        assert_eq!(live_reload.directory, PathBuf::from("/src"));
        assert!(!live_reload.enable);
        assert!(live_reload.ignore_dot_files);
        assert_eq!(live_reload.ignore, vec!["node_modules".to_owned()]);
    }

    #[test]
    fn test_no_open() {
        let config = ServerConfig::resolve(Options::new().no_open()).unwrap();
        assert_eq!(config.settings.open, None);

        let config = ServerConfig::resolve(Options::new().open("/docs/")).unwrap();
        assert_eq!(config.settings.open.as_deref(), Some("/docs/"));
    }

    #[test]
    fn test_from_settings_round_trip() {
        let settings = Settings {
            port: 5000,
            open: None,
            indexes: true,
            ..Settings::default()
        };
        let options = Options::from_settings(&settings).unwrap();
        let config = ServerConfig::resolve(options).unwrap();
        assert_eq!(config.settings, settings);
    }

    #[test]
    fn test_default_filter_rejects_vendor_paths() {
        let config = ServerConfig::resolve(Options::new()).unwrap();
        assert!(config.includes(Path::new("/site/index.html")));
        assert!(!config.includes(Path::new("/site/node_modules/lib/index.js")));
    }

    #[test]
    fn test_ignore_list_replaces_default() {
        let config = ServerConfig::resolve(Options::new().ignore(["vendor"])).unwrap();
        assert!(config.includes(Path::new("/site/node_modules/a.js")));
        assert!(!config.includes(Path::new("/site/vendor/a.js")));
    }

    #[test]
    fn test_custom_filter_includes_on_true() {
        let options = Options::new().filter(|path| path.extension().is_some_and(|e| e == "css"));
        let config = ServerConfig::resolve(options).unwrap();
        assert!(config.includes(Path::new("/site/app.css")));
        assert!(!config.includes(Path::new("/site/index.html")));
        // A custom filter replaces the ignore list entirely.
        assert!(config.includes(Path::new("/site/node_modules/x.css")));
    }

    #[test]
    fn test_empty_ignore_pattern_rejects_nothing() {
        let filter = ignore_filter(vec![String::new()]);
        assert!(filter(Path::new("/site/index.html")));
    }

    #[test]
    fn test_later_hook_replaces_earlier() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let first_clone = Arc::clone(&first);
        let second_clone = Arc::clone(&second);
        let options = Options::new()
            .on_reload(move || {
                first_clone.fetch_add(1, Ordering::SeqCst);
            })
            .on_reload(move || {
                second_clone.fetch_add(1, Ordering::SeqCst);
            });

        let config = ServerConfig::resolve(options).unwrap();
        config.hooks.reload();

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_hooks_are_noops() {
        let hooks = Hooks::default();
        hooks.reload();
        hooks.restart();
        hooks.stop();
        hooks.open("http://localhost:8978/");
    }

    #[test]
    fn test_setter_overwrites_scalar_parent() {
        let options = Options::from_value(json!({"live_reload": false}))
            .unwrap()
            .live_reload_port(4000);
        let config = ServerConfig::resolve(options).unwrap();
        assert_eq!(config.settings.live_reload.port, 4000);
    }
}
