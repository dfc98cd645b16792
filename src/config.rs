//! Configuration management for newsacquire.
//!
//! Values come from a config file (YAML, TOML or JSON by extension), then
//! environment variables named after the upper-cased key path
//! (`newspaper.url` -> `NEWSPAPER_URL`), then built-in defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::scrapers::{BrowserEngineConfig, RetryPolicy};
use crate::services::acquisition::DEFAULT_DOWNLOAD_PATH_PATTERN;

/// Config file used when neither `--config` nor `NEWSPAPER_CONFIG` is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "NEWSPAPER_CONFIG";

/// Environment variable naming the dotenv file.
pub const ENV_FILE_ENV: &str = "NEWSPAPER_ENV";

const DEFAULT_DOWNLOAD_DIR: &str = "downloads";

/// Key fragments whose values are never printed.
const SECRET_MARKERS: &[&str] = &["password", "token", "secret", "passwd", "api_key"];

#[derive(Debug, Clone, Copy)]
enum EnvKind {
    Str,
    Int,
    Bool,
}

/// Keys that may be supplied through the environment.
const ENV_KEYS: &[(&str, EnvKind)] = &[
    ("newspaper.url", EnvKind::Str),
    ("newspaper.login_url", EnvKind::Str),
    ("newspaper.username", EnvKind::Str),
    ("newspaper.password", EnvKind::Str),
    ("newspaper.download_path_pattern", EnvKind::Str),
    ("paths.download_dir", EnvKind::Str),
    ("retry.max_attempts", EnvKind::Int),
    ("http.user_agent", EnvKind::Str),
    ("http.connect_timeout_secs", EnvKind::Int),
    ("http.read_timeout_secs", EnvKind::Int),
    ("browser.headless", EnvKind::Bool),
    ("browser.executable", EnvKind::Str),
    ("browser.remote_url", EnvKind::Str),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {format} config {}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },
    #[error("Invalid configuration value: {0}")]
    Value(String),
    #[error("Invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

/// CSS selectors and URL patterns describing the site's login form and
/// download links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSet {
    pub username: String,
    pub password: String,
    pub submit: String,
    /// Element that only appears once logged in.
    pub login_success: String,
    /// Glob (`*` wildcard) the URL matches after a successful login.
    pub success_url_pattern: Option<String>,
    /// Elements that carry a login error message.
    pub error_selectors: Vec<String>,
    /// Download link candidates on a landing page, in priority order.
    pub download_link_selectors: Vec<String>,
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self {
            username: "input[name='username'], input[type='email'], #username".to_string(),
            password: "input[type='password']".to_string(),
            submit: "button[type='submit'], input[type='submit']".to_string(),
            login_success: "a[href*='logout'], .logout, .user-menu".to_string(),
            success_url_pattern: None,
            error_selectors: vec![
                ".error".to_string(),
                ".alert-danger".to_string(),
                ".login-error".to_string(),
                "[role='alert']".to_string(),
            ],
            download_link_selectors: vec![
                "a[href$='.pdf']".to_string(),
                "a.download".to_string(),
                "a[href*='download']".to_string(),
            ],
        }
    }
}

/// Target site and account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewspaperConfig {
    #[serde(default)]
    pub url: String,
    /// Login page; the site URL when unset.
    #[serde(default)]
    pub login_url: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Path below `url` of the dated download; `{date}` is `YYYY-MM-DD`.
    #[serde(default = "default_download_path_pattern")]
    pub download_path_pattern: String,
    #[serde(default)]
    pub selectors: SelectorSet,
}

fn default_download_path_pattern() -> String {
    DEFAULT_DOWNLOAD_PATH_PATTERN.to_string()
}

impl Default for NewspaperConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            login_url: None,
            username: String::new(),
            password: String::new(),
            download_path_pattern: default_download_path_pattern(),
            selectors: SelectorSet::default(),
        }
    }
}

impl NewspaperConfig {
    pub fn login_url(&self) -> &str {
        match self.login_url.as_deref() {
            Some(url) if !url.trim().is_empty() => url,
            _ => &self.url,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where editions are saved. `~` is expanded; relative paths are
    /// resolved against the config file's directory.
    #[serde(default)]
    pub download_dir: Option<String>,
}

/// Direct HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Overrides the default `NewspaperDownloader/1.0`.
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub newspaper: NewspaperConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    /// File the configuration was read from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `explicit`, `NEWSPAPER_CONFIG`, or `config.yaml`.
    ///
    /// A missing default file is not an error; a missing requested file is.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let requested = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        match requested {
            Some(path) => Self::load_from_path(&path).await,
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load_from_path(&path).await
                } else {
                    info!(
                        "Config file {} not found, using environment and defaults",
                        DEFAULT_CONFIG_FILE
                    );
                    Self::from_layers(Value::Null, None, env_var)
                }
            }
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let file = parse_file(path, &contents)?;
        debug!("Loaded config file {}", path.display());
        Self::from_layers(file, Some(path.to_path_buf()), env_var)
    }

    /// Build a config from file contents, filling keys the file lacks from `env`.
    pub fn from_layers(
        file: Value,
        source_path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut merged = match file {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        merge_env(&mut merged, env)?;

        let mut config: Config =
            serde_json::from_value(merged).map_err(|e| ConfigError::Value(e.to_string()))?;
        config.source_path = source_path;
        Ok(config)
    }

    /// Value at a dotted key path such as `newspaper.url`.
    pub fn lookup(&self, key_path: &str) -> Option<Value> {
        let pointer = format!("/{}", key_path.replace('.', "/"));
        serde_json::to_value(self).ok()?.pointer(&pointer).cloned()
    }

    /// String value at a dotted key path, or `default`.
    pub fn lookup_str(&self, key_path: &str, default: &str) -> String {
        match self.lookup(key_path) {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => default.to_string(),
            Some(other) => other.to_string(),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.base_dir() {
            Some(base) if !base.as_os_str().is_empty() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Directory editions are saved in.
    pub fn download_dir(&self) -> PathBuf {
        let dir = self
            .paths
            .download_dir
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(DEFAULT_DOWNLOAD_DIR);
        self.resolve_path(dir)
    }

    /// Check the keys an acquisition cannot run without.
    ///
    /// Returns warnings for non-critical gaps.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        let mut problems = Vec::new();
        let mut warnings = Vec::new();

        let url = self.lookup_str("newspaper.url", "");
        match Url::parse(&url) {
            _ if url.trim().is_empty() => problems
                .push("newspaper.url is not set (config file or NEWSPAPER_URL)".to_string()),
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => problems.push(format!("newspaper.url '{}' is not an http(s) URL", url)),
        }

        if let Some(login_url) = self.newspaper.login_url.as_deref() {
            if !login_url.trim().is_empty() && Url::parse(login_url).is_err() {
                problems.push(format!("newspaper.login_url '{}' is not a URL", login_url));
            }
        }

        for key in ["newspaper.username", "newspaper.password"] {
            if self.lookup_str(key, "").trim().is_empty() {
                problems.push(format!(
                    "{} is not set (config file or {})",
                    key,
                    env_name(key)
                ));
            }
        }

        if self.retry.max_attempts == 0 {
            problems.push("retry.max_attempts must be at least 1".to_string());
        }

        if self.paths.download_dir.is_none() {
            warnings.push(format!(
                "paths.download_dir is not set, using '{}'",
                self.download_dir().display()
            ));
        }

        if problems.is_empty() {
            Ok(warnings)
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Flattened `key = value` pairs with secrets masked.
    pub fn redacted_summary(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Ok(value) = serde_json::to_value(self) {
            flatten("", &value, &mut pairs);
        }
        pairs
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Environment variable name for a key path.
pub fn env_name(key_path: &str) -> String {
    key_path.replace('.', "_").to_uppercase()
}

fn is_secret(key_path: &str) -> bool {
    let lower = key_path.to_lowercase();
    SECRET_MARKERS.iter().any(|m| lower.contains(m))
}

fn parse_file(path: &Path, contents: &str) -> Result<Value, ConfigError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    let parse_error = |format: &'static str, message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        format,
        message,
    };

    match ext {
        "toml" => toml::from_str(contents).map_err(|e| parse_error("TOML", e.to_string())),
        "yaml" | "yml" => {
            serde_yaml::from_str(contents).map_err(|e| parse_error("YAML", e.to_string()))
        }
        _ => serde_json::from_str(contents).map_err(|e| parse_error("JSON", e.to_string())),
    }
}

/// Insert environment values for keys the file does not set.
fn merge_env(root: &mut Value, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
    for (key_path, kind) in ENV_KEYS {
        let pointer = format!("/{}", key_path.replace('.', "/"));
        let present = root
            .pointer(&pointer)
            .is_some_and(|v| !v.is_null() && v.as_str() != Some(""));
        if present {
            continue;
        }

        let name = env_name(key_path);
        let Some(raw) = env(&name).filter(|v| !v.is_empty()) else {
            continue;
        };

        let value = match kind {
            EnvKind::Str => Value::String(raw),
            EnvKind::Int => raw
                .trim()
                .parse::<u64>()
                .map(Value::from)
                .map_err(|_| {
                    ConfigError::Value(format!("{} must be an integer, got '{}'", name, raw))
                })?,
            EnvKind::Bool => match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Value::Bool(true),
                "0" | "false" | "no" | "off" => Value::Bool(false),
                _ => {
                    return Err(ConfigError::Value(format!(
                        "{} must be a boolean, got '{}'",
                        name, raw
                    )))
                }
            },
        };

        debug!("Using {} from environment", name);
        insert_at(root, key_path, value);
    }
    Ok(())
}

fn insert_at(root: &mut Value, key_path: &str, value: Value) {
    let mut current = root;
    let mut parts = key_path.split('.').peekable();
    while let Some(part) = parts.next() {
        if !current.is_object() {
            warn!("Replacing non-table config value above {}", key_path);
            *current = Value::Object(Default::default());
        }
        let Value::Object(map) = current else {
            return;
        };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        current = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&path, child, out);
            }
        }
        other => {
            let shown = match other {
                Value::String(s) if is_secret(prefix) && !s.is_empty() => "********".to_string(),
                Value::String(s) => s.clone(),
                Value::Null => "(unset)".to_string(),
                v => v.to_string(),
            };
            out.push((prefix.to_string(), shown));
        }
    }
}
