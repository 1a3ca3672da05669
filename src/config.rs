//! Configuration for the cache and its downloaders.
//!
//! [`CacheConfig`] is the resolved runtime configuration. [`FileConfig`] is
//! the optional on-disk layer, a flat `key = value` file:
//!
//! ```text
//! # ~/.config/resource-cache/config.toml
//! cache_dir = "/var/cache/rescache"
//! parallel_downloads = 4
//! update_policy = "60000ms"   # revalidate entries older than a minute
//! connect_timeout_secs = 10
//! read_timeout_secs = 120
//! max_attempts = 5
//! ```
//!
//! Precedence is command-line flag, then config file, then built-in default.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::cache::UpdatePolicy;
use crate::download::{CONNECT_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_PARALLEL_DOWNLOADS, READ_TIMEOUT_SECS};

/// Directory name used under the XDG config and cache roots.
pub const APP_DIR_NAME: &str = "resource-cache";

/// File name of the config file.
pub const CONFIG_FILE_NAME: &str = "config.toml";

const MAX_PARALLEL_DOWNLOADS: u64 = 100;
const MAX_TIMEOUT_SECS: u64 = 3600;
const MAX_ATTEMPTS_LIMIT: u64 = 20;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// The config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A line is not `key = value`.
    #[error("invalid config syntax on line {line}: expected key = value")]
    Syntax {
        /// 1-based line number.
        line: usize,
    },

    /// A key the file format does not know.
    #[error("unknown configuration key: '{key}' on line {line}")]
    UnknownKey {
        /// The offending key.
        key: String,
        /// 1-based line number.
        line: usize,
    },

    /// A value of the wrong shape for its key.
    #[error("invalid `{key}` value on line {line}: {reason}")]
    InvalidValue {
        /// The key being set.
        key: &'static str,
        /// 1-based line number.
        line: usize,
        /// What was expected.
        reason: String,
    },

    /// A well-formed value outside its allowed range.
    #[error("invalid config value for `{key}`: {value}. Expected range: {expected}")]
    OutOfRange {
        /// The key being validated.
        key: &'static str,
        /// The rejected value.
        value: u64,
        /// The allowed range.
        expected: &'static str,
    },
}

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Root of the on-disk cache.
    pub cache_dir: PathBuf,
    /// Size of the main download pool (1..=100).
    pub parallel_downloads: usize,
    /// Default staleness rule for registered resources.
    pub update_policy: UpdatePolicy,
    /// HTTP connect timeout.
    pub connect_timeout_secs: u64,
    /// HTTP read timeout.
    pub read_timeout_secs: u64,
    /// Attempts per download, first try included.
    pub max_attempts: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            parallel_downloads: DEFAULT_PARALLEL_DOWNLOADS,
            update_policy: UpdatePolicy::default(),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl CacheConfig {
    /// Starts from the defaults and applies every value set in `file`.
    #[must_use]
    pub fn from_file(file: &FileConfig) -> Self {
        let mut config = Self::default();
        config.apply(file);
        config
    }

    /// Overrides fields with the values set in `file`.
    pub fn apply(&mut self, file: &FileConfig) {
        if let Some(dir) = &file.cache_dir {
            self.cache_dir.clone_from(dir);
        }
        if let Some(parallel) = file.parallel_downloads {
            self.parallel_downloads = parallel;
        }
        if let Some(policy) = file.update_policy {
            self.update_policy = policy;
        }
        if let Some(secs) = file.connect_timeout_secs {
            self.connect_timeout_secs = secs;
        }
        if let Some(secs) = file.read_timeout_secs {
            self.read_timeout_secs = secs;
        }
        if let Some(attempts) = file.max_attempts {
            self.max_attempts = attempts;
        }
    }

    /// Checks every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_parallel(self.parallel_downloads as u64)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        validate_max_attempts(u64::from(self.max_attempts))
    }
}

/// Values read from a config file; `None` means "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub cache_dir: Option<PathBuf>,
    pub parallel_downloads: Option<usize>,
    pub update_policy: Option<UpdatePolicy>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
}

impl FileConfig {
    /// Validates set values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(parallel) = self.parallel_downloads {
            validate_parallel(parallel as u64)?;
        }
        if let Some(secs) = self.connect_timeout_secs {
            validate_timeout_secs("connect_timeout_secs", secs)?;
        }
        if let Some(secs) = self.read_timeout_secs {
            validate_timeout_secs("read_timeout_secs", secs)?;
        }
        if let Some(attempts) = self.max_attempts {
            validate_max_attempts(u64::from(attempts))?;
        }
        Ok(())
    }

    /// Reads and validates the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loading config file");
        raw.parse()
    }
}

impl FromStr for FileConfig {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut cfg = Self::default();
        for (index, raw_line) in raw.lines().enumerate() {
            let line = index + 1;
            let content = strip_inline_comment(raw_line).trim();
            if content.is_empty() {
                continue;
            }
            let Some((raw_key, raw_value)) = content.split_once('=') else {
                return Err(ConfigError::Syntax { line });
            };
            let value = raw_value.trim();

            match raw_key.trim() {
                "cache_dir" => {
                    let parsed = parse_string_literal(value)
                        .map_err(|reason| invalid("cache_dir", line, reason))?;
                    cfg.cache_dir = Some(PathBuf::from(parsed));
                }
                "parallel_downloads" => {
                    let parsed = parse_integer(value)
                        .map_err(|reason| invalid("parallel_downloads", line, reason))?;
                    let parsed = usize::try_from(parsed).map_err(|_| {
                        invalid("parallel_downloads", line, "out of range".to_string())
                    })?;
                    cfg.parallel_downloads = Some(parsed);
                }
                "update_policy" => {
                    let parsed = parse_string_literal(value)
                        .map_err(|reason| invalid("update_policy", line, reason))?;
                    let policy = parsed
                        .parse::<UpdatePolicy>()
                        .map_err(|e| invalid("update_policy", line, e.to_string()))?;
                    cfg.update_policy = Some(policy);
                }
                "connect_timeout_secs" => {
                    let parsed = parse_integer(value)
                        .map_err(|reason| invalid("connect_timeout_secs", line, reason))?;
                    cfg.connect_timeout_secs = Some(parsed);
                }
                "read_timeout_secs" => {
                    let parsed = parse_integer(value)
                        .map_err(|reason| invalid("read_timeout_secs", line, reason))?;
                    cfg.read_timeout_secs = Some(parsed);
                }
                "max_attempts" => {
                    let parsed = parse_integer(value)
                        .map_err(|reason| invalid("max_attempts", line, reason))?;
                    let parsed = u32::try_from(parsed)
                        .map_err(|_| invalid("max_attempts", line, "out of range for u32".to_string()))?;
                    cfg.max_attempts = Some(parsed);
                }
                unknown => {
                    return Err(ConfigError::UnknownKey {
                        key: unknown.to_string(),
                        line,
                    });
                }
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Where the config file was looked for, and what was found.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when the file exists.
    pub config: Option<FileConfig>,
}

impl LoadedConfig {
    #[must_use]
    pub fn loaded_from_file(&self) -> bool {
        self.config.is_some()
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/resource-cache/config.toml`
/// 2. `$HOME/.config/resource-cache/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_path_from(env_var_non_empty_os("XDG_CONFIG_HOME"), env_var_non_empty_os("HOME"))
}

/// Resolves the default cache directory.
///
/// Priority:
/// 1. `$XDG_CACHE_HOME/resource-cache`
/// 2. `$HOME/.cache/resource-cache`
/// 3. `./.resource-cache`
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    cache_dir_from(env_var_non_empty_os("XDG_CACHE_HOME"), env_var_non_empty_os("HOME"))
}

/// Loads the config file from the default path if it exists.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but is invalid.
pub fn load_default_file_config() -> Result<LoadedConfig, ConfigError> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(p) if p.exists() => Some(FileConfig::load(p)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg) = xdg_config_home {
        return Some(PathBuf::from(xdg).join(APP_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    let home = home?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn cache_dir_from(xdg_cache_home: Option<OsString>, home: Option<OsString>) -> PathBuf {
    if let Some(xdg) = xdg_cache_home {
        return PathBuf::from(xdg).join(APP_DIR_NAME);
    }
    match home {
        Some(home) => PathBuf::from(home).join(".cache").join(APP_DIR_NAME),
        None => PathBuf::from(format!(".{APP_DIR_NAME}")),
    }
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

fn validate_parallel(value: u64) -> Result<(), ConfigError> {
    if (1..=MAX_PARALLEL_DOWNLOADS).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key: "parallel_downloads",
            value,
            expected: "1..=100",
        })
    }
}

fn validate_timeout_secs(key: &'static str, value: u64) -> Result<(), ConfigError> {
    if (1..=MAX_TIMEOUT_SECS).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key,
            value,
            expected: "1..=3600",
        })
    }
}

fn validate_max_attempts(value: u64) -> Result<(), ConfigError> {
    if (1..=MAX_ATTEMPTS_LIMIT).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key: "max_attempts",
            value,
            expected: "1..=20",
        })
    }
}

fn invalid(key: &'static str, line: usize, reason: String) -> ConfigError {
    ConfigError::InvalidValue { key, line, reason }
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String, String> {
    raw_value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::to_string)
        .ok_or_else(|| "expected double-quoted string".to_string())
}

fn parse_integer(raw_value: &str) -> Result<u64, String> {
    let token = raw_value.trim();
    if token.is_empty() {
        return Err("expected integer value".to_string());
    }
    if token.starts_with('-') {
        return Err("expected non-negative integer".to_string());
    }
    token.parse::<u64>().map_err(|e| e.to_string())
}
