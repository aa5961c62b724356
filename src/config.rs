//! File configuration and credentials.
//!
//! Configuration is static: values are read once at the start of each
//! invocation, with CLI flags layered on top by the binary.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::DEFAULT_SESSION_DURATION_SECS;
use crate::probe::{DEFAULT_PROBE_HOST, DEFAULT_PROBE_TIMEOUT_SECS};

/// Default portal probe URL. Any plain-HTTP endpoint works; a captive
/// gateway intercepts the fetch regardless of the target.
pub const DEFAULT_PROBE_URL: &str = "http://detectportal.firefox.com/success.txt";

/// Portal login credentials.
///
/// The password is intentionally redacted in Debug output to prevent
/// accidental logging of sensitive data.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password.
    ///
    /// Passwords are sensitive — avoid logging the return value.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

// Custom Debug impl that redacts the password.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// File configuration for portalguard defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Portal login username.
    pub username: Option<String>,
    /// Portal login password.
    pub password: Option<String>,
    /// URL fetched to discover the portal redirect.
    pub probe_url: Option<String>,
    /// Session validity window in seconds.
    pub session_duration_secs: Option<u64>,
    /// Host name resolved by the connectivity probe.
    pub probe_host: Option<String>,
    /// Connectivity probe timeout in seconds.
    pub probe_timeout_secs: Option<u64>,
    /// State directory override.
    pub state_dir: Option<PathBuf>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error for any out-of-range value.
    pub fn validate(&self) -> Result<()> {
        if let Some(session_duration_secs) = self.session_duration_secs
            && session_duration_secs == 0
        {
            bail!(
                "Invalid config value for `session_duration_secs`: 0. Expected a positive duration"
            );
        }

        if let Some(probe_timeout_secs) = self.probe_timeout_secs
            && !(1..=60).contains(&probe_timeout_secs)
        {
            bail!(
                "Invalid config value for `probe_timeout_secs`: {probe_timeout_secs}. Expected range: 1..=60"
            );
        }

        if let Some(probe_url) = self.probe_url.as_deref()
            && url::Url::parse(probe_url).is_err()
        {
            bail!("Invalid config value for `probe_url`: '{probe_url}' is not a valid URL");
        }

        Ok(())
    }

    /// Session validity window, defaulted.
    #[must_use]
    pub fn session_duration(&self) -> u64 {
        self.session_duration_secs
            .unwrap_or(DEFAULT_SESSION_DURATION_SECS)
    }

    /// Probe URL, defaulted.
    #[must_use]
    pub fn probe_url(&self) -> &str {
        self.probe_url.as_deref().unwrap_or(DEFAULT_PROBE_URL)
    }

    /// Connectivity probe host, defaulted.
    #[must_use]
    pub fn probe_host(&self) -> &str {
        self.probe_host.as_deref().unwrap_or(DEFAULT_PROBE_HOST)
    }

    /// Connectivity probe timeout in seconds, defaulted.
    #[must_use]
    pub fn probe_timeout_secs(&self) -> u64 {
        self.probe_timeout_secs
            .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS)
    }

    /// Credentials when both halves are configured.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) => Some(Credentials::new(username, password)),
            _ => None,
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/portalguard/config.toml`
/// 2. `$HOME/.config/portalguard/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("portalguard")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("portalguard")
            .join("config.toml"),
    )
}

/// Reads an environment variable, treating empty values as unset. Shared
/// with the state module's XDG directory resolution.
pub(crate) fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present. A missing file is not an
/// error; a present but invalid file is.
///
/// # Errors
///
/// Returns an error when an existing config file cannot be read or parsed.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig { path, config: None });
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig { path, config: None });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
    })
}

/// Loads and parses a config file at an explicit path.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();

        match key {
            "username" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `username` value on line {}", line_index + 1)
                })?;
                cfg.username = Some(parsed);
            }
            "password" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `password` value on line {}", line_index + 1)
                })?;
                cfg.password = Some(parsed);
            }
            "probe_url" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `probe_url` value on line {}", line_index + 1)
                })?;
                cfg.probe_url = Some(parsed);
            }
            "session_duration_secs" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!(
                        "Invalid `session_duration_secs` value on line {}",
                        line_index + 1
                    )
                })?;
                cfg.session_duration_secs = Some(parsed);
            }
            "probe_host" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `probe_host` value on line {}", line_index + 1)
                })?;
                cfg.probe_host = Some(parsed);
            }
            "probe_timeout_secs" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!(
                        "Invalid `probe_timeout_secs` value on line {}",
                        line_index + 1
                    )
                })?;
                cfg.probe_timeout_secs = Some(parsed);
            }
            "state_dir" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `state_dir` value on line {}", line_index + 1)
                })?;
                cfg.state_dir = Some(PathBuf::from(parsed));
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
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

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}
