// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for runcx.
//!
//! [`RunConfig`] holds the launch defaults a `runcx` invocation starts from.
//! It is read from TOML, overlaid with environment variables, validated into
//! hard errors and advisory [`ConfigWarning`]s, and merged with overlays.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file could not be read.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory issues that do not prevent a launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The timeout is unusually large.
    LargeTimeout {
        /// Timeout in milliseconds.
        millis: u64,
    },
    /// The pump buffer is unusually large.
    LargeBuffer {
        /// Buffer size in bytes.
        bytes: usize,
    },
    /// `inherit_env` is off and no variables are configured.
    EmptyEnvironment,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::LargeTimeout { millis } => {
                write!(f, "timeout of {millis}ms is unusually large")
            }
            ConfigWarning::LargeBuffer { bytes } => {
                write!(f, "buffer size of {bytes} bytes is unusually large")
            }
            ConfigWarning::EmptyEnvironment => {
                write!(f, "inherit_env is false and no env entries are set; children start with an empty environment")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Launch defaults for `runcx`.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct RunConfig {
    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Size in bytes of each pump buffer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,

    /// Exit codes that count as success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_codes: Option<Vec<i32>>,

    /// `"kill-only"` or `"convert-to-cancelled"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_policy: Option<String>,

    /// Prefix written before the echoed command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo_prompt: Option<String>,

    /// Whether children start from the caller's environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherit_env: Option<bool>,

    /// Extra environment variables for every child.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Cancel a run after this many milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Encoding of captured output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_encoding: Option<String>,

    /// Encoding of text fed to stdin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_encoding: Option<String>,

    /// Suppress console windows on Windows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_window: Option<bool>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".into()),
            buffer_size: None,
            success_codes: None,
            cancellation_policy: None,
            echo_prompt: None,
            inherit_env: None,
            env: BTreeMap::new(),
            timeout_ms: None,
            output_encoding: None,
            input_encoding: None,
            no_window: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Largest accepted pump buffer (16 MiB).
const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Buffers above this size generate a warning.
const LARGE_BUFFER_THRESHOLD: usize = 1024 * 1024;

/// Timeouts above this many milliseconds (one hour) generate a warning.
const LARGE_TIMEOUT_THRESHOLD_MS: u64 = 3_600_000;

/// Recognised log levels.
pub const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Recognised cancellation policy names.
pub const VALID_POLICIES: &[&str] = &["kill-only", "convert", "convert-to-cancelled"];

/// Recognised encoding names, compared case-insensitively.
pub const VALID_ENCODINGS: &[&str] = &[
    "utf-8",
    "utf8",
    "utf-8-lossy",
    "utf8-lossy",
    "latin1",
    "latin-1",
    "iso-8859-1",
    "utf-16le",
    "utf16le",
];

/// Environment variable overriding `log_level`.
pub const ENV_LOG_LEVEL: &str = "RUNCX_LOG_LEVEL";

/// Environment variable overriding `timeout_ms`.
pub const ENV_TIMEOUT_MS: &str = "RUNCX_TIMEOUT_MS";

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`RunConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`RunConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<RunConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content =
                std::fs::read_to_string(p).map_err(|source| ConfigError::FileNotFound {
                    path: p.display().to_string(),
                    source,
                })?;
            parse_toml(&content)?
        }
        None => RunConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`RunConfig`].
pub fn parse_toml(content: &str) -> Result<RunConfig, ConfigError> {
    toml::from_str::<RunConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides from the process environment.
///
/// Recognised variables:
/// - `RUNCX_LOG_LEVEL`
/// - `RUNCX_TIMEOUT_MS` (ignored unless it parses as an integer)
pub fn apply_env_overrides(config: &mut RunConfig) {
    apply_env_overrides_with(config, |key| std::env::var(key).ok());
}

/// Apply environment overrides using `lookup` in place of the process
/// environment.
pub fn apply_env_overrides_with<F>(config: &mut RunConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(ENV_LOG_LEVEL) {
        config.log_level = Some(val);
    }
    if let Some(millis) = lookup(ENV_TIMEOUT_MS).and_then(|v| v.trim().parse().ok()) {
        config.timeout_ms = Some(millis);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (zero or oversized buffers, empty success-code lists, unknown
/// names) are returned as a [`ConfigError::ValidationError`]; soft issues
/// come back as warnings.
pub fn validate_config(config: &RunConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level
        && !VALID_LOG_LEVELS.contains(&level.as_str())
    {
        errors.push(format!("invalid log_level '{level}'"));
    }

    if let Some(size) = config.buffer_size {
        if size == 0 || size > MAX_BUFFER_SIZE {
            errors.push(format!(
                "buffer_size {size} out of range (1..={MAX_BUFFER_SIZE})"
            ));
        } else if size > LARGE_BUFFER_THRESHOLD {
            warnings.push(ConfigWarning::LargeBuffer { bytes: size });
        }
    }

    if let Some(ref codes) = config.success_codes
        && codes.is_empty()
    {
        errors.push("success_codes must not be empty".into());
    }

    if let Some(ref policy) = config.cancellation_policy
        && !VALID_POLICIES.contains(&policy.as_str())
    {
        errors.push(format!("invalid cancellation_policy '{policy}'"));
    }

    for (field, value) in [
        ("output_encoding", &config.output_encoding),
        ("input_encoding", &config.input_encoding),
    ] {
        if let Some(name) = value
            && !VALID_ENCODINGS.contains(&name.to_ascii_lowercase().as_str())
        {
            errors.push(format!("invalid {field} '{name}'"));
        }
    }

    for key in config.env.keys() {
        if key.is_empty() || key.contains('=') {
            errors.push(format!("invalid env variable name '{key}'"));
        }
    }

    match config.timeout_ms {
        Some(0) => errors.push("timeout_ms must be greater than zero".into()),
        Some(millis) if millis > LARGE_TIMEOUT_THRESHOLD_MS => {
            warnings.push(ConfigWarning::LargeTimeout { millis });
        }
        _ => {}
    }

    if config.inherit_env == Some(false) && config.env.is_empty() {
        warnings.push(ConfigWarning::EmptyEnvironment);
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations.  Values in `overlay` take precedence over `base`.
///
/// Environment maps are combined; on key collisions the overlay entry wins.
pub fn merge_configs(base: RunConfig, overlay: RunConfig) -> RunConfig {
    let mut env = base.env;
    env.extend(overlay.env);
    RunConfig {
        log_level: overlay.log_level.or(base.log_level),
        buffer_size: overlay.buffer_size.or(base.buffer_size),
        success_codes: overlay.success_codes.or(base.success_codes),
        cancellation_policy: overlay.cancellation_policy.or(base.cancellation_policy),
        echo_prompt: overlay.echo_prompt.or(base.echo_prompt),
        inherit_env: overlay.inherit_env.or(base.inherit_env),
        env,
        timeout_ms: overlay.timeout_ms.or(base.timeout_ms),
        output_encoding: overlay.output_encoding.or(base.output_encoding),
        input_encoding: overlay.input_encoding.or(base.input_encoding),
        no_window: overlay.no_window.or(base.no_window),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
