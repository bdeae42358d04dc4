use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lifecycle::TransitionPolicy;

/// Files probed, in order, when no explicit config path is given.
pub const CONFIG_SEARCH_PATHS: [&str; 2] = ["loamdesk.toml", "config/loamdesk.toml"];

pub const REFERENCE_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 6..=32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub intake: IntakeConfig,
    pub lifecycle: LifecycleConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntakeConfig {
    /// TOML wizard definition; the built-in loan application is used when unset.
    pub schema_path: Option<PathBuf>,
    pub reference_length: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub policy: TransitionPolicy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub schema_path: Option<PathBuf>,
    pub reference_length: Option<usize>,
    pub lifecycle_policy: Option<TransitionPolicy>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            intake: IntakeConfig { schema_path: None, reference_length: 8 },
            lifecycle: LifecycleConfig { policy: TransitionPolicy::Unrestricted },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_SEARCH_PATHS[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(intake) = patch.intake {
            if let Some(schema_path) = intake.schema_path {
                self.intake.schema_path = Some(schema_path);
            }
            if let Some(reference_length) = intake.reference_length {
                self.intake.reference_length = reference_length;
            }
        }

        if let Some(lifecycle) = patch.lifecycle {
            if let Some(policy) = lifecycle.policy {
                self.lifecycle.policy = policy;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LOAMDESK_INTAKE_SCHEMA_PATH") {
            self.intake.schema_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("LOAMDESK_INTAKE_REFERENCE_LENGTH") {
            self.intake.reference_length =
                parse_usize("LOAMDESK_INTAKE_REFERENCE_LENGTH", &value)?;
        }

        if let Some(value) = read_env("LOAMDESK_LIFECYCLE_POLICY") {
            self.lifecycle.policy = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "LOAMDESK_LIFECYCLE_POLICY".to_string(),
                value: value.clone(),
            })?;
        }

        let log_level =
            read_env("LOAMDESK_LOGGING_LEVEL").or_else(|| read_env("LOAMDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LOAMDESK_LOGGING_FORMAT").or_else(|| read_env("LOAMDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(schema_path) = overrides.schema_path {
            self.intake.schema_path = Some(schema_path);
        }
        if let Some(reference_length) = overrides.reference_length {
            self.intake.reference_length = reference_length;
        }
        if let Some(policy) = overrides.lifecycle_policy {
            self.lifecycle.policy = policy;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_intake(&self.intake)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Explicit paths are used only if they exist; otherwise the first existing
/// entry of [`CONFIG_SEARCH_PATHS`] wins.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_SEARCH_PATHS.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_intake(intake: &IntakeConfig) -> Result<(), ConfigError> {
    if !REFERENCE_LENGTH_RANGE.contains(&intake.reference_length) {
        return Err(ConfigError::Validation(format!(
            "intake.reference_length must be in range {}..={}",
            REFERENCE_LENGTH_RANGE.start(),
            REFERENCE_LENGTH_RANGE.end()
        )));
    }

    if let Some(path) = &intake.schema_path {
        if !path.is_file() {
            return Err(ConfigError::Validation(format!(
                "intake.schema_path `{}` does not point to a readable file",
                path.display()
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    intake: Option<IntakePatch>,
    lifecycle: Option<LifecyclePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct IntakePatch {
    schema_path: Option<PathBuf>,
    reference_length: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LifecyclePatch {
    policy: Option<TransitionPolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::lifecycle::TransitionPolicy;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_and_unrestricted() -> Result<(), String> {
        let config = AppConfig::default();
        config.validate().map_err(|err| err.to_string())?;

        ensure(config.intake.reference_length == 8, "default reference length should be 8")?;
        ensure(
            config.lifecycle.policy == TransitionPolicy::Unrestricted,
            "default lifecycle policy should be unrestricted",
        )?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_LOAMDESK_POLICY", "guarded");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("loamdesk.toml");
            fs::write(
                &path,
                r#"
[lifecycle]
policy = "${TEST_LOAMDESK_POLICY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.lifecycle.policy == TransitionPolicy::Guarded,
                "policy should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_LOAMDESK_POLICY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LOAMDESK_LOG_LEVEL", "warn");
        env::set_var("LOAMDESK_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )
        })();

        clear_vars(&["LOAMDESK_LOG_LEVEL", "LOAMDESK_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LOAMDESK_INTAKE_REFERENCE_LENGTH", "10");
        env::set_var("LOAMDESK_LIFECYCLE_POLICY", "unrestricted");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("loamdesk.toml");
            fs::write(
                &path,
                r#"
[intake]
reference_length = 12

[lifecycle]
policy = "guarded"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.intake.reference_length == 10, "env reference length should beat file")?;
            ensure(
                config.lifecycle.policy == TransitionPolicy::Unrestricted,
                "env policy should beat file",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")
        })();

        clear_vars(&["LOAMDESK_INTAKE_REFERENCE_LENGTH", "LOAMDESK_LIFECYCLE_POLICY"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LOAMDESK_INTAKE_REFERENCE_LENGTH", "4");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("intake.reference_length")
            );
            ensure(has_message, "validation failure should mention intake.reference_length")
        })();

        clear_vars(&["LOAMDESK_INTAKE_REFERENCE_LENGTH"]);
        result
    }

    #[test]
    fn malformed_env_override_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LOAMDESK_LIFECYCLE_POLICY", "strict");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "LOAMDESK_LIFECYCLE_POLICY", "error should name the env key")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected invalid override error".to_string()),
        };

        clear_vars(&["LOAMDESK_LIFECYCLE_POLICY"]);
        result
    }

    #[test]
    fn missing_required_file_is_an_error() -> Result<(), String> {
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let error = AppConfig::load(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            require_file: true,
            ..LoadOptions::default()
        });

        ensure(
            matches!(error, Err(ConfigError::MissingConfigFile(_))),
            "missing required file should be reported",
        )
    }
}
