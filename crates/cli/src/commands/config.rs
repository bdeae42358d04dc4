use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use loamdesk_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

pub fn run(config_path: Option<&Path>) -> String {
    let config = match AppConfig::load(LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        require_file: config_path.is_some(),
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path: Option<PathBuf> = resolve_config_path(config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let schema_path = config
        .intake
        .schema_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<built-in loan application>".to_string());

    let lines = vec![
        "effective config (source precedence: env > file > default):".to_string(),
        render_line(
            "intake.schema_path",
            &schema_path,
            source("intake.schema_path", &["LOAMDESK_INTAKE_SCHEMA_PATH"]),
        ),
        render_line(
            "intake.reference_length",
            &config.intake.reference_length.to_string(),
            source("intake.reference_length", &["LOAMDESK_INTAKE_REFERENCE_LENGTH"]),
        ),
        render_line(
            "lifecycle.policy",
            config.lifecycle.policy.as_str(),
            source("lifecycle.policy", &["LOAMDESK_LIFECYCLE_POLICY"]),
        ),
        render_line(
            "logging.level",
            &config.logging.level,
            source("logging.level", &["LOAMDESK_LOGGING_LEVEL", "LOAMDESK_LOG_LEVEL"]),
        ),
        render_line(
            "logging.format",
            &format!("{:?}", config.logging.format).to_lowercase(),
            source("logging.format", &["LOAMDESK_LOGGING_FORMAT", "LOAMDESK_LOG_FORMAT"]),
        ),
    ];

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
