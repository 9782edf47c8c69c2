use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use carsellmax_core::config::AppConfig;
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::load_config;

struct ConfigField {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run() -> String {
    let config = match load_config() {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key,
            field.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField> {
    let field = |key: &'static str, env_key: &'static str, value: String| ConfigField { key, env_key, value };

    vec![
        field("database.url", "CARSELLMAX_DATABASE_URL", config.database.url.clone()),
        field(
            "database.max_connections",
            "CARSELLMAX_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            "CARSELLMAX_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        field(
            "server.bind_address",
            "CARSELLMAX_SERVER_BIND_ADDRESS",
            config.server.bind_address.clone(),
        ),
        field("server.port", "CARSELLMAX_SERVER_PORT", config.server.port.to_string()),
        field(
            "server.public_base_url",
            "CARSELLMAX_SERVER_PUBLIC_BASE_URL",
            config.server.public_base_url.clone(),
        ),
        field(
            "server.graceful_shutdown_secs",
            "CARSELLMAX_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field("mail.enabled", "CARSELLMAX_MAIL_ENABLED", config.mail.enabled.to_string()),
        field(
            "mail.api_base_url",
            "CARSELLMAX_MAIL_API_BASE_URL",
            config.mail.api_base_url.clone(),
        ),
        field(
            "mail.api_key",
            "CARSELLMAX_MAIL_API_KEY",
            redact_secret(config.mail.api_key.as_ref()),
        ),
        field(
            "mail.from_address",
            "CARSELLMAX_MAIL_FROM_ADDRESS",
            config.mail.from_address.clone(),
        ),
        field("mail.test_mode", "CARSELLMAX_MAIL_TEST_MODE", config.mail.test_mode.to_string()),
        field(
            "mail.test_recipient",
            "CARSELLMAX_MAIL_TEST_RECIPIENT",
            config.mail.test_recipient.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        field(
            "mail.timeout_secs",
            "CARSELLMAX_MAIL_TIMEOUT_SECS",
            config.mail.timeout_secs.to_string(),
        ),
        field(
            "offers.default_expiry_days",
            "CARSELLMAX_OFFERS_DEFAULT_EXPIRY_DAYS",
            config.offers.default_expiry_days.to_string(),
        ),
        field(
            "admin.api_key",
            "CARSELLMAX_ADMIN_API_KEY",
            redact_secret(config.admin.api_key.as_ref()),
        ),
        field("logging.level", "CARSELLMAX_LOGGING_LEVEL", config.logging.level.clone()),
        field(
            "logging.format",
            "CARSELLMAX_LOGGING_FORMAT",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["carsellmax.toml", "config/carsellmax.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
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

/// Keeps a short provider prefix such as `re_` and hides the rest.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once('_') {
        Some((prefix, _)) if prefix.len() <= 4 => format!("{prefix}_***"),
        _ => "<redacted>".to_string(),
    }
}
