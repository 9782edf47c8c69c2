use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::offers::lifecycle::MAX_EXPIRY_DAYS;
use crate::offers::OfferDefaults;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub mail: MailConfig,
    pub offers: OffersConfig,
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Origin used to build the customer-facing offer links in emails.
    pub public_base_url: String,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub enabled: bool,
    pub api_base_url: String,
    pub api_key: Option<SecretString>,
    pub from_address: String,
    pub test_mode: bool,
    pub test_recipient: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct OffersConfig {
    pub default_expiry_days: u32,
    pub default_terms: String,
    pub default_payment_method: String,
    pub inspection_required: bool,
}

#[derive(Clone, Debug)]
pub struct AdminConfig {
    /// When set, `/api/admin` requires `Authorization: Bearer <key>`.
    pub api_key: Option<SecretString>,
}

#[derive(Clone, Debug)]
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub mail_enabled: Option<bool>,
    pub mail_api_key: Option<String>,
    pub mail_test_mode: Option<bool>,
    pub mail_test_recipient: Option<String>,
    pub admin_api_key: Option<String>,
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
        let offer_defaults = OfferDefaults::default();
        Self {
            database: DatabaseConfig {
                url: "sqlite://carsellmax.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                public_base_url: "http://localhost:8080".to_string(),
                graceful_shutdown_secs: 15,
            },
            mail: MailConfig {
                enabled: false,
                api_base_url: "https://api.resend.com".to_string(),
                api_key: None,
                from_address: "offers@carsellmax.com".to_string(),
                test_mode: false,
                test_recipient: None,
                timeout_secs: 15,
            },
            offers: OffersConfig {
                default_expiry_days: offer_defaults.expiry_days,
                default_terms: offer_defaults.terms,
                default_payment_method: offer_defaults.payment_method,
                inspection_required: offer_defaults.inspection_required,
            },
            admin: AdminConfig { api_key: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl OffersConfig {
    pub fn defaults(&self) -> OfferDefaults {
        OfferDefaults {
            expiry_days: self.default_expiry_days,
            terms: self.default_terms.clone(),
            payment_method: self.default_payment_method.clone(),
            inspection_required: self.inspection_required,
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("carsellmax.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(public_base_url) = server.public_base_url {
                self.server.public_base_url = public_base_url;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(mail) = patch.mail {
            if let Some(enabled) = mail.enabled {
                self.mail.enabled = enabled;
            }
            if let Some(api_base_url) = mail.api_base_url {
                self.mail.api_base_url = api_base_url;
            }
            if let Some(mail_api_key_value) = mail.api_key {
                self.mail.api_key = Some(secret_value(mail_api_key_value));
            }
            if let Some(from_address) = mail.from_address {
                self.mail.from_address = from_address;
            }
            if let Some(test_mode) = mail.test_mode {
                self.mail.test_mode = test_mode;
            }
            if let Some(test_recipient) = mail.test_recipient {
                self.mail.test_recipient = Some(test_recipient);
            }
            if let Some(timeout_secs) = mail.timeout_secs {
                self.mail.timeout_secs = timeout_secs;
            }
        }

        if let Some(offers) = patch.offers {
            if let Some(default_expiry_days) = offers.default_expiry_days {
                self.offers.default_expiry_days = default_expiry_days;
            }
            if let Some(default_terms) = offers.default_terms {
                self.offers.default_terms = default_terms;
            }
            if let Some(default_payment_method) = offers.default_payment_method {
                self.offers.default_payment_method = default_payment_method;
            }
            if let Some(inspection_required) = offers.inspection_required {
                self.offers.inspection_required = inspection_required;
            }
        }

        if let Some(admin) = patch.admin {
            if let Some(admin_api_key_value) = admin.api_key {
                self.admin.api_key = Some(secret_value(admin_api_key_value));
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
        if let Some(value) = read_env("CARSELLMAX_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CARSELLMAX_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("CARSELLMAX_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CARSELLMAX_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CARSELLMAX_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CARSELLMAX_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CARSELLMAX_SERVER_PORT") {
            self.server.port = parse_u16("CARSELLMAX_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CARSELLMAX_SERVER_PUBLIC_BASE_URL") {
            self.server.public_base_url = value;
        }
        if let Some(value) = read_env("CARSELLMAX_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CARSELLMAX_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CARSELLMAX_MAIL_ENABLED") {
            self.mail.enabled = parse_bool("CARSELLMAX_MAIL_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CARSELLMAX_MAIL_API_BASE_URL") {
            self.mail.api_base_url = value;
        }
        if let Some(value) = read_env("CARSELLMAX_MAIL_API_KEY") {
            self.mail.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CARSELLMAX_MAIL_FROM_ADDRESS") {
            self.mail.from_address = value;
        }
        if let Some(value) = read_env("CARSELLMAX_MAIL_TEST_MODE") {
            self.mail.test_mode = parse_bool("CARSELLMAX_MAIL_TEST_MODE", &value)?;
        }
        if let Some(value) = read_env("CARSELLMAX_MAIL_TEST_RECIPIENT") {
            self.mail.test_recipient = Some(value);
        }
        if let Some(value) = read_env("CARSELLMAX_MAIL_TIMEOUT_SECS") {
            self.mail.timeout_secs = parse_u64("CARSELLMAX_MAIL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CARSELLMAX_OFFERS_DEFAULT_EXPIRY_DAYS") {
            self.offers.default_expiry_days =
                parse_u32("CARSELLMAX_OFFERS_DEFAULT_EXPIRY_DAYS", &value)?;
        }

        if let Some(value) = read_env("CARSELLMAX_ADMIN_API_KEY") {
            self.admin.api_key = Some(secret_value(value));
        }

        let log_level =
            read_env("CARSELLMAX_LOGGING_LEVEL").or_else(|| read_env("CARSELLMAX_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CARSELLMAX_LOGGING_FORMAT").or_else(|| read_env("CARSELLMAX_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(enabled) = overrides.mail_enabled {
            self.mail.enabled = enabled;
        }
        if let Some(mail_api_key) = overrides.mail_api_key {
            self.mail.api_key = Some(secret_value(mail_api_key));
        }
        if let Some(test_mode) = overrides.mail_test_mode {
            self.mail.test_mode = test_mode;
        }
        if let Some(test_recipient) = overrides.mail_test_recipient {
            self.mail.test_recipient = Some(test_recipient);
        }
        if let Some(admin_api_key) = overrides.admin_api_key {
            self.admin.api_key = Some(secret_value(admin_api_key));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_mail(&self.mail)?;
        validate_offers(&self.offers)?;
        validate_admin(&self.admin)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("carsellmax.toml"), PathBuf::from("config/carsellmax.toml")]
        .into_iter()
        .find(|path| path.exists())
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

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    if !is_http_url(&server.public_base_url) {
        return Err(ConfigError::Validation(
            "server.public_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_mail(mail: &MailConfig) -> Result<(), ConfigError> {
    if mail.timeout_secs == 0 || mail.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "mail.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !looks_like_email(&mail.from_address) {
        return Err(ConfigError::Validation(
            "mail.from_address must be an email address".to_string(),
        ));
    }

    if mail.test_mode {
        let recipient_ok = mail.test_recipient.as_deref().map(looks_like_email).unwrap_or(false);
        if !recipient_ok {
            return Err(ConfigError::Validation(
                "mail.test_recipient is required when mail.test_mode is true".to_string(),
            ));
        }
    }

    if !mail.enabled {
        return Ok(());
    }

    if !is_http_url(&mail.api_base_url) {
        return Err(ConfigError::Validation(
            "mail.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    let missing_key = mail
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing_key {
        return Err(ConfigError::Validation(
            "mail.api_key is required when mail.enabled is true (set CARSELLMAX_MAIL_API_KEY)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_offers(offers: &OffersConfig) -> Result<(), ConfigError> {
    if !(1..=MAX_EXPIRY_DAYS).contains(&offers.default_expiry_days) {
        return Err(ConfigError::Validation(format!(
            "offers.default_expiry_days must be in range 1..={MAX_EXPIRY_DAYS}"
        )));
    }

    if offers.default_terms.trim().is_empty() {
        return Err(ConfigError::Validation("offers.default_terms must not be empty".to_string()));
    }

    if offers.default_payment_method.trim().is_empty() {
        return Err(ConfigError::Validation(
            "offers.default_payment_method must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_admin(admin: &AdminConfig) -> Result<(), ConfigError> {
    if let Some(key) = &admin.api_key {
        if key.expose_secret().trim().len() < 16 {
            return Err(ConfigError::Validation(
                "admin.api_key must be at least 16 characters".to_string(),
            ));
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

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn looks_like_email(value: &str) -> bool {
    value.trim().split_once('@').map(|(local, domain)| !local.is_empty() && domain.contains('.')).unwrap_or(false)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    mail: Option<MailPatch>,
    offers: Option<OffersPatch>,
    admin: Option<AdminPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    public_base_url: Option<String>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MailPatch {
    enabled: Option<bool>,
    api_base_url: Option<String>,
    api_key: Option<String>,
    from_address: Option<String>,
    test_mode: Option<bool>,
    test_recipient: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct OffersPatch {
    default_expiry_days: Option<u32>,
    default_terms: Option<String>,
    default_payment_method: Option<String>,
    inspection_required: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct AdminPatch {
    api_key: Option<String>,
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

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

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
    fn defaults_are_valid_without_file_or_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(!config.mail.enabled, "mail delivery should be disabled by default")?;
        ensure(config.offers.default_expiry_days == 7, "default expiry should be seven days")?;
        ensure(config.admin.api_key.is_none(), "admin key should be unset by default")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_CARSELLMAX_MAIL_KEY", "re_from_env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("carsellmax.toml");
            fs::write(
                &path,
                r#"
[mail]
enabled = true
api_key = "${TEST_CARSELLMAX_MAIL_KEY}"

[offers]
default_expiry_days = 10
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.mail.api_key.as_ref().map(|key| key.expose_secret() == "re_from_env")
                    == Some(true),
                "mail api key should be loaded from environment",
            )?;
            ensure(config.offers.default_expiry_days == 10, "expiry days should come from file")?;
            ensure(config.offers.defaults().expiry_days == 10, "offer defaults should follow")
        })();

        clear_vars(&["TEST_CARSELLMAX_MAIL_KEY"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CARSELLMAX_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("CARSELLMAX_SERVER_PORT", "9090");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("carsellmax.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[server]
port = 7070
public_base_url = "https://www.carsellmax.com"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.server.port == 9090, "env port should win over file")?;
            ensure(
                config.server.public_base_url == "https://www.carsellmax.com",
                "file base url should win over default",
            )
        })();

        clear_vars(&["CARSELLMAX_DATABASE_URL", "CARSELLMAX_SERVER_PORT"]);
        result
    }

    #[test]
    fn enabled_mail_without_key_fails_fast() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides { mail_enabled: Some(true), ..ConfigOverrides::default() },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected validation failure but config load succeeded".to_string()),
            Err(error) => error,
        };

        ensure(
            matches!(error, ConfigError::Validation(ref message) if message.contains("mail.api_key")),
            "validation failure should mention mail.api_key",
        )
    }

    #[test]
    fn test_mode_requires_recipient() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let missing = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides { mail_test_mode: Some(true), ..ConfigOverrides::default() },
            ..LoadOptions::default()
        });
        ensure(
            matches!(missing, Err(ConfigError::Validation(ref message)) if message.contains("test_recipient")),
            "test mode without recipient should fail",
        )?;

        let present = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                mail_test_mode: Some(true),
                mail_test_recipient: Some("qa@carsellmax.com".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        ensure(present.is_ok(), "test mode with recipient should load")
    }

    #[test]
    fn invalid_env_number_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CARSELLMAX_SERVER_PORT", "eighty");
        let result = AppConfig::load(LoadOptions::default());
        clear_vars(&["CARSELLMAX_SERVER_PORT"]);

        ensure(
            matches!(result, Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "CARSELLMAX_SERVER_PORT"),
            "bad port should surface the offending key",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CARSELLMAX_MAIL_API_KEY", "re_secret_value");
        env::set_var("CARSELLMAX_ADMIN_API_KEY", "admin-secret-value-0001");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("re_secret_value"), "debug output should not contain mail key")?;
            ensure(
                !debug.contains("admin-secret-value-0001"),
                "debug output should not contain admin key",
            )
        })();

        clear_vars(&["CARSELLMAX_MAIL_API_KEY", "CARSELLMAX_ADMIN_API_KEY"]);
        result
    }
}
