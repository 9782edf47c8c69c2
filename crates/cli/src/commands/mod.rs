pub mod alerts;
pub mod config;
pub mod doctor;
pub mod metrics;
pub mod migrate;

use std::future::Future;

use carsellmax_core::config::{AppConfig, LoadOptions};
use carsellmax_core::errors::ApplicationError;
use carsellmax_db::{connect_with_config, DbPool};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

#[derive(Debug, Serialize)]
struct ReportOutcome<'a, T: Serialize> {
    command: &'a str,
    status: &'static str,
    report: &'a T,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }

    pub fn from_error(command: &str, error: &ApplicationError) -> Self {
        Self::failure(command, error.error_class(), error.to_string(), error.exit_code())
    }

    /// Successful command whose payload is a full report rather than a message.
    pub fn report<T: Serialize>(command: &str, report: &T) -> Self {
        let payload = ReportOutcome { command, status: "ok", report };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }
}

fn serialize_payload<T: Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config() -> Result<AppConfig, ApplicationError> {
    AppConfig::load(LoadOptions::default())
        .map_err(|error| ApplicationError::Configuration(error.to_string()))
}

/// Drives one command's async work on a fresh current-thread runtime.
pub(crate) fn block_on<T>(
    work: impl Future<Output = Result<T, ApplicationError>>,
) -> Result<T, ApplicationError> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| ApplicationError::Integration(format!("failed to initialize async runtime: {error}")),
    )?;
    runtime.block_on(work)
}

pub(crate) async fn open_pool(config: &AppConfig) -> Result<DbPool, ApplicationError> {
    connect_with_config(&config.database)
        .await
        .map_err(|error| ApplicationError::Persistence(format!("failed to connect to database: {error}")))
}
