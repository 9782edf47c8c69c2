//! Outbound mail collaborator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use carsellmax_core::config::MailConfig;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailReceipt {
    pub message_id: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail request failed: {0}")]
    Transport(String),
    #[error("mail provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("mail provider response could not be decoded: {0}")]
    Decode(String),
    #[error("mail api key is not configured")]
    MissingApiKey,
}

/// Sends one rendered email. Failures are returned as-is; there is no retry.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<MailReceipt, MailError>;
}

/// Build the mailer described by `config`: the HTTP provider when delivery is
/// enabled, otherwise a mailer that only logs.
pub fn from_config(config: &MailConfig) -> Result<Box<dyn Mailer>, MailError> {
    if !config.enabled {
        return Ok(Box::new(LogMailer));
    }
    let api_key = config.api_key.clone().ok_or(MailError::MissingApiKey)?;
    Ok(Box::new(HttpMailer::new(
        &config.api_base_url,
        api_key,
        &config.from_address,
        Duration::from_secs(config.timeout_secs),
    )?))
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: String,
}

/// Transactional email over a Resend-compatible `POST /emails` API.
pub struct HttpMailer {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    from_address: String,
}

impl HttpMailer {
    pub fn new(
        api_base_url: &str,
        api_key: SecretString,
        from_address: &str,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| MailError::Transport(error.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/emails", api_base_url.trim_end_matches('/')),
            api_key,
            from_address: from_address.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<MailReceipt, MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&SendEmailRequest {
                from: &self.from_address,
                to: [&email.to],
                subject: &email.subject,
                html: &email.html,
            })
            .send()
            .await
            .map_err(|error| MailError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected { status: status.as_u16(), body });
        }

        let payload: SendEmailResponse =
            response.json().await.map_err(|error| MailError::Decode(error.to_string()))?;
        if payload.id.trim().is_empty() {
            return Err(MailError::Decode("provider returned an empty message id".to_string()));
        }
        Ok(MailReceipt { message_id: payload.id })
    }
}

/// Used when delivery is disabled: logs the message and reports a local id.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<MailReceipt, MailError> {
        let message_id = format!("local-{}", Uuid::new_v4().simple());
        info!(
            event_name = "mail.delivery_disabled",
            message_id = %message_id,
            recipient = %email.to,
            subject = %email.subject,
            "mail delivery disabled; message logged instead of sent"
        );
        Ok(MailReceipt { message_id })
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use recording::RecordingMailer;

#[cfg(any(test, feature = "test-support"))]
mod recording {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{MailError, MailReceipt, Mailer, OutboundEmail};

    /// Captures every message in memory. Can be told to fail the next sends.
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<OutboundEmail>>,
        failure: Mutex<Option<String>>,
    }

    impl RecordingMailer {
        pub fn fail_with(&self, reason: impl Into<String>) {
            if let Ok(mut failure) = self.failure.lock() {
                *failure = Some(reason.into());
            }
        }

        pub fn recover(&self) {
            if let Ok(mut failure) = self.failure.lock() {
                *failure = None;
            }
        }

        pub fn sent(&self) -> Vec<OutboundEmail> {
            self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutboundEmail) -> Result<MailReceipt, MailError> {
            let failure = self.failure.lock().ok().and_then(|failure| failure.clone());
            if let Some(reason) = failure {
                return Err(MailError::Transport(reason));
            }

            let mut sent =
                self.sent.lock().map_err(|_| MailError::Transport("recorder poisoned".to_string()))?;
            sent.push(email.clone());
            Ok(MailReceipt { message_id: format!("rec-{}", sent.len()) })
        }
    }
}

#[async_trait]
impl<T: Mailer + ?Sized> Mailer for std::sync::Arc<T> {
    async fn send(&self, email: &OutboundEmail) -> Result<MailReceipt, MailError> {
        (**self).send(email).await
    }
}
