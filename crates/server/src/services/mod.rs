//! Workflow services sitting between the HTTP routes and the repositories.
//!
//! Each service loads what it needs, applies the pure rules from
//! `carsellmax-core`, persists the result and appends an audit entry. Nothing
//! here holds a lock or spans a transaction; uniqueness races are closed by the
//! store's unique indexes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use carsellmax_core::audit::{AuditAction, AuditLogEntry};
use carsellmax_core::config::AppConfig;
use carsellmax_core::domain::offer::OfferStatus;
use carsellmax_core::domain::submission::{SubmissionId, SubmissionStatus};
use carsellmax_core::errors::DomainError;
use carsellmax_core::metrics::AlertThresholds;
use carsellmax_core::offers::{CascadeOutcome, OfferDefaults, OfferRuleError};
use carsellmax_db::{RepositoryError, Stores};

use crate::mail::Mailer;
use crate::templates::EmailRenderer;

pub mod metrics;
pub mod offers;
pub mod submissions;
pub mod valuations;

pub use metrics::MetricsService;
pub use offers::OfferService;
pub use submissions::SubmissionService;
pub use valuations::ValuationService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: SubmissionStatus, to: SubmissionStatus },
    #[error("an offer already exists for submission `{submission_id}`")]
    DuplicateOffer { submission_id: SubmissionId },
    #[error("a valuation already exists for submission `{submission_id}`")]
    DuplicateValuation { submission_id: SubmissionId },
    #[error("{0}")]
    Conflict(String),
    #[error("offer expired at {expiry_date}")]
    Expired { expiry_date: DateTime<Utc> },
    #[error("offer has already been {status}")]
    AlreadyDecided { status: OfferStatus },
    #[error("offer context is incomplete: {0}")]
    MissingContext(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("mail delivery failed: {0}")]
    UpstreamFailure(String),
    #[error(
        "offer `{offer_id}` was delivered as message `{message_id}` but could not be updated: {reason}"
    )]
    PartialSend { offer_id: String, message_id: String, reason: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("email template failed to render: {0}")]
    Template(String),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    /// Failures whose detail belongs in the log, not in a response body.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::PartialSend { .. } | Self::Persistence(_) | Self::Template(_))
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(error: RepositoryError) -> Self {
        Self::Persistence(error.to_string())
    }
}

impl From<DomainError> for ServiceError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            DomainError::InvalidInput(message) => Self::InvalidInput(message),
            DomainError::InvariantViolation(message) => Self::Conflict(message),
        }
    }
}

impl From<OfferRuleError> for ServiceError {
    fn from(error: OfferRuleError) -> Self {
        match error {
            OfferRuleError::InvalidAmount | OfferRuleError::InvalidExpiry(_) => {
                Self::InvalidInput(error.to_string())
            }
            OfferRuleError::NotDraft { .. } | OfferRuleError::NotSendable { .. } => {
                Self::Conflict(error.to_string())
            }
            OfferRuleError::AlreadyDecided { status } => Self::AlreadyDecided { status },
            OfferRuleError::Expired { expiry_date } => Self::Expired { expiry_date },
        }
    }
}

impl From<tera::Error> for ServiceError {
    fn from(error: tera::Error) -> Self {
        Self::Template(error.to_string())
    }
}

/// Settings the services read from [`AppConfig`] once at startup.
#[derive(Clone, Debug)]
pub struct ServiceSettings {
    pub offer_defaults: OfferDefaults,
    pub public_base_url: String,
    pub mail_test_mode: bool,
    pub mail_test_recipient: Option<String>,
    pub alert_thresholds: AlertThresholds,
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            offer_defaults: config.offers.defaults(),
            public_base_url: config.server.public_base_url.trim_end_matches('/').to_string(),
            mail_test_mode: config.mail.test_mode,
            mail_test_recipient: config.mail.test_recipient.clone(),
            alert_thresholds: AlertThresholds::default(),
        }
    }
}

#[derive(Clone)]
pub struct Services {
    pub submissions: SubmissionService,
    pub valuations: ValuationService,
    pub offers: OfferService,
    pub metrics: MetricsService,
}

impl Services {
    pub fn new(
        stores: Stores,
        mailer: Arc<dyn Mailer>,
        renderer: Arc<EmailRenderer>,
        settings: ServiceSettings,
    ) -> Self {
        let settings = Arc::new(settings);
        Self {
            submissions: SubmissionService::new(stores.clone()),
            valuations: ValuationService::new(stores.clone()),
            offers: OfferService::new(stores.clone(), mailer, renderer, settings.clone()),
            metrics: MetricsService::new(stores, settings.alert_thresholds.clone()),
        }
    }
}

/// Appends an audit entry. A failed write is logged and never fails the
/// mutation that produced it.
pub(crate) async fn record_audit(stores: &Stores, entry: AuditLogEntry) {
    let action = entry.action.clone();
    let record_id = entry.record_id.clone();
    if let Err(error) = stores.audit_log.append(entry).await {
        error!(
            event_name = "audit.write_failed",
            action = %action,
            record_id = %record_id,
            error = %error,
            "failed to write audit log entry"
        );
    }
}

pub(crate) fn snapshot(value: &impl Serialize) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// Mirrors an offer change onto the parent submission.
///
/// The status is written directly, without the transition table, and any
/// failure is reported in the returned outcome instead of failing the caller.
pub(crate) async fn cascade_parent_status(
    stores: &Stores,
    submission_id: &SubmissionId,
    target: SubmissionStatus,
    actor: &str,
    now: DateTime<Utc>,
) -> CascadeOutcome {
    let current = match stores.submissions.find_by_id(submission_id).await {
        Ok(Some(submission)) => submission.status,
        Ok(None) => return cascade_failed(submission_id, target, "submission not found".into()),
        Err(error) => return cascade_failed(submission_id, target, error.to_string()),
    };

    if current == target {
        return CascadeOutcome::Unchanged { status: current };
    }

    match stores.submissions.update_status(submission_id, target, now).await {
        Ok(true) => {}
        Ok(false) => return cascade_failed(submission_id, target, "submission not found".into()),
        Err(error) => return cascade_failed(submission_id, target, error.to_string()),
    }

    info!(
        event_name = "submission.status.cascaded",
        submission_id = %submission_id,
        from = %current,
        to = %target,
        "parent submission status mirrored from offer"
    );
    record_audit(
        stores,
        AuditLogEntry::new(AuditAction::SubmissionStatusChanged, submission_id.as_str(), actor)
            .with_old_value(serde_json::json!({ "status": current }))
            .with_new_value(serde_json::json!({ "status": target }))
            .with_note(Some("mirrored from offer status".to_string())),
    )
    .await;

    CascadeOutcome::Applied { status: target }
}

fn cascade_failed(
    submission_id: &SubmissionId,
    target: SubmissionStatus,
    reason: String,
) -> CascadeOutcome {
    warn!(
        event_name = "submission.status.cascade_failed",
        submission_id = %submission_id,
        target = %target,
        reason = %reason,
        "could not mirror offer status onto submission"
    );
    CascadeOutcome::Failed { target, reason }
}


#[cfg(test)]
mod tests {
    use carsellmax_core::domain::offer::OfferStatus;
    use carsellmax_core::domain::submission::{SubmissionId, SubmissionStatus};
    use carsellmax_core::errors::DomainError;
    use carsellmax_core::offers::{CascadeOutcome, OfferRuleError};
    use chrono::Utc;

    use super::test_support::{harness, submitted};
    use super::{cascade_parent_status, ServiceError};

    #[test]
    fn rule_errors_map_to_service_taxonomy() {
        assert!(matches!(
            ServiceError::from(OfferRuleError::NotDraft { status: OfferStatus::Sent }),
            ServiceError::Conflict(message) if message.contains("archive or cancel")
        ));
        assert!(matches!(
            ServiceError::from(OfferRuleError::NotSendable { status: OfferStatus::Accepted }),
            ServiceError::Conflict(message) if message == "cannot send an offer with status `accepted`"
        ));
        assert!(matches!(
            ServiceError::from(OfferRuleError::InvalidAmount),
            ServiceError::InvalidInput(_)
        ));
        assert!(matches!(
            ServiceError::from(DomainError::InvariantViolation("final".into())),
            ServiceError::Conflict(_)
        ));
    }

    #[test]
    fn internal_errors_are_flagged() {
        assert!(ServiceError::Persistence("disk".into()).is_internal());
        assert!(!ServiceError::not_found("offer", "o-1").is_internal());
        assert_eq!(ServiceError::not_found("offer", "o-1").to_string(), "offer not found");
    }

    #[tokio::test]
    async fn cascade_reports_applied_unchanged_and_failed() {
        let harness = harness();
        let submission = submitted(&harness).await;

        let applied = cascade_parent_status(
            &harness.stores,
            &submission.id,
            SubmissionStatus::Completed,
            "system",
            Utc::now(),
        )
        .await;
        assert_eq!(applied, CascadeOutcome::Applied { status: SubmissionStatus::Completed });

        let unchanged = cascade_parent_status(
            &harness.stores,
            &submission.id,
            SubmissionStatus::Completed,
            "system",
            Utc::now(),
        )
        .await;
        assert_eq!(unchanged, CascadeOutcome::Unchanged { status: SubmissionStatus::Completed });

        let failed = cascade_parent_status(
            &harness.stores,
            &SubmissionId::from("missing"),
            SubmissionStatus::Accepted,
            "system",
            Utc::now(),
        )
        .await;
        assert!(failed.is_failed());
    }
}
