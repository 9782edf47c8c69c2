use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};

use carsellmax_core::audit::{AuditAction, AuditLogEntry};
use carsellmax_core::domain::email::EmailLog;
use carsellmax_core::domain::offer::{Offer, OfferId, OfferStatus};
use carsellmax_core::domain::submission::SubmissionStatus;
use carsellmax_core::offers::{parent_status_for, CascadeOutcome, NewOffer};
use carsellmax_db::{RepositoryError, Stores};

use super::{cascade_parent_status, record_audit, snapshot, ServiceError, ServiceSettings};
use crate::mail::{Mailer, OutboundEmail};
use crate::templates::{EmailRenderer, OfferEmailContext};

const CUSTOMER_ACTOR: &str = "customer";

/// Result of a successful send.
#[derive(Clone, Debug, Serialize)]
pub struct SendReport {
    pub offer: Offer,
    pub recipient: String,
    pub test_mode: bool,
    pub provider_message_id: String,
    pub cascade: CascadeOutcome,
}

/// An offer after a status change, with the parent mirror when one ran.
#[derive(Clone, Debug, Serialize)]
pub struct OfferChange {
    pub offer: Offer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cascade: Option<CascadeOutcome>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PublicVehicle {
    pub year: i32,
    pub make: String,
    pub model: String,
    pub trim: Option<String>,
    pub vin: String,
    pub mileage: i64,
}

/// What the customer sees through the tracking link. Internal notes, the
/// token itself and staff identities stay out.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PublicOfferView {
    pub offer_amount: Decimal,
    pub expiry_date: DateTime<Utc>,
    pub status: OfferStatus,
    pub expired: bool,
    pub terms: String,
    pub inspection_required: bool,
    pub payment_method: String,
    pub customer_name: Option<String>,
    pub vehicle: Option<PublicVehicle>,
}

#[derive(Clone)]
pub struct OfferService {
    stores: Stores,
    mailer: Arc<dyn Mailer>,
    renderer: Arc<EmailRenderer>,
    settings: Arc<ServiceSettings>,
}

impl OfferService {
    pub fn new(
        stores: Stores,
        mailer: Arc<dyn Mailer>,
        renderer: Arc<EmailRenderer>,
        settings: Arc<ServiceSettings>,
    ) -> Self {
        Self { stores, mailer, renderer, settings }
    }

    /// Creates the single draft offer a submission may carry, whatever the
    /// status of any existing one.
    pub async fn create(&self, new_offer: NewOffer) -> Result<Offer, ServiceError> {
        let submission_id = new_offer.quote_submission_id.clone();
        if self.stores.submissions.find_by_id(&submission_id).await?.is_none() {
            return Err(ServiceError::not_found("quote submission", submission_id.as_str()));
        }
        if self.stores.offers.find_by_submission(&submission_id).await?.is_some() {
            return Err(ServiceError::DuplicateOffer { submission_id });
        }

        let offer = new_offer.into_offer(&self.settings.offer_defaults, Utc::now())?;
        self.stores.offers.insert(offer.clone()).await.map_err(|error| match error {
            RepositoryError::UniqueViolation(_) => {
                ServiceError::DuplicateOffer { submission_id: submission_id.clone() }
            }
            other => other.into(),
        })?;

        record_audit(
            &self.stores,
            AuditLogEntry::new(AuditAction::OfferCreated, offer.id.as_str(), &offer.created_by)
                .with_new_value(snapshot(&offer)),
        )
        .await;
        info!(
            event_name = "offer.created",
            offer_id = %offer.id,
            submission_id = %submission_id,
            offer_amount = %offer.offer_amount,
            "draft offer created"
        );
        Ok(offer)
    }

    pub async fn get(&self, id: &OfferId) -> Result<Offer, ServiceError> {
        self.load(id).await
    }

    /// Emails the offer and marks it sent. Only draft, sent and viewed offers
    /// can be sent.
    ///
    /// A provider failure leaves the offer untouched and is logged as an
    /// undelivered email. A local write failure after the provider accepted
    /// the message surfaces as [`ServiceError::PartialSend`].
    pub async fn send(
        &self,
        id: &OfferId,
        recipient_override: Option<String>,
        actor: &str,
    ) -> Result<SendReport, ServiceError> {
        let mut offer = self.load(id).await?;
        offer.ensure_sendable()?;
        let record =
            self.stores.submissions.find_record(&offer.quote_submission_id).await?.ok_or_else(
                || {
                    ServiceError::MissingContext(format!(
                        "quote submission `{}` is missing",
                        offer.quote_submission_id
                    ))
                },
            )?;
        let customer = record.customer.ok_or_else(|| {
            ServiceError::MissingContext("submission has no linked customer".to_string())
        })?;
        let vehicle = record.vehicle.ok_or_else(|| {
            ServiceError::MissingContext("submission has no linked vehicle".to_string())
        })?;

        let intended = match recipient_override.map(|r| r.trim().to_string()).filter(|r| !r.is_empty())
        {
            Some(address) if !address.contains('@') => {
                return Err(ServiceError::InvalidInput(format!(
                    "`{address}` is not a valid recipient"
                )));
            }
            Some(address) => address,
            None => customer.email.clone(),
        };
        let test_mode = self.settings.mail_test_mode;
        let recipient = match (&self.settings.mail_test_recipient, test_mode) {
            (Some(test_recipient), true) => test_recipient.clone(),
            _ => intended.clone(),
        };

        let rendered = self.renderer.render_offer(&OfferEmailContext {
            customer_name: customer.full_name.clone(),
            vehicle_name: vehicle.display_name(),
            vin: vehicle.vin.clone(),
            offer_amount: offer.offer_amount,
            expiry_date: offer.expiry_date.format("%B %-d, %Y").to_string(),
            terms: offer.terms.clone(),
            payment_method: offer.payment_method.clone(),
            inspection_required: offer.inspection_required,
            offer_url: format!("{}/offer/{}", self.settings.public_base_url, offer.tracking_token),
            test_mode,
            intended_recipient: intended.clone(),
        })?;

        let outbound =
            OutboundEmail { to: recipient.clone(), subject: rendered.subject, html: rendered.html };
        let receipt = match self.mailer.send(&outbound).await {
            Ok(receipt) => receipt,
            Err(mail_error) => {
                error!(
                    event_name = "offer.send.provider_failed",
                    offer_id = %offer.id,
                    submission_id = %offer.quote_submission_id,
                    recipient = %recipient,
                    error = %mail_error,
                    "mail provider rejected offer email"
                );
                self.log_email(EmailLog::failed(
                    offer.id.clone(),
                    &recipient,
                    &outbound.subject,
                    mail_error.to_string(),
                    test_mode,
                ))
                .await;
                return Err(ServiceError::UpstreamFailure(mail_error.to_string()));
            }
        };

        self.log_email(EmailLog::delivered(
            offer.id.clone(),
            &recipient,
            &outbound.subject,
            &receipt.message_id,
            test_mode,
        ))
        .await;

        let previous = offer.status;
        let now = Utc::now();
        offer.mark_sent(&receipt.message_id, now)?;
        if let Err(write_error) = self.stores.offers.update(offer.clone()).await {
            error!(
                event_name = "offer.send.partial",
                offer_id = %offer.id,
                message_id = %receipt.message_id,
                error = %write_error,
                "offer email delivered but offer record was not updated"
            );
            return Err(ServiceError::PartialSend {
                offer_id: offer.id.to_string(),
                message_id: receipt.message_id,
                reason: write_error.to_string(),
            });
        }

        record_audit(
            &self.stores,
            AuditLogEntry::new(AuditAction::OfferSent, offer.id.as_str(), actor)
                .with_old_value(serde_json::json!({ "status": previous }))
                .with_new_value(serde_json::json!({
                    "status": offer.status,
                    "recipient": recipient,
                    "provider_message_id": receipt.message_id,
                    "test_mode": test_mode,
                })),
        )
        .await;

        let cascade = cascade_parent_status(
            &self.stores,
            &offer.quote_submission_id,
            SubmissionStatus::QuoteSent,
            actor,
            now,
        )
        .await;

        info!(
            event_name = "offer.sent",
            offer_id = %offer.id,
            submission_id = %offer.quote_submission_id,
            message_id = %receipt.message_id,
            test_mode,
            "offer email sent"
        );
        Ok(SendReport {
            offer,
            recipient,
            test_mode,
            provider_message_id: receipt.message_id,
            cascade,
        })
    }

    /// Staff override of the offer status. Only `completed` is mirrored onto
    /// the submission.
    pub async fn update_status(
        &self,
        id: &OfferId,
        status: OfferStatus,
        reason: Option<String>,
        actor: &str,
    ) -> Result<OfferChange, ServiceError> {
        let mut offer = self.load(id).await?;
        let previous = offer.status;
        let now = Utc::now();

        offer.set_status(status, reason.clone(), now);
        self.stores.offers.update(offer.clone()).await?;

        record_audit(
            &self.stores,
            AuditLogEntry::new(AuditAction::OfferStatusChanged, id.as_str(), actor)
                .with_old_value(serde_json::json!({ "status": previous }))
                .with_new_value(serde_json::json!({ "status": status }))
                .with_note(reason),
        )
        .await;

        let cascade = if status == OfferStatus::Completed {
            Some(
                cascade_parent_status(
                    &self.stores,
                    &offer.quote_submission_id,
                    SubmissionStatus::Completed,
                    actor,
                    now,
                )
                .await,
            )
        } else {
            None
        };

        info!(
            event_name = "offer.status.updated",
            offer_id = %id,
            from = %previous,
            to = %status,
            actor = %actor,
            "offer status updated"
        );
        Ok(OfferChange { offer, cascade })
    }

    /// Removes a draft offer. Anything past draft must be archived or cancelled.
    pub async fn delete(
        &self,
        id: &OfferId,
        reason: Option<String>,
        actor: &str,
    ) -> Result<Offer, ServiceError> {
        let offer = self.load(id).await?;
        offer.ensure_deletable()?;

        if !self.stores.offers.delete(id).await? {
            return Err(ServiceError::not_found("offer", id.as_str()));
        }

        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        if reason.is_some() {
            record_audit(
                &self.stores,
                AuditLogEntry::new(AuditAction::OfferDeleted, id.as_str(), actor)
                    .with_old_value(snapshot(&offer))
                    .with_note(reason),
            )
            .await;
        }
        info!(
            event_name = "offer.deleted",
            offer_id = %id,
            submission_id = %offer.quote_submission_id,
            "draft offer deleted"
        );
        Ok(offer)
    }

    /// Public lookup by tracking token. The first view of a sent offer is
    /// recorded; a failure to record it does not fail the view.
    pub async fn view_by_token(&self, token: &str) -> Result<PublicOfferView, ServiceError> {
        let mut offer = self.load_by_token(token).await?;
        let now = Utc::now();

        if offer.mark_viewed(now) {
            match self.stores.offers.update(offer.clone()).await {
                Ok(()) => info!(
                    event_name = "offer.viewed",
                    offer_id = %offer.id,
                    "offer viewed for the first time"
                ),
                Err(write_error) => warn!(
                    event_name = "offer.view.record_failed",
                    offer_id = %offer.id,
                    error = %write_error,
                    "could not record offer view"
                ),
            }
        }

        let record = self.stores.submissions.find_record(&offer.quote_submission_id).await?;
        let (customer, vehicle) = match record {
            Some(record) => (record.customer, record.vehicle),
            None => (None, None),
        };

        Ok(PublicOfferView {
            offer_amount: offer.offer_amount,
            expiry_date: offer.expiry_date,
            status: offer.status,
            expired: offer.is_expired_at(now),
            terms: offer.terms,
            inspection_required: offer.inspection_required,
            payment_method: offer.payment_method,
            customer_name: customer.map(|customer| customer.full_name),
            vehicle: vehicle.map(|vehicle| PublicVehicle {
                year: vehicle.year,
                make: vehicle.make,
                model: vehicle.model,
                trim: vehicle.trim,
                vin: vehicle.vin,
                mileage: vehicle.mileage,
            }),
        })
    }

    pub async fn accept_by_token(&self, token: &str) -> Result<OfferChange, ServiceError> {
        let mut offer = self.load_by_token(token).await?;
        let previous = offer.status;
        let now = Utc::now();

        offer.accept(now)?;
        self.decided(offer, previous, None, now).await
    }

    pub async fn decline_by_token(
        &self,
        token: &str,
        reason: Option<String>,
    ) -> Result<OfferChange, ServiceError> {
        let mut offer = self.load_by_token(token).await?;
        let previous = offer.status;
        let now = Utc::now();

        offer.decline(reason.clone(), now)?;
        self.decided(offer, previous, reason, now).await
    }

    async fn decided(
        &self,
        offer: Offer,
        previous: OfferStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<OfferChange, ServiceError> {
        self.stores.offers.update(offer.clone()).await?;

        record_audit(
            &self.stores,
            AuditLogEntry::new(AuditAction::OfferStatusChanged, offer.id.as_str(), CUSTOMER_ACTOR)
                .with_old_value(serde_json::json!({ "status": previous }))
                .with_new_value(serde_json::json!({ "status": offer.status }))
                .with_note(reason),
        )
        .await;

        let cascade = match parent_status_for(offer.status) {
            Some(target) => Some(
                cascade_parent_status(
                    &self.stores,
                    &offer.quote_submission_id,
                    target,
                    CUSTOMER_ACTOR,
                    now,
                )
                .await,
            ),
            None => None,
        };

        info!(
            event_name = "offer.decided",
            offer_id = %offer.id,
            submission_id = %offer.quote_submission_id,
            status = %offer.status,
            "customer decided on offer"
        );
        Ok(OfferChange { offer, cascade })
    }

    async fn load(&self, id: &OfferId) -> Result<Offer, ServiceError> {
        self.stores
            .offers
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("offer", id.as_str()))
    }

    async fn load_by_token(&self, token: &str) -> Result<Offer, ServiceError> {
        self.stores
            .offers
            .find_by_token(token)
            .await?
            .ok_or_else(|| ServiceError::not_found("offer", "by tracking token"))
    }

    async fn log_email(&self, entry: EmailLog) {
        let offer_id = entry.offer_id.clone();
        if let Err(write_error) = self.stores.email_logs.append(entry).await {
            error!(
                event_name = "email_log.write_failed",
                offer_id = %offer_id,
                error = %write_error,
                "failed to record email attempt"
            );
        }
    }
}
