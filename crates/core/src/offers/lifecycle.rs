use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::offer::{Offer, OfferId, OfferStatus};
use crate::domain::submission::{SubmissionId, SubmissionStatus};
use crate::offers::token::generate_tracking_token;

pub const MAX_EXPIRY_DAYS: u32 = 90;

/// Values used when a new offer omits them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OfferDefaults {
    pub expiry_days: u32,
    pub terms: String,
    pub payment_method: String,
    pub inspection_required: bool,
}

impl Default for OfferDefaults {
    fn default() -> Self {
        Self {
            expiry_days: 7,
            terms: "Offer subject to a brief in-person inspection confirming the reported \
                    condition and mileage."
                .to_owned(),
            payment_method: "bank_transfer".to_owned(),
            inspection_required: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOffer {
    pub quote_submission_id: SubmissionId,
    pub offer_amount: Decimal,
    pub expiry_days: Option<u32>,
    pub terms: Option<String>,
    pub inspection_required: Option<bool>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OfferRuleError {
    #[error("offer amount must be greater than zero")]
    InvalidAmount,
    #[error("expiry_days must be in range 1..=90, got {0}")]
    InvalidExpiry(u32),
    #[error("cannot delete an offer with status `{status}`; archive or cancel it instead")]
    NotDraft { status: OfferStatus },
    #[error("cannot send an offer with status `{status}`")]
    NotSendable { status: OfferStatus },
    #[error("offer has already been {status}")]
    AlreadyDecided { status: OfferStatus },
    #[error("offer expired at {expiry_date}")]
    Expired { expiry_date: DateTime<Utc> },
}

/// Result of mirroring an offer change onto its parent submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CascadeOutcome {
    Applied { status: SubmissionStatus },
    Unchanged { status: SubmissionStatus },
    Failed { target: SubmissionStatus, reason: String },
}

impl CascadeOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Submission status implied by an offer reaching `status`, if any.
pub fn parent_status_for(status: OfferStatus) -> Option<SubmissionStatus> {
    match status {
        OfferStatus::Sent => Some(SubmissionStatus::QuoteSent),
        OfferStatus::Accepted => Some(SubmissionStatus::Accepted),
        OfferStatus::Declined => Some(SubmissionStatus::Declined),
        OfferStatus::Completed => Some(SubmissionStatus::Completed),
        _ => None,
    }
}

impl NewOffer {
    pub fn into_offer(
        self,
        defaults: &OfferDefaults,
        now: DateTime<Utc>,
    ) -> Result<Offer, OfferRuleError> {
        if self.offer_amount <= Decimal::ZERO {
            return Err(OfferRuleError::InvalidAmount);
        }

        let expiry_days = self.expiry_days.unwrap_or(defaults.expiry_days);
        if !(1..=MAX_EXPIRY_DAYS).contains(&expiry_days) {
            return Err(OfferRuleError::InvalidExpiry(expiry_days));
        }

        Ok(Offer {
            id: OfferId::generate(),
            quote_submission_id: self.quote_submission_id,
            offer_amount: self.offer_amount,
            expiry_date: now + Duration::days(i64::from(expiry_days)),
            status: OfferStatus::Draft,
            tracking_token: generate_tracking_token(),
            terms: non_blank(self.terms).unwrap_or_else(|| defaults.terms.clone()),
            inspection_required: self.inspection_required.unwrap_or(defaults.inspection_required),
            payment_method: non_blank(self.payment_method)
                .unwrap_or_else(|| defaults.payment_method.clone()),
            notes: non_blank(self.notes),
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
            sent_at: None,
            viewed_at: None,
            accepted_at: None,
            declined_at: None,
            decline_reason: None,
            provider_message_id: None,
        })
    }
}

impl Offer {
    pub fn ensure_deletable(&self) -> Result<(), OfferRuleError> {
        if self.status == OfferStatus::Draft {
            return Ok(());
        }
        Err(OfferRuleError::NotDraft { status: self.status })
    }

    /// Customer acceptance through the tracking token.
    pub fn accept(&mut self, now: DateTime<Utc>) -> Result<(), OfferRuleError> {
        self.ensure_undecided()?;
        if self.is_expired_at(now) {
            return Err(OfferRuleError::Expired { expiry_date: self.expiry_date });
        }

        self.status = OfferStatus::Accepted;
        self.accepted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Customer decline through the tracking token. Expiry does not block it.
    pub fn decline(
        &mut self,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), OfferRuleError> {
        self.ensure_undecided()?;

        self.status = OfferStatus::Declined;
        self.declined_at = Some(now);
        self.decline_reason = non_blank(reason);
        self.updated_at = now;
        Ok(())
    }

    /// Draft offers may be sent; sent and viewed ones may be sent again.
    pub fn ensure_sendable(&self) -> Result<(), OfferRuleError> {
        match self.status {
            OfferStatus::Draft | OfferStatus::Sent | OfferStatus::Viewed => Ok(()),
            status => Err(OfferRuleError::NotSendable { status }),
        }
    }

    pub fn mark_sent(
        &mut self,
        provider_message_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), OfferRuleError> {
        self.ensure_sendable()?;
        self.status = OfferStatus::Sent;
        self.sent_at = Some(now);
        self.provider_message_id = Some(provider_message_id.into());
        self.updated_at = now;
        Ok(())
    }

    /// Records the first customer view. Returns whether anything changed.
    pub fn mark_viewed(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != OfferStatus::Sent {
            return false;
        }
        self.status = OfferStatus::Viewed;
        self.viewed_at = Some(now);
        self.updated_at = now;
        true
    }

    /// Staff override. Any status may follow any other.
    pub fn set_status(&mut self, status: OfferStatus, reason: Option<String>, now: DateTime<Utc>) {
        match status {
            OfferStatus::Sent if self.sent_at.is_none() => self.sent_at = Some(now),
            OfferStatus::Accepted => self.accepted_at = Some(now),
            OfferStatus::Declined => {
                self.declined_at = Some(now);
                self.decline_reason = non_blank(reason);
            }
            _ => {}
        }
        self.status = status;
        self.updated_at = now;
    }

    fn ensure_undecided(&self) -> Result<(), OfferRuleError> {
        if self.status.is_decided() {
            return Err(OfferRuleError::AlreadyDecided { status: self.status });
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
}
