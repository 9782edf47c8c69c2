use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::string_id;
use crate::domain::submission::SubmissionId;
use crate::errors::DomainError;

string_id!(OfferId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Draft,
    Sent,
    Viewed,
    Accepted,
    Declined,
    Expired,
    Archived,
    Cancelled,
    Completed,
}

impl OfferStatus {
    pub const ALL: [OfferStatus; 9] = [
        OfferStatus::Draft,
        OfferStatus::Sent,
        OfferStatus::Viewed,
        OfferStatus::Accepted,
        OfferStatus::Declined,
        OfferStatus::Expired,
        OfferStatus::Archived,
        OfferStatus::Cancelled,
        OfferStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Viewed => "viewed",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Expired => "expired",
            Self::Archived => "archived",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// The customer already answered this offer.
    pub fn is_decided(&self) -> bool {
        matches!(self, Self::Accepted | Self::Declined)
    }

    /// Offer is in front of the customer and awaiting an answer.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, Self::Sent | Self::Viewed)
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|status| status.as_str() == normalized).ok_or_else(|| {
            DomainError::InvalidInput(format!(
                "unknown offer status `{}` (expected one of {})",
                value.trim(),
                Self::ALL.map(|status| status.as_str()).join("|")
            ))
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub quote_submission_id: SubmissionId,
    pub offer_amount: Decimal,
    pub expiry_date: DateTime<Utc>,
    pub status: OfferStatus,
    pub tracking_token: String,
    pub terms: String,
    pub inspection_required: bool,
    pub payment_method: String,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub provider_message_id: Option<String>,
}

impl Offer {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_date
    }
}
