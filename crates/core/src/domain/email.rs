use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::offer::OfferId;

pub const OFFER_TEMPLATE: &str = "offer";

/// One outbound email attempt, successful or not.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailLog {
    pub id: String,
    pub offer_id: OfferId,
    pub recipient: String,
    pub template: String,
    pub subject: String,
    pub provider_message_id: Option<String>,
    pub sent: bool,
    pub test_mode: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EmailLog {
    pub fn delivered(
        offer_id: OfferId,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        provider_message_id: impl Into<String>,
        test_mode: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            offer_id,
            recipient: recipient.into(),
            template: OFFER_TEMPLATE.to_owned(),
            subject: subject.into(),
            provider_message_id: Some(provider_message_id.into()),
            sent: true,
            test_mode,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn failed(
        offer_id: OfferId,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        error: impl Into<String>,
        test_mode: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            offer_id,
            recipient: recipient.into(),
            template: OFFER_TEMPLATE.to_owned(),
            subject: subject.into(),
            provider_message_id: None,
            sent: false,
            test_mode,
            error: Some(error.into()),
            created_at: Utc::now(),
        }
    }
}
