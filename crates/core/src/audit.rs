use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    SubmissionStatusChanged,
    ValuationCreated,
    ValuationUpdated,
    ValuationFinalized,
    OfferCreated,
    OfferSent,
    OfferStatusChanged,
    OfferDeleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmissionStatusChanged => "submission.status_changed",
            Self::ValuationCreated => "valuation.created",
            Self::ValuationUpdated => "valuation.updated",
            Self::ValuationFinalized => "valuation.finalized",
            Self::OfferCreated => "offer.created",
            Self::OfferSent => "offer.sent",
            Self::OfferStatusChanged => "offer.status_changed",
            Self::OfferDeleted => "offer.deleted",
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::SubmissionStatusChanged => "quote_submission",
            Self::ValuationCreated | Self::ValuationUpdated | Self::ValuationFinalized => {
                "valuation"
            }
            Self::OfferCreated | Self::OfferSent | Self::OfferStatusChanged | Self::OfferDeleted => {
                "offer"
            }
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of an administrative mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub action: String,
    pub table_name: String,
    pub record_id: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub actor: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(action: AuditAction, record_id: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action: action.as_str().to_owned(),
            table_name: action.table_name().to_owned(),
            record_id: record_id.into(),
            old_value: None,
            new_value: None,
            actor: actor.into(),
            note: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_old_value(mut self, value: serde_json::Value) -> Self {
        self.old_value = Some(value);
        self
    }

    pub fn with_new_value(mut self, value: serde_json::Value) -> Self {
        self.new_value = Some(value);
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note.map(|value| value.trim().to_owned()).filter(|value| !value.is_empty());
        self
    }
}
