use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::string_id;
use crate::domain::submission::SubmissionId;
use crate::errors::DomainError;

string_id!(ValuationId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationStatus {
    Draft,
    Final,
}

impl ValuationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Final => "final",
        }
    }
}

impl fmt::Display for ValuationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValuationStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "final" => Ok(Self::Final),
            other => Err(DomainError::InvalidInput(format!("unknown valuation status `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    pub id: ValuationId,
    pub quote_submission_id: SubmissionId,
    pub version: i64,
    pub status: ValuationStatus,
    pub base_value: Decimal,
    pub adjustments: Decimal,
    pub fees: Decimal,
    pub final_valuation: Decimal,
    pub recommended_offer: Decimal,
    pub market_notes: Option<String>,
    pub condition_notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

/// Partial update applied by staff while a valuation is still a draft.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationEdit {
    pub base_value: Option<Decimal>,
    pub adjustments: Option<Decimal>,
    pub fees: Option<Decimal>,
    pub recommended_offer: Option<Decimal>,
    pub market_notes: Option<String>,
    pub condition_notes: Option<String>,
}

impl Valuation {
    pub fn draft(
        quote_submission_id: SubmissionId,
        created_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ValuationId::generate(),
            quote_submission_id,
            version: 1,
            status: ValuationStatus::Draft,
            base_value: Decimal::ZERO,
            adjustments: Decimal::ZERO,
            fees: Decimal::ZERO,
            final_valuation: Decimal::ZERO,
            recommended_offer: Decimal::ZERO,
            market_notes: None,
            condition_notes: None,
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
            finalized_at: None,
        }
    }

    pub fn apply_edit(&mut self, edit: ValuationEdit, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status == ValuationStatus::Final {
            return Err(DomainError::InvariantViolation(format!(
                "valuation {} is final and can no longer be edited",
                self.id
            )));
        }

        for (field, value) in [
            ("base_value", edit.base_value),
            ("fees", edit.fees),
            ("recommended_offer", edit.recommended_offer),
        ] {
            if value.is_some_and(|amount| amount.is_sign_negative()) {
                return Err(DomainError::InvalidInput(format!("{field} cannot be negative")));
            }
        }

        if let Some(base_value) = edit.base_value {
            self.base_value = base_value;
        }
        if let Some(adjustments) = edit.adjustments {
            self.adjustments = adjustments;
        }
        if let Some(fees) = edit.fees {
            self.fees = fees;
        }
        if let Some(recommended_offer) = edit.recommended_offer {
            self.recommended_offer = recommended_offer;
        }
        if edit.market_notes.is_some() {
            self.market_notes = edit.market_notes;
        }
        if edit.condition_notes.is_some() {
            self.condition_notes = edit.condition_notes;
        }

        self.final_valuation = self.base_value + self.adjustments - self.fees;
        self.version += 1;
        self.updated_at = now;
        Ok(())
    }

    pub fn finalize(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status == ValuationStatus::Final {
            return Err(DomainError::InvariantViolation(format!(
                "valuation {} is already final",
                self.id
            )));
        }

        self.status = ValuationStatus::Final;
        self.finalized_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}
