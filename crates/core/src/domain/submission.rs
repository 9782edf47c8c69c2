use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::customer::{Customer, CustomerId, Vehicle, VehicleId};
use crate::domain::offer::Offer;
use crate::domain::string_id;
use crate::domain::valuation::Valuation;
use crate::errors::DomainError;

string_id!(SubmissionId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    PendingReview,
    UnderReview,
    ValuationReady,
    QuoteSent,
    Accepted,
    Declined,
    Withdrawn,
    /// Reached only when the offer completes; never requested directly.
    Completed,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 8] = [
        SubmissionStatus::PendingReview,
        SubmissionStatus::UnderReview,
        SubmissionStatus::ValuationReady,
        SubmissionStatus::QuoteSent,
        SubmissionStatus::Accepted,
        SubmissionStatus::Declined,
        SubmissionStatus::Withdrawn,
        SubmissionStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingReview => "pending_review",
            Self::UnderReview => "under_review",
            Self::ValuationReady => "valuation_ready",
            Self::QuoteSent => "quote_sent",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Withdrawn => "withdrawn",
            Self::Completed => "completed",
        }
    }

    /// Statuses reachable from `self` through a staff-requested transition.
    pub fn allowed_transitions(&self) -> &'static [SubmissionStatus] {
        use SubmissionStatus::{
            Accepted, Declined, PendingReview, QuoteSent, UnderReview, ValuationReady, Withdrawn,
        };

        match self {
            PendingReview => &[UnderReview, Declined, Withdrawn],
            UnderReview => &[ValuationReady, Declined, Withdrawn],
            ValuationReady => &[QuoteSent, UnderReview],
            QuoteSent => &[Accepted, Declined, Withdrawn],
            Accepted | Declined | Withdrawn | SubmissionStatus::Completed => &[],
        }
    }

    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|status| status.as_str() == normalized).ok_or_else(|| {
            DomainError::InvalidInput(format!("unknown submission status `{}`", value.trim()))
        })
    }
}

/// Checks a requested status change against the adjacency table.
///
/// Identical `current` and `requested` values are rejected like any other
/// pair that is missing from the table.
pub fn validate_transition(
    current: SubmissionStatus,
    requested: SubmissionStatus,
) -> Result<(), DomainError> {
    if current.can_transition_to(requested) {
        return Ok(());
    }

    Err(DomainError::InvalidTransition { from: current, to: requested })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSubmission {
    pub id: SubmissionId,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub status: SubmissionStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuoteSubmission {
    pub fn new(
        customer_id: CustomerId,
        vehicle_id: VehicleId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SubmissionId::generate(),
            customer_id,
            vehicle_id,
            status: SubmissionStatus::PendingReview,
            notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition_to(
        &mut self,
        next: SubmissionStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        validate_transition(self.status, next)?;
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

/// A submission joined with the records hanging off it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub submission: QuoteSubmission,
    pub customer: Option<Customer>,
    pub vehicle: Option<Vehicle>,
    pub valuation: Option<Valuation>,
    pub offer: Option<Offer>,
}

impl SubmissionRecord {
    pub fn bare(submission: QuoteSubmission) -> Self {
        Self { submission, customer: None, vehicle: None, valuation: None, offer: None }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{validate_transition, QuoteSubmission, SubmissionStatus};
    use crate::domain::customer::{CustomerId, VehicleId};
    use crate::errors::DomainError;

    use SubmissionStatus::*;

    const LEGAL: &[(SubmissionStatus, SubmissionStatus)] = &[
        (PendingReview, UnderReview),
        (PendingReview, Declined),
        (PendingReview, Withdrawn),
        (UnderReview, ValuationReady),
        (UnderReview, Declined),
        (UnderReview, Withdrawn),
        (ValuationReady, QuoteSent),
        (ValuationReady, UnderReview),
        (QuoteSent, Accepted),
        (QuoteSent, Declined),
        (QuoteSent, Withdrawn),
    ];

    #[test]
    fn only_pairs_in_the_adjacency_table_are_accepted() {
        for from in SubmissionStatus::ALL {
            for to in SubmissionStatus::ALL {
                let expected = LEGAL.contains(&(from, to));
                assert_eq!(
                    validate_transition(from, to).is_ok(),
                    expected,
                    "{from} -> {to} should be {}",
                    if expected { "allowed" } else { "rejected" }
                );
            }
        }
    }

    #[test]
    fn self_transitions_are_rejected_for_every_status() {
        for status in SubmissionStatus::ALL {
            let error = validate_transition(status, status).expect_err("self transition");
            assert_eq!(error, DomainError::InvalidTransition { from: status, to: status });
        }
    }

    #[test]
    fn decided_statuses_are_terminal() {
        for status in [Accepted, Declined, Withdrawn, Completed] {
            assert!(status.is_terminal(), "{status} should be terminal");
        }
        assert!(!QuoteSent.is_terminal());
    }

    #[test]
    fn status_parses_from_snake_case() {
        assert_eq!("valuation_ready".parse::<SubmissionStatus>(), Ok(ValuationReady));
        assert_eq!(" Quote_Sent ".parse::<SubmissionStatus>(), Ok(QuoteSent));
        assert!(matches!(
            "sold".parse::<SubmissionStatus>(),
            Err(DomainError::InvalidInput(message)) if message.contains("sold")
        ));
    }

    #[test]
    fn transition_updates_status_and_timestamp() {
        let created = Utc::now() - Duration::hours(3);
        let mut submission = QuoteSubmission::new(
            CustomerId::from("cust-1"),
            VehicleId::from("veh-1"),
            None,
            created,
        );
        let now = Utc::now();

        submission.transition_to(UnderReview, now).expect("pending -> under review");

        assert_eq!(submission.status, UnderReview);
        assert_eq!(submission.updated_at, now);
        assert_eq!(submission.created_at, created);
    }

    #[test]
    fn rejected_transition_leaves_submission_untouched() {
        let created = Utc::now();
        let mut submission = QuoteSubmission::new(
            CustomerId::from("cust-1"),
            VehicleId::from("veh-1"),
            None,
            created,
        );

        let error = submission.transition_to(QuoteSent, Utc::now()).expect_err("not adjacent");

        assert!(matches!(error, DomainError::InvalidTransition { from: PendingReview, to: QuoteSent }));
        assert_eq!(submission.status, PendingReview);
        assert_eq!(submission.updated_at, created);
    }
}
