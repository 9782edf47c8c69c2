use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::offer::OfferStatus;
use crate::domain::submission::{SubmissionRecord, SubmissionStatus};
use crate::errors::DomainError;
use crate::metrics::sla::{percentage, round_one, SlaAccumulator, SlaSummary};

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const MAX_WINDOW_DAYS: u32 = 365;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceMetrics {
    pub total_offers: usize,
    pub accepted: usize,
    pub declined: usize,
    pub expired: usize,
    pub pending: usize,
    /// Percentage of offers accepted, 0 when there are no offers.
    pub acceptance_rate: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscountMetrics {
    /// Submissions that carry both a valuation and an offer.
    pub compared: usize,
    pub total_valuation: Decimal,
    pub total_discount: Decimal,
    pub average_discount: Decimal,
    /// `None` when nothing was valued or the totals no longer fit a decimal.
    pub average_discount_pct: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationsMetrics {
    pub window_days: u32,
    pub window_start: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub total_submissions: usize,
    pub submissions_by_status: BTreeMap<String, usize>,
    pub submission_to_review: SlaSummary,
    pub review_to_send: SlaSummary,
    pub acceptance: AcceptanceMetrics,
    pub discounts: DiscountMetrics,
}

pub fn validate_window(days: u32) -> Result<u32, DomainError> {
    if !(1..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(DomainError::InvalidInput(format!(
            "days must be in range 1..={MAX_WINDOW_DAYS}, got {days}"
        )));
    }
    Ok(days)
}

/// Aggregates SLA, acceptance and discount figures for submissions created in
/// the trailing `window_days`. Records outside the window are ignored, so the
/// caller may pass a superset.
pub fn compute_operations_metrics(
    records: &[SubmissionRecord],
    window_days: u32,
    now: DateTime<Utc>,
) -> OperationsMetrics {
    let window_start = now - Duration::days(i64::from(window_days));

    let mut submissions_by_status = BTreeMap::new();
    let mut submission_to_review = SlaAccumulator::default();
    let mut review_to_send = SlaAccumulator::default();
    let mut acceptance = AcceptanceMetrics::default();
    let mut discounts = DiscountMetrics::default();
    let mut discount_totals_exact = true;
    let mut total_submissions = 0;

    for record in records.iter().filter(|record| record.submission.created_at >= window_start) {
        let submission = &record.submission;
        total_submissions += 1;
        *submissions_by_status.entry(submission.status.as_str().to_owned()).or_insert(0) += 1;

        if submission.status != SubmissionStatus::PendingReview {
            submission_to_review.record(submission.created_at, submission.updated_at);
        }

        let Some(offer) = &record.offer else {
            continue;
        };

        review_to_send.record(submission.created_at, offer.created_at);

        acceptance.total_offers += 1;
        match offer.status {
            OfferStatus::Accepted => acceptance.accepted += 1,
            OfferStatus::Declined => acceptance.declined += 1,
            OfferStatus::Expired => acceptance.expired += 1,
            _ => acceptance.pending += 1,
        }

        if let Some(valuation) = &record.valuation {
            discounts.compared += 1;
            let discount = valuation.final_valuation.checked_sub(offer.offer_amount);
            discount_totals_exact &=
                accumulate(&mut discounts.total_valuation, Some(valuation.final_valuation));
            discount_totals_exact &= accumulate(&mut discounts.total_discount, discount);
        }
    }

    acceptance.acceptance_rate = percentage(acceptance.accepted, acceptance.total_offers);

    if discounts.compared > 0 {
        discounts.average_discount =
            (discounts.total_discount / Decimal::from(discounts.compared)).round_dp(2);
    }
    if discount_totals_exact {
        discounts.average_discount_pct =
            discount_percentage(discounts.total_discount, discounts.total_valuation);
    }

    OperationsMetrics {
        window_days,
        window_start,
        generated_at: now,
        total_submissions,
        submissions_by_status,
        submission_to_review: submission_to_review.summary(),
        review_to_send: review_to_send.summary(),
        acceptance,
        discounts,
    }
}

/// Adds `value` to `total`, saturating on overflow. Returns false when the
/// sum was clamped.
fn accumulate(total: &mut Decimal, value: Option<Decimal>) -> bool {
    match value.and_then(|value| total.checked_add(value)) {
        Some(sum) => {
            *total = sum;
            true
        }
        None => {
            if let Some(value) = value {
                *total = total.saturating_add(value);
            }
            false
        }
    }
}

fn discount_percentage(total_discount: Decimal, total_valuation: Decimal) -> Option<f64> {
    let ratio = total_discount.checked_div(total_valuation)?.checked_mul(Decimal::ONE_HUNDRED)?;
    ratio.to_f64().map(round_one)
}
