use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::offer::OfferStatus;
use crate::domain::submission::{SubmissionRecord, SubmissionStatus};

/// Ordered most severe first, so a plain sort puts errors on top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertRule {
    StalePendingReview,
    OfferExpiringSoon,
    DraftOfferNotSent,
    HighSubmissionVolume,
    LowAcceptanceRate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub rule: AlertRule,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub count: usize,
    pub related_ids: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct AlertThresholds {
    pub pending_review_max_age: Duration,
    pub expiring_within: Duration,
    pub draft_max_age: Duration,
    pub volume_window: Duration,
    pub volume_limit: usize,
    pub acceptance_window: Duration,
    pub acceptance_min_offers: usize,
    /// Percent.
    pub acceptance_floor: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            pending_review_max_age: Duration::hours(24),
            expiring_within: Duration::hours(48),
            draft_max_age: Duration::hours(2),
            volume_window: Duration::hours(24),
            volume_limit: 50,
            acceptance_window: Duration::days(7),
            acceptance_min_offers: 5,
            acceptance_floor: 20.0,
        }
    }
}

/// Runs every rule independently and returns the fired alerts, most severe
/// first. Nothing is remembered between calls.
pub fn evaluate_alerts(
    records: &[SubmissionRecord],
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts: Vec<Alert> = [
        stale_pending_reviews(records, thresholds, now),
        offers_expiring_soon(records, thresholds, now),
        drafts_not_sent(records, thresholds, now),
        high_submission_volume(records, thresholds, now),
        low_acceptance_rate(records, thresholds, now),
    ]
    .into_iter()
    .flatten()
    .collect();

    alerts.sort_by_key(|alert| alert.severity);
    alerts
}

fn stale_pending_reviews(
    records: &[SubmissionRecord],
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Option<Alert> {
    let cutoff = now - thresholds.pending_review_max_age;
    let ids: Vec<String> = records
        .iter()
        .map(|record| &record.submission)
        .filter(|submission| {
            submission.status == SubmissionStatus::PendingReview && submission.created_at < cutoff
        })
        .map(|submission| submission.id.to_string())
        .collect();

    (!ids.is_empty()).then(|| Alert {
        rule: AlertRule::StalePendingReview,
        severity: AlertSeverity::Warning,
        title: "Submissions waiting for review".to_owned(),
        message: format!(
            "{} submission(s) have been pending review for more than {}h",
            ids.len(),
            thresholds.pending_review_max_age.num_hours()
        ),
        count: ids.len(),
        related_ids: ids,
    })
}

fn offers_expiring_soon(
    records: &[SubmissionRecord],
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Option<Alert> {
    let horizon = now + thresholds.expiring_within;
    let ids: Vec<String> = records
        .iter()
        .filter_map(|record| record.offer.as_ref())
        .filter(|offer| {
            offer.status.is_outstanding() && offer.expiry_date > now && offer.expiry_date <= horizon
        })
        .map(|offer| offer.id.to_string())
        .collect();

    (!ids.is_empty()).then(|| Alert {
        rule: AlertRule::OfferExpiringSoon,
        severity: AlertSeverity::Warning,
        title: "Offers expiring soon".to_owned(),
        message: format!(
            "{} open offer(s) expire within the next {}h",
            ids.len(),
            thresholds.expiring_within.num_hours()
        ),
        count: ids.len(),
        related_ids: ids,
    })
}

fn drafts_not_sent(
    records: &[SubmissionRecord],
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Option<Alert> {
    let cutoff = now - thresholds.draft_max_age;
    let ids: Vec<String> = records
        .iter()
        .filter_map(|record| record.offer.as_ref())
        .filter(|offer| offer.status == OfferStatus::Draft && offer.created_at < cutoff)
        .map(|offer| offer.id.to_string())
        .collect();

    (!ids.is_empty()).then(|| Alert {
        rule: AlertRule::DraftOfferNotSent,
        severity: AlertSeverity::Error,
        title: "Potential send failure".to_owned(),
        message: format!(
            "{} offer(s) are still in draft more than {}h after creation",
            ids.len(),
            thresholds.draft_max_age.num_hours()
        ),
        count: ids.len(),
        related_ids: ids,
    })
}

fn high_submission_volume(
    records: &[SubmissionRecord],
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Option<Alert> {
    let since = now - thresholds.volume_window;
    let count =
        records.iter().filter(|record| record.submission.created_at >= since).count();

    (count > thresholds.volume_limit).then(|| Alert {
        rule: AlertRule::HighSubmissionVolume,
        severity: AlertSeverity::Info,
        title: "High submission volume".to_owned(),
        message: format!(
            "{count} submissions in the last {}h (threshold {})",
            thresholds.volume_window.num_hours(),
            thresholds.volume_limit
        ),
        count,
        related_ids: Vec::new(),
    })
}

fn low_acceptance_rate(
    records: &[SubmissionRecord],
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Option<Alert> {
    let since = now - thresholds.acceptance_window;
    let recent: Vec<_> = records
        .iter()
        .filter_map(|record| record.offer.as_ref())
        .filter(|offer| offer.created_at >= since)
        .collect();
    if recent.len() < thresholds.acceptance_min_offers {
        return None;
    }

    let accepted = recent.iter().filter(|offer| offer.status == OfferStatus::Accepted).count();
    let rate = accepted as f64 / recent.len() as f64 * 100.0;

    (rate < thresholds.acceptance_floor).then(|| Alert {
        rule: AlertRule::LowAcceptanceRate,
        severity: AlertSeverity::Warning,
        title: "Low offer acceptance".to_owned(),
        message: format!(
            "{accepted} of {} offers accepted in the last {} days ({rate:.1}%)",
            recent.len(),
            thresholds.acceptance_window.num_days()
        ),
        count: recent.len(),
        related_ids: Vec::new(),
    })
}
