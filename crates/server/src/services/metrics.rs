use chrono::{Duration, Utc};
use tracing::info;

use carsellmax_core::metrics::{
    compute_operations_metrics, evaluate_alerts, validate_window, Alert, AlertThresholds,
    OperationsMetrics, DEFAULT_WINDOW_DAYS,
};
use carsellmax_db::Stores;

use super::ServiceError;

#[derive(Clone)]
pub struct MetricsService {
    stores: Stores,
    thresholds: AlertThresholds,
}

impl MetricsService {
    pub fn new(stores: Stores, thresholds: AlertThresholds) -> Self {
        Self { stores, thresholds }
    }

    /// Recomputes the operations report over the trailing `days` (default 30).
    pub async fn operations(&self, days: Option<u32>) -> Result<OperationsMetrics, ServiceError> {
        let days = validate_window(days.unwrap_or(DEFAULT_WINDOW_DAYS))?;
        let now = Utc::now();
        let records =
            self.stores.submissions.list_records(Some(now - Duration::days(i64::from(days)))).await?;

        let metrics = compute_operations_metrics(&records, days, now);
        info!(
            event_name = "metrics.operations.computed",
            window_days = days,
            total_submissions = metrics.total_submissions,
            "operations metrics computed"
        );
        Ok(metrics)
    }

    /// Evaluates every alert rule against all submissions.
    pub async fn alerts(&self) -> Result<Vec<Alert>, ServiceError> {
        let records = self.stores.submissions.list_records(None).await?;
        let alerts = evaluate_alerts(&records, &self.thresholds, Utc::now());
        info!(event_name = "metrics.alerts.evaluated", fired = alerts.len(), "alerts evaluated");
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use carsellmax_core::domain::offer::OfferStatus;
    use carsellmax_core::metrics::{AlertRule, AlertSeverity};
    use carsellmax_core::offers::NewOffer;

    use crate::services::test_support::{harness, submitted};
    use crate::services::ServiceError;

    #[tokio::test]
    async fn operations_report_counts_window_and_acceptance() {
        let harness = harness();
        let first = submitted(&harness).await;
        submitted(&harness).await;
        let offer = harness
            .services
            .offers
            .create(NewOffer {
                quote_submission_id: first.id.clone(),
                offer_amount: Decimal::new(15_000, 0),
                expiry_days: Some(3),
                terms: None,
                inspection_required: None,
                payment_method: None,
                notes: None,
                created_by: "buyer".into(),
            })
            .await
            .expect("offer");
        harness
            .services
            .offers
            .update_status(&offer.id, OfferStatus::Accepted, None, "staff")
            .await
            .expect("accept");

        let metrics = harness.services.metrics.operations(None).await.expect("metrics");

        assert_eq!(metrics.window_days, 30);
        assert_eq!(metrics.total_submissions, 2);
        assert_eq!(metrics.acceptance.total_offers, 1);
        assert_eq!(metrics.acceptance.accepted, 1);
        assert!((metrics.acceptance.acceptance_rate - 100.0).abs() < f64::EPSILON);
        assert_eq!(metrics.review_to_send.count, 1);
    }

    #[tokio::test]
    async fn operations_window_is_validated() {
        let harness = harness();
        assert!(matches!(
            harness.services.metrics.operations(Some(0)).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            harness.services.metrics.operations(Some(366)).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn stale_pending_review_raises_warning() {
        let harness = harness();
        let mut stale = submitted(&harness).await;
        stale.created_at = Utc::now() - Duration::hours(30);
        stale.updated_at = stale.created_at;
        harness.stores.submissions.save(stale.clone()).await.expect("save");

        let alerts = harness.services.metrics.alerts().await.expect("alerts");

        let pending = alerts
            .iter()
            .find(|alert| alert.rule == AlertRule::StalePendingReview)
            .expect("stale pending alert");
        assert_eq!(pending.severity, AlertSeverity::Warning);
        assert_eq!(pending.related_ids, vec![stale.id.to_string()]);
    }
}
