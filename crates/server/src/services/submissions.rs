use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use carsellmax_core::audit::{AuditAction, AuditLogEntry};
use carsellmax_core::domain::customer::{Customer, CustomerId, Vehicle, VehicleId};
use carsellmax_core::domain::submission::{
    QuoteSubmission, SubmissionId, SubmissionRecord, SubmissionStatus,
};
use carsellmax_core::errors::DomainError;
use carsellmax_core::metrics::validate_window;
use carsellmax_db::Stores;

use super::{record_audit, ServiceError};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CustomerInput {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VehicleInput {
    pub vin: String,
    pub year: i32,
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub trim: Option<String>,
    pub mileage: i64,
    #[serde(default)]
    pub condition: Option<String>,
}

/// A visitor's sale request as posted by the public site.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IntakeRequest {
    pub customer: CustomerInput,
    pub vehicle: VehicleInput,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct SubmissionService {
    stores: Stores,
}

impl SubmissionService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Creates the customer, vehicle and a `pending_review` submission.
    pub async fn intake(&self, request: IntakeRequest) -> Result<QuoteSubmission, ServiceError> {
        let now = Utc::now();
        let IntakeRequest { customer, vehicle, notes } = request;

        Customer::validate_contact(&customer.full_name, &customer.email)?;
        let vin = Vehicle::normalize_vin(&vehicle.vin)?;
        Vehicle::validate_year(vehicle.year, now)?;
        if vehicle.make.trim().is_empty() || vehicle.model.trim().is_empty() {
            return Err(DomainError::InvalidInput("vehicle make and model are required".into()).into());
        }
        if vehicle.mileage < 0 {
            return Err(DomainError::InvalidInput("mileage cannot be negative".into()).into());
        }

        let customer = Customer {
            id: CustomerId::generate(),
            full_name: customer.full_name.trim().to_string(),
            email: customer.email.trim().to_ascii_lowercase(),
            phone: trimmed(customer.phone),
            created_at: now,
        };
        let vehicle = Vehicle {
            id: VehicleId::generate(),
            customer_id: customer.id.clone(),
            vin,
            year: vehicle.year,
            make: vehicle.make.trim().to_string(),
            model: vehicle.model.trim().to_string(),
            trim: trimmed(vehicle.trim),
            mileage: vehicle.mileage,
            condition: trimmed(vehicle.condition),
            created_at: now,
        };
        let submission =
            QuoteSubmission::new(customer.id.clone(), vehicle.id.clone(), trimmed(notes), now);

        self.stores.customers.save_customer(customer).await?;
        self.stores.customers.save_vehicle(vehicle).await?;
        self.stores.submissions.save(submission.clone()).await?;

        info!(
            event_name = "submission.created",
            submission_id = %submission.id,
            "quote submission received"
        );
        Ok(submission)
    }

    /// Applies a staff-requested status change through the transition table.
    pub async fn update_status(
        &self,
        id: &SubmissionId,
        requested: SubmissionStatus,
        reason: Option<String>,
        actor: &str,
    ) -> Result<QuoteSubmission, ServiceError> {
        let mut submission = self
            .stores
            .submissions
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("quote submission", id.as_str()))?;
        let previous = submission.status;

        submission.transition_to(requested, Utc::now())?;
        let updated =
            self.stores.submissions.update_status(id, submission.status, submission.updated_at).await?;
        if !updated {
            return Err(ServiceError::not_found("quote submission", id.as_str()));
        }

        record_audit(
            &self.stores,
            AuditLogEntry::new(AuditAction::SubmissionStatusChanged, id.as_str(), actor)
                .with_old_value(serde_json::json!({ "status": previous }))
                .with_new_value(serde_json::json!({ "status": requested }))
                .with_note(reason),
        )
        .await;

        info!(
            event_name = "submission.status.updated",
            submission_id = %id,
            from = %previous,
            to = %requested,
            actor = %actor,
            "submission status updated"
        );
        Ok(submission)
    }

    /// Newest first, optionally narrowed to one status and a trailing window.
    pub async fn list(
        &self,
        status: Option<SubmissionStatus>,
        days: Option<u32>,
    ) -> Result<Vec<SubmissionRecord>, ServiceError> {
        let since = days
            .map(validate_window)
            .transpose()?
            .map(|days| Utc::now() - Duration::days(i64::from(days)));

        let records = self.stores.submissions.list_records(since).await?;
        Ok(records
            .into_iter()
            .filter(|record| status.map_or(true, |status| record.submission.status == status))
            .collect())
    }

    pub async fn detail(&self, id: &SubmissionId) -> Result<SubmissionRecord, ServiceError> {
        self.stores
            .submissions
            .find_record(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("quote submission", id.as_str()))
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use carsellmax_core::domain::submission::{SubmissionId, SubmissionStatus};

    use crate::services::test_support::{harness, intake_request, submitted};
    use crate::services::ServiceError;

    #[tokio::test]
    async fn intake_normalizes_and_starts_pending() {
        let harness = harness();
        let submission = submitted(&harness).await;

        assert_eq!(submission.status, SubmissionStatus::PendingReview);
        let record = harness.services.submissions.detail(&submission.id).await.expect("detail");
        let vehicle = record.vehicle.expect("vehicle");
        assert_eq!(vehicle.vin, "1HGCM82633A004352");
        assert_eq!(record.customer.expect("customer").email, "dana@example.com");
    }

    #[tokio::test]
    async fn intake_rejects_bad_vin_and_contact() {
        let harness = harness();

        let mut request = intake_request();
        request.vehicle.vin = "SHORT".to_string();
        let error = harness.services.submissions.intake(request).await.expect_err("bad vin");
        assert!(matches!(error, ServiceError::InvalidInput(message) if message.contains("VIN")));

        let mut request = intake_request();
        request.customer.email = "not-an-email".to_string();
        assert!(matches!(
            harness.services.submissions.intake(request).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn status_update_follows_table_and_audits() {
        let harness = harness();
        let submission = submitted(&harness).await;

        let updated = harness
            .services
            .submissions
            .update_status(
                &submission.id,
                SubmissionStatus::UnderReview,
                Some("picked up".into()),
                "staff",
            )
            .await
            .expect("pending -> under review");
        assert_eq!(updated.status, SubmissionStatus::UnderReview);

        let error = harness
            .services
            .submissions
            .update_status(&submission.id, SubmissionStatus::QuoteSent, None, "staff")
            .await
            .expect_err("not adjacent");
        assert!(matches!(
            error,
            ServiceError::InvalidTransition {
                from: SubmissionStatus::UnderReview,
                to: SubmissionStatus::QuoteSent
            }
        ));

        let audit = harness
            .stores
            .audit_log
            .list_for_record("quote_submission", submission.id.as_str())
            .await
            .expect("audit");
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].note.as_deref(), Some("picked up"));
        assert_eq!(audit[0].actor, "staff");
    }

    #[tokio::test]
    async fn self_transition_is_rejected() {
        let harness = harness();
        let submission = submitted(&harness).await;

        let error = harness
            .services
            .submissions
            .update_status(&submission.id, SubmissionStatus::PendingReview, None, "staff")
            .await
            .expect_err("self transition");
        assert!(matches!(error, ServiceError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn unknown_submission_is_not_found() {
        let harness = harness();
        let missing = SubmissionId::from("missing");

        assert!(matches!(
            harness
                .services
                .submissions
                .update_status(&missing, SubmissionStatus::UnderReview, None, "staff")
                .await,
            Err(ServiceError::NotFound { .. })
        ));
        assert!(matches!(
            harness.services.submissions.detail(&missing).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_filters_by_status_and_validates_window() {
        let harness = harness();
        let first = submitted(&harness).await;
        submitted(&harness).await;
        harness
            .services
            .submissions
            .update_status(&first.id, SubmissionStatus::UnderReview, None, "staff")
            .await
            .expect("transition");

        let all = harness.services.submissions.list(None, Some(30)).await.expect("list");
        assert_eq!(all.len(), 2);

        let under_review = harness
            .services
            .submissions
            .list(Some(SubmissionStatus::UnderReview), None)
            .await
            .expect("filtered");
        assert_eq!(under_review.len(), 1);
        assert_eq!(under_review[0].submission.id, first.id);

        assert!(matches!(
            harness.services.submissions.list(None, Some(0)).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
