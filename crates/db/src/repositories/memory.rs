use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use carsellmax_core::audit::AuditLogEntry;
use carsellmax_core::domain::customer::{Customer, CustomerId, Vehicle, VehicleId};
use carsellmax_core::domain::email::EmailLog;
use carsellmax_core::domain::offer::{Offer, OfferId};
use carsellmax_core::domain::submission::{
    QuoteSubmission, SubmissionId, SubmissionRecord, SubmissionStatus,
};
use carsellmax_core::domain::valuation::{Valuation, ValuationId};

use super::{
    AuditLogRepository, CustomerRepository, EmailLogRepository, OfferRepository,
    RepositoryError, SubmissionRepository, ValuationRepository,
};

/// Process-local store implementing every repository trait. Uniqueness rules
/// mirror the SQLite indexes.
#[derive(Default)]
pub struct InMemoryStore {
    customers: RwLock<HashMap<String, Customer>>,
    vehicles: RwLock<HashMap<String, Vehicle>>,
    submissions: RwLock<HashMap<String, QuoteSubmission>>,
    valuations: RwLock<HashMap<String, Valuation>>,
    offers: RwLock<HashMap<String, Offer>>,
    email_logs: RwLock<Vec<EmailLog>>,
    audit_log: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryStore {
    async fn record_for(&self, submission: QuoteSubmission) -> SubmissionRecord {
        let customer = self.customers.read().await.get(&submission.customer_id.0).cloned();
        let vehicle = self.vehicles.read().await.get(&submission.vehicle_id.0).cloned();
        let valuation = self
            .valuations
            .read()
            .await
            .values()
            .find(|v| v.quote_submission_id == submission.id)
            .cloned();
        let offer = self
            .offers
            .read()
            .await
            .values()
            .find(|o| o.quote_submission_id == submission.id)
            .cloned();

        SubmissionRecord { submission, customer, vehicle, valuation, offer }
    }
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryStore {
    async fn find_customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        Ok(self.customers.read().await.get(&id.0).cloned())
    }

    async fn save_customer(&self, customer: Customer) -> Result<(), RepositoryError> {
        self.customers.write().await.insert(customer.id.0.clone(), customer);
        Ok(())
    }

    async fn find_vehicle(&self, id: &VehicleId) -> Result<Option<Vehicle>, RepositoryError> {
        Ok(self.vehicles.read().await.get(&id.0).cloned())
    }

    async fn save_vehicle(&self, vehicle: Vehicle) -> Result<(), RepositoryError> {
        self.vehicles.write().await.insert(vehicle.id.0.clone(), vehicle);
        Ok(())
    }
}

#[async_trait::async_trait]
impl SubmissionRepository for InMemoryStore {
    async fn find_by_id(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<QuoteSubmission>, RepositoryError> {
        Ok(self.submissions.read().await.get(&id.0).cloned())
    }

    async fn save(&self, submission: QuoteSubmission) -> Result<(), RepositoryError> {
        self.submissions.write().await.insert(submission.id.0.clone(), submission);
        Ok(())
    }

    async fn update_status(
        &self,
        id: &SubmissionId,
        status: SubmissionStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut submissions = self.submissions.write().await;
        match submissions.get_mut(&id.0) {
            Some(submission) => {
                submission.status = status;
                submission.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_record(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError> {
        let submission = self.submissions.read().await.get(&id.0).cloned();
        match submission {
            Some(submission) => Ok(Some(self.record_for(submission).await)),
            None => Ok(None),
        }
    }

    async fn list_records(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        let mut submissions: Vec<QuoteSubmission> = self
            .submissions
            .read()
            .await
            .values()
            .filter(|s| since.map_or(true, |since| s.created_at >= since))
            .cloned()
            .collect();
        submissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut records = Vec::with_capacity(submissions.len());
        for submission in submissions {
            records.push(self.record_for(submission).await);
        }
        Ok(records)
    }
}

#[async_trait::async_trait]
impl ValuationRepository for InMemoryStore {
    async fn find_by_id(&self, id: &ValuationId) -> Result<Option<Valuation>, RepositoryError> {
        Ok(self.valuations.read().await.get(&id.0).cloned())
    }

    async fn find_by_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<Valuation>, RepositoryError> {
        Ok(self
            .valuations
            .read()
            .await
            .values()
            .find(|v| &v.quote_submission_id == submission_id)
            .cloned())
    }

    async fn insert(&self, valuation: Valuation) -> Result<(), RepositoryError> {
        let mut valuations = self.valuations.write().await;
        if valuations.values().any(|v| v.quote_submission_id == valuation.quote_submission_id) {
            return Err(RepositoryError::UniqueViolation(
                "valuation.quote_submission_id".to_string(),
            ));
        }
        valuations.insert(valuation.id.0.clone(), valuation);
        Ok(())
    }

    async fn update(&self, valuation: Valuation) -> Result<(), RepositoryError> {
        let mut valuations = self.valuations.write().await;
        if let Some(existing) = valuations.get_mut(&valuation.id.0) {
            *existing = valuation;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl OfferRepository for InMemoryStore {
    async fn find_by_id(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        Ok(self.offers.read().await.get(&id.0).cloned())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Offer>, RepositoryError> {
        Ok(self.offers.read().await.values().find(|o| o.tracking_token == token).cloned())
    }

    async fn find_by_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<Offer>, RepositoryError> {
        Ok(self
            .offers
            .read()
            .await
            .values()
            .find(|o| &o.quote_submission_id == submission_id)
            .cloned())
    }

    async fn insert(&self, offer: Offer) -> Result<(), RepositoryError> {
        let mut offers = self.offers.write().await;
        if offers.values().any(|o| o.quote_submission_id == offer.quote_submission_id) {
            return Err(RepositoryError::UniqueViolation("offer.quote_submission_id".to_string()));
        }
        if offers.values().any(|o| o.tracking_token == offer.tracking_token) {
            return Err(RepositoryError::UniqueViolation("offer.tracking_token".to_string()));
        }
        offers.insert(offer.id.0.clone(), offer);
        Ok(())
    }

    async fn update(&self, offer: Offer) -> Result<(), RepositoryError> {
        let mut offers = self.offers.write().await;
        if let Some(existing) = offers.get_mut(&offer.id.0) {
            *existing = offer;
        }
        Ok(())
    }

    async fn delete(&self, id: &OfferId) -> Result<bool, RepositoryError> {
        Ok(self.offers.write().await.remove(&id.0).is_some())
    }
}

#[async_trait::async_trait]
impl EmailLogRepository for InMemoryStore {
    async fn append(&self, entry: EmailLog) -> Result<(), RepositoryError> {
        self.email_logs.write().await.push(entry);
        Ok(())
    }

    async fn list_for_offer(&self, offer_id: &OfferId) -> Result<Vec<EmailLog>, RepositoryError> {
        Ok(self.email_logs.read().await.iter().filter(|e| &e.offer_id == offer_id).cloned().collect())
    }
}

#[async_trait::async_trait]
impl AuditLogRepository for InMemoryStore {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), RepositoryError> {
        self.audit_log.write().await.push(entry);
        Ok(())
    }

    async fn list_for_record(
        &self,
        table_name: &str,
        record_id: &str,
    ) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        Ok(self
            .audit_log
            .read()
            .await
            .iter()
            .filter(|e| e.table_name == table_name && e.record_id == record_id)
            .cloned()
            .collect())
    }
}
