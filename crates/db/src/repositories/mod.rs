use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use carsellmax_core::audit::AuditLogEntry;
use carsellmax_core::domain::customer::{Customer, CustomerId, Vehicle, VehicleId};
use carsellmax_core::domain::email::EmailLog;
use carsellmax_core::domain::offer::{Offer, OfferId};
use carsellmax_core::domain::submission::{
    QuoteSubmission, SubmissionId, SubmissionRecord, SubmissionStatus,
};
use carsellmax_core::domain::valuation::{Valuation, ValuationId};

use crate::DbPool;

pub mod audit;
pub mod customer;
pub mod email_log;
pub mod memory;
pub mod offer;
pub mod submission;
pub mod valuation;

pub use audit::SqlAuditLogRepository;
pub use customer::SqlCustomerRepository;
pub use email_log::SqlEmailLogRepository;
pub use memory::InMemoryStore;
pub use offer::SqlOfferRepository;
pub use submission::SqlSubmissionRepository;
pub use valuation::SqlValuationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;
    async fn save_customer(&self, customer: Customer) -> Result<(), RepositoryError>;
    async fn find_vehicle(&self, id: &VehicleId) -> Result<Option<Vehicle>, RepositoryError>;
    async fn save_vehicle(&self, vehicle: Vehicle) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<QuoteSubmission>, RepositoryError>;

    async fn save(&self, submission: QuoteSubmission) -> Result<(), RepositoryError>;

    /// Writes `status` without consulting the transition table. Returns false
    /// when no such submission exists.
    async fn update_status(
        &self,
        id: &SubmissionId,
        status: SubmissionStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn find_record(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError>;

    /// Submissions created at or after `since` (all when `None`), newest first,
    /// joined with their customer, vehicle, valuation and offer.
    async fn list_records(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SubmissionRecord>, RepositoryError>;
}

#[async_trait]
pub trait ValuationRepository: Send + Sync {
    async fn find_by_id(&self, id: &ValuationId) -> Result<Option<Valuation>, RepositoryError>;
    async fn find_by_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<Valuation>, RepositoryError>;
    /// Fails with [`RepositoryError::UniqueViolation`] when the submission
    /// already has a valuation.
    async fn insert(&self, valuation: Valuation) -> Result<(), RepositoryError>;
    async fn update(&self, valuation: Valuation) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait OfferRepository: Send + Sync {
    async fn find_by_id(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError>;
    async fn find_by_token(&self, token: &str) -> Result<Option<Offer>, RepositoryError>;
    async fn find_by_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<Offer>, RepositoryError>;
    /// Fails with [`RepositoryError::UniqueViolation`] when the submission
    /// already has an offer or the tracking token is taken.
    async fn insert(&self, offer: Offer) -> Result<(), RepositoryError>;
    async fn update(&self, offer: Offer) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &OfferId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait EmailLogRepository: Send + Sync {
    async fn append(&self, entry: EmailLog) -> Result<(), RepositoryError>;
    async fn list_for_offer(&self, offer_id: &OfferId) -> Result<Vec<EmailLog>, RepositoryError>;
}

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), RepositoryError>;
    async fn list_for_record(
        &self,
        table_name: &str,
        record_id: &str,
    ) -> Result<Vec<AuditLogEntry>, RepositoryError>;
}

/// Handles to every repository the services need, behind trait objects so the
/// same wiring works for SQLite and the in-memory store.
#[derive(Clone)]
pub struct Stores {
    pub customers: Arc<dyn CustomerRepository>,
    pub submissions: Arc<dyn SubmissionRepository>,
    pub valuations: Arc<dyn ValuationRepository>,
    pub offers: Arc<dyn OfferRepository>,
    pub email_logs: Arc<dyn EmailLogRepository>,
    pub audit_log: Arc<dyn AuditLogRepository>,
}

impl Stores {
    pub fn sql(pool: DbPool) -> Self {
        Self {
            customers: Arc::new(SqlCustomerRepository::new(pool.clone())),
            submissions: Arc::new(SqlSubmissionRepository::new(pool.clone())),
            valuations: Arc::new(SqlValuationRepository::new(pool.clone())),
            offers: Arc::new(SqlOfferRepository::new(pool.clone())),
            email_logs: Arc::new(SqlEmailLogRepository::new(pool.clone())),
            audit_log: Arc::new(SqlAuditLogRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::default());
        Self {
            customers: store.clone(),
            submissions: store.clone(),
            valuations: store.clone(),
            offers: store.clone(),
            email_logs: store.clone(),
            audit_log: store,
        }
    }
}

pub(crate) fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp `{value}`: {e}")))
}

pub(crate) fn parse_optional_timestamp(
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.as_deref().map(parse_timestamp).transpose()
}

pub(crate) fn parse_decimal(value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value)
        .map_err(|e| RepositoryError::Decode(format!("invalid decimal `{value}`: {e}")))
}

/// Maps a unique-index failure on insert to [`RepositoryError::UniqueViolation`].
pub(crate) fn insert_error(error: sqlx::Error, what: &str) -> RepositoryError {
    let unique = error.as_database_error().map(|db| db.is_unique_violation()).unwrap_or(false);
    if unique {
        RepositoryError::UniqueViolation(what.to_string())
    } else {
        RepositoryError::Database(error)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};

    use carsellmax_core::domain::customer::{Customer, CustomerId, Vehicle, VehicleId};
    use carsellmax_core::domain::submission::QuoteSubmission;

    use super::{CustomerRepository, SubmissionRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    pub async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    pub fn sample_customer(id: &str, now: DateTime<Utc>) -> Customer {
        Customer {
            id: CustomerId::from(id),
            full_name: "Dana Whitfield".to_string(),
            email: format!("{id}@example.com"),
            phone: Some("555-0100".to_string()),
            created_at: now,
        }
    }

    pub fn sample_vehicle(id: &str, customer_id: &str, now: DateTime<Utc>) -> Vehicle {
        Vehicle {
            id: VehicleId::from(id),
            customer_id: CustomerId::from(customer_id),
            vin: "1HGCM82633A004352".to_string(),
            year: 2019,
            make: "Honda".to_string(),
            model: "Accord".to_string(),
            trim: Some("EX-L".to_string()),
            mileage: 48_200,
            condition: Some("good".to_string()),
            created_at: now,
        }
    }

    /// Inserts a customer, vehicle and pending submission so FK constraints hold.
    pub async fn seed_submission(
        customers: &dyn CustomerRepository,
        submissions: &dyn SubmissionRepository,
        key: &str,
        now: DateTime<Utc>,
    ) -> QuoteSubmission {
        let customer = sample_customer(&format!("cust-{key}"), now);
        let vehicle = sample_vehicle(&format!("veh-{key}"), customer.id.as_str(), now);
        customers.save_customer(customer.clone()).await.expect("save customer");
        customers.save_vehicle(vehicle.clone()).await.expect("save vehicle");

        let submission = QuoteSubmission::new(customer.id, vehicle.id, None, now);
        submissions.save(submission.clone()).await.expect("save submission");
        submission
    }
}
