use chrono::Utc;
use tracing::info;

use carsellmax_core::audit::{AuditAction, AuditLogEntry};
use carsellmax_core::domain::submission::SubmissionId;
use carsellmax_core::domain::valuation::{Valuation, ValuationEdit, ValuationId};
use carsellmax_db::{RepositoryError, Stores};

use super::{record_audit, snapshot, ServiceError};

#[derive(Clone)]
pub struct ValuationService {
    stores: Stores,
}

impl ValuationService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Opens a zeroed draft valuation. A submission carries at most one.
    pub async fn create(
        &self,
        submission_id: &SubmissionId,
        actor: &str,
    ) -> Result<Valuation, ServiceError> {
        if self.stores.submissions.find_by_id(submission_id).await?.is_none() {
            return Err(ServiceError::not_found("quote submission", submission_id.as_str()));
        }
        if self.stores.valuations.find_by_submission(submission_id).await?.is_some() {
            return Err(ServiceError::DuplicateValuation { submission_id: submission_id.clone() });
        }

        let valuation = Valuation::draft(submission_id.clone(), actor, Utc::now());
        self.stores.valuations.insert(valuation.clone()).await.map_err(|error| match error {
            RepositoryError::UniqueViolation(_) => {
                ServiceError::DuplicateValuation { submission_id: submission_id.clone() }
            }
            other => other.into(),
        })?;

        record_audit(
            &self.stores,
            AuditLogEntry::new(AuditAction::ValuationCreated, valuation.id.as_str(), actor)
                .with_new_value(snapshot(&valuation)),
        )
        .await;
        info!(
            event_name = "valuation.created",
            valuation_id = %valuation.id,
            submission_id = %submission_id,
            "draft valuation created"
        );
        Ok(valuation)
    }

    pub async fn edit(
        &self,
        id: &ValuationId,
        edit: ValuationEdit,
        actor: &str,
    ) -> Result<Valuation, ServiceError> {
        let mut valuation = self.load(id).await?;
        let before = snapshot(&valuation);

        valuation.apply_edit(edit, Utc::now())?;
        self.stores.valuations.update(valuation.clone()).await?;

        record_audit(
            &self.stores,
            AuditLogEntry::new(AuditAction::ValuationUpdated, id.as_str(), actor)
                .with_old_value(before)
                .with_new_value(snapshot(&valuation)),
        )
        .await;
        info!(
            event_name = "valuation.updated",
            valuation_id = %id,
            version = valuation.version,
            "valuation edited"
        );
        Ok(valuation)
    }

    /// Moves a draft to final. There is no way back.
    pub async fn finalize(&self, id: &ValuationId, actor: &str) -> Result<Valuation, ServiceError> {
        let mut valuation = self.load(id).await?;

        valuation.finalize(Utc::now())?;
        self.stores.valuations.update(valuation.clone()).await?;

        record_audit(
            &self.stores,
            AuditLogEntry::new(AuditAction::ValuationFinalized, id.as_str(), actor)
                .with_old_value(serde_json::json!({ "status": "draft" }))
                .with_new_value(serde_json::json!({
                    "status": valuation.status,
                    "final_valuation": valuation.final_valuation,
                })),
        )
        .await;
        info!(
            event_name = "valuation.finalized",
            valuation_id = %id,
            submission_id = %valuation.quote_submission_id,
            "valuation finalized"
        );
        Ok(valuation)
    }

    async fn load(&self, id: &ValuationId) -> Result<Valuation, ServiceError> {
        self.stores
            .valuations
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("valuation", id.as_str()))
    }
}
