use sqlx::Row;

use carsellmax_core::audit::AuditLogEntry;

use super::{decode_error, parse_timestamp, AuditLogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAuditLogRepository {
    pool: DbPool,
}

impl SqlAuditLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_json(value: Option<String>) -> Result<Option<serde_json::Value>, RepositoryError> {
    value.as_deref().map(serde_json::from_str).transpose().map_err(decode_error)
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<AuditLogEntry, RepositoryError> {
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    Ok(AuditLogEntry {
        id: row.try_get("id").map_err(decode_error)?,
        action: row.try_get("action").map_err(decode_error)?,
        table_name: row.try_get("table_name").map_err(decode_error)?,
        record_id: row.try_get("record_id").map_err(decode_error)?,
        old_value: parse_json(row.try_get("old_value").map_err(decode_error)?)?,
        new_value: parse_json(row.try_get("new_value").map_err(decode_error)?)?,
        actor: row.try_get("actor").map_err(decode_error)?,
        note: row.try_get("note").map_err(decode_error)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl AuditLogRepository for SqlAuditLogRepository {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), RepositoryError> {
        let old_value = entry.old_value.as_ref().map(serde_json::Value::to_string);
        let new_value = entry.new_value.as_ref().map(serde_json::Value::to_string);

        sqlx::query(
            "INSERT INTO audit_log (id, action, table_name, record_id, old_value, new_value,
                                    actor, note, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.action)
        .bind(&entry.table_name)
        .bind(&entry.record_id)
        .bind(old_value)
        .bind(new_value)
        .bind(&entry.actor)
        .bind(&entry.note)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_record(
        &self,
        table_name: &str,
        record_id: &str,
    ) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, action, table_name, record_id, old_value, new_value, actor, note,
                    created_at
             FROM audit_log WHERE table_name = ? AND record_id = ?
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(table_name)
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use carsellmax_core::audit::{AuditAction, AuditLogEntry};
    use carsellmax_core::domain::email::EmailLog;
    use carsellmax_core::offers::{NewOffer, OfferDefaults};
    use rust_decimal::Decimal;

    use super::SqlAuditLogRepository;
    use crate::repositories::test_support::{seed_submission, setup};
    use crate::repositories::{
        AuditLogRepository, EmailLogRepository, OfferRepository, SqlCustomerRepository,
        SqlEmailLogRepository, SqlOfferRepository, SqlSubmissionRepository,
    };

    #[tokio::test]
    async fn audit_entries_round_trip_json_values() {
        let pool = setup().await;
        let repo = SqlAuditLogRepository::new(pool);

        let entry = AuditLogEntry::new(AuditAction::OfferDeleted, "offer-1", "admin")
            .with_old_value(json!({ "status": "draft", "offer_amount": "12000" }))
            .with_note(Some("duplicate entry".to_string()));
        repo.append(entry.clone()).await.expect("append");

        let entries = repo.list_for_record("offer", "offer-1").await.expect("list");
        assert_eq!(entries, vec![entry]);
        assert!(repo.list_for_record("offer", "offer-2").await.expect("other").is_empty());
    }

    #[tokio::test]
    async fn email_log_records_failures_and_successes() {
        let pool = setup().await;
        let submission = seed_submission(
            &SqlCustomerRepository::new(pool.clone()),
            &SqlSubmissionRepository::new(pool.clone()),
            "1",
            Utc::now(),
        )
        .await;
        let offers = SqlOfferRepository::new(pool.clone());
        let offer = NewOffer {
            quote_submission_id: submission.id,
            offer_amount: Decimal::new(9_500, 0),
            expiry_days: None,
            terms: None,
            inspection_required: None,
            payment_method: None,
            notes: None,
            created_by: "buyer".to_string(),
        }
        .into_offer(&OfferDefaults::default(), Utc::now())
        .expect("offer");
        offers.insert(offer.clone()).await.expect("insert offer");

        let logs = SqlEmailLogRepository::new(pool);
        logs.append(EmailLog::failed(offer.id.clone(), "a@example.com", "Your offer", "timeout", false))
            .await
            .expect("failed log");
        logs.append(EmailLog::delivered(offer.id.clone(), "a@example.com", "Your offer", "msg_1", false))
            .await
            .expect("delivered log");

        let entries = logs.list_for_offer(&offer.id).await.expect("list");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.iter().filter(|e| e.sent).count(), 1);
        assert!(entries.iter().any(|e| e.error.as_deref() == Some("timeout")));
    }
}
