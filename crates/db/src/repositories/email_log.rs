use sqlx::Row;

use carsellmax_core::domain::email::EmailLog;
use carsellmax_core::domain::offer::OfferId;

use super::{decode_error, parse_timestamp, EmailLogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlEmailLogRepository {
    pool: DbPool,
}

impl SqlEmailLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_email_log(row: &sqlx::sqlite::SqliteRow) -> Result<EmailLog, RepositoryError> {
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    Ok(EmailLog {
        id: row.try_get("id").map_err(decode_error)?,
        offer_id: OfferId(row.try_get("offer_id").map_err(decode_error)?),
        recipient: row.try_get("recipient").map_err(decode_error)?,
        template: row.try_get("template").map_err(decode_error)?,
        subject: row.try_get("subject").map_err(decode_error)?,
        provider_message_id: row.try_get("provider_message_id").map_err(decode_error)?,
        sent: row.try_get("sent").map_err(decode_error)?,
        test_mode: row.try_get("test_mode").map_err(decode_error)?,
        error: row.try_get("error").map_err(decode_error)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl EmailLogRepository for SqlEmailLogRepository {
    async fn append(&self, entry: EmailLog) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO email_log (id, offer_id, recipient, template, subject,
                                    provider_message_id, sent, test_mode, error, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.offer_id.0)
        .bind(&entry.recipient)
        .bind(&entry.template)
        .bind(&entry.subject)
        .bind(&entry.provider_message_id)
        .bind(entry.sent)
        .bind(entry.test_mode)
        .bind(&entry.error)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_offer(&self, offer_id: &OfferId) -> Result<Vec<EmailLog>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, offer_id, recipient, template, subject, provider_message_id, sent,
                    test_mode, error, created_at
             FROM email_log WHERE offer_id = ? ORDER BY created_at ASC",
        )
        .bind(&offer_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_email_log).collect::<Result<Vec<_>, _>>()
    }
}
