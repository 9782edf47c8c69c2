use sqlx::Row;

use carsellmax_core::domain::offer::{Offer, OfferId, OfferStatus};
use carsellmax_core::domain::submission::SubmissionId;

use super::{
    decode_error, insert_error, parse_decimal, parse_optional_timestamp, parse_timestamp,
    OfferRepository, RepositoryError,
};
use crate::DbPool;

pub(crate) const OFFER_COLUMNS: &str =
    "o.id, o.quote_submission_id, o.offer_amount, o.expiry_date, o.status, o.tracking_token,
     o.terms, o.inspection_required, o.payment_method, o.notes, o.created_by, o.created_at,
     o.updated_at, o.sent_at, o.viewed_at, o.accepted_at, o.declined_at, o.decline_reason,
     o.provider_message_id";

pub struct SqlOfferRepository {
    pool: DbPool,
}

impl SqlOfferRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<Offer>, RepositoryError> {
        let sql = format!("SELECT {OFFER_COLUMNS} FROM offer o WHERE o.{column} = ?");
        let row = sqlx::query(&sql).bind(value).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_offer).transpose()
    }
}

pub(crate) fn row_to_offer(row: &sqlx::sqlite::SqliteRow) -> Result<Offer, RepositoryError> {
    let offer_amount: String = row.try_get("offer_amount").map_err(decode_error)?;
    let expiry_date: String = row.try_get("expiry_date").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(Offer {
        id: OfferId(row.try_get("id").map_err(decode_error)?),
        quote_submission_id: SubmissionId(row.try_get("quote_submission_id").map_err(decode_error)?),
        offer_amount: parse_decimal(&offer_amount)?,
        expiry_date: parse_timestamp(&expiry_date)?,
        status: status.parse::<OfferStatus>().map_err(decode_error)?,
        tracking_token: row.try_get("tracking_token").map_err(decode_error)?,
        terms: row.try_get("terms").map_err(decode_error)?,
        inspection_required: row.try_get("inspection_required").map_err(decode_error)?,
        payment_method: row.try_get("payment_method").map_err(decode_error)?,
        notes: row.try_get("notes").map_err(decode_error)?,
        created_by: row.try_get("created_by").map_err(decode_error)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        sent_at: parse_optional_timestamp(row.try_get("sent_at").map_err(decode_error)?)?,
        viewed_at: parse_optional_timestamp(row.try_get("viewed_at").map_err(decode_error)?)?,
        accepted_at: parse_optional_timestamp(row.try_get("accepted_at").map_err(decode_error)?)?,
        declined_at: parse_optional_timestamp(row.try_get("declined_at").map_err(decode_error)?)?,
        decline_reason: row.try_get("decline_reason").map_err(decode_error)?,
        provider_message_id: row.try_get("provider_message_id").map_err(decode_error)?,
    })
}

#[async_trait::async_trait]
impl OfferRepository for SqlOfferRepository {
    async fn find_by_id(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        self.fetch_one_where("id", &id.0).await
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Offer>, RepositoryError> {
        self.fetch_one_where("tracking_token", token).await
    }

    async fn find_by_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<Offer>, RepositoryError> {
        self.fetch_one_where("quote_submission_id", &submission_id.0).await
    }

    async fn insert(&self, offer: Offer) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO offer (id, quote_submission_id, offer_amount, expiry_date, status,
                                tracking_token, terms, inspection_required, payment_method,
                                notes, created_by, created_at, updated_at, sent_at, viewed_at,
                                accepted_at, declined_at, decline_reason, provider_message_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&offer.id.0)
        .bind(&offer.quote_submission_id.0)
        .bind(offer.offer_amount.to_string())
        .bind(offer.expiry_date.to_rfc3339())
        .bind(offer.status.as_str())
        .bind(&offer.tracking_token)
        .bind(&offer.terms)
        .bind(offer.inspection_required)
        .bind(&offer.payment_method)
        .bind(&offer.notes)
        .bind(&offer.created_by)
        .bind(offer.created_at.to_rfc3339())
        .bind(offer.updated_at.to_rfc3339())
        .bind(offer.sent_at.map(|dt| dt.to_rfc3339()))
        .bind(offer.viewed_at.map(|dt| dt.to_rfc3339()))
        .bind(offer.accepted_at.map(|dt| dt.to_rfc3339()))
        .bind(offer.declined_at.map(|dt| dt.to_rfc3339()))
        .bind(&offer.decline_reason)
        .bind(&offer.provider_message_id)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, "offer.quote_submission_id"))?;

        Ok(())
    }

    async fn update(&self, offer: Offer) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE offer SET
                 offer_amount = ?, expiry_date = ?, status = ?, terms = ?,
                 inspection_required = ?, payment_method = ?, notes = ?, updated_at = ?,
                 sent_at = ?, viewed_at = ?, accepted_at = ?, declined_at = ?,
                 decline_reason = ?, provider_message_id = ?
             WHERE id = ?",
        )
        .bind(offer.offer_amount.to_string())
        .bind(offer.expiry_date.to_rfc3339())
        .bind(offer.status.as_str())
        .bind(&offer.terms)
        .bind(offer.inspection_required)
        .bind(&offer.payment_method)
        .bind(&offer.notes)
        .bind(offer.updated_at.to_rfc3339())
        .bind(offer.sent_at.map(|dt| dt.to_rfc3339()))
        .bind(offer.viewed_at.map(|dt| dt.to_rfc3339()))
        .bind(offer.accepted_at.map(|dt| dt.to_rfc3339()))
        .bind(offer.declined_at.map(|dt| dt.to_rfc3339()))
        .bind(&offer.decline_reason)
        .bind(&offer.provider_message_id)
        .bind(&offer.id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &OfferId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM offer WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
