use sqlx::Row;

use carsellmax_core::domain::submission::SubmissionId;
use carsellmax_core::domain::valuation::{Valuation, ValuationId, ValuationStatus};

use super::{
    decode_error, insert_error, parse_decimal, parse_optional_timestamp, parse_timestamp,
    RepositoryError, ValuationRepository,
};
use crate::DbPool;

pub(crate) const VALUATION_COLUMNS: &str =
    "v.id, v.quote_submission_id, v.version, v.status, v.base_value, v.adjustments, v.fees,
     v.final_valuation, v.recommended_offer, v.market_notes, v.condition_notes, v.created_by,
     v.created_at, v.updated_at, v.finalized_at";

pub struct SqlValuationRepository {
    pool: DbPool,
}

impl SqlValuationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<Valuation>, RepositoryError> {
        let sql = format!("SELECT {VALUATION_COLUMNS} FROM valuation v WHERE v.{column} = ?");
        let row = sqlx::query(&sql).bind(value).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_valuation).transpose()
    }
}

pub(crate) fn row_to_valuation(row: &sqlx::sqlite::SqliteRow) -> Result<Valuation, RepositoryError> {
    let status: String = row.try_get("status").map_err(decode_error)?;
    let base_value: String = row.try_get("base_value").map_err(decode_error)?;
    let adjustments: String = row.try_get("adjustments").map_err(decode_error)?;
    let fees: String = row.try_get("fees").map_err(decode_error)?;
    let final_valuation: String = row.try_get("final_valuation").map_err(decode_error)?;
    let recommended_offer: String = row.try_get("recommended_offer").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;
    let finalized_at: Option<String> = row.try_get("finalized_at").map_err(decode_error)?;

    Ok(Valuation {
        id: ValuationId(row.try_get("id").map_err(decode_error)?),
        quote_submission_id: SubmissionId(row.try_get("quote_submission_id").map_err(decode_error)?),
        version: row.try_get("version").map_err(decode_error)?,
        status: status.parse::<ValuationStatus>().map_err(decode_error)?,
        base_value: parse_decimal(&base_value)?,
        adjustments: parse_decimal(&adjustments)?,
        fees: parse_decimal(&fees)?,
        final_valuation: parse_decimal(&final_valuation)?,
        recommended_offer: parse_decimal(&recommended_offer)?,
        market_notes: row.try_get("market_notes").map_err(decode_error)?,
        condition_notes: row.try_get("condition_notes").map_err(decode_error)?,
        created_by: row.try_get("created_by").map_err(decode_error)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        finalized_at: parse_optional_timestamp(finalized_at)?,
    })
}

#[async_trait::async_trait]
impl ValuationRepository for SqlValuationRepository {
    async fn find_by_id(&self, id: &ValuationId) -> Result<Option<Valuation>, RepositoryError> {
        self.fetch_one_where("id", &id.0).await
    }

    async fn find_by_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<Valuation>, RepositoryError> {
        self.fetch_one_where("quote_submission_id", &submission_id.0).await
    }

    async fn insert(&self, valuation: Valuation) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO valuation (id, quote_submission_id, version, status, base_value,
                                    adjustments, fees, final_valuation, recommended_offer,
                                    market_notes, condition_notes, created_by, created_at,
                                    updated_at, finalized_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&valuation.id.0)
        .bind(&valuation.quote_submission_id.0)
        .bind(valuation.version)
        .bind(valuation.status.as_str())
        .bind(valuation.base_value.to_string())
        .bind(valuation.adjustments.to_string())
        .bind(valuation.fees.to_string())
        .bind(valuation.final_valuation.to_string())
        .bind(valuation.recommended_offer.to_string())
        .bind(&valuation.market_notes)
        .bind(&valuation.condition_notes)
        .bind(&valuation.created_by)
        .bind(valuation.created_at.to_rfc3339())
        .bind(valuation.updated_at.to_rfc3339())
        .bind(valuation.finalized_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, "valuation.quote_submission_id"))?;

        Ok(())
    }

    async fn update(&self, valuation: Valuation) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE valuation SET
                 version = ?, status = ?, base_value = ?, adjustments = ?, fees = ?,
                 final_valuation = ?, recommended_offer = ?, market_notes = ?,
                 condition_notes = ?, updated_at = ?, finalized_at = ?
             WHERE id = ?",
        )
        .bind(valuation.version)
        .bind(valuation.status.as_str())
        .bind(valuation.base_value.to_string())
        .bind(valuation.adjustments.to_string())
        .bind(valuation.fees.to_string())
        .bind(valuation.final_valuation.to_string())
        .bind(valuation.recommended_offer.to_string())
        .bind(&valuation.market_notes)
        .bind(&valuation.condition_notes)
        .bind(valuation.updated_at.to_rfc3339())
        .bind(valuation.finalized_at.map(|dt| dt.to_rfc3339()))
        .bind(&valuation.id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
