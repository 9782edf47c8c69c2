use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use carsellmax_core::domain::customer::{CustomerId, VehicleId};
use carsellmax_core::domain::submission::{
    QuoteSubmission, SubmissionId, SubmissionRecord, SubmissionStatus,
};

use super::customer::{row_to_customer, row_to_vehicle};
use super::offer::{row_to_offer, OFFER_COLUMNS};
use super::valuation::{row_to_valuation, VALUATION_COLUMNS};
use super::{decode_error, parse_timestamp, RepositoryError, SubmissionRepository};
use crate::DbPool;

const SUBMISSION_COLUMNS: &str =
    "s.id, s.customer_id, s.vehicle_id, s.status, s.notes, s.created_at, s.updated_at";

pub struct SqlSubmissionRepository {
    pool: DbPool,
}

impl SqlSubmissionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Loads related rows with one query per table, scoped by the same
    /// submission filter, then stitches them onto the submissions.
    async fn attach_related(
        &self,
        submissions: Vec<QuoteSubmission>,
        filter: &str,
        bind: Option<String>,
    ) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        if submissions.is_empty() {
            return Ok(Vec::new());
        }

        let customer_sql = format!(
            "SELECT c.id, c.full_name, c.email, c.phone, c.created_at
             FROM customer c JOIN quote_submission s ON s.customer_id = c.id {filter}"
        );
        let vehicle_sql = format!(
            "SELECT v.id, v.customer_id, v.vin, v.year, v.make, v.model, v.trim, v.mileage,
                    v.condition, v.created_at
             FROM vehicle v JOIN quote_submission s ON s.vehicle_id = v.id {filter}"
        );
        let valuation_sql = format!(
            "SELECT {VALUATION_COLUMNS}
             FROM valuation v JOIN quote_submission s ON s.id = v.quote_submission_id {filter}"
        );
        let offer_sql = format!(
            "SELECT {OFFER_COLUMNS}
             FROM offer o JOIN quote_submission s ON s.id = o.quote_submission_id {filter}"
        );

        let mut customers = HashMap::new();
        for row in bound(&customer_sql, &bind).fetch_all(&self.pool).await? {
            let customer = row_to_customer(&row)?;
            customers.insert(customer.id.clone(), customer);
        }

        let mut vehicles = HashMap::new();
        for row in bound(&vehicle_sql, &bind).fetch_all(&self.pool).await? {
            let vehicle = row_to_vehicle(&row)?;
            vehicles.insert(vehicle.id.clone(), vehicle);
        }

        let mut valuations = HashMap::new();
        for row in bound(&valuation_sql, &bind).fetch_all(&self.pool).await? {
            let valuation = row_to_valuation(&row)?;
            valuations.insert(valuation.quote_submission_id.clone(), valuation);
        }

        let mut offers = HashMap::new();
        for row in bound(&offer_sql, &bind).fetch_all(&self.pool).await? {
            let offer = row_to_offer(&row)?;
            offers.insert(offer.quote_submission_id.clone(), offer);
        }

        Ok(submissions
            .into_iter()
            .map(|submission| SubmissionRecord {
                customer: customers.get(&submission.customer_id).cloned(),
                vehicle: vehicles.get(&submission.vehicle_id).cloned(),
                valuation: valuations.remove(&submission.id),
                offer: offers.remove(&submission.id),
                submission,
            })
            .collect())
    }
}

fn bound<'q>(
    sql: &'q str,
    bind: &'q Option<String>,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    let query = sqlx::query(sql);
    match bind {
        Some(value) => query.bind(value.as_str()),
        None => query,
    }
}

fn row_to_submission(row: &sqlx::sqlite::SqliteRow) -> Result<QuoteSubmission, RepositoryError> {
    let status: String = row.try_get("status").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(QuoteSubmission {
        id: SubmissionId(row.try_get("id").map_err(decode_error)?),
        customer_id: CustomerId(row.try_get("customer_id").map_err(decode_error)?),
        vehicle_id: VehicleId(row.try_get("vehicle_id").map_err(decode_error)?),
        status: status.parse::<SubmissionStatus>().map_err(decode_error)?,
        notes: row.try_get("notes").map_err(decode_error)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl SubmissionRepository for SqlSubmissionRepository {
    async fn find_by_id(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<QuoteSubmission>, RepositoryError> {
        let sql = format!("SELECT {SUBMISSION_COLUMNS} FROM quote_submission s WHERE s.id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_submission).transpose()
    }

    async fn save(&self, submission: QuoteSubmission) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO quote_submission (id, customer_id, vehicle_id, status, notes,
                                           created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 notes = excluded.notes,
                 updated_at = excluded.updated_at",
        )
        .bind(&submission.id.0)
        .bind(&submission.customer_id.0)
        .bind(&submission.vehicle_id.0)
        .bind(submission.status.as_str())
        .bind(&submission.notes)
        .bind(submission.created_at.to_rfc3339())
        .bind(submission.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_status(
        &self,
        id: &SubmissionId,
        status: SubmissionStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE quote_submission SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(updated_at.to_rfc3339())
                .bind(&id.0)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_record(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError> {
        let Some(submission) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        let records =
            self.attach_related(vec![submission], "WHERE s.id = ?", Some(id.0.clone())).await?;
        Ok(records.into_iter().next())
    }

    async fn list_records(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        let (filter, bind) = match since {
            Some(since) => ("WHERE s.created_at >= ?", Some(since.to_rfc3339())),
            None => ("", None),
        };

        let sql = format!(
            "SELECT {SUBMISSION_COLUMNS} FROM quote_submission s {filter}
             ORDER BY s.created_at DESC"
        );
        let submissions = bound(&sql, &bind)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(row_to_submission)
            .collect::<Result<Vec<_>, _>>()?;

        self.attach_related(submissions, filter, bind).await
    }
}
