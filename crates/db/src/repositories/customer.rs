use sqlx::Row;

use carsellmax_core::domain::customer::{Customer, CustomerId, Vehicle, VehicleId};

use super::{decode_error, parse_timestamp, CustomerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer, RepositoryError> {
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    Ok(Customer {
        id: CustomerId(row.try_get("id").map_err(decode_error)?),
        full_name: row.try_get("full_name").map_err(decode_error)?,
        email: row.try_get("email").map_err(decode_error)?,
        phone: row.try_get("phone").map_err(decode_error)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

pub(crate) fn row_to_vehicle(row: &sqlx::sqlite::SqliteRow) -> Result<Vehicle, RepositoryError> {
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let year: i64 = row.try_get("year").map_err(decode_error)?;

    Ok(Vehicle {
        id: VehicleId(row.try_get("id").map_err(decode_error)?),
        customer_id: CustomerId(row.try_get("customer_id").map_err(decode_error)?),
        vin: row.try_get("vin").map_err(decode_error)?,
        year: i32::try_from(year).map_err(decode_error)?,
        make: row.try_get("make").map_err(decode_error)?,
        model: row.try_get("model").map_err(decode_error)?,
        trim: row.try_get("trim").map_err(decode_error)?,
        mileage: row.try_get("mileage").map_err(decode_error)?,
        condition: row.try_get("condition").map_err(decode_error)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, full_name, email, phone, created_at FROM customer WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_customer).transpose()
    }

    async fn save_customer(&self, customer: Customer) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO customer (id, full_name, email, phone, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 full_name = excluded.full_name,
                 email = excluded.email,
                 phone = excluded.phone",
        )
        .bind(&customer.id.0)
        .bind(&customer.full_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_vehicle(&self, id: &VehicleId) -> Result<Option<Vehicle>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, customer_id, vin, year, make, model, trim, mileage, condition, created_at
             FROM vehicle WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_vehicle).transpose()
    }

    async fn save_vehicle(&self, vehicle: Vehicle) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO vehicle (id, customer_id, vin, year, make, model, trim, mileage,
                                  condition, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 vin = excluded.vin,
                 year = excluded.year,
                 make = excluded.make,
                 model = excluded.model,
                 trim = excluded.trim,
                 mileage = excluded.mileage,
                 condition = excluded.condition",
        )
        .bind(&vehicle.id.0)
        .bind(&vehicle.customer_id.0)
        .bind(&vehicle.vin)
        .bind(i64::from(vehicle.year))
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(&vehicle.trim)
        .bind(vehicle.mileage)
        .bind(&vehicle.condition)
        .bind(vehicle.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use carsellmax_core::domain::customer::{CustomerId, VehicleId};

    use super::SqlCustomerRepository;
    use crate::repositories::test_support::{sample_customer, sample_vehicle, setup};
    use crate::repositories::CustomerRepository;

    #[tokio::test]
    async fn save_and_find_customer_and_vehicle() {
        let pool = setup().await;
        let repo = SqlCustomerRepository::new(pool);
        let now = Utc::now();

        repo.save_customer(sample_customer("cust-1", now)).await.expect("save customer");
        repo.save_vehicle(sample_vehicle("veh-1", "cust-1", now)).await.expect("save vehicle");

        let customer = repo
            .find_customer(&CustomerId::from("cust-1"))
            .await
            .expect("find customer")
            .expect("customer exists");
        assert_eq!(customer.email, "cust-1@example.com");

        let vehicle =
            repo.find_vehicle(&VehicleId::from("veh-1")).await.expect("find").expect("exists");
        assert_eq!(vehicle.year, 2019);
        assert_eq!(vehicle.trim.as_deref(), Some("EX-L"));
        assert_eq!(vehicle.customer_id, CustomerId::from("cust-1"));
    }

    #[tokio::test]
    async fn vehicle_requires_existing_customer() {
        let pool = setup().await;
        let repo = SqlCustomerRepository::new(pool);

        let result = repo.save_vehicle(sample_vehicle("veh-1", "missing", Utc::now())).await;
        assert!(result.is_err(), "foreign key should reject orphan vehicle");
    }

    #[tokio::test]
    async fn save_customer_upserts_contact_details() {
        let pool = setup().await;
        let repo = SqlCustomerRepository::new(pool);
        let now = Utc::now();

        let mut customer = sample_customer("cust-1", now);
        repo.save_customer(customer.clone()).await.expect("save");
        customer.phone = None;
        customer.full_name = "Dana W.".to_string();
        repo.save_customer(customer).await.expect("upsert");

        let found = repo.find_customer(&CustomerId::from("cust-1")).await.expect("find");
        let found = found.expect("exists");
        assert_eq!(found.full_name, "Dana W.");
        assert_eq!(found.phone, None);
    }
}
