use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use carsellmax_core::domain::customer::{Customer, CustomerId, Vehicle, VehicleId};
use carsellmax_core::domain::offer::OfferStatus;
use carsellmax_core::domain::submission::{QuoteSubmission, SubmissionStatus};
use carsellmax_core::domain::valuation::Valuation;
use carsellmax_core::offers::{NewOffer, OfferDefaults};
use carsellmax_db::repositories::RepositoryError;
use carsellmax_db::{connect_with_settings, migrations, Stores};

type ContractResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

async fn sql_stores() -> ContractResult<Stores> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|e| format!("connect: {e}"))?;
    migrations::run_pending(&pool).await.map_err(|e| format!("migrate: {e}"))?;
    Ok(Stores::sql(pool))
}

async fn seed(stores: &Stores, key: &str) -> ContractResult<QuoteSubmission> {
    let now = Utc::now();
    let customer = Customer {
        id: CustomerId(format!("cust-{key}")),
        full_name: "Morgan Reyes".to_string(),
        email: format!("{key}@example.com"),
        phone: None,
        created_at: now,
    };
    let vehicle = Vehicle {
        id: VehicleId(format!("veh-{key}")),
        customer_id: customer.id.clone(),
        vin: "2T1BURHE0JC034461".to_string(),
        year: 2018,
        make: "Toyota".to_string(),
        model: "Corolla".to_string(),
        trim: None,
        mileage: 61_000,
        condition: None,
        created_at: now,
    };
    stores.customers.save_customer(customer.clone()).await.map_err(|e| e.to_string())?;
    stores.customers.save_vehicle(vehicle.clone()).await.map_err(|e| e.to_string())?;

    let submission = QuoteSubmission::new(customer.id, vehicle.id, None, now);
    stores.submissions.save(submission.clone()).await.map_err(|e| e.to_string())?;
    Ok(submission)
}

async fn exercise_contract(stores: Stores) -> ContractResult {
    let submission = seed(&stores, "1").await?;
    let now = Utc::now();

    stores
        .valuations
        .insert(Valuation::draft(submission.id.clone(), "appraiser", now))
        .await
        .map_err(|e| e.to_string())?;
    let duplicate_valuation =
        stores.valuations.insert(Valuation::draft(submission.id.clone(), "again", now)).await;
    require!(
        matches!(duplicate_valuation, Err(RepositoryError::UniqueViolation(_))),
        "second valuation should violate uniqueness, got {duplicate_valuation:?}"
    );

    let mut offer = NewOffer {
        quote_submission_id: submission.id.clone(),
        offer_amount: Decimal::new(14_250, 0),
        expiry_days: Some(3),
        terms: None,
        inspection_required: Some(false),
        payment_method: None,
        notes: None,
        created_by: "buyer".to_string(),
    }
    .into_offer(&OfferDefaults::default(), now)
    .map_err(|e| e.to_string())?;
    stores.offers.insert(offer.clone()).await.map_err(|e| e.to_string())?;

    offer.mark_sent("msg_contract", now + Duration::minutes(5)).map_err(|e| e.to_string())?;
    stores.offers.update(offer.clone()).await.map_err(|e| e.to_string())?;
    stores
        .submissions
        .update_status(&submission.id, SubmissionStatus::QuoteSent, now)
        .await
        .map_err(|e| e.to_string())?;

    let by_token = stores
        .offers
        .find_by_token(&offer.tracking_token)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("offer should resolve by token")?;
    require!(by_token.status == OfferStatus::Sent, "token lookup should see the sent status");

    let record = stores
        .submissions
        .find_record(&submission.id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("record should exist")?;
    require!(
        record.submission.status == SubmissionStatus::QuoteSent,
        "record should carry the cascaded status"
    );
    require!(record.valuation.is_some(), "record should include the valuation");
    require!(record.offer.as_ref().map(|o| &o.id) == Some(&offer.id), "record should include the offer");

    seed(&stores, "2").await?;
    let records = stores.submissions.list_records(None).await.map_err(|e| e.to_string())?;
    require!(records.len() == 2, "expected two records, got {}", records.len());

    require!(
        stores.offers.delete(&offer.id).await.map_err(|e| e.to_string())?,
        "delete should report the removed row"
    );
    require!(
        stores.offers.find_by_submission(&submission.id).await.map_err(|e| e.to_string())?.is_none(),
        "offer should be gone after delete"
    );

    Ok(())
}

#[tokio::test]
async fn sqlite_stores_satisfy_contract() -> ContractResult {
    exercise_contract(sql_stores().await?).await
}

#[tokio::test]
async fn in_memory_stores_satisfy_contract() -> ContractResult {
    exercise_contract(Stores::in_memory()).await
}
