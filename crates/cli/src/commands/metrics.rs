use chrono::{Duration, Utc};

use carsellmax_core::errors::ApplicationError;
use carsellmax_core::metrics::{compute_operations_metrics, validate_window, DEFAULT_WINDOW_DAYS};
use carsellmax_db::Stores;

use crate::commands::{block_on, load_config, open_pool, CommandResult};

pub fn run(days: Option<u32>) -> CommandResult {
    let days = match validate_window(days.unwrap_or(DEFAULT_WINDOW_DAYS)) {
        Ok(days) => days,
        Err(error) => return CommandResult::from_error("metrics", &error.into()),
    };

    let result = load_config().and_then(|config| {
        block_on(async move {
            let pool = open_pool(&config).await?;
            let now = Utc::now();
            let records = Stores::sql(pool.clone())
                .submissions
                .list_records(Some(now - Duration::days(i64::from(days))))
                .await
                .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
            pool.close().await;
            Ok(compute_operations_metrics(&records, days, now))
        })
    });

    match result {
        Ok(metrics) => CommandResult::report("metrics", &metrics),
        Err(error) => CommandResult::from_error("metrics", &error),
    }
}
