use chrono::{DateTime, Utc};
use serde::Serialize;

use carsellmax_core::errors::ApplicationError;
use carsellmax_core::metrics::{evaluate_alerts, Alert, AlertThresholds};
use carsellmax_db::Stores;

use crate::commands::{block_on, load_config, open_pool, CommandResult};

#[derive(Debug, Serialize)]
struct AlertsReport {
    generated_at: DateTime<Utc>,
    fired: usize,
    alerts: Vec<Alert>,
}

pub fn run() -> CommandResult {
    let result = load_config().and_then(|config| {
        block_on(async move {
            let pool = open_pool(&config).await?;
            let records = Stores::sql(pool.clone())
                .submissions
                .list_records(None)
                .await
                .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
            pool.close().await;

            let generated_at = Utc::now();
            let alerts = evaluate_alerts(&records, &AlertThresholds::default(), generated_at);
            Ok(AlertsReport { generated_at, fired: alerts.len(), alerts })
        })
    });

    match result {
        Ok(report) => CommandResult::report("alerts", &report),
        Err(error) => CommandResult::from_error("alerts", &error),
    }
}
