use carsellmax_core::errors::ApplicationError;
use carsellmax_db::migrations;

use crate::commands::{block_on, load_config, open_pool, CommandResult};

pub fn run() -> CommandResult {
    let result = load_config().and_then(|config| {
        block_on(async move {
            let pool = open_pool(&config).await?;
            migrations::run_pending(&pool)
                .await
                .map_err(|error| ApplicationError::Persistence(format!("migration failed: {error}")))?;
            pool.close().await;
            Ok(())
        })
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(error) => CommandResult::from_error("migrate", &error),
    }
}
