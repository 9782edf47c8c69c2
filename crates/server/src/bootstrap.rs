use std::sync::Arc;

use axum::Router;
use carsellmax_core::config::{AppConfig, ConfigError, LoadOptions};
use carsellmax_db::{connect_with_config, migrations, DbPool, Stores};
use thiserror::Error;
use tracing::info;

use crate::health;
use crate::mail::{self, MailError};
use crate::routes::{self, AppState};
use crate::services::{ServiceSettings, Services};
use crate::templates::EmailRenderer;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub services: Services,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("mailer setup failed: {0}")]
    Mailer(#[from] MailError),
    #[error("email templates failed to compile: {0}")]
    Templates(#[source] tera::Error),
}

impl Application {
    /// API routes plus `/health`.
    pub fn router(&self) -> Router {
        let state = AppState::new(self.services.clone(), self.config.admin.api_key.clone());
        routes::router(state).merge(health::router(self.db_pool.clone()))
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let mailer: Arc<dyn mail::Mailer> = Arc::from(mail::from_config(&config.mail)?);
    let renderer = Arc::new(EmailRenderer::new().map_err(BootstrapError::Templates)?);
    let services = Services::new(
        Stores::sql(db_pool.clone()),
        mailer,
        renderer,
        ServiceSettings::from_config(&config),
    );
    info!(
        event_name = "system.bootstrap.services_ready",
        mail_enabled = config.mail.enabled,
        mail_test_mode = config.mail.test_mode,
        admin_auth = config.admin.api_key.is_some(),
        "workflow services initialized"
    );

    Ok(Application { config, db_pool, services })
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use carsellmax_core::config::{ConfigOverrides, LoadOptions};
    use tower::ServiceExt;

    use crate::bootstrap::bootstrap;

    fn overrides(overrides: ConfigOverrides) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..overrides
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_when_mail_enabled_without_key() {
        let result = bootstrap(overrides(ConfigOverrides {
            mail_enabled: Some(true),
            ..ConfigOverrides::default()
        }))
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("mail.api_key"));
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_serves_health() {
        let app = bootstrap(overrides(ConfigOverrides::default())).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('quote_submission', 'offer', 'valuation', 'audit_log')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 4);

        let response = app
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        app.db_pool.close().await;
    }
}
