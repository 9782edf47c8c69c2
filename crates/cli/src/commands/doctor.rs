use carsellmax_core::config::AppConfig;
use carsellmax_db::DbPool;
use serde::Serialize;

use crate::commands::{block_on, load_config, open_pool, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const REQUIRED_TABLES: [&str; 7] =
    ["customer", "vehicle", "quote_submission", "valuation", "offer", "email_log", "audit_log"];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match load_config() {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_mail_readiness(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["mail_readiness", "database_connectivity", "schema_presence"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_mail_readiness(config: &AppConfig) -> DoctorCheck {
    let mail = &config.mail;
    let details = match (mail.enabled, mail.test_mode) {
        (false, _) => "mail delivery disabled; offer emails are logged only".to_string(),
        (true, true) => format!(
            "provider {} enabled in test mode; all offers go to {}",
            mail.api_base_url,
            mail.test_recipient.as_deref().unwrap_or("<unset>")
        ),
        (true, false) => format!("provider {} enabled from {}", mail.api_base_url, mail.from_address),
    };
    DoctorCheck { name: "mail_readiness", status: CheckStatus::Pass, details }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let result = block_on(async {
        let pool = open_pool(config).await?;
        let missing = missing_tables(&pool).await;
        pool.close().await;
        Ok(missing)
    });

    match result {
        Ok(missing) => vec![
            DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`", config.database.url),
            },
            match missing {
                Ok(missing) if missing.is_empty() => DoctorCheck {
                    name: "schema_presence",
                    status: CheckStatus::Pass,
                    details: "all workflow tables present".to_string(),
                },
                Ok(missing) => DoctorCheck {
                    name: "schema_presence",
                    status: CheckStatus::Fail,
                    details: format!(
                        "missing tables: {} (run `carsellmax migrate`)",
                        missing.join(", ")
                    ),
                },
                Err(error) => DoctorCheck {
                    name: "schema_presence",
                    status: CheckStatus::Fail,
                    details: format!("failed to inspect schema: {error}"),
                },
            },
        ],
        Err(error) => vec![
            DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: error.to_string(),
            },
            DoctorCheck {
                name: "schema_presence",
                status: CheckStatus::Skipped,
                details: "skipped because the database is unreachable".to_string(),
            },
        ],
    }
}

async fn missing_tables(pool: &DbPool) -> Result<Vec<&'static str>, sqlx::Error> {
    let present: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(pool)
            .await?;
    Ok(REQUIRED_TABLES
        .into_iter()
        .filter(|table| !present.iter().any(|name| name == table))
        .collect())
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
