//! Doctor command - validate configuration and show status

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use taggable_adapters::store::SqliteTagStore;
use taggable_domain::{FieldPolicy, TagStore};

use crate::args::DoctorArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    tagging: CheckResult,
    subjects: CheckResult,
    database: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        tagging: CheckResult::error("Not checked"),
        subjects: CheckResult::error("Not checked"),
        database: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.tagging = check_tagging(config);
        report.subjects = check_subjects(config);
        report.database = check_database(config).await;
    }

    let checks = [
        &report.config,
        &report.tagging,
        &report.subjects,
        &report.database,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

fn check_tagging(config: &AppConfig) -> CheckResult {
    let tagging = &config.tagging;
    if let Err(e) = FieldPolicy::default().validate_locale(&tagging.default_locale) {
        return CheckResult::error(format!("Invalid default locale: {}", e));
    }

    if tagging.delimiter.is_empty() {
        return CheckResult::warn(format!(
            "Delimiter is empty: tag strings are never split (locale: {})",
            tagging.default_locale
        ));
    }

    CheckResult::ok(format!(
        "Delimiter: {:?}, Default locale: {}",
        tagging.delimiter, tagging.default_locale
    ))
}

fn check_subjects(config: &AppConfig) -> CheckResult {
    if config.subjects.is_empty() {
        return CheckResult::warn("No subject types registered under [subjects]");
    }

    CheckResult::ok(format!("{} subject types registered", config.subjects.len()))
        .with_details(serde_json::json!(config.subjects))
}

async fn check_database(config: &AppConfig) -> CheckResult {
    let path = &config.general.database_path;
    let store = match SqliteTagStore::new(path, &config.tagging).await {
        Ok(store) => store,
        Err(e) => {
            return CheckResult::error(format!(
                "Failed to open database {}: {}",
                path.display(),
                e
            ));
        }
    };

    let live_tags = async {
        let mut tx = store.begin().await?;
        let tags = tx.list_tags(None).await?;
        tx.rollback().await?;
        Ok::<_, taggable_domain::StoreError>(tags.len())
    }
    .await;

    match live_tags {
        Ok(count) => CheckResult::ok(format!("{} ({} live tags)", path.display(), count))
            .with_details(serde_json::json!({
                "path": path,
                "tags_table": config.tagging.tags_table,
                "taggables_table": config.tagging.taggables_table,
                "live_tags": count,
            })),
        Err(e) => CheckResult::error(format!("Database query failed: {}", e)),
    }
}

fn print_report(report: &DoctorReport) {
    println!("taggable Doctor Report");
    println!("======================");
    println!();

    print_check("Config", &report.config);
    print_check("Tagging", &report.tagging);
    print_check("Subjects", &report.subjects);
    print_check("Database", &report.database);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
