pub mod bundle;
pub mod config;
pub mod settle;
pub mod validate;

use std::path::{Path, PathBuf};

use liquida_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};
use liquida_core::errors::{ApplicationError, SettlementDiagnostic};
use liquida_core::settlement::validator::ValidationReport;
use liquida_core::settlement::SettlementOutcome;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Default, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostic: Option<SettlementDiagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    settlement: Option<SettlementOutcome>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            message: message.into(),
            ..CommandOutcome::default()
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn settled(
        command: &str,
        message: impl Into<String>,
        settlement: Option<SettlementOutcome>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            message: message.into(),
            settlement,
            ..CommandOutcome::default()
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn validated(command: &str, report: ValidationReport) -> Self {
        let fatal = report.fatal_count();
        let advisory = report.advisory_count();
        let message = format!("{fatal} fatal finding(s), {advisory} advisory finding(s)");
        let (status, error_class, exit_code) = if report.valid {
            ("ok", None, 0)
        } else {
            ("error", Some("validation_findings".to_string()), 4)
        };

        let payload = CommandOutcome {
            command: command.to_string(),
            status: status.to_string(),
            error_class,
            message,
            report: Some(report),
            ..CommandOutcome::default()
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn from_error(command: &str, error: &ApplicationError) -> Self {
        let diagnostic = match error {
            ApplicationError::Settlement(error) => Some(error.diagnostic()),
            _ => None,
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error.error_class().to_string()),
            message: error.to_string(),
            diagnostic,
            ..CommandOutcome::default()
        };
        Self { exit_code: error.exit_code(), output: serialize_payload(payload) }
    }
}

/// Loads configuration for a command; an explicit path must exist.
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ApplicationError> {
    let config = AppConfig::load(LoadOptions {
        config_path: config_path.map(PathBuf::from),
        require_file: config_path.is_some(),
        ..LoadOptions::default()
    })?;
    init_logging(&config.logging);
    Ok(config)
}

/// Installs the tracing subscriber once per process; stdout stays reserved
/// for the command outcome.
pub fn init_logging(logging: &LoggingConfig) {
    use tracing::Level;

    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        tracing::debug!(event_name = "cli.logging.already_initialized", "subscriber already set");
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
