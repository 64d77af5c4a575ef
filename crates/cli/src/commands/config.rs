use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use liquida_core::config::{AppConfig, LoadOptions};
use liquida_core::errors::ApplicationError;
use toml::Value;

use crate::commands::CommandResult;

pub fn run(config_path: Option<&Path>) -> CommandResult {
    match AppConfig::load(LoadOptions {
        config_path: config_path.map(PathBuf::from),
        require_file: config_path.is_some(),
        ..LoadOptions::default()
    }) {
        Ok(config) => CommandResult::success("config", render(&config, config_path)),
        Err(error) => CommandResult::from_error("config", &ApplicationError::from(error)),
    }
}

fn render(config: &AppConfig, config_path: Option<&Path>) -> String {
    let config_file_path = detect_config_path(config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "campaign.id",
        &config.campaign.id.to_string(),
        source("campaign.id", "LIQUIDA_CAMPAIGN_ID"),
    ));
    lines.push(render_line(
        "campaign.company",
        &config.campaign.company,
        source("campaign.company", "LIQUIDA_CAMPAIGN_COMPANY"),
    ));
    lines.push(render_line(
        "campaign.crop",
        &config.campaign.crop,
        source("campaign.crop", "LIQUIDA_CAMPAIGN_CROP"),
    ));

    lines.push(render_line(
        "income.gross",
        &config.income.gross.to_string(),
        source("income.gross", "LIQUIDA_INCOME_GROSS"),
    ));
    lines.push(render_line(
        "income.other_funds",
        &config.income.other_funds.to_string(),
        source("income.other_funds", "LIQUIDA_INCOME_OTHER_FUNDS"),
    ));

    for (class, value, env_key) in [
        ("line", config.rejection.line, "LIQUIDA_REJECTION_LINE"),
        ("table", config.rejection.table, "LIQUIDA_REJECTION_TABLE"),
        ("rotten", config.rejection.rotten, "LIQUIDA_REJECTION_ROTTEN"),
    ] {
        let key_path = format!("rejection.{class}");
        lines.push(render_line(&key_path, &value.to_string(), source(&key_path, env_key)));
    }

    lines.push(render_line(
        "certification.bonus_base",
        &config.certification.bonus_base.to_string(),
        source("certification.bonus_base", "LIQUIDA_CERTIFICATION_BONUS_BASE"),
    ));

    lines.push(render_line(
        "pricing.reference_group",
        &config.pricing.reference_group,
        field_source(
            "pricing.reference_group",
            None,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "pricing.secondary_ratio",
        &config.pricing.secondary_ratio.to_string(),
        source("pricing.secondary_ratio", "LIQUIDA_PRICING_SECONDARY_RATIO"),
    ));
    let groups = config
        .pricing
        .groups
        .iter()
        .map(|(group, members)| format!("{group}=[{}]", members.join(",")))
        .collect::<Vec<_>>()
        .join(" ");
    lines.push(render_line(
        "pricing.groups",
        &groups,
        field_source("pricing.groups", None, config_file_doc.as_ref(), config_file_path.as_deref()),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "LIQUIDA_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "LIQUIDA_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let root = PathBuf::from("liquida.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/liquida.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
