use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decimal::parse_decimal;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub campaign: CampaignConfig,
    pub income: IncomeConfig,
    pub rejection: RejectionConfig,
    pub certification: CertificationConfig,
    pub pricing: PricingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct CampaignConfig {
    pub id: u32,
    pub company: String,
    pub crop: String,
}

#[derive(Clone, Debug)]
pub struct IncomeConfig {
    pub gross: Decimal,
    pub other_funds: Decimal,
}

/// Per-kg deduction applied to each reject class.
#[derive(Clone, Debug)]
pub struct RejectionConfig {
    pub line: Decimal,
    pub table: Decimal,
    pub rotten: Decimal,
}

#[derive(Clone, Debug)]
pub struct CertificationConfig {
    pub bonus_base: Decimal,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub reference_group: String,
    pub primary_category: String,
    pub secondary_category: String,
    pub secondary_ratio: Decimal,
    /// Economic group -> authority groups folded into it.
    pub groups: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub campaign_id: Option<u32>,
    pub company: Option<String>,
    pub crop: Option<String>,
    pub gross_income: Option<Decimal>,
    pub other_funds: Option<Decimal>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("invalid decimal for `{key}`: `{value}`")]
    InvalidDecimal { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            campaign: CampaignConfig { id: 0, company: String::new(), crop: String::new() },
            income: IncomeConfig { gross: Decimal::ZERO, other_funds: Decimal::ZERO },
            rejection: RejectionConfig {
                line: Decimal::new(-1, 2),
                table: Decimal::new(-2, 2),
                rotten: Decimal::new(-3, 2),
            },
            certification: CertificationConfig { bonus_base: Decimal::ZERO },
            pricing: PricingConfig {
                reference_group: "AAA".to_string(),
                primary_category: "I".to_string(),
                secondary_category: "II".to_string(),
                secondary_ratio: Decimal::new(5, 1),
                groups: default_authority_groups(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

/// Grading-authority calibre bands folded into the three commercial groups.
pub fn default_authority_groups() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        ("AAA".to_string(), vec!["2/3".to_string()]),
        ("AA".to_string(), vec!["4".to_string(), "5".to_string()]),
        ("A".to_string(), vec!["6".to_string(), "7/8".to_string(), "9/10".to_string()]),
    ])
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("liquida.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(campaign) = patch.campaign {
            if let Some(id) = campaign.id {
                self.campaign.id = id;
            }
            if let Some(company) = campaign.company {
                self.campaign.company = company;
            }
            if let Some(crop) = campaign.crop {
                self.campaign.crop = crop;
            }
        }

        if let Some(income) = patch.income {
            if let Some(gross) = income.gross {
                self.income.gross = decimal_field("income.gross", &gross)?;
            }
            if let Some(other_funds) = income.other_funds {
                self.income.other_funds = decimal_field("income.other_funds", &other_funds)?;
            }
        }

        if let Some(rejection) = patch.rejection {
            if let Some(line) = rejection.line {
                self.rejection.line = decimal_field("rejection.line", &line)?;
            }
            if let Some(table) = rejection.table {
                self.rejection.table = decimal_field("rejection.table", &table)?;
            }
            if let Some(rotten) = rejection.rotten {
                self.rejection.rotten = decimal_field("rejection.rotten", &rotten)?;
            }
        }

        if let Some(certification) = patch.certification {
            if let Some(bonus_base) = certification.bonus_base {
                self.certification.bonus_base =
                    decimal_field("certification.bonus_base", &bonus_base)?;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(reference_group) = pricing.reference_group {
                self.pricing.reference_group = reference_group;
            }
            if let Some(primary_category) = pricing.primary_category {
                self.pricing.primary_category = primary_category;
            }
            if let Some(secondary_category) = pricing.secondary_category {
                self.pricing.secondary_category = secondary_category;
            }
            if let Some(secondary_ratio) = pricing.secondary_ratio {
                self.pricing.secondary_ratio =
                    decimal_field("pricing.secondary_ratio", &secondary_ratio)?;
            }
            if let Some(groups) = pricing.groups {
                self.pricing.groups = groups;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LIQUIDA_CAMPAIGN_ID") {
            self.campaign.id = parse_u32("LIQUIDA_CAMPAIGN_ID", &value)?;
        }
        if let Some(value) = read_env("LIQUIDA_CAMPAIGN_COMPANY") {
            self.campaign.company = value;
        }
        if let Some(value) = read_env("LIQUIDA_CAMPAIGN_CROP") {
            self.campaign.crop = value;
        }

        if let Some(value) = read_env("LIQUIDA_INCOME_GROSS") {
            self.income.gross = parse_env_decimal("LIQUIDA_INCOME_GROSS", &value)?;
        }
        if let Some(value) = read_env("LIQUIDA_INCOME_OTHER_FUNDS") {
            self.income.other_funds = parse_env_decimal("LIQUIDA_INCOME_OTHER_FUNDS", &value)?;
        }

        if let Some(value) = read_env("LIQUIDA_REJECTION_LINE") {
            self.rejection.line = parse_env_decimal("LIQUIDA_REJECTION_LINE", &value)?;
        }
        if let Some(value) = read_env("LIQUIDA_REJECTION_TABLE") {
            self.rejection.table = parse_env_decimal("LIQUIDA_REJECTION_TABLE", &value)?;
        }
        if let Some(value) = read_env("LIQUIDA_REJECTION_ROTTEN") {
            self.rejection.rotten = parse_env_decimal("LIQUIDA_REJECTION_ROTTEN", &value)?;
        }

        if let Some(value) = read_env("LIQUIDA_CERTIFICATION_BONUS_BASE") {
            self.certification.bonus_base =
                parse_env_decimal("LIQUIDA_CERTIFICATION_BONUS_BASE", &value)?;
        }

        if let Some(value) = read_env("LIQUIDA_PRICING_SECONDARY_RATIO") {
            self.pricing.secondary_ratio =
                parse_env_decimal("LIQUIDA_PRICING_SECONDARY_RATIO", &value)?;
        }

        let log_level = read_env("LIQUIDA_LOGGING_LEVEL").or_else(|| read_env("LIQUIDA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LIQUIDA_LOGGING_FORMAT").or_else(|| read_env("LIQUIDA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(campaign_id) = overrides.campaign_id {
            self.campaign.id = campaign_id;
        }
        if let Some(company) = overrides.company {
            self.campaign.company = company;
        }
        if let Some(crop) = overrides.crop {
            self.campaign.crop = crop;
        }
        if let Some(gross_income) = overrides.gross_income {
            self.income.gross = gross_income;
        }
        if let Some(other_funds) = overrides.other_funds {
            self.income.other_funds = other_funds;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    fn normalize(&mut self) {
        self.campaign.company = self.campaign.company.trim().to_string();
        self.campaign.crop = self.campaign.crop.trim().to_uppercase();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_campaign(&self.campaign)?;
        validate_income(&self.income)?;
        validate_pricing(&self.pricing)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("liquida.toml"), PathBuf::from("config/liquida.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_campaign(campaign: &CampaignConfig) -> Result<(), ConfigError> {
    if campaign.id == 0 {
        return Err(ConfigError::Validation(
            "campaign.id is required (set [campaign] id or LIQUIDA_CAMPAIGN_ID)".to_string(),
        ));
    }
    if campaign.company.is_empty() {
        return Err(ConfigError::Validation(
            "campaign.company is required (set [campaign] company or LIQUIDA_CAMPAIGN_COMPANY)"
                .to_string(),
        ));
    }
    if campaign.crop.is_empty() {
        return Err(ConfigError::Validation(
            "campaign.crop is required (set [campaign] crop or LIQUIDA_CAMPAIGN_CROP)".to_string(),
        ));
    }
    Ok(())
}

fn validate_income(income: &IncomeConfig) -> Result<(), ConfigError> {
    if income.gross <= Decimal::ZERO {
        return Err(ConfigError::Validation(
            "income.gross must be greater than zero (actual gross campaign income)".to_string(),
        ));
    }
    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if pricing.secondary_ratio <= Decimal::ZERO {
        return Err(ConfigError::Validation(
            "pricing.secondary_ratio must be greater than zero".to_string(),
        ));
    }
    if pricing.primary_category.trim().is_empty() || pricing.secondary_category.trim().is_empty()
    {
        return Err(ConfigError::Validation(
            "pricing.primary_category and pricing.secondary_category must not be empty"
                .to_string(),
        ));
    }
    if pricing.primary_category == pricing.secondary_category {
        return Err(ConfigError::Validation(
            "pricing.primary_category and pricing.secondary_category must differ".to_string(),
        ));
    }
    if !pricing.groups.contains_key(&pricing.reference_group) {
        return Err(ConfigError::Validation(format!(
            "pricing.reference_group `{}` is not one of the configured pricing.groups",
            pricing.reference_group
        )));
    }

    let mut seen = BTreeSet::new();
    for (group, members) in &pricing.groups {
        if members.is_empty() {
            return Err(ConfigError::Validation(format!(
                "pricing.groups.{group} must list at least one authority group"
            )));
        }
        for member in members {
            if !seen.insert(member.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "authority group `{member}` is assigned to more than one economic group"
                )));
            }
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_env_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    parse_decimal(value).map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn decimal_field(key: &str, value: &DecimalText) -> Result<Decimal, ConfigError> {
    let raw = match value {
        DecimalText::Text(text) => text.clone(),
        DecimalText::Integer(number) => number.to_string(),
    };
    parse_decimal(&raw)
        .map_err(|_| ConfigError::InvalidDecimal { key: key.to_string(), value: raw.clone() })
}

/// Monetary values are written as strings so TOML floats never touch them;
/// whole numbers are accepted bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DecimalText {
    Text(String),
    Integer(i64),
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    campaign: Option<CampaignPatch>,
    income: Option<IncomePatch>,
    rejection: Option<RejectionPatch>,
    certification: Option<CertificationPatch>,
    pricing: Option<PricingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CampaignPatch {
    id: Option<u32>,
    company: Option<String>,
    crop: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IncomePatch {
    gross: Option<DecimalText>,
    other_funds: Option<DecimalText>,
}

#[derive(Debug, Default, Deserialize)]
struct RejectionPatch {
    line: Option<DecimalText>,
    table: Option<DecimalText>,
    rotten: Option<DecimalText>,
}

#[derive(Debug, Default, Deserialize)]
struct CertificationPatch {
    bonus_base: Option<DecimalText>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    reference_group: Option<String>,
    primary_category: Option<String>,
    secondary_category: Option<String>,
    secondary_ratio: Option<DecimalText>,
    groups: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
