use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use liquida_cli::commands::{config, settle, validate};
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;

const CONFIG: &str = r#"
[campaign]
id = 2025
company = "1"
crop = "kakis"

[income]
gross = "105000.00"
other_funds = "0"

[certification]
bonus_base = "0"

[logging]
level = "warn"
"#;

const PRICES: &str =
    r#"[{ "week": 12, "group": "G1", "category": "AAA", "relative_price": "1.0000" }]"#;

#[test]
fn settle_writes_outcome_and_reconciles_to_gross_income() {
    with_env(&[], || {
        let workspace = Workspace::new();
        let records = lots(&[("B1", 250, Some("S1")), ("B2", 99_750, Some("S1"))]);
        let bundle = workspace.bundle(&records, PRICES);
        let output = workspace.path("settlement.json");

        let result = settle::run(&bundle, Some(&output), Some(&workspace.config));
        assert_eq!(result.exit_code, 0, "expected successful settlement: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "settle");
        assert_eq!(payload["status"], "ok");
        assert!(payload.get("settlement").is_none(), "outcome goes to the output file");

        let written: Value =
            serde_json::from_str(&fs::read_to_string(&output).expect("output file"))
                .expect("outcome json");
        assert_eq!(decimal(&written["summary"]["coefficient"]), Decimal::new(105, 2));
        assert_eq!(decimal(&written["lots"][0]["final_value"]), Decimal::new(2625, 1));
        assert_eq!(written["final_prices"].as_array().map(Vec::len), Some(1));
        assert!(decimal(&written["summary"]["descuadre"]) <= Decimal::new(1, 2));
    });
}

#[test]
fn settle_without_output_embeds_the_outcome() {
    with_env(&[], || {
        let workspace = Workspace::new();
        let records = lots(&[("B1", 1_000, Some("S1")), ("B2", 500, None)]);
        let bundle = workspace.bundle(&records, PRICES);

        let result = settle::run(&bundle, None, Some(&workspace.config));
        assert_eq!(result.exit_code, 0, "expected successful settlement: {}", result.output);

        let payload = parse_payload(&result.output);
        let settlement = &payload["settlement"];
        assert_eq!(settlement["summary"]["lot_count"], 2);
        assert_eq!(settlement["certification_audit"][0]["lot_id"], "B2");
        let reason = &settlement["certification_audit"][0]["reason"];
        assert_eq!(reason, "missing_certification_record");
    });
}

#[test]
fn settle_aborts_on_duplicate_price_key_with_diagnostic() {
    with_env(&[], || {
        let workspace = Workspace::new();
        let prices = r#"[
            { "week": 12, "group": "G1", "category": "AAA", "relative_price": "1.0000" },
            { "week": 12, "group": "G1", "category": "AAA", "relative_price": "1.1000" }
        ]"#;
        let bundle = workspace.bundle(&lots(&[("B1", 250, Some("S1"))]), prices);
        let output = workspace.path("settlement.json");

        let result = settle::run(&bundle, Some(&output), Some(&workspace.config));
        assert_eq!(result.exit_code, 4, "expected settlement validation failure code");
        assert!(!output.exists(), "no partial output on fatal errors");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "duplicate_price_keys");
        assert_eq!(payload["diagnostic"]["keys"][0], "week 12/G1/AAA");
    });
}

#[test]
fn settle_returns_config_failure_without_campaign() {
    with_env(&[], || {
        let workspace = Workspace::new();
        let bundle = workspace.bundle(&lots(&[("B1", 250, Some("S1"))]), PRICES);

        let result = settle::run(&bundle, None, None);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "settle");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn settle_returns_input_failure_for_missing_bundle() {
    with_env(&[], || {
        let workspace = Workspace::new();
        let missing = workspace.path("absent.json");

        let result = settle::run(&missing, None, Some(&workspace.config));
        assert_eq!(result.exit_code, 3, "expected input bundle failure code");
        assert_eq!(parse_payload(&result.output)["error_class"], "input_bundle");
    });
}

#[test]
fn env_overrides_gross_income_from_file() {
    with_env(&[("LIQUIDA_INCOME_GROSS", "210000")], || {
        let workspace = Workspace::new();
        let records = lots(&[("B1", 250, Some("S1")), ("B2", 99_750, Some("S1"))]);
        let bundle = workspace.bundle(&records, PRICES);

        let result = settle::run(&bundle, None, Some(&workspace.config));
        assert_eq!(result.exit_code, 0, "expected successful settlement: {}", result.output);

        let payload = parse_payload(&result.output);
        let coefficient = decimal(&payload["settlement"]["summary"]["coefficient"]);
        assert_eq!(coefficient, Decimal::new(21, 1));
    });
}

#[test]
fn validate_reports_advisory_findings_as_success() {
    with_env(&[], || {
        let workspace = Workspace::new();
        let records = lots(&[("B1", 250, Some("S1")), ("B2", 10, None)]);
        let bundle = workspace.bundle(&records, PRICES);

        let result = validate::run(&bundle, Some(&workspace.config));
        assert_eq!(result.exit_code, 0, "advisory findings do not fail validation");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "validate");
        assert_eq!(payload["report"]["valid"], true);
        assert_eq!(payload["report"]["findings"][0]["severity"], "advisory");
        assert_eq!(payload["report"]["findings"][0]["keys"][0], "B2");
    });
}

#[test]
fn validate_collects_every_fatal_finding() {
    with_env(&[], || {
        let workspace = Workspace::new();
        let mut records = lots(&[("B1", 250, Some("S1"))]);
        records.push_str(
            r#", { "campaign": 2025, "company": "1", "crop": "KAKIS", "lot_id": "B7",
                  "week": 13, "calibre": "Cal7", "category": "AAA", "net_weight": "40" }"#,
        );
        let bundle = workspace.bundle(&records, PRICES);

        let result = validate::run(&bundle, Some(&workspace.config));
        assert_eq!(result.exit_code, 4, "fatal findings fail validation");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "validation_findings");
        let codes: Vec<&str> = payload["report"]["findings"]
            .as_array()
            .map(|findings| findings.iter().filter_map(|f| f["code"].as_str()).collect())
            .unwrap_or_default();
        assert!(codes.contains(&"missing_week_prices"));
        assert!(codes.contains(&"unmapped_calibres"));
    });
}

#[test]
fn config_reports_file_and_env_sources() {
    with_env(&[("LIQUIDA_CAMPAIGN_COMPANY", "7")], || {
        let workspace = Workspace::new();

        let result = config::run(Some(&workspace.config));
        assert_eq!(result.exit_code, 0, "expected effective config: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("- campaign.id = 2025 (source: file ("), "{message}");
        assert!(message.contains("- campaign.company = 7 (source: env (LIQUIDA_CAMPAIGN_COMPANY))"));
        assert!(message.contains("- campaign.crop = KAKIS"));
        assert!(message.contains("- rejection.line = -0.01 (source: default)"));
    });
}

#[test]
fn config_rejects_invalid_file_with_config_exit_code() {
    with_env(&[], || {
        let workspace = Workspace::new();
        let invalid = workspace.path("invalid.toml");
        write_file(&invalid, &CONFIG.replace(r#"gross = "105000.00""#, r#"gross = "0""#));

        let result = config::run(Some(&invalid));
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("income.gross"), "{message}");
    });
}

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let config = dir.path().join("liquida.toml");
        fs::write(&config, CONFIG).expect("config file");
        Self { dir, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn bundle(&self, lots: &str, prices: &str) -> PathBuf {
        let path = self.path("bundle.json");
        let raw = format!(
            r#"{{
                "lots": [{lots}],
                "calibre_map": [{{ "calibre": "Cal0", "group": "G1" }}],
                "prices": {prices},
                "certification_records": [{{ "reference": "S1", "level": "N1" }}],
                "certification_levels": [{{ "level": "N1", "index": "1" }}]
            }}"#
        );
        write_file(&path, &raw);
        path
    }
}

fn lots(entries: &[(&str, i64, Option<&str>)]) -> String {
    entries
        .iter()
        .map(|(lot_id, weight, certification_ref)| {
            let certification = certification_ref
                .map(|reference| format!(r#", "certification_ref": "{reference}""#))
                .unwrap_or_default();
            format!(
                r#"{{ "campaign": 2025, "company": "1", "crop": "KAKIS", "lot_id": "{lot_id}",
                     "week": 12, "calibre": "Cal0", "category": "AAA",
                     "net_weight": "{weight}"{certification} }}"#
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_file(path: &Path, raw: &str) {
    fs::write(path, raw).expect("bundle file");
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(raw) => raw.parse().expect("decimal string"),
        other => other.to_string().parse().expect("decimal number"),
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "LIQUIDA_CAMPAIGN_ID",
        "LIQUIDA_CAMPAIGN_COMPANY",
        "LIQUIDA_CAMPAIGN_CROP",
        "LIQUIDA_INCOME_GROSS",
        "LIQUIDA_INCOME_OTHER_FUNDS",
        "LIQUIDA_REJECTION_LINE",
        "LIQUIDA_REJECTION_TABLE",
        "LIQUIDA_REJECTION_ROTTEN",
        "LIQUIDA_CERTIFICATION_BONUS_BASE",
        "LIQUIDA_PRICING_SECONDARY_RATIO",
        "LIQUIDA_LOGGING_LEVEL",
        "LIQUIDA_LOGGING_FORMAT",
        "LIQUIDA_LOG_LEVEL",
        "LIQUIDA_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
