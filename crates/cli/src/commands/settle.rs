use std::fs;
use std::path::Path;

use liquida_core::errors::ApplicationError;
use liquida_core::settlement::{DeterministicSettlementEngine, SettlementEngine, SettlementOutcome};

use crate::commands::{bundle, load_config, CommandResult};

pub fn run(input: &Path, output: Option<&Path>, config_path: Option<&Path>) -> CommandResult {
    match execute(input, output, config_path) {
        Ok(outcome) => {
            let summary = &outcome.summary;
            let mut message = format!(
                "settled {} lot(s) into {} final price(s); coefficient {}; descuadre {}; {} certification mismatch(es)",
                summary.lot_count,
                summary.final_price_count,
                summary.coefficient,
                summary.descuadre,
                summary.certification_mismatch_count,
            );
            match output {
                Some(path) => {
                    message.push_str(&format!("; written to {}", path.display()));
                    CommandResult::settled("settle", message, None)
                }
                None => CommandResult::settled("settle", message, Some(outcome)),
            }
        }
        Err(error) => CommandResult::from_error("settle", &error),
    }
}

fn execute(
    input: &Path,
    output: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<SettlementOutcome, ApplicationError> {
    let config = load_config(config_path)?;
    let settlement_input = bundle::load(input, &config)?;

    let engine = DeterministicSettlementEngine::default();
    let outcome = engine.settle(&settlement_input)?;

    if let Some(path) = output {
        write_outcome(path, &outcome)?;
    }

    Ok(outcome)
}

fn write_outcome(path: &Path, outcome: &SettlementOutcome) -> Result<(), ApplicationError> {
    let rendered = serde_json::to_string_pretty(outcome)
        .map_err(|error| ApplicationError::Output(error.to_string()))?;
    fs::write(path, rendered)
        .map_err(|error| ApplicationError::Output(format!("`{}`: {error}", path.display())))?;

    tracing::info!(
        event_name = "cli.settle.written",
        path = %path.display(),
        run_id = %outcome.run_id,
        "settlement outcome written"
    );
    Ok(())
}
