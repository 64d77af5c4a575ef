use std::path::Path;

use liquida_core::settlement::validator::collect_findings;

use crate::commands::{bundle, load_config, CommandResult};

/// Dry run: every pre-solve check, no reconciliation.
pub fn run(input: &Path, config_path: Option<&Path>) -> CommandResult {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(error) => return CommandResult::from_error("validate", &error),
    };
    let settlement_input = match bundle::load(input, &config) {
        Ok(settlement_input) => settlement_input,
        Err(error) => return CommandResult::from_error("validate", &error),
    };

    let report = collect_findings(&settlement_input);
    tracing::info!(
        event_name = "cli.validate.completed",
        valid = report.valid,
        fatal = report.fatal_count(),
        advisory = report.advisory_count(),
        "validation report ready"
    );
    CommandResult::validated("validate", report)
}
