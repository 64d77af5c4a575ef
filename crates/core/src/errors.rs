use std::fmt::Display;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::grading::CalibreCode;
use crate::domain::lot::{LotId, LotKey};
use crate::domain::price::PriceKey;

/// Fatal conditions; any of them aborts a run before output is emitted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SettlementError {
    #[error("lot records outside the campaign scope: {}", join(.lots))]
    ForeignLots { lots: Vec<LotId> },
    #[error("duplicate price entries for keys: {}", join(.keys))]
    DuplicatePriceKeys { keys: Vec<PriceKey> },
    #[error("duplicate lot records for keys: {}", join(.keys))]
    DuplicateLotKeys { keys: Vec<LotKey> },
    #[error("conflicting economic groups mapped for calibres: {}", join(.calibres))]
    ConflictingCalibreMapping { calibres: Vec<CalibreCode> },
    #[error("duplicate certification records for references: {}", .references.join(", "))]
    DuplicateCertificationRecords { references: Vec<String> },
    #[error("duplicate certification levels: {}", .levels.join(", "))]
    DuplicateCertificationLevels { levels: Vec<String> },
    #[error("missing orientative price for weeks with lot volume: {}", join(.weeks))]
    MissingWeekPrices { weeks: Vec<u32> },
    #[error("calibres without economic group mapping: {}", join(.calibres))]
    UnmappedCalibres { calibres: Vec<CalibreCode> },
    #[error("lots match no price entry for keys: {}", join(.keys))]
    UnmatchedPriceKeys { keys: Vec<PriceKey> },
    #[error("aggregate theoretical income is zero; cannot reconcile against nothing")]
    ZeroTheoreticalIncome,
    #[error(
        "descuadre over tolerance: reconciled={reconciled} target={target} descuadre={descuadre}"
    )]
    Descuadre { reconciled: Decimal, target: Decimal, descuadre: Decimal },
    #[error("pricing authority matrix is empty")]
    EmptyAuthorityMatrix,
    #[error("duplicate authority matrix rows: {}", .rows.join(", "))]
    DuplicateAuthorityRows { rows: Vec<String> },
    #[error("no reference week: no authority week has commercial lot volume")]
    NoReferenceWeek,
    #[error("reference week {week} is invalid: reference group base price {price} <= 0")]
    InvalidReferencePrice { week: u32, price: Decimal },
}

/// Serializable form of a fatal condition, naming the offending keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementDiagnostic {
    pub code: String,
    pub message: String,
    pub keys: Vec<String>,
}

impl SettlementError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ForeignLots { .. } => "foreign_lots",
            Self::DuplicatePriceKeys { .. } => "duplicate_price_keys",
            Self::DuplicateLotKeys { .. } => "duplicate_lot_keys",
            Self::ConflictingCalibreMapping { .. } => "conflicting_calibre_mapping",
            Self::DuplicateCertificationRecords { .. } => "duplicate_certification_records",
            Self::DuplicateCertificationLevels { .. } => "duplicate_certification_levels",
            Self::MissingWeekPrices { .. } => "missing_week_prices",
            Self::UnmappedCalibres { .. } => "unmapped_calibres",
            Self::UnmatchedPriceKeys { .. } => "unmatched_price_keys",
            Self::ZeroTheoreticalIncome => "zero_theoretical_income",
            Self::Descuadre { .. } => "descuadre",
            Self::EmptyAuthorityMatrix => "empty_authority_matrix",
            Self::DuplicateAuthorityRows { .. } => "duplicate_authority_rows",
            Self::NoReferenceWeek => "no_reference_week",
            Self::InvalidReferencePrice { .. } => "invalid_reference_price",
        }
    }

    pub fn keys(&self) -> Vec<String> {
        match self {
            Self::ForeignLots { lots } => strings(lots),
            Self::DuplicatePriceKeys { keys } | Self::UnmatchedPriceKeys { keys } => strings(keys),
            Self::DuplicateLotKeys { keys } => strings(keys),
            Self::ConflictingCalibreMapping { calibres } | Self::UnmappedCalibres { calibres } => {
                strings(calibres)
            }
            Self::DuplicateCertificationRecords { references } => references.clone(),
            Self::DuplicateCertificationLevels { levels } => levels.clone(),
            Self::DuplicateAuthorityRows { rows } => rows.clone(),
            Self::MissingWeekPrices { weeks } => strings(weeks),
            Self::InvalidReferencePrice { week, .. } => vec![week.to_string()],
            Self::ZeroTheoreticalIncome
            | Self::Descuadre { .. }
            | Self::EmptyAuthorityMatrix
            | Self::NoReferenceWeek => Vec::new(),
        }
    }

    pub fn diagnostic(&self) -> SettlementDiagnostic {
        SettlementDiagnostic {
            code: self.code().to_string(),
            message: self.to_string(),
            keys: self.keys(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("input bundle failure: {0}")]
    Input(String),
    #[error("could not write settlement output: {0}")]
    Output(String),
}

impl ApplicationError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Settlement(error) => error.code(),
            Self::Configuration(_) => "config_validation",
            Self::Input(_) => "input_bundle",
            Self::Output(_) => "output_write",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Output(_) => 1,
            Self::Configuration(_) => 2,
            Self::Input(_) => 3,
            Self::Settlement(_) => 4,
        }
    }
}

fn join<T: Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn strings<T: Display>(items: &[T]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use crate::config::ConfigError;
    use crate::domain::grading::{CalibreCode, Category, EconomicGroup};
    use crate::domain::price::PriceKey;
    use crate::errors::{ApplicationError, SettlementError};

    #[test]
    fn duplicate_price_diagnostic_names_offending_key() {
        let error = SettlementError::DuplicatePriceKeys {
            keys: vec![PriceKey::new(12, EconomicGroup::new("G1"), Category::new("AAA"))],
        };

        let diagnostic = error.diagnostic();
        assert_eq!(diagnostic.code, "duplicate_price_keys");
        assert_eq!(diagnostic.keys, vec!["week 12/G1/AAA".to_string()]);
        assert!(diagnostic.message.contains("week 12/G1/AAA"));
    }

    #[test]
    fn unmapped_calibres_lists_every_code() {
        let error = SettlementError::UnmappedCalibres {
            calibres: vec![CalibreCode::new("Cal10"), CalibreCode::new("Cal11")],
        };
        assert_eq!(error.to_string(), "calibres without economic group mapping: Cal10, Cal11");
    }

    #[test]
    fn application_errors_map_to_distinct_exit_codes() {
        let config = ApplicationError::from(ConfigError::Validation("bad".to_string()));
        let input = ApplicationError::Input("missing file".to_string());
        let settlement = ApplicationError::from(SettlementError::ZeroTheoreticalIncome);

        assert_eq!(config.exit_code(), 2);
        assert_eq!(input.exit_code(), 3);
        assert_eq!(settlement.exit_code(), 4);
        assert_eq!(settlement.error_class(), "zero_theoretical_income");
    }
}
