use std::collections::{BTreeSet, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::lot::{CampaignScope, LotId, LotKey, LotRecord};
use crate::domain::price::{PriceEntry, PriceKey};
use crate::errors::SettlementError;
use crate::settlement::calibre::CalibreMapper;
use crate::settlement::fund::{FundAllocator, FundResolution};
use crate::settlement::pricing::{PriceLookupError, PriceTable};
use crate::settlement::SettlementInput;

/// Absolute tolerance between reconciled and target income.
pub const CUADRE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Fatal,
    Advisory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub keys: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub findings: Vec<ValidationFinding>,
}

impl ValidationReport {
    fn push_fatal(&mut self, error: SettlementError) {
        let diagnostic = error.diagnostic();
        self.findings.push(ValidationFinding {
            code: diagnostic.code,
            severity: Severity::Fatal,
            message: diagnostic.message,
            keys: diagnostic.keys,
        });
    }

    pub fn fatal_count(&self) -> usize {
        self.findings.iter().filter(|finding| finding.severity == Severity::Fatal).count()
    }

    pub fn advisory_count(&self) -> usize {
        self.findings.iter().filter(|finding| finding.severity == Severity::Advisory).count()
    }
}

pub fn foreign_lots(lots: &[LotRecord], scope: &CampaignScope) -> Vec<LotId> {
    lots.iter()
        .filter(|lot| !lot.belongs_to(scope))
        .map(|lot| lot.lot_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Keys that appear more than once on the price side of the lot join.
pub fn duplicate_price_keys(entries: &[PriceEntry]) -> Vec<PriceKey> {
    duplicates(entries.iter().map(PriceEntry::key))
}

pub fn duplicate_lot_keys(lots: &[LotRecord]) -> Vec<LotKey> {
    duplicates(lots.iter().map(LotRecord::key))
}

/// Weeks with positive lot volume that the price table does not cover.
pub fn unpriced_weeks(lots: &[LotRecord], table: &PriceTable) -> Vec<u32> {
    lots.iter()
        .filter(|lot| lot.has_volume() && !table.has_week(lot.week))
        .map(|lot| lot.week)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Keys of lots with volume whose week is priced but that match no entry.
pub fn unmatched_price_keys(
    lots: &[LotRecord],
    mapper: &CalibreMapper,
    table: &PriceTable,
) -> Vec<PriceKey> {
    let mut missing = BTreeSet::new();
    for lot in lots.iter().filter(|lot| lot.has_volume()) {
        let Some(group) = mapper.map(&lot.calibre) else {
            continue;
        };
        if let Err(PriceLookupError::MissingKey { key }) =
            table.lookup(lot.week, group, &lot.category)
        {
            missing.insert(key);
        }
    }
    missing.into_iter().collect()
}

pub fn ensure_lot_scope(lots: &[LotRecord], scope: &CampaignScope) -> Result<(), SettlementError> {
    let lots = foreign_lots(lots, scope);
    if lots.is_empty() {
        Ok(())
    } else {
        Err(SettlementError::ForeignLots { lots })
    }
}

pub fn ensure_unique_price_keys(entries: &[PriceEntry]) -> Result<(), SettlementError> {
    let keys = duplicate_price_keys(entries);
    if keys.is_empty() {
        Ok(())
    } else {
        Err(SettlementError::DuplicatePriceKeys { keys })
    }
}

pub fn ensure_unique_lot_keys(lots: &[LotRecord]) -> Result<(), SettlementError> {
    let keys = duplicate_lot_keys(lots);
    if keys.is_empty() {
        Ok(())
    } else {
        Err(SettlementError::DuplicateLotKeys { keys })
    }
}

pub fn ensure_priced_weeks(lots: &[LotRecord], table: &PriceTable) -> Result<(), SettlementError> {
    let weeks = unpriced_weeks(lots, table);
    if weeks.is_empty() {
        Ok(())
    } else {
        Err(SettlementError::MissingWeekPrices { weeks })
    }
}

pub fn ensure_mapped_calibres(
    lots: &[LotRecord],
    mapper: &CalibreMapper,
) -> Result<(), SettlementError> {
    let calibres = mapper.unmapped(lots);
    if calibres.is_empty() {
        Ok(())
    } else {
        Err(SettlementError::UnmappedCalibres { calibres })
    }
}

pub fn ensure_matched_price_keys(
    lots: &[LotRecord],
    mapper: &CalibreMapper,
    table: &PriceTable,
) -> Result<(), SettlementError> {
    let keys = unmatched_price_keys(lots, mapper, table);
    if keys.is_empty() {
        Ok(())
    } else {
        Err(SettlementError::UnmatchedPriceKeys { keys })
    }
}

pub fn ensure_nonzero_theoretical_income(total: Decimal) -> Result<(), SettlementError> {
    if total.is_zero() {
        Err(SettlementError::ZeroTheoreticalIncome)
    } else {
        Ok(())
    }
}

/// Returns the descuadre when it is within tolerance.
pub fn check_cuadre(reconciled: Decimal, target: Decimal) -> Result<Decimal, SettlementError> {
    let descuadre = (reconciled - target).abs();
    if descuadre > CUADRE_TOLERANCE {
        return Err(SettlementError::Descuadre { reconciled, target, descuadre });
    }
    Ok(descuadre)
}

/// Ordered pre-solve checks; stops at the first fatal condition.
pub fn run_pre_checks(
    input: &SettlementInput,
) -> Result<(CalibreMapper, PriceTable, FundAllocator), SettlementError> {
    ensure_lot_scope(&input.lots, &input.parameters.scope)?;
    ensure_unique_price_keys(&input.prices)?;
    ensure_unique_lot_keys(&input.lots)?;

    let table = PriceTable::new(&input.prices)?;
    ensure_priced_weeks(&input.lots, &table)?;

    let mapper = CalibreMapper::new(&input.calibre_map)?;
    ensure_mapped_calibres(&input.lots, &mapper)?;
    ensure_matched_price_keys(&input.lots, &mapper, &table)?;

    let allocator = FundAllocator::new(
        input.parameters.bonus_base,
        &input.certification_records,
        &input.certification_levels,
    )?;

    Ok((mapper, table, allocator))
}

/// Runs every pre-solve check without stopping, for a dry-run report.
pub fn collect_findings(input: &SettlementInput) -> ValidationReport {
    let mut report = ValidationReport::default();
    let lots = &input.lots;

    if let Err(error) = ensure_lot_scope(lots, &input.parameters.scope) {
        report.push_fatal(error);
    }
    if let Err(error) = ensure_unique_lot_keys(lots) {
        report.push_fatal(error);
    }

    let table = match PriceTable::new(&input.prices) {
        Ok(table) => Some(table),
        Err(error) => {
            report.push_fatal(error);
            None
        }
    };
    if let Some(table) = &table {
        if let Err(error) = ensure_priced_weeks(lots, table) {
            report.push_fatal(error);
        }
    }

    let mapper = match CalibreMapper::new(&input.calibre_map) {
        Ok(mapper) => Some(mapper),
        Err(error) => {
            report.push_fatal(error);
            None
        }
    };
    if let Some(mapper) = &mapper {
        if let Err(error) = ensure_mapped_calibres(lots, mapper) {
            report.push_fatal(error);
        }
        if let Some(table) = &table {
            if let Err(error) = ensure_matched_price_keys(lots, mapper, table) {
                report.push_fatal(error);
            }
        }
    }

    match FundAllocator::new(
        input.parameters.bonus_base,
        &input.certification_records,
        &input.certification_levels,
    ) {
        Ok(allocator) => {
            for lot in lots {
                if let FundResolution::Unmatched(mismatch) = allocator.allocate(lot) {
                    report.findings.push(ValidationFinding {
                        code: mismatch.reason.as_str().to_string(),
                        severity: Severity::Advisory,
                        message: format!(
                            "lot {} settles without certification fund contribution",
                            mismatch.lot_id
                        ),
                        keys: vec![mismatch.lot_id.to_string()],
                    });
                }
            }
        }
        Err(error) => report.push_fatal(error),
    }

    report.valid = report.fatal_count() == 0;
    report
}

fn duplicates<K>(keys: impl Iterator<Item = K>) -> Vec<K>
where
    K: Clone + Eq + Ord + std::hash::Hash,
{
    let mut seen = HashSet::new();
    let mut repeated = BTreeSet::new();
    for key in keys {
        if !seen.insert(key.clone()) {
            repeated.insert(key);
        }
    }
    repeated.into_iter().collect()
}
