//! Final price aggregation, reconciliation summary and weekly breakdown.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{round_export, round_internal};
use crate::domain::grading::{CalibreCode, Category, EconomicGroup};
use crate::domain::lot::LotId;
use crate::domain::price::FinalPriceRecord;
use crate::settlement::fund::CertificationMismatch;
use crate::settlement::rejection::RejectionAdjustment;
use crate::settlement::solver::Reconciliation;

/// One lot after valuation and reconciliation. Amounts are at internal scale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledLot {
    pub lot_id: LotId,
    pub week: u32,
    pub calibre: CalibreCode,
    pub category: Category,
    pub group: EconomicGroup,
    pub net_weight: Decimal,
    /// `None` for lots without commercial volume; they are never priced.
    pub relative_price: Option<Decimal>,
    pub commercial_value: Decimal,
    pub rejection: RejectionAdjustment,
    pub fund_contribution: Decimal,
    pub theoretical_income: Decimal,
    pub final_value: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub campaign: u32,
    pub coefficient: Decimal,
    pub gross_income: Decimal,
    pub other_funds: Decimal,
    pub target_income: Decimal,
    pub theoretical_total: Decimal,
    pub reconciled_total: Decimal,
    pub descuadre: Decimal,
    pub total_net_weight: Decimal,
    pub lot_count: usize,
    pub final_price_count: usize,
    pub certification_mismatch_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub week: u32,
    pub commercial_weight: Decimal,
    pub theoretical_income: Decimal,
    pub final_value: Decimal,
    pub lot_count: usize,
}

/// Final price per (week, calibre, category) for lots carrying volume.
///
/// Lots sharing a key share a relative price, so the first priced lot decides.
pub fn final_prices(
    campaign: u32,
    coefficient: Decimal,
    lots: &[SettledLot],
) -> Vec<FinalPriceRecord> {
    let mut by_key: BTreeMap<(u32, CalibreCode, Category), Decimal> = BTreeMap::new();
    for lot in lots {
        let Some(relative_price) = lot.relative_price else {
            continue;
        };
        by_key
            .entry((lot.week, lot.calibre.clone(), lot.category.clone()))
            .or_insert(relative_price);
    }

    by_key
        .into_iter()
        .map(|((week, calibre, category), relative_price)| FinalPriceRecord {
            campaign,
            week,
            calibre,
            category,
            final_price: round_export(coefficient * relative_price),
        })
        .collect()
}

pub fn weekly_summary(lots: &[SettledLot]) -> Vec<WeeklySummary> {
    let mut weeks: BTreeMap<u32, WeeklySummary> = BTreeMap::new();
    for lot in lots {
        let entry = weeks.entry(lot.week).or_insert_with(|| WeeklySummary {
            week: lot.week,
            commercial_weight: Decimal::ZERO,
            theoretical_income: Decimal::ZERO,
            final_value: Decimal::ZERO,
            lot_count: 0,
        });
        entry.commercial_weight += lot.net_weight;
        entry.theoretical_income += lot.theoretical_income;
        entry.final_value += lot.final_value;
        entry.lot_count += 1;
    }

    weeks
        .into_values()
        .map(|week| WeeklySummary {
            theoretical_income: round_export(week.theoretical_income),
            final_value: round_export(week.final_value),
            ..week
        })
        .collect()
}

pub fn summarize(
    campaign: u32,
    gross_income: Decimal,
    other_funds: Decimal,
    reconciliation: &Reconciliation,
    lots: &[SettledLot],
    final_prices: &[FinalPriceRecord],
    audit: &[CertificationMismatch],
) -> ReconciliationSummary {
    ReconciliationSummary {
        campaign,
        coefficient: reconciliation.coefficient_rounded(),
        gross_income,
        other_funds,
        target_income: reconciliation.target,
        theoretical_total: round_internal(reconciliation.theoretical_total),
        reconciled_total: round_export(reconciliation.reconciled_total),
        descuadre: round_internal(reconciliation.descuadre),
        total_net_weight: lots.iter().map(|lot| lot.net_weight).sum(),
        lot_count: lots.len(),
        final_price_count: final_prices.len(),
        certification_mismatch_count: audit.len(),
    }
}
