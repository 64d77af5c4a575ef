//! Normalises the pricing authority's weekly matrix into relative prices.
//!
//! The authority publishes value and volume per calibre band. Bands are
//! folded into economic groups by kg-weighted mean, then every group is
//! expressed relative to the reference group in the reference week.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;

use crate::config::PricingConfig;
use crate::decimal::round_internal;
use crate::domain::grading::{Category, EconomicGroup};
use crate::domain::price::{AuthorityPriceRow, PriceEntry};
use crate::errors::SettlementError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorityScheme {
    pub reference_group: EconomicGroup,
    pub primary_category: Category,
    pub secondary_category: Category,
    pub secondary_ratio: Decimal,
    pub groups: BTreeMap<EconomicGroup, Vec<String>>,
}

impl From<&PricingConfig> for AuthorityScheme {
    fn from(config: &PricingConfig) -> Self {
        Self {
            reference_group: EconomicGroup::new(config.reference_group.clone()),
            primary_category: Category::new(config.primary_category.clone()),
            secondary_category: Category::new(config.secondary_category.clone()),
            secondary_ratio: config.secondary_ratio,
            groups: config
                .groups
                .iter()
                .map(|(group, members)| (EconomicGroup::new(group.clone()), members.clone()))
                .collect(),
        }
    }
}

/// Base (absolute) price of one economic group in one week.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupBasePrice {
    pub week: u32,
    pub group: EconomicGroup,
    pub base_price: Decimal,
}

pub fn group_base_prices(
    rows: &[AuthorityPriceRow],
    scheme: &AuthorityScheme,
) -> Result<Vec<GroupBasePrice>, SettlementError> {
    if rows.is_empty() {
        return Err(SettlementError::EmptyAuthorityMatrix);
    }

    let mut by_week: BTreeMap<u32, BTreeMap<&str, &AuthorityPriceRow>> = BTreeMap::new();
    let mut duplicates = BTreeSet::new();
    for row in rows {
        let band = row.authority_group.trim();
        if by_week.entry(row.week).or_default().insert(band, row).is_some() {
            duplicates.insert(format!("week {}/{}", row.week, band));
        }
    }
    if !duplicates.is_empty() {
        return Err(SettlementError::DuplicateAuthorityRows {
            rows: duplicates.into_iter().collect(),
        });
    }

    let mut prices = Vec::new();
    for (week, bands) in &by_week {
        for (group, members) in &scheme.groups {
            let present: Vec<&AuthorityPriceRow> =
                members.iter().filter_map(|member| bands.get(member.trim()).copied()).collect();
            prices.push(GroupBasePrice {
                week: *week,
                group: group.clone(),
                base_price: weighted_mean(&present),
            });
        }
    }

    Ok(prices)
}

/// Relative price entries for both categories of every (week, group).
///
/// `lot_weeks` are the weeks carrying commercial volume; the first matrix week
/// among them is the reference week.
pub fn derive_relative_prices(
    rows: &[AuthorityPriceRow],
    scheme: &AuthorityScheme,
    lot_weeks: &BTreeSet<u32>,
) -> Result<Vec<PriceEntry>, SettlementError> {
    let base_prices = group_base_prices(rows, scheme)?;

    let reference_week = base_prices
        .iter()
        .map(|price| price.week)
        .find(|week| lot_weeks.contains(week))
        .ok_or(SettlementError::NoReferenceWeek)?;
    let reference_price = base_prices
        .iter()
        .find(|price| price.week == reference_week && price.group == scheme.reference_group)
        .map(|price| price.base_price)
        .unwrap_or(Decimal::ZERO);
    if reference_price <= Decimal::ZERO {
        return Err(SettlementError::InvalidReferencePrice {
            week: reference_week,
            price: reference_price,
        });
    }

    tracing::debug!(
        event_name = "settlement.pricing.reference_week",
        reference_week,
        reference_price = %reference_price,
        "authority matrix reference selected"
    );

    let mut entries = Vec::with_capacity(base_prices.len() * 2);
    for price in base_prices {
        let primary = round_internal(price.base_price / reference_price);
        let secondary = round_internal(primary * scheme.secondary_ratio);
        entries.push(PriceEntry {
            week: price.week,
            group: price.group.clone(),
            category: scheme.primary_category.clone(),
            relative_price: primary,
        });
        entries.push(PriceEntry {
            week: price.week,
            group: price.group,
            category: scheme.secondary_category.clone(),
            relative_price: secondary,
        });
    }

    Ok(entries)
}

fn weighted_mean(rows: &[&AuthorityPriceRow]) -> Decimal {
    let total_kg: Decimal = rows.iter().map(|row| row.kg).sum();
    if total_kg > Decimal::ZERO {
        let weighted: Decimal = rows.iter().map(|row| row.kg * row.value).sum();
        return weighted / total_kg;
    }

    match rows {
        [single] => single.value,
        _ => Decimal::ZERO,
    }
}
