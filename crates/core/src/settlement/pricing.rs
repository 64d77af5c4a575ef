use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::decimal::round_internal;
use crate::domain::grading::{Category, EconomicGroup};
use crate::domain::price::{PriceEntry, PriceKey};
use crate::errors::SettlementError;
use crate::settlement::validator::duplicate_price_keys;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PriceLookupError {
    #[error("missing orientative price for week {week}")]
    MissingWeek { week: u32 },
    #[error("no price entry for {key}")]
    MissingKey { key: PriceKey },
}

impl From<PriceLookupError> for SettlementError {
    fn from(error: PriceLookupError) -> Self {
        match error {
            PriceLookupError::MissingWeek { week } => Self::MissingWeekPrices { weeks: vec![week] },
            PriceLookupError::MissingKey { key } => Self::UnmatchedPriceKeys { keys: vec![key] },
        }
    }
}

/// Relative price matrix indexed by (week, economic group, category).
#[derive(Clone, Debug, Default)]
pub struct PriceTable {
    prices: HashMap<PriceKey, Decimal>,
    weeks: BTreeSet<u32>,
}

impl PriceTable {
    /// Builds the index, rejecting any repeated key so the lot join stays
    /// many-to-one.
    pub fn new(entries: &[PriceEntry]) -> Result<Self, SettlementError> {
        let duplicates = duplicate_price_keys(entries);
        if !duplicates.is_empty() {
            return Err(SettlementError::DuplicatePriceKeys { keys: duplicates });
        }

        let prices = entries
            .iter()
            .map(|entry| (entry.key(), round_internal(entry.relative_price)))
            .collect();
        let weeks = entries.iter().map(|entry| entry.week).collect();

        Ok(Self { prices, weeks })
    }

    pub fn has_week(&self, week: u32) -> bool {
        self.weeks.contains(&week)
    }

    pub fn weeks(&self) -> impl Iterator<Item = u32> + '_ {
        self.weeks.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn lookup(
        &self,
        week: u32,
        group: &EconomicGroup,
        category: &Category,
    ) -> Result<Decimal, PriceLookupError> {
        if !self.has_week(week) {
            return Err(PriceLookupError::MissingWeek { week });
        }

        let key = PriceKey::new(week, group.clone(), category.clone());
        match self.prices.get(&key) {
            Some(price) => Ok(*price),
            None => Err(PriceLookupError::MissingKey { key }),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{PriceLookupError, PriceTable};
    use crate::domain::grading::{Category, EconomicGroup};
    use crate::domain::price::{PriceEntry, PriceKey};
    use crate::errors::SettlementError;

    fn group(value: &str) -> EconomicGroup {
        EconomicGroup::new(value)
    }

    fn category(value: &str) -> Category {
        Category::new(value)
    }

    #[test]
    fn lookup_rounds_to_four_fraction_digits() {
        let table =
            PriceTable::new(&[PriceEntry::new(12, "G1", "I", Decimal::new(1_234_567, 6))])
                .expect("table");

        let price = table.lookup(12, &group("G1"), &category("I")).expect("price");
        assert_eq!(price, Decimal::new(12_346, 4));
    }

    #[test]
    fn duplicate_keys_abort_before_indexing() {
        let error = PriceTable::new(&[
            PriceEntry::new(12, "G1", "AAA", Decimal::ONE),
            PriceEntry::new(12, "G1", "AAA", Decimal::TWO),
            PriceEntry::new(13, "G1", "AAA", Decimal::ONE),
        ])
        .expect_err("duplicate");

        assert_eq!(
            error,
            SettlementError::DuplicatePriceKeys {
                keys: vec![PriceKey::new(12, group("G1"), category("AAA"))]
            }
        );
    }

    #[test]
    fn missing_week_is_distinguished_from_missing_key() {
        let table =
            PriceTable::new(&[PriceEntry::new(12, "G1", "I", Decimal::ONE)]).expect("table");

        assert_eq!(
            table.lookup(13, &group("G1"), &category("I")),
            Err(PriceLookupError::MissingWeek { week: 13 })
        );
        assert_eq!(
            table.lookup(12, &group("G2"), &category("I")),
            Err(PriceLookupError::MissingKey {
                key: PriceKey::new(12, group("G2"), category("I"))
            })
        );
    }

    #[test]
    fn zero_price_is_a_real_entry_not_a_gap() {
        let table =
            PriceTable::new(&[PriceEntry::new(12, "G1", "I", Decimal::ZERO)]).expect("table");
        assert_eq!(table.lookup(12, &group("G1"), &category("I")), Ok(Decimal::ZERO));
        assert_eq!(table.len(), 1);
        assert_eq!(table.weeks().collect::<Vec<_>>(), vec![12]);
    }
}
