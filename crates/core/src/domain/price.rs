use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::grading::{CalibreCode, Category, EconomicGroup};

/// Join key between lots and the relative price matrix.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PriceKey {
    pub week: u32,
    pub group: EconomicGroup,
    pub category: Category,
}

impl PriceKey {
    pub fn new(week: u32, group: EconomicGroup, category: Category) -> Self {
        Self { week, group, category }
    }
}

impl fmt::Display for PriceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "week {}/{}/{}", self.week, self.group, self.category)
    }
}

/// Relative (pre-coefficient) price for one key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub week: u32,
    pub group: EconomicGroup,
    pub category: Category,
    pub relative_price: Decimal,
}

impl PriceEntry {
    pub fn new(
        week: u32,
        group: impl Into<String>,
        category: impl Into<String>,
        relative_price: Decimal,
    ) -> Self {
        Self {
            week,
            group: EconomicGroup::new(group),
            category: Category::new(category),
            relative_price,
        }
    }

    pub fn key(&self) -> PriceKey {
        PriceKey::new(self.week, self.group.clone(), self.category.clone())
    }
}

/// One row of the pricing authority's normalised matrix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityPriceRow {
    pub week: u32,
    pub authority_group: String,
    pub kg: Decimal,
    pub value: Decimal,
}

/// Externally visible unit of settlement, at export precision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalPriceRecord {
    pub campaign: u32,
    pub week: u32,
    pub calibre: CalibreCode,
    pub category: Category,
    pub final_price: Decimal,
}
