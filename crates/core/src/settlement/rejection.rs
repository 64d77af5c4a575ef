use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::RejectionConfig;
use crate::decimal::round_internal;
use crate::domain::lot::RejectWeights;

/// Per-kg unit values for the three downgrade classes.
///
/// Values are normally negative. A positive value is accepted as-is and
/// turns that class into a credit rather than a deduction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionPrices {
    pub line: Decimal,
    pub table: Decimal,
    pub rotten: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionAdjustment {
    pub line: Decimal,
    pub table: Decimal,
    pub rotten: Decimal,
    pub total: Decimal,
}

impl RejectionPrices {
    pub fn new(line: Decimal, table: Decimal, rotten: Decimal) -> Self {
        Self { line, table, rotten }
    }

    /// Classes whose configured value would add to, not subtract from, income.
    pub fn positive_classes(&self) -> Vec<&'static str> {
        [("line", self.line), ("table", self.table), ("rotten", self.rotten)]
            .into_iter()
            .filter(|(_, price)| *price > Decimal::ZERO)
            .map(|(name, _)| name)
            .collect()
    }
}

impl From<&RejectionConfig> for RejectionPrices {
    fn from(config: &RejectionConfig) -> Self {
        Self::new(config.line, config.table, config.rotten)
    }
}

#[derive(Clone, Debug)]
pub struct RejectionValuer {
    prices: RejectionPrices,
}

impl RejectionValuer {
    pub fn new(prices: RejectionPrices) -> Self {
        let positive = prices.positive_classes();
        if !positive.is_empty() {
            tracing::warn!(
                event_name = "settlement.rejection.positive_unit_price",
                classes = %positive.join(","),
                "positive reject unit price configured; those classes add to theoretical income"
            );
        }
        Self { prices }
    }

    pub fn prices(&self) -> &RejectionPrices {
        &self.prices
    }

    pub fn value(&self, weights: &RejectWeights) -> RejectionAdjustment {
        let line = round_internal(weights.line * self.prices.line);
        let table = round_internal(weights.table * self.prices.table);
        let rotten = round_internal(weights.rotten * self.prices.rotten);

        RejectionAdjustment { line, table, rotten, total: line + table + rotten }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{RejectionPrices, RejectionValuer};
    use crate::domain::lot::RejectWeights;

    fn weights(line: i64, table: i64, rotten: i64) -> RejectWeights {
        RejectWeights {
            line: Decimal::new(line, 0),
            table: Decimal::new(table, 0),
            rotten: Decimal::new(rotten, 0),
        }
    }

    #[test]
    fn deduction_sums_each_class() {
        let valuer = RejectionValuer::new(RejectionPrices::new(
            Decimal::new(-1, 2),
            Decimal::new(-2, 2),
            Decimal::new(-3, 2),
        ));

        let adjustment = valuer.value(&weights(100, 50, 10));
        assert_eq!(adjustment.line, Decimal::new(-1, 0));
        assert_eq!(adjustment.table, Decimal::new(-1, 0));
        assert_eq!(adjustment.rotten, Decimal::new(-3, 1));
        assert_eq!(adjustment.total, Decimal::new(-23, 1));
    }

    #[test]
    fn non_positive_prices_never_yield_a_credit() {
        let valuer = RejectionValuer::new(RejectionPrices::new(
            Decimal::ZERO,
            Decimal::new(-15, 3),
            Decimal::new(-4, 2),
        ));

        for sample in [weights(0, 0, 0), weights(7, 3, 1), weights(1_000, 2_000, 3_000)] {
            assert!(valuer.value(&sample).total <= Decimal::ZERO);
        }
    }

    #[test]
    fn positive_price_is_flagged_and_reduces_the_deduction() {
        let prices = RejectionPrices::new(Decimal::new(1, 2), Decimal::new(-2, 2), Decimal::ZERO);
        assert_eq!(prices.positive_classes(), vec!["line"]);

        let adjustment = RejectionValuer::new(prices).value(&weights(100, 100, 0));
        assert_eq!(adjustment.total, Decimal::new(-1, 0));
    }

    #[test]
    fn fractional_weights_round_to_internal_scale() {
        let valuer = RejectionValuer::new(RejectionPrices::new(
            Decimal::new(-333, 4),
            Decimal::ZERO,
            Decimal::ZERO,
        ));
        let sample = RejectWeights { line: Decimal::new(15, 1), ..RejectWeights::default() };

        // 1.5 * -0.0333 = -0.04995 -> -0.0500 under banker's rounding
        assert_eq!(valuer.value(&sample).line, Decimal::new(-500, 4));
    }
}
