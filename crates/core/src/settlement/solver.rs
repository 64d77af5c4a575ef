//! Closed-form reconciliation of theoretical income against actual income.
//!
//! `c = (gross - other_funds) / T`, applied to every lot's theoretical
//! income. The coefficient keeps full decimal precision; each scaled lot value
//! is held at the internal 4-digit scale and only rounded to 2 digits on
//! export. Per-lot rounding leaves a residual against the target; it is
//! booked in one step on the lot with the largest scaled value, so the
//! reconciled total does not drift with the lot count.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{round_internal, INTERNAL_SCALE};
use crate::errors::SettlementError;
use crate::settlement::validator::{check_cuadre, ensure_nonzero_theoretical_income};

/// weight x relative price + rejection adjustment + fund contribution.
pub fn theoretical_income(
    net_weight: Decimal,
    relative_price: Decimal,
    rejection_adjustment: Decimal,
    fund_contribution: Decimal,
) -> Decimal {
    round_internal(net_weight * relative_price) + rejection_adjustment + fund_contribution
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub coefficient: Decimal,
    pub target: Decimal,
    pub theoretical_total: Decimal,
    pub reconciled_total: Decimal,
    pub descuadre: Decimal,
    /// Rounding residual booked on `residual_lot`.
    pub residual: Decimal,
    pub residual_lot: Option<usize>,
}

impl Reconciliation {
    /// Coefficient at reporting precision.
    pub fn coefficient_rounded(&self) -> Decimal {
        self.coefficient.round_dp(INTERNAL_SCALE)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconciliationSolver {
    gross_income: Decimal,
    other_funds: Decimal,
}

impl ReconciliationSolver {
    pub fn new(gross_income: Decimal, other_funds: Decimal) -> Self {
        Self { gross_income, other_funds }
    }

    /// Amount the scaled theoretical income must add up to.
    pub fn target(&self) -> Decimal {
        self.gross_income - self.other_funds
    }

    pub fn coefficient(&self, theoretical_total: Decimal) -> Result<Decimal, SettlementError> {
        ensure_nonzero_theoretical_income(theoretical_total)?;
        Ok(self.target() / theoretical_total)
    }

    pub fn scale(coefficient: Decimal, theoretical: Decimal) -> Decimal {
        round_internal(coefficient * theoretical)
    }

    /// Solves for the coefficient, scales every lot and enforces the cuadre.
    pub fn reconcile(
        &self,
        theoretical: &[Decimal],
    ) -> Result<(Reconciliation, Vec<Decimal>), SettlementError> {
        let theoretical_total: Decimal = theoretical.iter().copied().sum();
        let coefficient = self.coefficient(theoretical_total)?;

        let mut finals: Vec<Decimal> =
            theoretical.iter().map(|value| Self::scale(coefficient, *value)).collect();
        let target = self.target();
        let scaled_total: Decimal = finals.iter().copied().sum();
        let residual = round_internal(target - scaled_total);
        let residual_lot = largest_value(&finals);
        if let Some(index) = residual_lot {
            finals[index] += residual;
        }

        let reconciled_total: Decimal = finals.iter().copied().sum();
        let descuadre = check_cuadre(reconciled_total, target)?;

        Ok((
            Reconciliation {
                coefficient,
                target,
                theoretical_total,
                reconciled_total,
                descuadre,
                residual,
                residual_lot,
            },
            finals,
        ))
    }
}

/// Index of the largest absolute value; the first one wins ties.
fn largest_value(values: &[Decimal]) -> Option<usize> {
    let mut largest: Option<(usize, Decimal)> = None;
    for (index, value) in values.iter().enumerate() {
        let magnitude = value.abs();
        if largest.map_or(true, |(_, current)| magnitude > current) {
            largest = Some((index, magnitude));
        }
    }
    largest.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{theoretical_income, ReconciliationSolver};
    use crate::decimal::round_export;
    use crate::errors::SettlementError;

    #[test]
    fn coefficient_scales_theoretical_to_gross_income() {
        let solver = ReconciliationSolver::new(Decimal::new(105_000, 0), Decimal::ZERO);
        let theoretical = vec![
            Decimal::new(2_500_000, 4),
            Decimal::new(49_750_0000, 4),
            Decimal::new(50_000_0000, 4),
        ];

        let (reconciliation, finals) = solver.reconcile(&theoretical).expect("reconciled");
        assert_eq!(reconciliation.theoretical_total, Decimal::new(100_000, 0));
        assert_eq!(reconciliation.coefficient_rounded(), Decimal::new(10_500, 4));
        assert_eq!(round_export(finals[0]), Decimal::new(26_250, 2));
        assert_eq!(reconciliation.descuadre, Decimal::ZERO);
    }

    #[test]
    fn zero_theoretical_income_cannot_be_reconciled() {
        let solver = ReconciliationSolver::new(Decimal::new(100_000, 0), Decimal::ZERO);
        let error = solver.reconcile(&[Decimal::ZERO, Decimal::ZERO]).expect_err("zero total");
        assert_eq!(error, SettlementError::ZeroTheoreticalIncome);
        let error = solver.reconcile(&[]).expect_err("empty");
        assert_eq!(error, SettlementError::ZeroTheoreticalIncome);
    }

    #[test]
    fn other_funds_reduce_the_target_flatly() {
        let solver = ReconciliationSolver::new(Decimal::new(1_000, 0), Decimal::new(200, 0));
        let (reconciliation, finals) =
            solver.reconcile(&[Decimal::new(300, 0), Decimal::new(100, 0)]).expect("reconciled");

        assert_eq!(reconciliation.target, Decimal::new(800, 0));
        assert_eq!(reconciliation.coefficient, Decimal::TWO);
        assert_eq!(finals, vec![Decimal::new(600, 0), Decimal::new(200, 0)]);
    }

    #[test]
    fn reconciled_total_stays_within_tolerance_for_awkward_ratios() {
        let solver = ReconciliationSolver::new(Decimal::new(1_000_000, 0), Decimal::ZERO);
        let theoretical: Vec<Decimal> = (1..=150).map(|i| Decimal::new(i * 7 + 13, 3)).collect();

        let (reconciliation, finals) = solver.reconcile(&theoretical).expect("reconciled");
        let sum: Decimal = finals.iter().copied().sum();
        assert!((sum - Decimal::new(1_000_000, 0)).abs() <= Decimal::new(1, 2));
        assert!(reconciliation.descuadre <= Decimal::new(1, 2));
    }

    #[test]
    fn rounding_residual_does_not_accumulate_over_large_campaigns() {
        let gross = Decimal::new(333_333_333, 2);
        let solver = ReconciliationSolver::new(gross, Decimal::ZERO);
        // deterministic spread over (0, 500] with awkward fractions
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let theoretical: Vec<Decimal> = (0..60_000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                Decimal::new((state % 5_000_000) as i64 + 1, 4)
            })
            .collect();

        let (reconciliation, finals) = solver.reconcile(&theoretical).expect("reconciled");
        assert_eq!(finals.len(), 60_000);
        assert!(finals.iter().all(|value| value.scale() <= 4));
        assert_eq!(reconciliation.reconciled_total, gross);
        assert_eq!(reconciliation.descuadre, Decimal::ZERO);

        let index = reconciliation.residual_lot.expect("residual lot");
        let unadjusted = ReconciliationSolver::scale(reconciliation.coefficient, theoretical[index]);
        assert_eq!(finals[index] - unadjusted, reconciliation.residual);
    }

    #[test]
    fn residual_is_booked_on_the_largest_lot() {
        let solver = ReconciliationSolver::new(Decimal::new(10, 0), Decimal::ZERO);
        let (reconciliation, finals) = solver
            .reconcile(&[Decimal::ONE, Decimal::ONE, Decimal::new(2, 0)])
            .expect("reconciled");

        // c = 2.5; 2.5 + 2.5 + 5 needs no correction
        assert_eq!(reconciliation.residual, Decimal::ZERO);
        assert_eq!(reconciliation.residual_lot, Some(2));
        assert_eq!(finals.iter().copied().sum::<Decimal>(), Decimal::new(10, 0));

        let solver = ReconciliationSolver::new(Decimal::new(1, 0), Decimal::ZERO);
        let (reconciliation, finals) = solver
            .reconcile(&[Decimal::ONE, Decimal::ONE, Decimal::new(2, 0)])
            .expect("reconciled");
        // c = 0.25 exactly
        assert_eq!(finals, vec![Decimal::new(25, 2), Decimal::new(25, 2), Decimal::new(5, 1)]);
        assert_eq!(reconciliation.descuadre, Decimal::ZERO);

        let solver = ReconciliationSolver::new(Decimal::new(1, 0), Decimal::ZERO);
        let thirds = [Decimal::ONE, Decimal::ONE, Decimal::ONE];
        let (reconciliation, finals) = solver.reconcile(&thirds).expect("reconciled");
        // three lots of 0.3333 leave 0.0001 for the first one
        assert_eq!(reconciliation.residual, Decimal::new(1, 4));
        assert_eq!(reconciliation.residual_lot, Some(0));
        assert_eq!(finals[0], Decimal::new(3_334, 4));
        assert_eq!(finals[1], Decimal::new(3_333, 4));
    }

    #[test]
    fn theoretical_income_adds_adjustments_after_rounding_the_product() {
        let value = theoretical_income(
            Decimal::new(1_234, 1),
            Decimal::new(12_345, 4),
            Decimal::new(-25, 1),
            Decimal::new(1, 0),
        );
        // 123.4 * 1.2345 = 152.3373 ; -2.5 + 1.0
        assert_eq!(value, Decimal::new(1_508_373, 4));
    }
}
