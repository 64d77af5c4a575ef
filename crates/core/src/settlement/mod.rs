pub mod authority;
pub mod calibre;
pub mod fund;
pub mod pricing;
pub mod rejection;
pub mod solver;
pub mod summary;
pub mod validator;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
use crate::config::AppConfig;
use crate::decimal::round_internal;
use crate::domain::certification::{CertificationLevel, CertificationRecord};
use crate::domain::grading::CalibreMapping;
use crate::domain::lot::{CampaignScope, LotRecord};
use crate::domain::price::{FinalPriceRecord, PriceEntry};
use crate::errors::SettlementError;

use self::{
    fund::{dedup_mismatches, CertificationMismatch, FundResolution},
    rejection::{RejectionPrices, RejectionValuer},
    solver::{theoretical_income, ReconciliationSolver},
    summary::{ReconciliationSummary, SettledLot, WeeklySummary},
};

/// Campaign-wide constants for one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementParameters {
    pub scope: CampaignScope,
    pub gross_income: Decimal,
    pub other_funds: Decimal,
    pub rejection_prices: RejectionPrices,
    pub bonus_base: Decimal,
}

impl From<&AppConfig> for SettlementParameters {
    fn from(config: &AppConfig) -> Self {
        Self {
            scope: CampaignScope::new(
                config.campaign.id,
                config.campaign.company.clone(),
                config.campaign.crop.clone(),
            ),
            gross_income: config.income.gross,
            other_funds: config.income.other_funds,
            rejection_prices: RejectionPrices::from(&config.rejection),
            bonus_base: config.certification.bonus_base,
        }
    }
}

/// Materialised record sets handed to the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementInput {
    pub parameters: SettlementParameters,
    pub lots: Vec<LotRecord>,
    pub calibre_map: Vec<CalibreMapping>,
    pub prices: Vec<PriceEntry>,
    pub certification_records: Vec<CertificationRecord>,
    pub certification_levels: Vec<CertificationLevel>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub summary: ReconciliationSummary,
    pub final_prices: Vec<FinalPriceRecord>,
    pub weekly: Vec<WeeklySummary>,
    pub lots: Vec<SettledLot>,
    pub certification_audit: Vec<CertificationMismatch>,
}

/// Weeks with commercial volume; the reference week is chosen among them.
pub fn lot_weeks_with_volume(lots: &[LotRecord]) -> BTreeSet<u32> {
    lots.iter().filter(|lot| lot.has_volume()).map(|lot| lot.week).collect()
}

pub trait SettlementEngine: Send + Sync {
    fn settle(&self, input: &SettlementInput) -> Result<SettlementOutcome, SettlementError>;
}

pub struct DeterministicSettlementEngine<A = InMemoryAuditSink> {
    audit_sink: A,
}

impl<A> DeterministicSettlementEngine<A> {
    pub fn new(audit_sink: A) -> Self {
        Self { audit_sink }
    }

    pub fn audit_sink(&self) -> &A {
        &self.audit_sink
    }
}

impl Default for DeterministicSettlementEngine<InMemoryAuditSink> {
    fn default() -> Self {
        Self::new(InMemoryAuditSink::default())
    }
}

impl<A: AuditSink> DeterministicSettlementEngine<A> {
    fn run(
        &self,
        run_id: &str,
        input: &SettlementInput,
    ) -> Result<SettlementOutcome, SettlementError> {
        let parameters = &input.parameters;
        let (mapper, table, allocator) = validator::run_pre_checks(input)?;
        let valuer = RejectionValuer::new(parameters.rejection_prices.clone());

        let mut lots = Vec::with_capacity(input.lots.len());
        let mut mismatches = Vec::new();
        let groups = mapper.map_lots(&input.lots)?;
        for (lot, group) in input.lots.iter().zip(groups) {
            let group = group.clone();
            let relative_price = if lot.has_volume() {
                Some(table.lookup(lot.week, &group, &lot.category)?)
            } else {
                None
            };
            let price = relative_price.unwrap_or(Decimal::ZERO);

            let rejection = valuer.value(&lot.rejects);
            let resolution = allocator.allocate(lot);
            let fund_contribution = resolution.contribution();
            if let FundResolution::Unmatched(mismatch) = resolution {
                mismatches.push(mismatch);
            }

            lots.push(SettledLot {
                lot_id: lot.lot_id.clone(),
                week: lot.week,
                calibre: lot.calibre.clone(),
                category: lot.category.clone(),
                group,
                net_weight: lot.net_weight,
                relative_price,
                commercial_value: round_internal(lot.net_weight * price),
                theoretical_income: theoretical_income(
                    lot.net_weight,
                    price,
                    rejection.total,
                    fund_contribution,
                ),
                rejection,
                fund_contribution,
                final_value: Decimal::ZERO,
            });
        }

        let theoretical: Vec<Decimal> = lots.iter().map(|lot| lot.theoretical_income).collect();
        let solver = ReconciliationSolver::new(parameters.gross_income, parameters.other_funds);
        let (reconciliation, finals) = solver.reconcile(&theoretical)?;
        for (lot, final_value) in lots.iter_mut().zip(finals) {
            lot.final_value = final_value;
        }

        tracing::info!(
            event_name = "settlement.reconciliation.solved",
            run_id = %run_id,
            coefficient = %reconciliation.coefficient_rounded(),
            theoretical_total = %reconciliation.theoretical_total,
            descuadre = %reconciliation.descuadre,
            residual = %reconciliation.residual,
            "global coefficient applied"
        );

        let certification_audit = dedup_mismatches(mismatches);
        if !certification_audit.is_empty() {
            tracing::warn!(
                event_name = "settlement.certification.unmatched",
                run_id = %run_id,
                count = certification_audit.len(),
                "lots settled without certification fund contribution"
            );
            self.audit_sink.emit(
                AuditEvent::new(
                    run_id,
                    "settlement.certification_mismatches",
                    AuditCategory::Certification,
                    AuditOutcome::Advisory,
                )
                .with_metadata("count", certification_audit.len().to_string()),
            );
        }

        let campaign = parameters.scope.campaign;
        let final_prices = summary::final_prices(campaign, reconciliation.coefficient, &lots);
        let weekly = summary::weekly_summary(&lots);
        let summary = summary::summarize(
            campaign,
            parameters.gross_income,
            parameters.other_funds,
            &reconciliation,
            &lots,
            &final_prices,
            &certification_audit,
        );

        Ok(SettlementOutcome {
            run_id: run_id.to_string(),
            generated_at: Utc::now(),
            summary,
            final_prices,
            weekly,
            lots,
            certification_audit,
        })
    }
}

impl<A: AuditSink> SettlementEngine for DeterministicSettlementEngine<A> {
    fn settle(&self, input: &SettlementInput) -> Result<SettlementOutcome, SettlementError> {
        let run_id = Uuid::new_v4().to_string();
        let scope = &input.parameters.scope;
        tracing::info!(
            event_name = "settlement.run.started",
            run_id = %run_id,
            campaign = scope.campaign,
            company = %scope.company,
            crop = %scope.crop,
            lot_count = input.lots.len(),
            price_count = input.prices.len(),
            "settlement run started"
        );
        self.audit_sink.emit(
            AuditEvent::new(
                &run_id,
                "settlement.run_started",
                AuditCategory::System,
                AuditOutcome::Success,
            )
            .with_metadata("campaign", scope.campaign.to_string())
            .with_metadata("lot_count", input.lots.len().to_string()),
        );

        match self.run(&run_id, input) {
            Ok(outcome) => {
                self.audit_sink.emit(
                    AuditEvent::new(
                        &run_id,
                        "settlement.run_reconciled",
                        AuditCategory::Reconciliation,
                        AuditOutcome::Success,
                    )
                    .with_metadata("coefficient", outcome.summary.coefficient.to_string())
                    .with_metadata("descuadre", outcome.summary.descuadre.to_string())
                    .with_metadata("final_price_count", outcome.final_prices.len().to_string()),
                );
                Ok(outcome)
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "settlement.run.aborted",
                    run_id = %run_id,
                    error_class = error.code(),
                    error = %error,
                    "settlement run aborted"
                );
                self.audit_sink.emit(
                    AuditEvent::new(
                        &run_id,
                        "settlement.validation_failed",
                        AuditCategory::Validation,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("error_class", error.code())
                    .with_metadata("keys", error.keys().join(",")),
                );
                Err(error)
            }
        }
    }
}
