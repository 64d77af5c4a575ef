use std::fs;
use std::path::Path;

use anyhow::Context;
use liquida_core::config::AppConfig;
use liquida_core::domain::certification::{CertificationLevel, CertificationRecord};
use liquida_core::domain::grading::CalibreMapping;
use liquida_core::domain::lot::LotRecord;
use liquida_core::domain::price::{AuthorityPriceRow, PriceEntry};
use liquida_core::errors::ApplicationError;
use liquida_core::settlement::authority::{derive_relative_prices, AuthorityScheme};
use liquida_core::settlement::validator::ensure_lot_scope;
use liquida_core::settlement::{lot_weeks_with_volume, SettlementInput, SettlementParameters};
use serde::Deserialize;

/// Record sets handed over by the storage side, as one JSON document.
///
/// Prices arrive either already relative (`prices`) or as the pricing
/// authority's raw matrix (`authority_matrix`), never both.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputBundle {
    pub lots: Vec<LotRecord>,
    pub calibre_map: Vec<CalibreMapping>,
    #[serde(default)]
    pub prices: Option<Vec<PriceEntry>>,
    #[serde(default)]
    pub authority_matrix: Option<Vec<AuthorityPriceRow>>,
    #[serde(default)]
    pub certification_records: Vec<CertificationRecord>,
    #[serde(default)]
    pub certification_levels: Vec<CertificationLevel>,
}

pub fn read(path: &Path) -> anyhow::Result<InputBundle> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read input bundle `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("could not parse input bundle `{}`", path.display()))
}

impl InputBundle {
    pub fn into_input(self, config: &AppConfig) -> Result<SettlementInput, ApplicationError> {
        let parameters = SettlementParameters::from(config);
        let prices = match (self.prices, self.authority_matrix) {
            (Some(prices), None) => prices,
            (None, Some(rows)) => {
                // The reference week must come from this campaign's lots only.
                ensure_lot_scope(&self.lots, &parameters.scope)?;
                let scheme = AuthorityScheme::from(&config.pricing);
                derive_relative_prices(&rows, &scheme, &lot_weeks_with_volume(&self.lots))?
            }
            (Some(_), Some(_)) => {
                return Err(ApplicationError::Input(
                    "bundle carries both `prices` and `authority_matrix`; supply exactly one"
                        .to_string(),
                ))
            }
            (None, None) => {
                return Err(ApplicationError::Input(
                    "bundle carries neither `prices` nor `authority_matrix`".to_string(),
                ))
            }
        };

        Ok(SettlementInput {
            parameters,
            lots: self.lots,
            calibre_map: self.calibre_map,
            prices,
            certification_records: self.certification_records,
            certification_levels: self.certification_levels,
        })
    }
}

/// Reads and resolves the bundle; read failures carry their full cause chain.
pub fn load(path: &Path, config: &AppConfig) -> Result<SettlementInput, ApplicationError> {
    let bundle = read(path).map_err(|error| ApplicationError::Input(format!("{error:#}")))?;
    tracing::debug!(
        event_name = "cli.bundle.loaded",
        path = %path.display(),
        lots = bundle.lots.len(),
        "input bundle loaded"
    );
    bundle.into_input(config)
}
