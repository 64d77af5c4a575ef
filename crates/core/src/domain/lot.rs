use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::grading::{CalibreCode, Category};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LotId(pub String);

impl LotId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for LotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Campaign, company and crop a settlement run is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CampaignScope {
    pub campaign: u32,
    pub company: String,
    pub crop: String,
}

impl CampaignScope {
    pub fn new(campaign: u32, company: impl Into<String>, crop: impl Into<String>) -> Self {
        Self { campaign, company: company.into(), crop: crop.into() }
    }
}

/// Downgraded weight of a lot, in kg, per reject class.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectWeights {
    #[serde(default)]
    pub line: Decimal,
    #[serde(default)]
    pub table: Decimal,
    #[serde(default)]
    pub rotten: Decimal,
}

/// A delivered batch at one calibre and category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotRecord {
    pub campaign: u32,
    pub company: String,
    pub crop: String,
    pub lot_id: LotId,
    pub week: u32,
    pub calibre: CalibreCode,
    pub category: Category,
    pub net_weight: Decimal,
    #[serde(default)]
    pub rejects: RejectWeights,
    #[serde(default)]
    pub certification_ref: Option<String>,
}

/// Critical key tuple; no two lot records may share it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LotKey {
    pub campaign: u32,
    pub company: String,
    pub crop: String,
    pub lot_id: LotId,
    pub week: u32,
    pub calibre: CalibreCode,
    pub category: Category,
}

impl LotRecord {
    pub fn key(&self) -> LotKey {
        LotKey {
            campaign: self.campaign,
            company: self.company.clone(),
            crop: self.crop.clone(),
            lot_id: self.lot_id.clone(),
            week: self.week,
            calibre: self.calibre.clone(),
            category: self.category.clone(),
        }
    }

    pub fn belongs_to(&self, scope: &CampaignScope) -> bool {
        self.campaign == scope.campaign && self.company == scope.company && self.crop == scope.crop
    }

    /// Net weight counted towards income; negative corrections count as zero.
    pub fn commercial_weight(&self) -> Decimal {
        self.net_weight.max(Decimal::ZERO)
    }

    pub fn has_volume(&self) -> bool {
        self.commercial_weight() > Decimal::ZERO
    }
}

impl fmt::Display for LotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/week {}/{}/{}",
            self.campaign,
            self.company,
            self.crop,
            self.lot_id,
            self.week,
            self.calibre,
            self.category
        )
    }
}
