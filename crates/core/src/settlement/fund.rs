use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::round_internal;
use crate::domain::certification::{CertificationLevel, CertificationRecord};
use crate::domain::lot::{LotId, LotRecord};
use crate::errors::SettlementError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchReason {
    MissingCertificationRecord,
    LevelWithoutIndex,
}

impl MismatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCertificationRecord => "missing_certification_record",
            Self::LevelWithoutIndex => "level_without_index",
        }
    }
}

/// A lot kept in settlement with a zero fund contribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationMismatch {
    pub lot_id: LotId,
    pub certification_ref: Option<String>,
    pub level: Option<String>,
    pub reason: MismatchReason,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FundResolution {
    Matched { contribution: Decimal },
    Unmatched(CertificationMismatch),
}

impl FundResolution {
    pub fn contribution(&self) -> Decimal {
        match self {
            Self::Matched { contribution } => *contribution,
            Self::Unmatched(_) => Decimal::ZERO,
        }
    }
}

/// Resolves each lot's share of the certification fund.
#[derive(Clone, Debug)]
pub struct FundAllocator {
    bonus_base: Decimal,
    levels_by_reference: HashMap<String, String>,
    index_by_level: HashMap<String, Option<Decimal>>,
}

impl FundAllocator {
    pub fn new(
        bonus_base: Decimal,
        records: &[CertificationRecord],
        levels: &[CertificationLevel],
    ) -> Result<Self, SettlementError> {
        let mut levels_by_reference = HashMap::new();
        let mut duplicate_references = BTreeSet::new();
        for record in records {
            let reference = record.reference.trim().to_string();
            let level = record.level.trim().to_string();
            if levels_by_reference.insert(reference.clone(), level).is_some() {
                duplicate_references.insert(reference);
            }
        }
        if !duplicate_references.is_empty() {
            return Err(SettlementError::DuplicateCertificationRecords {
                references: duplicate_references.into_iter().collect(),
            });
        }

        let mut index_by_level = HashMap::new();
        let mut duplicate_levels = BTreeSet::new();
        for level in levels {
            let name = level.level.trim().to_string();
            if index_by_level.insert(name.clone(), level.index).is_some() {
                duplicate_levels.insert(name);
            }
        }
        if !duplicate_levels.is_empty() {
            return Err(SettlementError::DuplicateCertificationLevels {
                levels: duplicate_levels.into_iter().collect(),
            });
        }

        Ok(Self { bonus_base, levels_by_reference, index_by_level })
    }

    pub fn bonus_base(&self) -> Decimal {
        self.bonus_base
    }

    /// Contribution = commercial weight x bonus base x level index. A lot that
    /// cannot be matched contributes zero and is reported, never dropped.
    pub fn allocate(&self, lot: &LotRecord) -> FundResolution {
        let reference = lot.certification_ref.as_deref().map(str::trim).filter(|r| !r.is_empty());
        let Some(level) = reference.and_then(|r| self.levels_by_reference.get(r)) else {
            return FundResolution::Unmatched(CertificationMismatch {
                lot_id: lot.lot_id.clone(),
                certification_ref: reference.map(str::to_string),
                level: None,
                reason: MismatchReason::MissingCertificationRecord,
            });
        };

        match self.index_by_level.get(level).copied().flatten() {
            Some(index) => FundResolution::Matched {
                contribution: round_internal(lot.commercial_weight() * self.bonus_base * index),
            },
            None => FundResolution::Unmatched(CertificationMismatch {
                lot_id: lot.lot_id.clone(),
                certification_ref: reference.map(str::to_string),
                level: Some(level.clone()),
                reason: MismatchReason::LevelWithoutIndex,
            }),
        }
    }
}

/// Audit set with one entry per (lot, reason), in first-seen order.
pub fn dedup_mismatches(mismatches: Vec<CertificationMismatch>) -> Vec<CertificationMismatch> {
    let mut seen = BTreeSet::new();
    mismatches
        .into_iter()
        .filter(|mismatch| seen.insert((mismatch.lot_id.clone(), mismatch.reason)))
        .collect()
}
