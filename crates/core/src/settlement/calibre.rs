use std::collections::{BTreeSet, HashMap};

use crate::domain::grading::{CalibreCode, CalibreMapping, EconomicGroup};
use crate::domain::lot::LotRecord;
use crate::errors::SettlementError;

/// Calibre -> economic group lookup for one campaign configuration.
#[derive(Clone, Debug, Default)]
pub struct CalibreMapper {
    groups: HashMap<CalibreCode, EconomicGroup>,
}

impl CalibreMapper {
    /// Builds the lookup; repeated identical rows are tolerated, conflicting
    /// ones are a configuration error naming every affected calibre.
    pub fn new(mappings: &[CalibreMapping]) -> Result<Self, SettlementError> {
        let mut groups: HashMap<CalibreCode, EconomicGroup> = HashMap::new();
        let mut conflicts = BTreeSet::new();

        for mapping in mappings {
            match groups.get(&mapping.calibre) {
                Some(existing) if existing != &mapping.group => {
                    conflicts.insert(mapping.calibre.clone());
                }
                Some(_) => {}
                None => {
                    groups.insert(mapping.calibre.clone(), mapping.group.clone());
                }
            }
        }

        if !conflicts.is_empty() {
            return Err(SettlementError::ConflictingCalibreMapping {
                calibres: conflicts.into_iter().collect(),
            });
        }

        Ok(Self { groups })
    }

    pub fn map(&self, calibre: &CalibreCode) -> Option<&EconomicGroup> {
        self.groups.get(calibre)
    }

    /// Calibres used by `lots` that have no mapping, sorted and de-duplicated.
    pub fn unmapped<'a>(&self, lots: impl IntoIterator<Item = &'a LotRecord>) -> Vec<CalibreCode> {
        lots.into_iter()
            .filter(|lot| !self.groups.contains_key(&lot.calibre))
            .map(|lot| lot.calibre.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Maps every lot, or fails listing all unmapped calibres at once.
    pub fn map_lots(&self, lots: &[LotRecord]) -> Result<Vec<&EconomicGroup>, SettlementError> {
        let unmapped = self.unmapped(lots);
        if !unmapped.is_empty() {
            return Err(SettlementError::UnmappedCalibres { calibres: unmapped });
        }

        Ok(lots.iter().filter_map(|lot| self.groups.get(&lot.calibre)).collect())
    }
}
