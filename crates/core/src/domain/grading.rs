use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw calibre code as recorded by the grading line (`Cal0`, `Cal7`, ...).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalibreCode(pub String);

/// Grading-authority group that selects the applicable price row.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EconomicGroup(pub String);

/// Commercial category of a lot (`I`, `II`, ...).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Category(pub String);

/// One row of the campaign's calibre correspondence table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibreMapping {
    pub calibre: CalibreCode,
    pub group: EconomicGroup,
}

impl CalibreCode {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl EconomicGroup {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl Category {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl CalibreMapping {
    pub fn new(calibre: impl Into<String>, group: impl Into<String>) -> Self {
        Self { calibre: CalibreCode::new(calibre), group: EconomicGroup::new(group) }
    }
}

impl fmt::Display for CalibreCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for EconomicGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
