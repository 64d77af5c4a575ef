use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Certification status of a grower reference, from the quality store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationRecord {
    pub reference: String,
    pub level: String,
}

/// Fund index attached to a certification level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationLevel {
    pub level: String,
    pub index: Option<Decimal>,
}

impl CertificationRecord {
    pub fn new(reference: impl Into<String>, level: impl Into<String>) -> Self {
        Self { reference: reference.into(), level: level.into() }
    }
}

impl CertificationLevel {
    pub fn new(level: impl Into<String>, index: Option<Decimal>) -> Self {
        Self { level: level.into(), index }
    }
}
