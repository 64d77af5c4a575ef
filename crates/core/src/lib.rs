pub mod audit;
pub mod config;
pub mod decimal;
pub mod domain;
pub mod errors;
pub mod settlement;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::certification::{CertificationLevel, CertificationRecord};
pub use domain::grading::{CalibreCode, CalibreMapping, Category, EconomicGroup};
pub use domain::lot::{CampaignScope, LotId, LotRecord, RejectWeights};
pub use domain::price::{AuthorityPriceRow, FinalPriceRecord, PriceEntry, PriceKey};
pub use errors::{ApplicationError, SettlementDiagnostic, SettlementError};
pub use settlement::validator::{collect_findings, Severity, ValidationFinding, ValidationReport};
pub use settlement::{
    DeterministicSettlementEngine, SettlementEngine, SettlementInput, SettlementOutcome,
    SettlementParameters,
};
