pub mod config;
pub mod decision;
pub mod fingerprint;
pub mod validate;

pub use config::{ClassifierConfig, ConfigError};
pub use decision::{
    CallMetadata, Classification, ClassifiedDecision, Decision, DowngradeReason,
    InvariantViolation, Trade, UnknownClassification, UnknownTrade,
};
pub use fingerprint::{Fingerprint, fingerprint};
pub use validate::{FailureKind, ValidationError, validate};
