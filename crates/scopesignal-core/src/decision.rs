//! Validated classification decisions and the metadata attached to them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint::Fingerprint;

/// Upper bound (inclusive) for `confidence`.
pub const MAX_CONFIDENCE: u8 = 100;

/// Reasoning keywords that mark a `CLOSED` decision as an ambiguity downgrade.
const AMBIGUITY_MARKERS: &[&str] = &["unclear", "ambiguous", "missing", "vague", "uncertain"];

/// Opportunity classification for one update and one trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// No realistic opportunity for a new subcontractor.
    Closed,
    /// New scope exists but an incumbent or insider is likely favoured.
    SoftOpen,
    /// Clearly defined, openly biddable work.
    Contestable,
}

impl Classification {
    pub const ALL: [Classification; 3] = [Self::Closed, Self::SoftOpen, Self::Contestable];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::SoftOpen => "SOFT_OPEN",
            Self::Contestable => "CONTESTABLE",
        }
    }

    /// Highest confidence a decision with this classification may carry.
    pub fn confidence_ceiling(&self) -> u8 {
        match self {
            Self::Closed => MAX_CONFIDENCE,
            Self::SoftOpen => 75,
            Self::Contestable => 85,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown classification: {0:?}")]
pub struct UnknownClassification(pub String);

impl FromStr for Classification {
    type Err = UnknownClassification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownClassification(s.to_string()))
    }
}

/// Trades the CLI accepts. The library takes any category string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trade {
    Electrical,
    #[serde(rename = "HVAC")]
    Hvac,
    Plumbing,
}

impl Trade {
    pub const ALL: [Trade; 3] = [Self::Electrical, Self::Hvac, Self::Plumbing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electrical => "Electrical",
            Self::Hvac => "HVAC",
            Self::Plumbing => "Plumbing",
        }
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown trade {0:?} (expected Electrical, HVAC, or Plumbing)")]
pub struct UnknownTrade(pub String);

/// Case-insensitive.
impl FromStr for Trade {
    type Err = UnknownTrade;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTrade(s.to_string()))
    }
}

/// A domain rule broken by an otherwise well-formed decision.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("trade_relevant=false requires CLOSED, got {classification}")]
    IrrelevantNotClosed { classification: Classification },

    #[error("{classification} confidence {confidence} exceeds ceiling {ceiling}")]
    ConfidenceCeiling {
        classification: Classification,
        confidence: u8,
        ceiling: u8,
    },

    #[error("confidence {confidence} outside 0..=100")]
    ConfidenceOutOfRange { confidence: u8 },
}

/// Validated output of one classification.
///
/// Only [`validate`](crate::validate::validate) builds these from model
/// output. Deserializing (e.g. from a cache snapshot) re-runs
/// [`check_invariants`](Self::check_invariants) and fails on a violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DecisionRecord")]
pub struct Decision {
    #[serde(rename = "trade_relevant")]
    relevant: bool,
    classification: Classification,
    confidence: u8,
    reasoning: String,
    risk_note: String,
    recommended_action: String,
}

/// Serialized form of a [`Decision`], checked on conversion.
#[derive(Deserialize)]
struct DecisionRecord {
    #[serde(rename = "trade_relevant")]
    relevant: bool,
    classification: Classification,
    confidence: u8,
    reasoning: String,
    risk_note: String,
    recommended_action: String,
}

impl TryFrom<DecisionRecord> for Decision {
    type Error = InvariantViolation;

    fn try_from(record: DecisionRecord) -> Result<Self, Self::Error> {
        let decision = Self::from_parts(
            record.relevant,
            record.classification,
            record.confidence,
            record.reasoning,
            record.risk_note,
            record.recommended_action,
        );
        decision.check_invariants()?;
        Ok(decision)
    }
}

impl Decision {
    pub(crate) fn from_parts(
        relevant: bool,
        classification: Classification,
        confidence: u8,
        reasoning: String,
        risk_note: String,
        recommended_action: String,
    ) -> Self {
        Self {
            relevant,
            classification,
            confidence,
            reasoning,
            risk_note,
            recommended_action,
        }
    }

    pub fn relevant(&self) -> bool {
        self.relevant
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn risk_note(&self) -> &str {
        &self.risk_note
    }

    pub fn recommended_action(&self) -> &str {
        &self.recommended_action
    }

    /// Check the domain rules every accepted decision must satisfy.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.confidence > MAX_CONFIDENCE {
            return Err(InvariantViolation::ConfidenceOutOfRange {
                confidence: self.confidence,
            });
        }

        if !self.relevant && self.classification != Classification::Closed {
            return Err(InvariantViolation::IrrelevantNotClosed {
                classification: self.classification,
            });
        }

        let ceiling = self.classification.confidence_ceiling();
        if self.confidence > ceiling {
            return Err(InvariantViolation::ConfidenceCeiling {
                classification: self.classification,
                confidence: self.confidence,
                ceiling,
            });
        }

        Ok(())
    }

    /// Why this decision came out conservative, if it did.
    pub fn downgrade_reason(&self) -> Option<DowngradeReason> {
        if !self.relevant {
            return Some(DowngradeReason::TradeIrrelevant);
        }
        if self.classification == Classification::Closed {
            let reasoning = self.reasoning.to_lowercase();
            if AMBIGUITY_MARKERS.iter().any(|m| reasoning.contains(m)) {
                return Some(DowngradeReason::AmbiguousLanguage);
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DowngradeReason {
    TradeIrrelevant,
    AmbiguousLanguage,
}

/// Per-call metadata attached to every returned decision.
///
/// Field aliases accept cache records written by older tooling
/// (`trade`, `attempt`, `cache_key`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallMetadata {
    #[serde(alias = "trade")]
    pub category: String,
    pub model: String,
    #[serde(alias = "cache_key")]
    pub fingerprint: Fingerprint,
    #[serde(alias = "attempt")]
    pub attempts: u32,
    pub latency_ms: u64,
    #[serde(default)]
    pub cache_hit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_age_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downgrade_reason: Option<DowngradeReason>,
}

/// A decision together with the metadata of the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedDecision {
    #[serde(flatten)]
    pub decision: Decision,
    #[serde(rename = "_metadata")]
    pub metadata: CallMetadata,
}

impl ClassifiedDecision {
    /// Mark this decision as served from cache with the given age.
    pub fn into_cache_hit(mut self, age_secs: u64) -> Self {
        self.metadata.cache_hit = true;
        self.metadata.cache_age_secs = Some(age_secs);
        self
    }
}
