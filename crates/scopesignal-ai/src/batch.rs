//! Batch input and per-item outcomes.

use scopesignal_core::{Classification, ClassifiedDecision};
use serde::{Deserialize, Serialize};

/// One unit of batch input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    #[serde(alias = "trade")]
    pub category: String,
    /// Reference label, used only by evaluation runs.
    #[serde(
        default,
        alias = "expected_classification",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected: Option<Classification>,
}

impl BatchItem {
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            category: category.into(),
            expected: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedItem {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub result: ClassifiedDecision,
}

/// A failed item in a batch. Failures never abort the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub category: String,
    pub error: String,
    pub kind: String,
    pub attempts: u32,
}

/// Result for one batch item, in input order.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchOutcome {
    Classified(ClassifiedItem),
    Failed(ErrorRecord),
}

impl BatchOutcome {
    pub fn index(&self) -> usize {
        match self {
            Self::Classified(item) => item.index,
            Self::Failed(record) => record.index,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
