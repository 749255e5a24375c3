//! Parse raw model output into a [`Decision`], rejecting anything malformed
//! or inconsistent with the domain rules.
//!
//! Checks run in a fixed order so that structural problems and domain
//! problems stay distinguishable in logs:
//!
//! 1. Strip whitespace and an optional Markdown code fence.
//! 2. Decode a JSON object into a typed intermediate record.
//! 3. Require every field to be present and non-null.
//! 4. Check the classification enum and the confidence range.
//! 5. Check the domain invariants ([`Decision::check_invariants`]).

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::decision::{Classification, Decision, InvariantViolation, MAX_CONFIDENCE};

/// Which class of failure an attempt ended with.
///
/// Retry policy treats all of them alike; the distinction is kept for logs
/// and for the terminal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    MalformedOutput,
    InvariantViolation,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::MalformedOutput => "malformed_output",
            Self::InvariantViolation => "invariant_violation",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("response is not a JSON object: {reason}")]
    Malformed { reason: String },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid classification: {0}")]
    InvalidClassification(String),

    #[error("confidence must be an integer in 0..=100, got {0}")]
    InvalidConfidence(String),

    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

impl ValidationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Invariant(_) => FailureKind::InvariantViolation,
            _ => FailureKind::MalformedOutput,
        }
    }
}

/// Wire shape of a model answer before any checks.
///
/// Every field is optional here so that absence is reported as
/// [`ValidationError::MissingField`] rather than a generic decode error.
#[derive(Deserialize)]
struct RawDecision {
    #[serde(alias = "relevant")]
    trade_relevant: Option<bool>,
    classification: Option<String>,
    confidence: Option<Value>,
    reasoning: Option<String>,
    risk_note: Option<String>,
    recommended_action: Option<String>,
}

/// Validate one raw model response.
pub fn validate(raw: &str) -> Result<Decision, ValidationError> {
    let body = strip_code_fence(raw);

    let value: Value = serde_json::from_str(body).map_err(|e| ValidationError::Malformed {
        reason: e.to_string(),
    })?;
    if !value.is_object() {
        return Err(ValidationError::Malformed {
            reason: format!("expected object, got {}", json_type(&value)),
        });
    }

    let parsed: RawDecision =
        serde_json::from_value(value).map_err(|e| ValidationError::Malformed {
            reason: e.to_string(),
        })?;

    let relevant = parsed
        .trade_relevant
        .ok_or(ValidationError::MissingField("trade_relevant"))?;
    let classification = parsed
        .classification
        .ok_or(ValidationError::MissingField("classification"))?;
    let confidence = parsed
        .confidence
        .filter(|v| !v.is_null())
        .ok_or(ValidationError::MissingField("confidence"))?;
    let reasoning = parsed
        .reasoning
        .ok_or(ValidationError::MissingField("reasoning"))?;
    let risk_note = parsed
        .risk_note
        .ok_or(ValidationError::MissingField("risk_note"))?;
    let recommended_action = parsed
        .recommended_action
        .ok_or(ValidationError::MissingField("recommended_action"))?;

    let classification: Classification = classification
        .parse()
        .map_err(|_| ValidationError::InvalidClassification(classification.clone()))?;
    let confidence = parse_confidence(&confidence)?;

    let decision = Decision::from_parts(
        relevant,
        classification,
        confidence,
        reasoning,
        risk_note,
        recommended_action,
    );
    decision.check_invariants()?;
    Ok(decision)
}

/// Accept JSON integers and integral floats in `0..=100`.
fn parse_confidence(value: &Value) -> Result<u8, ValidationError> {
    let invalid = || ValidationError::InvalidConfidence(value.to_string());

    let Value::Number(n) = value else {
        return Err(invalid());
    };
    let whole = match n.as_i64() {
        Some(i) => i,
        None => match n.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 => f as i64,
            _ => return Err(invalid()),
        },
    };

    u8::try_from(whole)
        .ok()
        .filter(|c| *c <= MAX_CONFIDENCE)
        .ok_or_else(invalid)
}

/// Remove surrounding whitespace and a Markdown code fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let body = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    body.trim()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(relevant: bool, classification: &str, confidence: Value) -> String {
        json!({
            "trade_relevant": relevant,
            "classification": classification,
            "confidence": confidence,
            "reasoning": "Amendment references an attachment only.",
            "risk_note": "Attachment B could add electrical scope.",
            "recommended_action": "Pull Attachment B from the portal.",
        })
        .to_string()
    }

    #[test]
    fn accepts_valid_closed() {
        let d = validate(&payload(false, "CLOSED", json!(92))).unwrap();
        assert!(!d.relevant());
        assert_eq!(d.classification(), Classification::Closed);
        assert_eq!(d.confidence(), 92);
        assert_eq!(d.recommended_action(), "Pull Attachment B from the portal.");
    }

    #[test]
    fn accepts_contestable_at_ceiling() {
        let d = validate(&payload(true, "CONTESTABLE", json!(85))).unwrap();
        assert_eq!(d.classification(), Classification::Contestable);
    }

    #[test]
    fn rejects_irrelevant_soft_open() {
        let err = validate(&payload(false, "SOFT_OPEN", json!(40))).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Invariant(InvariantViolation::IrrelevantNotClosed {
                classification: Classification::SoftOpen
            })
        );
        assert_eq!(err.kind(), FailureKind::InvariantViolation);
    }

    #[test]
    fn rejects_contestable_above_85() {
        let err = validate(&payload(true, "CONTESTABLE", json!(90))).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Invariant(InvariantViolation::ConfidenceCeiling {
                confidence: 90,
                ceiling: 85,
                ..
            })
        ));
    }

    #[test]
    fn rejects_soft_open_above_75() {
        let err = validate(&payload(true, "SOFT_OPEN", json!(76))).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvariantViolation);
    }

    #[test]
    fn rejects_confidence_101() {
        let err = validate(&payload(true, "CLOSED", json!(101))).unwrap_err();
        assert_eq!(err, ValidationError::InvalidConfidence("101".into()));
        assert_eq!(err.kind(), FailureKind::MalformedOutput);
    }

    #[test]
    fn rejects_negative_and_fractional_confidence() {
        assert!(matches!(
            validate(&payload(true, "CLOSED", json!(-1))),
            Err(ValidationError::InvalidConfidence(_))
        ));
        assert!(matches!(
            validate(&payload(true, "CLOSED", json!(72.5))),
            Err(ValidationError::InvalidConfidence(_))
        ));
        assert!(matches!(
            validate(&payload(true, "CLOSED", json!("80"))),
            Err(ValidationError::InvalidConfidence(_))
        ));
    }

    #[test]
    fn accepts_integral_float_confidence() {
        let d = validate(&payload(true, "SOFT_OPEN", json!(70.0))).unwrap();
        assert_eq!(d.confidence(), 70);
    }

    #[test]
    fn rejects_unknown_classification() {
        let err = validate(&payload(true, "CONTSTABLE", json!(50))).unwrap_err();
        assert_eq!(err, ValidationError::InvalidClassification("CONTSTABLE".into()));
    }

    #[test]
    fn rejects_missing_field() {
        let raw = json!({
            "trade_relevant": true,
            "classification": "CLOSED",
            "confidence": 60,
            "reasoning": "r",
            "risk_note": "n",
        })
        .to_string();
        assert_eq!(
            validate(&raw),
            Err(ValidationError::MissingField("recommended_action"))
        );
    }

    #[test]
    fn null_counts_as_missing() {
        let raw = json!({
            "trade_relevant": true,
            "classification": "CLOSED",
            "confidence": null,
            "reasoning": "r",
            "risk_note": "n",
            "recommended_action": "a",
        })
        .to_string();
        assert_eq!(validate(&raw), Err(ValidationError::MissingField("confidence")));
    }

    #[test]
    fn presence_checked_before_invariants() {
        // Would violate the relevance rule, but a field is missing first.
        let raw = json!({
            "trade_relevant": false,
            "classification": "CONTESTABLE",
            "confidence": 99,
        })
        .to_string();
        assert_eq!(validate(&raw), Err(ValidationError::MissingField("reasoning")));
    }

    #[test]
    fn rejects_non_object() {
        let err = validate("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, ValidationError::Malformed { .. }));
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn rejects_garbage() {
        let err = validate("Sure! Here is my analysis.").unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedOutput);
    }

    #[test]
    fn rejects_wrong_field_type() {
        let raw = json!({
            "trade_relevant": "yes",
            "classification": "CLOSED",
            "confidence": 60,
            "reasoning": "r",
            "risk_note": "n",
            "recommended_action": "a",
        })
        .to_string();
        assert!(matches!(validate(&raw), Err(ValidationError::Malformed { .. })));
    }

    #[test]
    fn strips_markdown_fence() {
        let raw = format!("```json\n{}\n```", payload(true, "SOFT_OPEN", json!(60)));
        let d = validate(&raw).unwrap();
        assert_eq!(d.classification(), Classification::SoftOpen);

        let bare = format!("  ```\n{}\n```  ", payload(true, "CLOSED", json!(60)));
        assert!(validate(&bare).is_ok());
    }

    #[test]
    fn accepts_relevant_alias() {
        let raw = json!({
            "relevant": true,
            "classification": "CLOSED",
            "confidence": 55,
            "reasoning": "r",
            "risk_note": "n",
            "recommended_action": "a",
        })
        .to_string();
        assert!(validate(&raw).unwrap().relevant());
    }

    #[test]
    fn validation_is_deterministic() {
        let raw = payload(true, "CONTESTABLE", json!(95));
        assert_eq!(validate(&raw), validate(&raw));
    }
}
