use scopesignal_core::{ConfigError, FailureKind, ValidationError};
use scopesignal_store::StoreError;
use thiserror::Error;

/// The remote call did not produce a response body.
#[derive(Debug, Error)]
pub enum TransportError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("model returned no content")]
    EmptyResponse,

    #[error("{0}")]
    Other(String),
}

/// Why a single attempt was not accepted.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("rejected output: {0}")]
    Output(#[from] ValidationError),
}

impl AttemptError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::Output(e) => e.kind(),
        }
    }
}

/// Terminal failure once the attempt budget is spent.
#[derive(Debug, Error)]
#[error("classification failed after {attempts} attempt(s): {last}")]
pub struct ClassificationFailure {
    pub attempts: u32,
    #[source]
    pub last: AttemptError,
}

impl ClassificationFailure {
    pub fn kind(&self) -> FailureKind {
        self.last.kind()
    }
}

/// Building a classifier from configuration failed.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cache unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("model client: {0}")]
    Client(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopesignal_core::InvariantViolation;
    use std::error::Error as _;

    #[test]
    fn attempt_error_kinds() {
        let transport = AttemptError::from(TransportError::EmptyResponse);
        assert_eq!(transport.kind(), FailureKind::Transport);

        let malformed = AttemptError::from(ValidationError::MissingField("confidence"));
        assert_eq!(malformed.kind(), FailureKind::MalformedOutput);

        let invariant = AttemptError::from(ValidationError::Invariant(
            InvariantViolation::ConfidenceOutOfRange { confidence: 120 },
        ));
        assert_eq!(invariant.kind(), FailureKind::InvariantViolation);
    }

    #[test]
    fn failure_carries_cause() {
        let failure = ClassificationFailure {
            attempts: 3,
            last: TransportError::Server {
                status: 503,
                body: "overloaded".into(),
            }
            .into(),
        };
        let msg = failure.to_string();
        assert!(msg.contains("3 attempt(s)"), "{msg}");
        assert!(msg.contains("503"), "{msg}");
        assert!(failure.source().is_some());
        assert_eq!(failure.kind(), FailureKind::Transport);
    }
}
