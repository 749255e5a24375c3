pub mod batch;
mod classifier;
mod client;
mod error;
pub mod evaluate;
pub mod prompt;
pub mod retry;

#[cfg(feature = "http")]
pub mod http;

#[cfg(test)]
mod testing;

pub use batch::{BatchItem, BatchOutcome, ClassifiedItem, ErrorRecord};
pub use classifier::Classifier;
pub use client::ModelClient;
pub use evaluate::{EvaluationReport, evaluate};
pub use error::{AttemptError, ClassificationFailure, SetupError, TransportError};
pub use retry::RetryPolicy;

#[cfg(feature = "http")]
pub use http::ChatClient;
