//! Scripted model client for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{ModelClient, TransportError};

/// Replays queued responses in order; an empty queue yields either the
/// fallback response or a transport error.
pub(crate) struct ScriptedClient {
    steps: Mutex<VecDeque<Result<String, TransportError>>>,
    fallback: Option<String>,
    calls: AtomicU32,
}

impl ScriptedClient {
    pub(crate) fn new(steps: Vec<Result<String, TransportError>>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Always answers with `response`.
    pub(crate) fn echo(response: &str) -> Self {
        Self {
            fallback: Some(response.to_string()),
            ..Self::new(Vec::new())
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _system: &str, _user: &str) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(step) = self.steps.lock().pop_front() {
            return step;
        }
        match &self.fallback {
            Some(response) => Ok(response.clone()),
            None => Err(TransportError::Other("script exhausted".into())),
        }
    }
}
