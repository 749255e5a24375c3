//! The classify pipeline: fingerprint, cache lookup, retried remote call,
//! metadata, cache write.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use scopesignal_core::{
    CallMetadata, ClassifiedDecision, ClassifierConfig, fingerprint, validate,
};
use scopesignal_store::ResultCache;
use tracing::{info, warn};

use crate::batch::{BatchItem, BatchOutcome, ClassifiedItem, ErrorRecord};
use crate::prompt::{SYSTEM_PROMPT, user_message};
use crate::retry::RetryPolicy;
use crate::{ClassificationFailure, ModelClient, SetupError};

/// Classifies project updates against a remote model, caching accepted
/// decisions by fingerprint.
///
/// Cheap to share: the model client and the cache are reference counted.
pub struct Classifier {
    client: Arc<dyn ModelClient>,
    cache: Option<ResultCache>,
    policy: RetryPolicy,
    concurrency: usize,
}

impl Classifier {
    /// A classifier with the default retry policy and no cache.
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            cache: None,
            policy: RetryPolicy::default(),
            concurrency: 1,
        }
    }

    /// Build from configuration, opening the on-disk cache when enabled.
    pub fn from_config(
        client: Arc<dyn ModelClient>,
        config: &ClassifierConfig,
    ) -> Result<Self, SetupError> {
        config.validate()?;
        let cache = if config.cache_enabled {
            Some(ResultCache::open_dir(&config.cache_dir, config.cache_ttl)?)
        } else {
            None
        };
        Ok(Self::new(client)
            .with_cache(cache)
            .with_policy(RetryPolicy::new(config.max_retries, config.backoff_unit))
            .with_concurrency(config.batch_concurrency))
    }

    pub fn with_cache(mut self, cache: Option<ResultCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Maximum batch items in flight. Values below 1 are treated as 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Classify one project update for one trade category.
    ///
    /// A fresh cache hit makes no remote call. Otherwise the model is called
    /// until one response validates or the retry budget is spent; only
    /// accepted decisions are cached.
    pub async fn classify(
        &self,
        text: &str,
        category: &str,
    ) -> Result<ClassifiedDecision, ClassificationFailure> {
        let fp = fingerprint(category, text);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&fp) {
                info!(
                    fingerprint = %fp,
                    category,
                    age_secs = hit.metadata.cache_age_secs.unwrap_or_default(),
                    "cache hit"
                );
                return Ok(hit);
            }
        }

        let user = user_message(text, category);
        let client = &self.client;
        let accepted = self
            .policy
            .run(|| client.complete(SYSTEM_PROMPT, &user), validate)
            .await?;

        let decision = accepted.value;
        let metadata = CallMetadata {
            category: category.to_string(),
            model: client.model().to_string(),
            fingerprint: fp,
            attempts: accepted.attempts,
            latency_ms: accepted.latency.as_millis() as u64,
            cache_hit: false,
            cache_age_secs: None,
            downgrade_reason: decision.downgrade_reason(),
        };
        let classified = ClassifiedDecision { decision, metadata };

        info!(
            fingerprint = %fp,
            category,
            classification = %classified.decision.classification(),
            confidence = classified.decision.confidence(),
            attempts = accepted.attempts,
            latency_ms = classified.metadata.latency_ms,
            "classified"
        );

        if let Some(cache) = &self.cache {
            cache.set(&fp, &classified);
        }
        Ok(classified)
    }

    /// Classify every item, returning one outcome per item in input order.
    ///
    /// Items run with bounded concurrency; a failing item becomes an
    /// [`ErrorRecord`] and never aborts the rest.
    pub async fn classify_batch(&self, items: &[BatchItem]) -> Vec<BatchOutcome> {
        info!(items = items.len(), concurrency = self.concurrency, "batch started");
        let outcomes: Vec<BatchOutcome> = stream::iter(items.iter().enumerate())
            .map(|(index, item)| async move {
                match self.classify(&item.text, &item.category).await {
                    Ok(result) => BatchOutcome::Classified(ClassifiedItem {
                        index,
                        id: item.id.clone(),
                        result,
                    }),
                    Err(failure) => {
                        warn!(
                            index,
                            category = %item.category,
                            attempts = failure.attempts,
                            error = %failure,
                            "batch item failed"
                        );
                        BatchOutcome::Failed(ErrorRecord {
                            index,
                            id: item.id.clone(),
                            category: item.category.clone(),
                            error: failure.to_string(),
                            kind: failure.kind().as_str().to_string(),
                            attempts: failure.attempts,
                        })
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let failed = outcomes.iter().filter(|o| o.is_failure()).count();
        let cache_hits = outcomes
            .iter()
            .filter(|o| matches!(o, BatchOutcome::Classified(item) if item.result.metadata.cache_hit))
            .count();
        info!(
            total = outcomes.len(),
            succeeded = outcomes.len() - failed,
            failed,
            cache_hits,
            "batch complete"
        );
        outcomes
    }
}
