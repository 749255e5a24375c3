//! Score batch outcomes against reference labels.
//!
//! Items carrying an `expected` classification are compared with what the
//! model returned. Unlabelled items still count towards the distribution,
//! cache usage and failure totals, but not towards accuracy.

use std::collections::BTreeMap;

use scopesignal_core::Classification;
use serde::Serialize;

use crate::batch::{BatchItem, BatchOutcome};

const CLASSES: usize = Classification::ALL.len();

fn slot(class: Classification) -> usize {
    match class {
        Classification::Closed => 0,
        Classification::SoftOpen => 1,
        Classification::Contestable => 2,
    }
}

/// Counts indexed by `[expected][predicted]`, in [`Classification::ALL`] order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub counts: [[usize; CLASSES]; CLASSES],
}

impl ConfusionMatrix {
    pub fn record(&mut self, expected: Classification, predicted: Classification) {
        self.counts[slot(expected)][slot(predicted)] += 1;
    }

    pub fn get(&self, expected: Classification, predicted: Classification) -> usize {
        self.counts[slot(expected)][slot(predicted)]
    }

    fn true_positives(&self, class: Classification) -> usize {
        self.get(class, class)
    }

    /// Labelled items predicted as `class`.
    fn predicted(&self, class: Classification) -> usize {
        self.counts.iter().map(|row| row[slot(class)]).sum()
    }

    /// Labelled items whose reference label is `class`.
    fn support(&self, class: Classification) -> usize {
        self.counts[slot(class)].iter().sum()
    }

    fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    fn correct(&self) -> usize {
        Classification::ALL
            .into_iter()
            .map(|c| self.true_positives(c))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub class: Classification,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Labelled items whose reference label is this class.
    pub support: usize,
    /// Every classified item (labelled or not) the model put in this class.
    pub returned: usize,
    pub mean_confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryScore {
    pub labelled: usize,
    pub correct: usize,
}

impl CategoryScore {
    pub fn accuracy(&self) -> Option<f64> {
        ratio(self.correct, self.labelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheUsage {
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
    /// Mean latency of the remote calls made in this run (cache hits excluded).
    pub mean_latency_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub total: usize,
    pub classified: usize,
    pub failed: usize,
    /// Failed items by failure kind (`transport`, `malformed_output`, ...).
    pub failures_by_kind: BTreeMap<String, usize>,
    pub labelled: usize,
    pub correct: usize,
    /// `correct / labelled`; 0 when nothing was labelled.
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
    pub per_class: Vec<ClassMetrics>,
    pub macro_f1: f64,
    pub weighted_f1: f64,
    pub mean_confidence_correct: Option<f64>,
    pub mean_confidence_incorrect: Option<f64>,
    pub by_category: BTreeMap<String, CategoryScore>,
    pub cache: CacheUsage,
}

/// Score `outcomes` against the labels in `items`.
///
/// Outcomes are matched to items by their batch index, as returned by
/// [`Classifier::classify_batch`](crate::Classifier::classify_batch).
pub fn evaluate(items: &[BatchItem], outcomes: &[BatchOutcome]) -> EvaluationReport {
    let mut confusion = ConfusionMatrix::default();
    let mut failures_by_kind = BTreeMap::new();
    let mut by_category: BTreeMap<String, CategoryScore> = BTreeMap::new();
    let mut returned = [0usize; CLASSES];
    let mut confidence_by_class: [Vec<u8>; CLASSES] = Default::default();
    let mut confidence_correct = Vec::new();
    let mut confidence_incorrect = Vec::new();
    let mut hits = 0;
    let mut latencies = Vec::new();

    for outcome in outcomes {
        let classified = match outcome {
            BatchOutcome::Failed(record) => {
                *failures_by_kind.entry(record.kind.clone()).or_insert(0) += 1;
                continue;
            }
            BatchOutcome::Classified(item) => item,
        };

        let decision = &classified.result.decision;
        let metadata = &classified.result.metadata;
        let predicted = decision.classification();
        returned[slot(predicted)] += 1;
        confidence_by_class[slot(predicted)].push(decision.confidence());
        if metadata.cache_hit {
            hits += 1;
        } else {
            latencies.push(metadata.latency_ms);
        }

        let Some(item) = items.get(classified.index) else {
            continue;
        };
        let Some(expected) = item.expected else {
            continue;
        };
        confusion.record(expected, predicted);
        let score = by_category.entry(item.category.clone()).or_default();
        score.labelled += 1;
        if expected == predicted {
            score.correct += 1;
            confidence_correct.push(decision.confidence());
        } else {
            confidence_incorrect.push(decision.confidence());
        }
    }

    let per_class: Vec<ClassMetrics> = Classification::ALL
        .into_iter()
        .map(|class| {
            let tp = confusion.true_positives(class);
            let precision = ratio(tp, confusion.predicted(class)).unwrap_or(0.0);
            let recall = ratio(tp, confusion.support(class)).unwrap_or(0.0);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                class,
                precision,
                recall,
                f1,
                support: confusion.support(class),
                returned: returned[slot(class)],
                mean_confidence: mean(&confidence_by_class[slot(class)]),
            }
        })
        .collect();

    let macro_f1 = per_class.iter().map(|m| m.f1).sum::<f64>() / CLASSES as f64;
    let labelled = confusion.total();
    let weighted_f1 = if labelled > 0 {
        per_class
            .iter()
            .map(|m| m.f1 * m.support as f64)
            .sum::<f64>()
            / labelled as f64
    } else {
        0.0
    };

    let classified = returned.iter().sum::<usize>();
    let misses = classified - hits;
    let correct = confusion.correct();

    EvaluationReport {
        total: outcomes.len(),
        classified,
        failed: outcomes.len() - classified,
        failures_by_kind,
        labelled,
        correct,
        accuracy: ratio(correct, labelled).unwrap_or(0.0),
        confusion,
        per_class,
        macro_f1,
        weighted_f1,
        mean_confidence_correct: mean(&confidence_correct),
        mean_confidence_incorrect: mean(&confidence_incorrect),
        by_category,
        cache: CacheUsage {
            hits,
            misses,
            hit_rate: ratio(hits, classified).unwrap_or(0.0),
            mean_latency_ms: if latencies.is_empty() {
                None
            } else {
                Some(latencies.iter().sum::<u64>() as f64 / latencies.len() as f64)
            },
        },
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

fn mean(values: &[u8]) -> Option<f64> {
    (!values.is_empty())
        .then(|| values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64)
}
