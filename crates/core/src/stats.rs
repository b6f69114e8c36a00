//! Run-wide progress accounting.

use std::fmt;

use prometheus_client::{encoding::text::encode, metrics::counter::Counter, registry::Registry};
use tracing::info;

const DEFAULT_DUMP_INTERVAL: f64 = 1.0;
const PROGRESS_MULTIPLIER: f64 = 2.0;

/// Counters exported alongside the progress log.
pub struct RunMetrics {
    registry: Registry,
    examples: Counter,
    labeled: Counter,
    sample_failures: Counter,
}

impl Default for RunMetrics {
    fn default() -> Self {
        let mut registry = Registry::default();
        let examples = Counter::default();
        let labeled = Counter::default();
        let sample_failures = Counter::default();
        registry.register("cbcont_examples", "Examples processed", examples.clone());
        registry.register(
            "cbcont_labeled_examples",
            "Examples carrying an observed cost",
            labeled.clone(),
        );
        registry.register(
            "cbcont_sample_failures",
            "Examples for which no action could be sampled",
            sample_failures.clone(),
        );
        Self {
            registry,
            examples,
            labeled,
            sample_failures,
        }
    }
}

impl fmt::Debug for RunMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunMetrics")
            .field("examples", &self.examples.get())
            .field("labeled", &self.labeled.get())
            .field("sample_failures", &self.sample_failures.get())
            .finish()
    }
}

impl RunMetrics {
    pub fn examples(&self) -> u64 {
        self.examples.get()
    }

    pub fn sample_failures(&self) -> u64 {
        self.sample_failures.get()
    }

    /// Prometheus text exposition of the run counters.
    pub fn encode(&self) -> Result<String, fmt::Error> {
        let mut body = String::new();
        encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

/// One progress report, as logged.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLine {
    pub average_loss: Option<f64>,
    pub since_last: Option<f64>,
    pub example_counter: u64,
    pub example_weight: f64,
    pub current_label: String,
    pub current_prediction: String,
    pub current_features: usize,
}

#[derive(Debug)]
pub struct RunStats {
    sum_loss: f64,
    sum_loss_since_last_dump: f64,
    holdout_sum_loss: f64,
    weighted_labeled_examples: f64,
    weighted_unlabeled_examples: f64,
    weighted_holdout_examples: f64,
    old_weighted_labeled_examples: f64,
    weighted_labels: f64,
    example_number: u64,
    total_features: u64,
    dump_interval: f64,
    quiet: bool,
    metrics: RunMetrics,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new(DEFAULT_DUMP_INTERVAL, false)
    }
}

impl RunStats {
    pub fn new(dump_interval: f64, quiet: bool) -> Self {
        Self {
            sum_loss: 0.0,
            sum_loss_since_last_dump: 0.0,
            holdout_sum_loss: 0.0,
            weighted_labeled_examples: 0.0,
            weighted_unlabeled_examples: 0.0,
            weighted_holdout_examples: 0.0,
            old_weighted_labeled_examples: 0.0,
            weighted_labels: 0.0,
            example_number: 0,
            total_features: 0,
            dump_interval,
            quiet,
            metrics: RunMetrics::default(),
        }
    }

    /// Accumulates one finished example.
    ///
    /// Labeled test examples count as holdout and do not touch the training
    /// loss.
    pub fn update(&mut self, test_only: bool, labeled: bool, loss: f32, weight: f32, num_features: usize) {
        let loss = f64::from(loss);
        let weight = f64::from(weight);
        self.metrics.examples.inc();
        if labeled {
            self.metrics.labeled.inc();
        }

        if test_only && labeled {
            self.weighted_holdout_examples += weight;
            self.holdout_sum_loss += loss;
            return;
        }
        if labeled {
            self.weighted_labeled_examples += weight;
        } else {
            self.weighted_unlabeled_examples += weight;
        }
        self.sum_loss += loss;
        self.sum_loss_since_last_dump += loss;
        self.total_features += num_features as u64;
        self.example_number += 1;
    }

    pub fn add_weighted_labels(&mut self, weight: f32) {
        self.weighted_labels += f64::from(weight);
    }

    pub fn record_sample_failure(&mut self) {
        self.metrics.sample_failures.inc();
    }

    pub fn weighted_examples(&self) -> f64 {
        self.weighted_labeled_examples + self.weighted_unlabeled_examples
    }

    pub fn weighted_labels(&self) -> f64 {
        self.weighted_labels
    }

    pub fn example_number(&self) -> u64 {
        self.example_number
    }

    pub fn total_features(&self) -> u64 {
        self.total_features
    }

    pub fn holdout_examples(&self) -> f64 {
        self.weighted_holdout_examples
    }

    /// Average training loss over labeled weight, if any was seen.
    pub fn average_loss(&self) -> Option<f64> {
        (self.weighted_labeled_examples > 0.0).then(|| self.sum_loss / self.weighted_labeled_examples)
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Logs a progress line once the weighted example count reaches the dump
    /// interval, then doubles the interval.
    pub fn print_update(&mut self, label: &str, prediction: &str, num_features: usize) -> Option<ProgressLine> {
        if self.quiet || self.weighted_examples() < self.dump_interval {
            return None;
        }

        let new_labeled = self.weighted_labeled_examples - self.old_weighted_labeled_examples;
        let line = ProgressLine {
            average_loss: self.average_loss(),
            since_last: (new_labeled > 0.0).then(|| self.sum_loss_since_last_dump / new_labeled),
            example_counter: self.example_number,
            example_weight: self.weighted_examples(),
            current_label: label.to_string(),
            current_prediction: prediction.to_string(),
            current_features: num_features,
        };
        info!(
            average_loss = %fmt_loss(line.average_loss),
            since_last = %fmt_loss(line.since_last),
            example_counter = line.example_counter,
            example_weight = line.example_weight,
            current_label = %line.current_label,
            current_predict = %line.current_prediction,
            current_features = line.current_features,
            "progress"
        );

        self.sum_loss_since_last_dump = 0.0;
        self.old_weighted_labeled_examples = self.weighted_labeled_examples;
        self.dump_interval *= PROGRESS_MULTIPLIER;
        Some(line)
    }

    /// Logs the end-of-run summary.
    pub fn finish(&self) {
        info!(
            examples = self.example_number,
            weighted_examples = self.weighted_examples(),
            weighted_labels = self.weighted_labels,
            holdout_examples = self.weighted_holdout_examples,
            average_loss = %fmt_loss(self.average_loss()),
            total_features = self.total_features,
            sample_failures = self.metrics.sample_failures(),
            "finished run"
        );
    }
}

fn fmt_loss(loss: Option<f64>) -> String {
    loss.map_or_else(|| "n.a.".to_string(), |value| format!("{value:.6}"))
}
