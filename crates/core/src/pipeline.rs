//! Wires the stages together and finishes every example.

use std::io::Write;

use tracing::warn;

use crate::config::{PipelineConfig, PipelineMode};
use crate::error::{CbContError, Result};
use crate::example::{Example, Label, Learner, Prediction};
use crate::label::UNKNOWN_COST;
use crate::output;
use crate::rand_state::{RandState, SharedRandState};
use crate::sampler::ContinuousActionSampler;
use crate::stats::RunStats;
use crate::transform::PmfToPdf;

enum TopStage {
    Sample(ContinuousActionSampler),
    Pdf(PmfToPdf),
}

impl TopStage {
    fn stage(&mut self) -> &mut dyn Learner {
        match self {
            TopStage::Sample(sampler) => sampler as &mut dyn Learner,
            TopStage::Pdf(transform) => transform as &mut dyn Learner,
        }
    }
}

pub struct Pipeline {
    top: TopStage,
    rand_state: SharedRandState,
    stats: RunStats,
    sinks: Vec<Box<dyn Write>>,
}

impl Pipeline {
    /// Validates `config` and stacks the transform (and, in sample mode, the
    /// sampler) on top of `base`.
    pub fn from_config(config: &PipelineConfig, base: Box<dyn Learner>) -> Result<Self> {
        let transform_config = config.validate()?;
        let rand_state = RandState::shared(config.seed);
        let transform = PmfToPdf::new(transform_config, base);
        let top = match config.mode {
            PipelineMode::Sample => TopStage::Sample(ContinuousActionSampler::new(
                Box::new(transform),
                SharedRandState::clone(&rand_state),
            )),
            PipelineMode::Pdf => TopStage::Pdf(transform),
        };
        Ok(Self {
            top,
            rand_state,
            stats: RunStats::new(config.dump_interval, config.quiet),
            sinks: Vec::new(),
        })
    }

    pub fn add_sink(&mut self, sink: Box<dyn Write>) {
        self.sinks.push(sink);
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn rand_state(&self) -> &SharedRandState {
        &self.rand_state
    }

    /// Learns from examples that carry an observed cost and predicts the rest,
    /// then reports the example.
    ///
    /// Recoverable failures are logged and the example is finished without an
    /// assigned action; all other errors abort.
    pub fn process(&mut self, ec: &mut Example) -> Result<()> {
        let learn = !ec.test_only && ec.label.has_observation();
        // The transform does not predict while learning; pdf mode still
        // reports a density for every example.
        let outcome = match (&mut self.top, learn) {
            (TopStage::Pdf(transform), true) => transform.predict(ec).and_then(|()| transform.learn(ec)),
            (top, true) => top.stage().learn(ec),
            (top, false) => top.stage().predict(ec),
        };
        match outcome {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => {
                if matches!(err, CbContError::SamplePdfFailed(_)) {
                    self.stats.record_sample_failure();
                }
                warn!(error = %err, "example finished without an action");
            }
            Err(err) => return Err(err),
        }
        self.finish_example(ec);
        Ok(())
    }

    pub fn finish(&mut self) {
        for sink in &mut self.sinks {
            if let Err(err) = sink.flush() {
                warn!(error = %err, "failed to flush prediction sink");
            }
        }
        self.stats.finish();
    }

    fn finish_example(&mut self, ec: &Example) {
        if matches!(self.top, TopStage::Sample(_)) {
            self.finish_sampled(ec);
        } else {
            self.finish_pdf(ec);
        }
    }

    fn finish_sampled(&mut self, ec: &Example) {
        let costs = ec.continuous_label().map(|l| l.costs.as_slice()).unwrap_or_default();
        let labeled = costs.first().is_some_and(|c| c.action != UNKNOWN_COST);
        let loss = costs.first().map_or(0.0, |c| c.cost);
        self.stats.update(ec.test_only, labeled, loss, ec.weight, ec.num_features);
        self.stats.add_weighted_labels(ec.weight);

        let prediction = match &ec.pred {
            Prediction::ActionPdf(chosen) => {
                output::write_to_sinks(&mut self.sinks, &output::action_pdf_line(chosen));
                format!("{}:{}", chosen.action, chosen.density)
            }
            _ => "none".to_string(),
        };
        let label = costs.first().map_or_else(|| "unknown".to_string(), ToString::to_string);
        self.stats.print_update(&label, &prediction, ec.num_features);
    }

    fn finish_pdf(&mut self, ec: &Example) {
        let Prediction::Pdf(pdf) = &ec.pred else {
            self.stats.update(ec.test_only, false, 0.0, 1.0, ec.num_features);
            return;
        };
        let observed: Vec<_> = match &ec.label {
            Label::Continuous(label) => label.costs.iter().filter(|c| c.is_observed()).collect(),
            _ => Vec::new(),
        };

        let total_density: f32 = pdf.iter().map(|s| s.density).sum();
        let loss: f32 = observed
            .iter()
            .map(|c| c.cost / c.probability * total_density)
            .sum();
        self.stats
            .update(ec.test_only, !observed.is_empty(), loss, 1.0, ec.num_features);

        output::write_to_sinks(&mut self.sinks, &output::pdf_line(pdf, ec.tag.as_deref()));
        let label = observed
            .first()
            .map_or_else(|| " unknown".to_string(), |c| c.to_string());
        self.stats
            .print_update(&label, &output::pdf_mode(pdf), ec.num_features);
    }
}
