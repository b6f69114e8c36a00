//! Discretize/continuize transform between a discrete learner and a
//! continuous action range.
//!
//! Predict turns the learner's N discrete scores into a piecewise-constant
//! density over `[min_value, max_value]`, spreading every bin's score
//! uniformly over the `2·bandwidth` bins around it (box kernel). Learn inverts
//! that: a continuous observation is charged to every bin whose kernel covers
//! it, weighted by the width of that kernel.

use std::mem;

use tracing::{debug, warn};

use crate::cb_label::{CbClass, CbLabel};
use crate::error::{CbContError, Result};
use crate::example::{ActionScore, Example, Label, Learner, PdfSegment, Prediction};
use crate::label::CostEntry;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformConfig {
    num_actions: u32,
    min_value: f32,
    max_value: f32,
    bandwidth: u32,
}

impl TransformConfig {
    pub fn new(num_actions: u32, min_value: f32, max_value: f32, bandwidth: u32) -> Result<Self> {
        if num_actions == 0 {
            return Err(CbContError::Config("number of actions must be > 0".into()));
        }
        if bandwidth == 0 {
            return Err(CbContError::Config("bandwidth must be >= 1".into()));
        }
        if !min_value.is_finite() || !max_value.is_finite() || min_value >= max_value {
            return Err(CbContError::Config(format!(
                "min_value ({min_value}) must be finite and below max_value ({max_value})"
            )));
        }
        Ok(Self {
            num_actions,
            min_value,
            max_value,
            bandwidth,
        })
    }

    pub fn num_actions(&self) -> u32 {
        self.num_actions
    }

    pub fn min_value(&self) -> f32 {
        self.min_value
    }

    pub fn max_value(&self) -> f32 {
        self.max_value
    }

    pub fn bandwidth(&self) -> u32 {
        self.bandwidth
    }

    fn range(&self) -> f32 {
        self.max_value - self.min_value
    }

    /// Bins `[lo, hi)` covered by the box kernel centred on `bin`.
    pub fn kernel(&self, bin: u32) -> (u32, u32) {
        let lo = bin.saturating_sub(self.bandwidth);
        let hi = bin.saturating_add(self.bandwidth).min(self.num_actions);
        (lo, hi)
    }

    pub fn kernel_width(&self, bin: u32) -> u32 {
        let (lo, hi) = self.kernel(bin);
        hi - lo
    }

    /// Left edge of continuous bin `bin`.
    pub fn bin_edge(&self, bin: i64) -> f32 {
        self.min_value + bin as f32 * self.range() / self.num_actions as f32
    }

    /// Continuous bin holding `action`, i.e. the `ic` with
    /// `edge(ic) <= action < edge(ic + 1)`.
    ///
    /// Only corrects the floating-point error of the floor; actions outside
    /// the range map to bins outside `[0, N)`. Bins beyond the reach of any
    /// kernel are clamped to the first unreachable one on either side, and a
    /// NaN action maps below the range.
    pub fn continuous_bin(&self, action: f32) -> i64 {
        let bandwidth = i64::from(self.bandwidth);
        let lowest = -bandwidth - 1;
        let highest = i64::from(self.num_actions) + bandwidth;
        let scaled = (action - self.min_value) * self.num_actions as f32 / self.range();
        if scaled.is_nan() {
            return lowest - 1;
        }
        let floor = (scaled.floor() as i64).clamp(lowest, highest);
        let mut ic = floor;
        if self.bin_edge(floor) > action {
            ic -= 1;
        }
        if action >= self.bin_edge(floor + 1) {
            ic += 1;
        }
        ic
    }

    /// Discrete bins whose kernel covers continuous bin `ic`, inclusive.
    pub fn affected_bins(&self, ic: i64) -> Option<(u32, u32)> {
        let bandwidth = i64::from(self.bandwidth);
        let lo = (ic - bandwidth + 1).max(0);
        let hi = (ic + bandwidth).min(i64::from(self.num_actions) - 1);
        (lo <= hi).then(|| (lo as u32, hi as u32))
    }
}

pub struct PmfToPdf {
    base: Box<dyn Learner>,
    config: TransformConfig,
    discrete_scores: Vec<f32>,
    continuous_scores: Vec<f32>,
    temp_pred_a_s: Vec<ActionScore>,
    temp_lbl_cb: CbLabel,
}

impl PmfToPdf {
    pub fn new(config: TransformConfig, base: Box<dyn Learner>) -> Self {
        let n = config.num_actions as usize;
        Self {
            base,
            config,
            discrete_scores: vec![0.0; n],
            continuous_scores: vec![0.0; n],
            temp_pred_a_s: Vec::with_capacity(n),
            temp_lbl_cb: CbLabel::default(),
        }
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Puts the scratch discrete label and prediction on `ec`, returning the
    /// caller's values.
    fn swap_in(&mut self, ec: &mut Example) -> (Label, Prediction) {
        let label = mem::replace(&mut ec.label, Label::Discrete(mem::take(&mut self.temp_lbl_cb)));
        let pred = mem::replace(
            &mut ec.pred,
            Prediction::ActionScores(mem::take(&mut self.temp_pred_a_s)),
        );
        (label, pred)
    }

    /// Restores the caller's label and prediction and reclaims the scratch.
    fn swap_out(&mut self, ec: &mut Example, saved: (Label, Prediction)) -> Result<()> {
        let (label, pred) = saved;
        if let Label::Discrete(lbl) = mem::replace(&mut ec.label, label) {
            self.temp_lbl_cb = lbl;
        }
        match mem::replace(&mut ec.pred, pred) {
            Prediction::ActionScores(scores) => {
                self.temp_pred_a_s = scores;
                Ok(())
            }
            other => Err(CbContError::UnexpectedPrediction {
                expected: "action_scores",
                found: other.kind(),
            }),
        }
    }

    fn load_discrete_scores(&mut self) -> Result<()> {
        let n = self.config.num_actions;
        if self.temp_pred_a_s.len() != n as usize {
            return Err(CbContError::Config(format!(
                "discrete learner returned {} scores for {n} actions",
                self.temp_pred_a_s.len()
            )));
        }
        self.discrete_scores.fill(0.0);
        for a_s in &self.temp_pred_a_s {
            if a_s.action == 0 || a_s.action > n {
                return Err(CbContError::Config(format!(
                    "discrete learner returned action {} outside 1..={n}",
                    a_s.action
                )));
            }
            self.discrete_scores[a_s.action as usize - 1] = a_s.score;
        }
        Ok(())
    }

    /// Box-kernel smoothing of the discrete scores into `pdf`.
    fn densify(&mut self, pdf: &mut Vec<PdfSegment>) {
        let cfg = self.config;
        let n = cfg.num_actions;
        let range = cfg.range();

        self.continuous_scores.fill(0.0);
        for i in 0..n {
            let (lo, hi) = cfg.kernel(i);
            let mass = self.discrete_scores[i as usize] * n as f32 / ((hi - lo) as f32 * range);
            for density in &mut self.continuous_scores[lo as usize..hi as usize] {
                *density += mass;
            }
        }

        pdf.clear();
        pdf.extend(
            self.continuous_scores
                .iter()
                .enumerate()
                .map(|(i, &density)| PdfSegment {
                    action: cfg.bin_edge(i as i64),
                    density,
                }),
        );
        pdf.push(PdfSegment {
            action: cfg.max_value,
            density: 0.0,
        });
    }

    fn observation(ec: &Example) -> Result<CostEntry> {
        match &ec.label {
            Label::Continuous(label) if label.costs.len() == 1 => Ok(label.costs[0]),
            Label::Continuous(label) => Err(CbContError::MissingObservation {
                found: label.costs.len(),
            }),
            _ => Err(CbContError::MissingObservation { found: 0 }),
        }
    }

    /// Fills the scratch discrete label with the redistributed observation.
    fn redistribute(&mut self, observed: CostEntry) {
        let cfg = self.config;
        let ic = cfg.continuous_bin(observed.action);
        self.temp_lbl_cb.costs.clear();

        let Some((lo, hi)) = cfg.affected_bins(ic) else {
            warn!(
                action = observed.action,
                min_value = cfg.min_value,
                max_value = cfg.max_value,
                "observed action lies outside the continuous range, no bin receives its cost"
            );
            return;
        };
        for j in lo..=hi {
            self.temp_lbl_cb.costs.push(CbClass {
                action: j + 1,
                cost: observed.cost,
                probability: observed.probability * cfg.kernel_width(j) as f32,
                partial_prediction: 0.0,
            });
        }
        debug!(
            action = observed.action,
            bin = ic,
            first = lo + 1,
            last = hi + 1,
            "redistributed continuous observation"
        );
    }
}

impl Learner for PmfToPdf {
    fn predict(&mut self, ec: &mut Example) -> Result<()> {
        let saved = self.swap_in(ec);
        let outcome = self.base.predict(ec);
        let restored = self.swap_out(ec, saved);
        outcome?;
        restored?;

        self.load_discrete_scores()?;
        let mut pdf = match mem::take(&mut ec.pred) {
            Prediction::Pdf(buffer) => buffer,
            _ => Vec::with_capacity(self.config.num_actions as usize + 1),
        };
        self.densify(&mut pdf);
        debug!(segments = pdf.len(), "transformed pmf into pdf");
        ec.pred = Prediction::Pdf(pdf);
        Ok(())
    }

    fn learn(&mut self, ec: &mut Example) -> Result<()> {
        let observed = Self::observation(ec)?;
        self.redistribute(observed);

        let saved = self.swap_in(ec);
        let outcome = self.base.learn(ec);
        let restored = self.swap_out(ec, saved);
        outcome?;
        restored
    }
}
