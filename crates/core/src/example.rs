//! The per-example object that travels through the pipeline.
//!
//! Every stage reads its input from and writes its output to the same
//! [`Example`]. A stage that delegates to the stage below it swaps its own
//! scratch label/prediction onto the example for the duration of the call and
//! swaps the caller's values back before returning.

use serde::{Deserialize, Serialize};

use crate::cb_label::CbLabel;
use crate::error::Result;
use crate::label::ContinuousLabel;

/// One point of the discrete learner's output: a 1-based action id and its score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionScore {
    pub action: u32,
    pub score: f32,
}

/// Left edge of a piecewise-constant density segment.
///
/// A density is an ascending run of segments; the last one sits at the upper
/// bound of the interval and carries density 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfSegment {
    pub action: f32,
    pub density: f32,
}

/// The single continuous action chosen for an example.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampledAction {
    pub action: f32,
    pub density: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Label {
    #[default]
    Empty,
    Continuous(ContinuousLabel),
    Discrete(CbLabel),
}

impl Label {
    pub fn kind(&self) -> &'static str {
        match self {
            Label::Empty => "empty",
            Label::Continuous(_) => "continuous",
            Label::Discrete(_) => "discrete",
        }
    }

    /// True when the label carries an observed cost a learner can train on.
    pub fn has_observation(&self) -> bool {
        match self {
            Label::Empty => false,
            Label::Continuous(label) => !label.is_test(),
            Label::Discrete(label) => label.observed_cost().is_some(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Prediction {
    #[default]
    None,
    ActionScores(Vec<ActionScore>),
    Pdf(Vec<PdfSegment>),
    ActionPdf(SampledAction),
}

impl Prediction {
    pub fn kind(&self) -> &'static str {
        match self {
            Prediction::None => "none",
            Prediction::ActionScores(_) => "action_scores",
            Prediction::Pdf(_) => "pdf",
            Prediction::ActionPdf(_) => "action_pdf",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub label: Label,
    pub pred: Prediction,
    /// Set for examples without training signal; they are only predicted.
    pub test_only: bool,
    pub weight: f32,
    pub num_features: usize,
    pub tag: Option<String>,
}

impl Default for Example {
    fn default() -> Self {
        Self {
            label: Label::Empty,
            pred: Prediction::None,
            test_only: true,
            weight: 1.0,
            num_features: 0,
            tag: None,
        }
    }
}

impl Example {
    pub fn with_continuous_label(label: ContinuousLabel, num_features: usize) -> Self {
        Self {
            test_only: label.is_test(),
            label: Label::Continuous(label),
            num_features,
            ..Self::default()
        }
    }

    pub fn continuous_label(&self) -> Option<&ContinuousLabel> {
        match &self.label {
            Label::Continuous(label) => Some(label),
            _ => None,
        }
    }
}

/// A stage of the pipeline: the discrete learner, the transform or the sampler.
///
/// Stages are bound to their delegate once at construction.
pub trait Learner {
    fn predict(&mut self, ec: &mut Example) -> Result<()>;
    fn learn(&mut self, ec: &mut Example) -> Result<()>;
}

impl<L: Learner + ?Sized> Learner for Box<L> {
    fn predict(&mut self, ec: &mut Example) -> Result<()> {
        (**self).predict(ec)
    }

    fn learn(&mut self, ec: &mut Example) -> Result<()> {
        (**self).learn(ec)
    }
}
