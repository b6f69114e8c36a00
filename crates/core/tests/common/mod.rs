//! Test helpers and fixtures for pipeline tests

use std::cell::RefCell;
use std::rc::Rc;

use cbcont_core::{
    ActionScore, CbLabel, ContinuousLabel, Example, Label, Learner, PipelineConfig, Prediction,
    Result,
};

/// Labels seen by a [`RecordingLearner`], in learn order
pub type Learned = Rc<RefCell<Vec<CbLabel>>>;

/// Discrete learner with fixed scores that records every label it learns from
pub struct RecordingLearner {
    pub scores: Vec<f32>,
    pub learned: Learned,
}

impl RecordingLearner {
    pub fn new(scores: Vec<f32>) -> (Self, Learned) {
        let learned = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                scores,
                learned: Rc::clone(&learned),
            },
            learned,
        )
    }
}

impl Learner for RecordingLearner {
    fn predict(&mut self, ec: &mut Example) -> Result<()> {
        ec.pred = Prediction::ActionScores(
            self.scores
                .iter()
                .enumerate()
                .map(|(i, &score)| ActionScore {
                    action: i as u32 + 1,
                    score,
                })
                .collect(),
        );
        Ok(())
    }

    fn learn(&mut self, ec: &mut Example) -> Result<()> {
        if let Label::Discrete(label) = &ec.label {
            self.learned.borrow_mut().push(label.clone());
        }
        Ok(())
    }
}

/// Helper to build a config for `num_actions` bins over `[min, max]`
pub fn test_config(num_actions: u32, min: f32, max: f32, bandwidth: u32) -> PipelineConfig {
    PipelineConfig {
        num_actions,
        min_value: Some(min),
        max_value: Some(max),
        bandwidth,
        seed: 17,
        quiet: true,
        ..PipelineConfig::default()
    }
}

/// Helper to create an example from a label text such as `"1.5:0.4:0.8"`
pub fn example(label: &str) -> Example {
    let label = ContinuousLabel::parse(label.split_whitespace()).expect("valid label");
    Example::with_continuous_label(label, 3)
}

/// Sink that keeps everything written to it
#[derive(Clone, Default)]
pub struct SharedSink(pub Rc<RefCell<Vec<u8>>>);

impl SharedSink {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("utf8 output")
    }
}

impl std::io::Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
