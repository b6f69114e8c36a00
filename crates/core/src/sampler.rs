//! Continuous action sampler: the top stage of a continuous-action pipeline.
//!
//! Asks the stage below for a density, draws one action from it with the
//! shared random state and reports the action together with its density.

use std::mem;

use tracing::debug;

use crate::error::{CbContError, Result};
use crate::example::{Example, Label, Learner, PdfSegment, Prediction, SampledAction};
use crate::explore;
use crate::rand_state::SharedRandState;

pub struct ContinuousActionSampler {
    base: Box<dyn Learner>,
    rand_state: SharedRandState,
    pred_pdf: Vec<PdfSegment>,
}

impl ContinuousActionSampler {
    pub fn new(base: Box<dyn Learner>, rand_state: SharedRandState) -> Self {
        Self {
            base,
            rand_state,
            pred_pdf: Vec::new(),
        }
    }

    /// Density produced for the most recent prediction.
    pub fn last_pdf(&self) -> &[PdfSegment] {
        &self.pred_pdf
    }
}

impl Learner for ContinuousActionSampler {
    /// On a sampling failure the example keeps `Prediction::None` and the
    /// random state is not advanced.
    fn predict(&mut self, ec: &mut Example) -> Result<()> {
        ec.pred = Prediction::Pdf(mem::take(&mut self.pred_pdf));
        self.base.predict(ec)?;

        let pdf = match mem::take(&mut ec.pred) {
            Prediction::Pdf(pdf) => pdf,
            other => {
                return Err(CbContError::UnexpectedPrediction {
                    expected: "pdf",
                    found: other.kind(),
                })
            }
        };

        let state = self.rand_state.borrow().current_state();
        let chosen = match explore::sample_pdf(state, &pdf) {
            Ok(action) => action,
            Err(err) => {
                self.pred_pdf = pdf;
                return Err(CbContError::SamplePdfFailed(err));
            }
        };
        self.rand_state.borrow_mut().advance();

        let density = explore::pdf_value(&pdf, chosen);
        self.pred_pdf = pdf;
        debug!(action = chosen, density, "sampled continuous action");
        ec.pred = Prediction::ActionPdf(SampledAction {
            action: chosen,
            density,
        });
        Ok(())
    }

    fn learn(&mut self, ec: &mut Example) -> Result<()> {
        match &ec.label {
            Label::Continuous(label) if label.costs.len() == 1 => {}
            Label::Continuous(label) => {
                return Err(CbContError::MissingObservation {
                    found: label.costs.len(),
                })
            }
            _ => return Err(CbContError::MissingObservation { found: 0 }),
        }
        if ec.test_only {
            return Err(CbContError::TestOnlyExample);
        }

        // Only feeds progress reporting; the delegate learns regardless.
        let predicted = self.predict(ec);
        self.base.learn(ec)?;
        predicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::ContinuousLabel;
    use crate::rand_state::RandState;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Density stage returning a fixed pdf and recording what it learned.
    struct FixedPdf {
        pdf: Vec<PdfSegment>,
        learned: Rc<RefCell<Vec<Example>>>,
    }

    impl Learner for FixedPdf {
        fn predict(&mut self, ec: &mut Example) -> Result<()> {
            // Hand back a fresh buffer, the way a reallocating delegate would.
            ec.pred = Prediction::Pdf(self.pdf.clone());
            Ok(())
        }

        fn learn(&mut self, ec: &mut Example) -> Result<()> {
            self.learned.borrow_mut().push(ec.clone());
            Ok(())
        }
    }

    fn seg(action: f32, density: f32) -> PdfSegment {
        PdfSegment { action, density }
    }

    fn sampler(pdf: Vec<PdfSegment>, seed: u64) -> (ContinuousActionSampler, Rc<RefCell<Vec<Example>>>) {
        let learned = Rc::new(RefCell::new(Vec::new()));
        let base = FixedPdf {
            pdf,
            learned: Rc::clone(&learned),
        };
        (
            ContinuousActionSampler::new(Box::new(base), RandState::shared(seed)),
            learned,
        )
    }

    fn three_bin_pdf() -> Vec<PdfSegment> {
        vec![seg(0.0, 0.45), seg(1.0, 0.4), seg(2.0, 0.15), seg(3.0, 0.0)]
    }

    fn sample(s: &mut ContinuousActionSampler) -> SampledAction {
        let mut ec = Example::default();
        s.predict(&mut ec).unwrap();
        match ec.pred {
            Prediction::ActionPdf(chosen) => chosen,
            other => panic!("expected action_pdf, got {other:?}"),
        }
    }

    #[test]
    fn fixed_seed_gives_identical_sequences() {
        let (mut a, _) = sampler(three_bin_pdf(), 42);
        let (mut b, _) = sampler(three_bin_pdf(), 42);
        let xs: Vec<SampledAction> = (0..50).map(|_| sample(&mut a)).collect();
        let ys: Vec<SampledAction> = (0..50).map(|_| sample(&mut b)).collect();
        assert_eq!(xs, ys);
        for chosen in &xs {
            assert!((0.0..=3.0).contains(&chosen.action));
            assert_eq!(chosen.density, explore::pdf_value(&three_bin_pdf(), chosen.action));
        }
        let distinct = xs.windows(2).filter(|w| w[0].action != w[1].action).count();
        assert!(distinct > 0, "generator must advance between draws");
    }

    #[test]
    fn advances_random_state_once_per_decision() {
        let (mut s, _) = sampler(three_bin_pdf(), 9);
        let mut twin = RandState::new(9);
        for _ in 0..3 {
            sample(&mut s);
            twin.advance();
            assert_eq!(s.rand_state.borrow().current_state(), twin.current_state());
        }
    }

    #[test]
    fn zero_mass_fails_without_advancing() {
        let zero = vec![seg(0.0, 0.0), seg(1.0, 0.0), seg(2.0, 0.0)];
        let (mut s, _) = sampler(zero, 5);
        let before = s.rand_state.borrow().current_state();
        let mut ec = Example::default();
        let err = s.predict(&mut ec).unwrap_err();
        assert!(matches!(err, CbContError::SamplePdfFailed(_)));
        assert!(err.is_recoverable());
        assert_eq!(ec.pred, Prediction::None);
        assert_eq!(s.rand_state.borrow().current_state(), before);
    }

    #[test]
    fn keeps_a_copy_of_the_last_pdf() {
        let (mut s, _) = sampler(three_bin_pdf(), 1);
        sample(&mut s);
        assert_eq!(s.last_pdf(), three_bin_pdf().as_slice());
    }

    #[test]
    fn learn_forwards_label_unchanged() {
        let (mut s, learned) = sampler(three_bin_pdf(), 3);
        let label = ContinuousLabel::parse(["1.5:0.4:0.8"]).unwrap();
        let mut ec = Example::with_continuous_label(label.clone(), 4);
        s.learn(&mut ec).unwrap();

        let learned = learned.borrow();
        assert_eq!(learned.len(), 1);
        assert_eq!(learned[0].label, Label::Continuous(label));
        assert!(matches!(ec.pred, Prediction::ActionPdf(_)));
    }

    #[test]
    fn learn_rejects_unlabeled_examples() {
        let (mut s, learned) = sampler(three_bin_pdf(), 3);
        let mut ec = Example::with_continuous_label(ContinuousLabel::default(), 0);
        assert!(matches!(
            s.learn(&mut ec).unwrap_err(),
            CbContError::MissingObservation { found: 0 }
        ));

        let label = ContinuousLabel::parse(["1.5"]).unwrap();
        let mut ec = Example::with_continuous_label(label, 0);
        assert!(matches!(s.learn(&mut ec).unwrap_err(), CbContError::TestOnlyExample));
        assert!(learned.borrow().is_empty());
    }

    #[test]
    fn learn_still_delegates_when_sampling_fails() {
        let zero = vec![seg(0.0, 0.0), seg(1.0, 0.0)];
        let (mut s, learned) = sampler(zero, 3);
        let label = ContinuousLabel::parse(["0.5:1:0.5"]).unwrap();
        let mut ec = Example::with_continuous_label(label, 0);
        let err = s.learn(&mut ec).unwrap_err();
        assert!(matches!(err, CbContError::SamplePdfFailed(_)));
        assert_eq!(learned.borrow().len(), 1);
    }
}
