//! Epsilon-greedy discrete learner.
//!
//! Keeps an importance-weighted cost estimate per arm, puts `1 - epsilon` of
//! the probability mass on the arm with the lowest estimate and spreads
//! `epsilon` uniformly over all arms. It ignores features; it exists so the
//! continuous pipeline can run end to end.

use std::cmp::Ordering;

use cbcont_core::{ActionScore, CbContError, Example, Label, Learner, Prediction, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
struct ArmStats {
    plays: u64,
    weighted_cost: f64,
    weight: f64,
}

impl ArmStats {
    fn average(&self) -> f64 {
        if self.weight == 0.0 {
            0.0
        } else {
            self.weighted_cost / self.weight
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpsilonGreedy {
    arms: Vec<ArmStats>,
    #[serde(default = "default_epsilon")]
    epsilon: f64,
}

fn default_epsilon() -> f64 {
    0.05
}

impl EpsilonGreedy {
    pub fn new(num_actions: u32, epsilon: f32) -> Self {
        Self {
            arms: vec![ArmStats::default(); num_actions as usize],
            epsilon: f64::from(epsilon).clamp(0.0, 1.0),
        }
    }

    pub fn num_actions(&self) -> usize {
        self.arms.len()
    }

    /// Loads learner state from a JSON snapshot.
    ///
    /// A snapshot that does not deserialize, or that was taken for a different
    /// number of actions, leaves the state unchanged.
    pub fn load(&mut self, snapshot: Value) {
        if let Ok(loaded) = serde_json::from_value::<Self>(snapshot) {
            if loaded.arms.len() == self.arms.len() {
                *self = loaded;
            }
        }
    }

    /// Creates a JSON snapshot of the current learner state.
    ///
    /// Returns an empty object if serialization fails.
    pub fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }

    /// 0-based index of the arm with the lowest estimated cost; ties go to
    /// the lowest index.
    fn best_arm(&self) -> Option<usize> {
        self.arms
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.average().partial_cmp(&b.average()).unwrap_or(Ordering::Equal))
            .map(|(index, _)| index)
    }

    /// Probability mass function over the arms, in action-id order.
    pub fn pmf(&self) -> Vec<f32> {
        let n = self.arms.len();
        if n == 0 {
            return Vec::new();
        }
        let explore = self.epsilon / n as f64;
        let mut pmf = vec![explore; n];
        if let Some(best) = self.best_arm() {
            pmf[best] += 1.0 - self.epsilon;
        }
        pmf.into_iter().map(|p| p as f32).collect()
    }
}

impl Learner for EpsilonGreedy {
    fn predict(&mut self, ec: &mut Example) -> Result<()> {
        let mut scores = match std::mem::take(&mut ec.pred) {
            Prediction::ActionScores(buffer) => buffer,
            _ => Vec::with_capacity(self.arms.len()),
        };
        scores.clear();
        scores.extend(self.pmf().into_iter().enumerate().map(|(i, score)| ActionScore {
            action: i as u32 + 1,
            score,
        }));
        ec.pred = Prediction::ActionScores(scores);
        Ok(())
    }

    fn learn(&mut self, ec: &mut Example) -> Result<()> {
        let Label::Discrete(label) = &ec.label else {
            return Err(CbContError::MissingObservation { found: 0 });
        };
        for class in label.costs.iter().filter(|c| c.is_observed()) {
            let Some(arm) = (class.action as usize)
                .checked_sub(1)
                .and_then(|index| self.arms.get_mut(index))
            else {
                return Err(CbContError::Config(format!(
                    "discrete action {} outside 1..={}",
                    class.action,
                    self.arms.len()
                )));
            };
            let importance = 1.0 / f64::from(class.probability);
            arm.plays = arm.plays.saturating_add(1);
            arm.weighted_cost += f64::from(class.cost) * importance;
            arm.weight += importance;
        }
        debug!(updates = label.costs.len(), "epsilon-greedy update");
        Ok(())
    }
}
