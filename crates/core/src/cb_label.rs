//! Discrete contextual-bandit label handed to the finite-action learner.

use serde::{Deserialize, Serialize};

use crate::label::UNKNOWN_COST;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CbClass {
    /// 1-based discrete action id.
    pub action: u32,
    pub cost: f32,
    /// Probability the action was played with; after redistribution this is
    /// the continuous probability scaled by the bin's box width.
    pub probability: f32,
    pub partial_prediction: f32,
}

impl CbClass {
    pub fn is_observed(&self) -> bool {
        self.cost != UNKNOWN_COST && self.probability > 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CbLabel {
    pub costs: Vec<CbClass>,
}

impl CbLabel {
    pub fn observed_cost(&self) -> Option<&CbClass> {
        self.costs.iter().find(|class| class.is_observed())
    }

    pub fn is_test(&self) -> bool {
        self.observed_cost().is_none()
    }
}
