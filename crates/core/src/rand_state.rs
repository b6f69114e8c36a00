//! Pipeline-wide pseudo-random state.
//!
//! A draw reads a uniform value *at* the current state without mutating it;
//! the owner then advances the state exactly once per decision. With a fixed
//! seed and a fixed example order the sequence of decisions is reproducible.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Shared by reference between the stages of one pipeline run.
pub type SharedRandState = Rc<RefCell<RandState>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandState {
    state: u64,
}

impl RandState {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn shared(seed: u64) -> SharedRandState {
        Rc::new(RefCell::new(Self::new(seed)))
    }

    pub fn current_state(&self) -> u64 {
        self.state
    }

    /// Uniform value in `[0, 1)` determined entirely by `state`.
    pub fn uniform_at(state: u64) -> f32 {
        StdRng::seed_from_u64(state).gen::<f32>()
    }

    /// Returns the uniform value at the current state and moves to the next one.
    pub fn advance(&mut self) -> f32 {
        let mut rng = StdRng::seed_from_u64(self.state);
        let value = rng.gen::<f32>();
        self.state = rng.gen::<u64>();
        value
    }
}
