//! Discrete-action learners for the cbcont pipeline.
//!
//! Any type implementing [`cbcont_core::Learner`] that answers predict with
//! one score per action and learns from a discrete cost label can sit under
//! the transform.

/// Epsilon-greedy learner over per-arm cost estimates.
pub mod epsilon_greedy;

pub use epsilon_greedy::EpsilonGreedy;
