//! Continuous-action contextual bandits on top of a finite-action learner.
//!
//! The discrete learner scores N actions. [`PmfToPdf`] turns those scores into
//! a density over `[min_value, max_value]` and maps continuous observations
//! back onto the discrete bins; [`ContinuousActionSampler`] draws one action
//! from that density. [`Pipeline`] stacks the stages and reports every example.

pub mod cb_label;
pub mod config;
pub mod error;
pub mod example;
pub mod explore;
pub mod label;
pub mod output;
pub mod pipeline;
pub mod rand_state;
pub mod sampler;
pub mod stats;
pub mod transform;

pub use cb_label::{CbClass, CbLabel};
pub use config::{load_config, PipelineConfig, PipelineMode};
pub use error::{CbContError, Result};
pub use example::{ActionScore, Example, Label, Learner, PdfSegment, Prediction, SampledAction};
pub use explore::ExploreError;
pub use label::{ContinuousLabel, CostEntry, UNKNOWN_COST};
pub use pipeline::Pipeline;
pub use rand_state::{RandState, SharedRandState};
pub use sampler::ContinuousActionSampler;
pub use stats::{ProgressLine, RunStats};
pub use transform::{PmfToPdf, TransformConfig};
