use std::io;
use thiserror::Error;

use crate::explore::ExploreError;

pub type Result<T> = std::result::Result<T, CbContError>;

#[derive(Debug, Error)]
pub enum CbContError {
    #[error("malformed cost specification: '{0}'")]
    MalformedLabel(String),

    #[error("invalid cost '{text}' for action '{action}'")]
    InvalidCost { action: String, text: String },

    #[error("invalid probability '{text}' for action '{action}'")]
    InvalidProbability { action: String, text: String },

    #[error("truncated label cache: needed {needed} bytes, {available} available")]
    TruncatedCache { needed: usize, available: usize },

    #[error("failed to sample from pdf: {0}")]
    SamplePdfFailed(#[source] ExploreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("learn requires exactly one observed cost, found {found}")]
    MissingObservation { found: usize },

    #[error("learn called on a test-only example")]
    TestOnlyExample,

    #[error("unexpected prediction from base learner: expected {expected}, found {found}")]
    UnexpectedPrediction {
        expected: &'static str,
        found: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serde JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serde YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl CbContError {
    /// Per-example failures that the run recovers from locally.
    ///
    /// Everything else (label parsing, configuration, a broken stage contract)
    /// is fatal for the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CbContError::TruncatedCache { .. } | CbContError::SamplePdfFailed(_) | CbContError::Io(_)
        )
    }
}

impl From<ExploreError> for CbContError {
    fn from(err: ExploreError) -> Self {
        CbContError::SamplePdfFailed(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_kinds_follow_policy() {
        assert!(CbContError::TruncatedCache { needed: 8, available: 3 }.is_recoverable());
        assert!(CbContError::SamplePdfFailed(ExploreError::ZeroMass).is_recoverable());
        assert!(!CbContError::MalformedLabel("1:2:3:4".into()).is_recoverable());
        assert!(!CbContError::Config("bandwidth must be >= 1".into()).is_recoverable());
        assert!(!CbContError::MissingObservation { found: 2 }.is_recoverable());
    }
}
