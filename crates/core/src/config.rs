use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::{CbContError, Result};
use crate::transform::TransformConfig;

const fn default_bandwidth() -> u32 {
    1
}

const fn default_epsilon() -> f32 {
    0.05
}

const fn default_dump_interval() -> f64 {
    1.0
}

/// Which stage sits on top of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Sample one continuous action per example.
    #[default]
    Sample,
    /// Emit the density itself.
    Pdf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub num_actions: u32,
    /// Action count of the transform stage; must agree with `num_actions`.
    #[serde(default)]
    pub cb_continuous: Option<u32>,
    #[serde(default)]
    pub min_value: Option<f32>,
    #[serde(default)]
    pub max_value: Option<f32>,
    #[serde(default = "default_bandwidth")]
    pub bandwidth: u32,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,
    #[serde(default = "default_dump_interval")]
    pub dump_interval: f64,
    #[serde(default)]
    pub quiet: bool,
    #[serde(default)]
    pub mode: PipelineMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            num_actions: 0,
            cb_continuous: None,
            min_value: None,
            max_value: None,
            bandwidth: default_bandwidth(),
            seed: 0,
            epsilon: default_epsilon(),
            dump_interval: default_dump_interval(),
            quiet: false,
            mode: PipelineMode::default(),
        }
    }
}

impl PipelineConfig {
    /// Checks the whole configuration before any example is processed.
    pub fn validate(&self) -> Result<TransformConfig> {
        if self.num_actions == 0 {
            return Err(CbContError::Config("number of actions must be > 0".into()));
        }
        if let Some(transform_actions) = self.cb_continuous {
            if transform_actions != self.num_actions {
                return Err(CbContError::Config(format!(
                    "action counts disagree: sampler has {}, transform has {transform_actions}",
                    self.num_actions
                )));
            }
        }
        let (Some(min_value), Some(max_value)) = (self.min_value, self.max_value) else {
            return Err(CbContError::Config(
                "min_value and max_value must both be supplied".into(),
            ));
        };
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(CbContError::Config(format!(
                "epsilon must lie in [0, 1], got {}",
                self.epsilon
            )));
        }
        if !(self.dump_interval > 0.0) {
            return Err(CbContError::Config("dump_interval must be > 0".into()));
        }
        TransformConfig::new(self.num_actions, min_value, max_value, self.bandwidth)
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)?;
    let config = serde_yaml_ng::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid() -> PipelineConfig {
        PipelineConfig {
            num_actions: 3,
            min_value: Some(0.0),
            max_value: Some(3.0),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn partial_yaml_merges_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "num_actions: 8\nmin_value: -1.0\nmax_value: 1.0\n").unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.num_actions, 8);
        assert_eq!(cfg.bandwidth, default_bandwidth());
        assert_eq!(cfg.epsilon, default_epsilon());
        assert_eq!(cfg.mode, PipelineMode::Sample);

        let transform = cfg.validate().unwrap();
        assert_eq!(transform.num_actions(), 8);
        assert_eq!(transform.bandwidth(), 1);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "num_actions: 8\nbandwith: 2\n").unwrap();
        assert!(matches!(load_config(file.path()).unwrap_err(), CbContError::Yaml(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            load_config("/does/not/exist.yaml").unwrap_err(),
            CbContError::Io(_)
        ));
    }

    #[test]
    fn validation_catches_setup_errors() {
        assert!(valid().validate().is_ok());

        let cases = [
            PipelineConfig { num_actions: 0, ..valid() },
            PipelineConfig { bandwidth: 0, ..valid() },
            PipelineConfig { min_value: None, ..valid() },
            PipelineConfig { max_value: None, ..valid() },
            PipelineConfig { max_value: Some(0.0), ..valid() },
            PipelineConfig { cb_continuous: Some(4), ..valid() },
            PipelineConfig { epsilon: 1.5, ..valid() },
        ];
        for cfg in cases {
            assert!(
                matches!(cfg.validate(), Err(CbContError::Config(_))),
                "{cfg:?} should be rejected"
            );
        }

        let agreeing = PipelineConfig { cb_continuous: Some(3), ..valid() };
        assert!(agreeing.validate().is_ok());
    }
}
