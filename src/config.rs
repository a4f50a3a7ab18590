use crate::error::{Error, Result};
use crate::{Adam, Momentum, Optimizer, SGD};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optimization algorithm and its hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Sgd {
        learning_rate: f32,
    },
    Momentum {
        learning_rate: f32,
        momentum: f32,
    },
    Adam {
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adam {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl OptimizerConfig {
    pub fn learning_rate(&self) -> f32 {
        match *self {
            OptimizerConfig::Sgd { learning_rate }
            | OptimizerConfig::Momentum { learning_rate, .. }
            | OptimizerConfig::Adam { learning_rate, .. } => learning_rate,
        }
    }

    /// Creates a fresh optimizer with no accumulated state
    pub fn build(&self) -> Box<dyn Optimizer> {
        match *self {
            OptimizerConfig::Sgd { .. } => Box::new(SGD::new()),
            OptimizerConfig::Momentum { momentum, .. } => Box::new(Momentum::new(momentum)),
            OptimizerConfig::Adam {
                beta1,
                beta2,
                epsilon,
                ..
            } => Box::new(Adam::new(beta1, beta2, epsilon)),
        }
    }

    fn validate(&self) -> Result<()> {
        let learning_rate = self.learning_rate();
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be positive, got {learning_rate}"
            )));
        }
        match *self {
            OptimizerConfig::Momentum { momentum, .. } if !(0.0..1.0).contains(&momentum) => Err(
                Error::InvalidConfig(format!("momentum must be in [0, 1), got {momentum}")),
            ),
            OptimizerConfig::Adam { beta1, beta2, .. }
                if !(0.0..1.0).contains(&beta1) || !(0.0..1.0).contains(&beta2) =>
            {
                Err(Error::InvalidConfig(format!(
                    "Adam betas must be in [0, 1), got {beta1} and {beta2}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Hyperparameters of the ShallowFBCSPNet classifier and its training loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShallowFbcspConfig {
    /// Number of temporal filters
    pub n_filters_time: usize,
    /// Length of the temporal filters in samples
    pub filter_time_length: usize,
    /// Number of spatial filters
    pub n_filters_spat: usize,
    /// Average pooling window length in samples
    pub pool_time_length: usize,
    /// Average pooling stride in samples
    pub pool_time_stride: usize,
    /// Dropout probability before the classifier
    pub drop_prob: f32,
    /// Number of training epochs
    pub n_epochs: usize,
    /// Nominal number of trials per batch
    pub batch_size: usize,
    pub optimizer: OptimizerConfig,
    /// Seed for initialization, dropout and shuffling; drawn at fit time when absent
    pub seed: Option<u64>,
}

impl Default for ShallowFbcspConfig {
    fn default() -> Self {
        ShallowFbcspConfig {
            n_filters_time: 10,
            filter_time_length: 75,
            n_filters_spat: 5,
            pool_time_length: 60,
            pool_time_stride: 30,
            drop_prob: 0.5,
            n_epochs: 160,
            batch_size: 32,
            optimizer: OptimizerConfig::default(),
            seed: None,
        }
    }
}

impl ShallowFbcspConfig {
    /// Loads a configuration from a JSON file, missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ShallowFbcspConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every size is positive and every probability is in range
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("n_filters_time", self.n_filters_time),
            ("filter_time_length", self.filter_time_length),
            ("n_filters_spat", self.n_filters_spat),
            ("pool_time_length", self.pool_time_length),
            ("pool_time_stride", self.pool_time_stride),
            ("n_epochs", self.n_epochs),
            ("batch_size", self.batch_size),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, value)| *value == 0) {
            return Err(Error::InvalidConfig(format!("{name} must be positive")));
        }

        if !(0.0..1.0).contains(&self.drop_prob) {
            return Err(Error::InvalidConfig(format!(
                "drop_prob must be in [0, 1), got {}",
                self.drop_prob
            )));
        }

        self.optimizer.validate()
    }
}
