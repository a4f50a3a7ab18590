use crate::config::ShallowFbcspConfig;
use crate::error::{Error, Result};
use crate::layers::{AvgPool, BatchNorm, Conv, Dropout, LogSoftmax, SafeLog, Square};
use crate::{Layer, Network};
use rand::Rng;

/// Time lengths of the intermediate feature maps for a given input length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalSizes {
    /// Samples after the temporal convolution
    pub after_conv: usize,
    /// Samples after average pooling, which is also the classifier kernel length
    pub final_conv_length: usize,
}

impl TemporalSizes {
    pub fn new(n_times: usize, config: &ShallowFbcspConfig) -> Result<Self> {
        if n_times < config.filter_time_length {
            return Err(Error::InputTooShort {
                stage: "temporal convolution",
                time_samples: n_times,
                required: config.filter_time_length,
            });
        }
        let after_conv = n_times - config.filter_time_length + 1;

        if after_conv < config.pool_time_length {
            return Err(Error::InputTooShort {
                stage: "average pooling",
                time_samples: n_times,
                required: config.filter_time_length + config.pool_time_length - 1,
            });
        }
        let final_conv_length =
            (after_conv - config.pool_time_length) / config.pool_time_stride + 1;

        Ok(TemporalSizes {
            after_conv,
            final_conv_length,
        })
    }
}

/// Builds an untrained ShallowFBCSPNet.
///
/// The network consumes trials as single-channel images of `n_times` rows
/// by `n_chans` columns and emits one row of class log-probabilities per trial.
///
/// # Arguments
/// * `n_chans` - Number of EEG channels
/// * `n_times` - Number of time samples per trial
/// * `n_classes` - Number of output classes
/// * `config` - Layer hyperparameters and optimizer
/// * `rng` - Random generator for weight initialization
pub fn shallow_fbcsp_net<R: Rng>(
    n_chans: usize,
    n_times: usize,
    n_classes: usize,
    config: &ShallowFbcspConfig,
    rng: &mut R,
) -> Result<Network> {
    config.validate()?;
    if n_chans == 0 {
        return Err(Error::EmptyInput("trials have no channels".to_string()));
    }
    if n_classes == 0 {
        return Err(Error::EmptyInput("no classes to predict".to_string()));
    }
    let sizes = TemporalSizes::new(n_times, config)?;

    let mut network = Network::new(config.optimizer.build());

    network.add_layer(Layer::Conv(Conv::new(
        1,
        config.n_filters_time,
        (n_times, n_chans),
        (config.filter_time_length, 1),
        (1, 1),
        true,
        rng,
    )));
    network.add_layer(Layer::Conv(Conv::new(
        config.n_filters_time,
        config.n_filters_spat,
        (sizes.after_conv, n_chans),
        (1, n_chans),
        (1, 1),
        false,
        rng,
    )));
    network.add_layer(Layer::BatchNorm(BatchNorm::new(config.n_filters_spat)));
    network.add_layer(Layer::Square(Square::new()));
    network.add_layer(Layer::AvgPool(AvgPool::new(
        config.n_filters_spat,
        (sizes.after_conv, 1),
        (config.pool_time_length, 1),
        (config.pool_time_stride, 1),
    )));
    network.add_layer(Layer::SafeLog(SafeLog::default()));
    network.add_layer(Layer::Dropout(Dropout::new(config.drop_prob)));
    network.add_layer(Layer::Conv(Conv::new(
        config.n_filters_spat,
        n_classes,
        (sizes.final_conv_length, 1),
        (sizes.final_conv_length, 1),
        (1, 1),
        true,
        rng,
    )));
    network.add_layer(Layer::LogSoftmax(LogSoftmax::new()));

    network.initialize_optimizer();
    Ok(network)
}
