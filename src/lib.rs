pub mod architecture;
pub mod args;
pub mod batching;
pub mod config;
pub mod data;
pub mod error;
pub mod estimator;
pub mod evaluation;
pub mod layers;
pub mod model_selection;
pub mod network;
pub mod optimizers;
pub mod synthetic;
pub mod tensor;
pub mod test_utils;
pub mod training;

pub use architecture::{shallow_fbcsp_net, TemporalSizes};
pub use args::{parse_arguments, DemoOptions};
pub use batching::{balanced_batches, BatchOrder};
pub use config::{OptimizerConfig, ShallowFbcspConfig};
pub use data::{split_train_test, validate_trials};
pub use error::{Error, Result};
pub use estimator::ShallowFbcspClassifier;
pub use evaluation::{
    calculate_accuracy, evaluate_split, nll_loss, nll_loss_gradient, predict_log_probs,
    SplitMetrics,
};
pub use layers::{
    AvgPool,
    AvgPoolBackwardContext,
    AvgPoolForwardContext,
    //
    BatchNorm,
    BatchNormBackwardContext,
    BatchNormForwardContext,
    //
    Conv,
    ConvBackwardContext,
    ConvForwardContext,
    //
    Dropout,
    DropoutBackwardContext,
    DropoutForwardContext,
    //
    ForwardMode,
    Layer,
    LayerBackwardContext,
    LayerForwardContext,
    //
    LogSoftmax,
    LogSoftmaxBackwardContext,
    LogSoftmaxForwardContext,
    //
    SafeLog,
    SafeLogBackwardContext,
    SafeLogForwardContext,
    //
    Square,
    SquareBackwardContext,
    SquareForwardContext,
};
pub use model_selection::{cross_val_score, Classifier, KFold};
pub use network::Network;
pub use optimizers::{Adam, Momentum, Optimizer, SGD};
pub use synthetic::band_power_trials;
pub use tensor::Tensor;
pub use training::{train_batch, train_epoch};
