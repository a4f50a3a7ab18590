use crate::batching::{balanced_batches, BatchOrder};
use crate::data::{gather_labels, gather_trials};
use crate::error::{Error, Result};
use crate::{Network, Tensor};
use ndarray::ArrayView3;

/// Mean negative log-likelihood of the target classes
///
/// # Arguments
/// * `log_probs` - Class log-probabilities, one row per trial
/// * `targets` - Ground truth labels
pub fn nll_loss(log_probs: &Tensor, targets: &[usize]) -> f32 {
    let n_classes = log_probs.shape.1;
    let total: f32 = targets
        .iter()
        .enumerate()
        .map(|(i, &target)| -log_probs.data[i * n_classes + target])
        .sum();
    total / targets.len() as f32
}

/// Gradient of [`nll_loss`] with respect to the log-probabilities
pub fn nll_loss_gradient(log_probs: &Tensor, targets: &[usize]) -> Tensor {
    let n_classes = log_probs.shape.1;
    let scale = -1.0 / targets.len() as f32;

    let mut grad = log_probs.zeros_like();
    for (i, &target) in targets.iter().enumerate() {
        grad.data[i * n_classes + target] = scale;
    }
    grad
}

/// Fraction of rows whose highest-scoring class equals the target
pub fn calculate_accuracy(log_probs: &Tensor, targets: &[usize]) -> f32 {
    let correct = log_probs
        .argmax_rows()
        .iter()
        .zip(targets)
        .filter(|(predicted, target)| predicted == target)
        .count();
    correct as f32 / targets.len() as f32
}

/// Loss and accuracy of the network on one data split
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitMetrics {
    pub loss: f32,
    /// Fraction of correct predictions in [0, 1]
    pub accuracy: f32,
}

/// Runs the network in evaluation mode over the given trials
///
/// Trials are processed in sequential balanced batches and the outputs
/// are concatenated in the order of `indices`.
///
/// # Returns
/// Class log-probabilities, one row per entry of `indices`
pub fn predict_log_probs(
    network: &Network,
    x: ArrayView3<f32>,
    indices: &[usize],
    batch_size: usize,
) -> Tensor {
    let outputs: Vec<Tensor> = balanced_batches(indices.len(), batch_size, BatchOrder::Sequential)
        .into_iter()
        .map(|positions| {
            let trials = gather_labels(indices, &positions);
            network.predict(gather_trials(x, &trials))
        })
        .collect();

    Tensor::concat_rows(outputs)
}

/// Evaluates loss and accuracy on the given trials without changing the network
///
/// # Arguments
/// * `network` - Trained or partially trained network
/// * `x` - All trials shaped (trials, channels, time samples)
/// * `y` - Labels for all trials
/// * `indices` - Trials forming the split
/// * `batch_size` - Nominal evaluation batch size
pub fn evaluate_split(
    network: &Network,
    x: ArrayView3<f32>,
    y: &[usize],
    indices: &[usize],
    batch_size: usize,
) -> Result<SplitMetrics> {
    if indices.is_empty() {
        return Err(Error::EmptyInput("cannot evaluate an empty split".to_string()));
    }

    let log_probs = predict_log_probs(network, x, indices, batch_size);
    let targets = gather_labels(y, indices);

    Ok(SplitMetrics {
        loss: nll_loss(&log_probs, &targets),
        accuracy: calculate_accuracy(&log_probs, &targets),
    })
}
