use crate::batching::{balanced_batches, BatchOrder};
use crate::data::{gather_labels, gather_trials};
use crate::evaluation::{nll_loss, nll_loss_gradient};
use crate::layers::ForwardMode;
use crate::Network;
use ndarray::ArrayView3;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

/// Performs one gradient update on a batch of trials
///
/// # Arguments
/// * `network` - Network to update
/// * `x` - All trials shaped (trials, channels, time samples)
/// * `y` - Labels for all trials
/// * `batch` - Trials forming the batch
/// * `learning_rate` - Step size passed to the optimizer
/// * `rng` - Generator for dropout masks
///
/// # Returns
/// Loss of the batch before the update
pub fn train_batch(
    network: &mut Network,
    x: ArrayView3<f32>,
    y: &[usize],
    batch: &[usize],
    learning_rate: f32,
    rng: &mut StdRng,
) -> f32 {
    let input = gather_trials(x, batch);
    let targets = gather_labels(y, batch);

    let (output, forward_contexts) = network.forward(input, &mut ForwardMode::Train(rng));
    let loss = nll_loss(&output, &targets);

    let grad = nll_loss_gradient(&output, &targets);
    let (_, backward_contexts) = network.backward(grad, &forward_contexts);

    network.update_parameters(&forward_contexts, &backward_contexts, learning_rate);

    loss
}

/// Trains the network for one pass over shuffled balanced batches
///
/// # Arguments
/// * `network` - Network to update
/// * `x` - All trials shaped (trials, channels, time samples)
/// * `y` - Labels for all trials
/// * `train_indices` - Trials of the training split
/// * `batch_size` - Nominal batch size
/// * `learning_rate` - Step size passed to the optimizer
/// * `rng` - Generator for the shuffle seed and dropout masks
///
/// # Returns
/// Mean loss over the batches of the epoch
pub fn train_epoch(
    network: &mut Network,
    x: ArrayView3<f32>,
    y: &[usize],
    train_indices: &[usize],
    batch_size: usize,
    learning_rate: f32,
    rng: &mut StdRng,
) -> f32 {
    let seed = rng.gen::<u64>();
    let batches = balanced_batches(
        train_indices.len(),
        batch_size,
        BatchOrder::Shuffled { seed },
    );

    let mut total_loss = 0.0;
    for (batch_idx, positions) in batches.iter().enumerate() {
        let batch = gather_labels(train_indices, positions);
        let loss = train_batch(network, x, y, &batch, learning_rate, rng);
        debug!(batch = batch_idx, size = batch.len(), loss, "trained batch");
        total_loss += loss;
    }

    if batches.is_empty() {
        0.0
    } else {
        total_loss / batches.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::shallow_fbcsp_net;
    use crate::config::{OptimizerConfig, ShallowFbcspConfig};
    use crate::evaluation::evaluate_split;
    use crate::layers::Layer;
    use ndarray::Array3;
    use rand::SeedableRng;

    fn separable_trials() -> (Array3<f32>, Vec<usize>) {
        // Class 1 trials carry a strong oscillation on channel 0, class 0 trials are nearly flat
        let y: Vec<usize> = (0..24).map(|i| i % 2).collect();
        let x = Array3::from_shape_fn((24, 2, 12), |(i, c, t)| {
            let amplitude = if y[i] == 1 && c == 0 { 3.0 } else { 0.1 };
            amplitude * ((t as f32) * 1.3 + i as f32).sin()
        });
        (x, y)
    }

    fn config() -> ShallowFbcspConfig {
        ShallowFbcspConfig {
            n_filters_time: 4,
            filter_time_length: 3,
            n_filters_spat: 2,
            pool_time_length: 4,
            pool_time_stride: 2,
            drop_prob: 0.0,
            optimizer: OptimizerConfig::Adam {
                learning_rate: 0.05,
                beta1: 0.9,
                beta2: 0.999,
                epsilon: 1e-8,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_train_batch_changes_parameters_and_running_stats() {
        let (x, y) = separable_trials();
        let config = config();
        let mut rng = StdRng::seed_from_u64(1);
        let mut network = shallow_fbcsp_net(2, 12, 2, &config, &mut rng).unwrap();

        let weights_before = match &network.layers[0] {
            Layer::Conv(conv) => conv.weights.clone(),
            _ => panic!(),
        };

        let loss = train_batch(&mut network, x.view(), &y, &[0, 1, 2, 3], 0.05, &mut rng);
        assert!(loss.is_finite() && loss > 0.0);

        match &network.layers[0] {
            Layer::Conv(conv) => assert_ne!(conv.weights, weights_before),
            _ => panic!(),
        }
        match &network.layers[2] {
            Layer::BatchNorm(bn) => assert!(bn.running_mean.data.iter().any(|&m| m != 0.0)),
            _ => panic!(),
        }
    }

    #[test]
    fn test_training_reduces_loss_on_separable_data() {
        let (x, y) = separable_trials();
        let config = config();
        let mut rng = StdRng::seed_from_u64(2);
        let mut network = shallow_fbcsp_net(2, 12, 2, &config, &mut rng).unwrap();
        let indices: Vec<usize> = (0..24).collect();

        let before = evaluate_split(&network, x.view(), &y, &indices, 8).unwrap();
        for _ in 0..30 {
            train_epoch(&mut network, x.view(), &y, &indices, 8, 0.05, &mut rng);
        }
        let after = evaluate_split(&network, x.view(), &y, &indices, 8).unwrap();

        assert!(after.loss < before.loss);
    }

    #[test]
    fn test_epochs_are_reproducible_with_seed() {
        let (x, y) = separable_trials();
        let config = ShallowFbcspConfig {
            drop_prob: 0.5,
            ..config()
        };
        let indices: Vec<usize> = (0..20).collect();

        let run = || {
            let mut rng = StdRng::seed_from_u64(77);
            let mut network = shallow_fbcsp_net(2, 12, 2, &config, &mut rng).unwrap();
            let loss = train_epoch(&mut network, x.view(), &y, &indices, 6, 0.01, &mut rng);
            (loss, network.predict(gather_trials(x.view(), &[21, 22])))
        };

        let (loss_a, output_a) = run();
        let (loss_b, output_b) = run();
        assert_eq!(loss_a, loss_b);
        assert_eq!(output_a, output_b);
    }
}
