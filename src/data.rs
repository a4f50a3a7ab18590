use crate::error::{Error, Result};
use crate::Tensor;
use ndarray::ArrayView3;
use std::ops::Range;

/// Checks that a trial array and its labels describe the same non-empty set
///
/// # Arguments
/// * `x` - Trials shaped (trials, channels, time samples)
/// * `y` - One label per trial
pub fn validate_trials(x: ArrayView3<f32>, y: &[usize]) -> Result<()> {
    let (n_trials, n_chans, n_times) = x.dim();
    if n_trials == 0 {
        return Err(Error::EmptyInput("no trials given".to_string()));
    }
    if n_chans == 0 || n_times == 0 {
        return Err(Error::EmptyInput(format!(
            "trials of {n_chans} channels by {n_times} samples"
        )));
    }
    if y.len() != n_trials {
        return Err(Error::ShapeMismatch {
            what: "labels",
            expected: n_trials,
            found: y.len(),
        });
    }
    Ok(())
}

/// Splits `n_trials` into a training range of the first `floor(7n / 8)`
/// trials and a test range with the rest, keeping the original order
pub fn split_train_test(n_trials: usize) -> (Range<usize>, Range<usize>) {
    let n_train = n_trials * 7 / 8;
    (0..n_train, n_train..n_trials)
}

/// Number of classes implied by 0-based labels
pub fn infer_n_classes(y: &[usize]) -> usize {
    y.iter().max().map_or(0, |&max_label| max_label + 1)
}

/// Gathers trials into a network input tensor
///
/// Each trial becomes one row holding a single-channel image with time along
/// the height and EEG channels along the width.
///
/// # Arguments
/// * `x` - Trials shaped (trials, channels, time samples)
/// * `indices` - Trials to gather, in batch order
pub fn gather_trials(x: ArrayView3<f32>, indices: &[usize]) -> Tensor {
    let (_, n_chans, n_times) = x.dim();
    let mut data = Vec::with_capacity(indices.len() * n_chans * n_times);

    for &trial in indices {
        let trial = x.index_axis(ndarray::Axis(0), trial);
        for t in 0..n_times {
            for c in 0..n_chans {
                data.push(trial[[c, t]]);
            }
        }
    }

    Tensor::new_with_shape(data, (indices.len(), n_times * n_chans))
}

/// Labels of the given trials, in the same order
pub fn gather_labels(y: &[usize], indices: &[usize]) -> Vec<usize> {
    indices.iter().map(|&i| y[i]).collect()
}
