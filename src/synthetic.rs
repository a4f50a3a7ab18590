use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal, Uniform};
use std::f32::consts::PI;

/// Generates labelled EEG-like trials whose classes differ in band power
///
/// Every channel carries Gaussian noise. Trials of class `k` add an
/// oscillation of a class-specific frequency on channel `k % n_chans`, so the
/// classes are separable by the power of one channel in one band. Labels
/// cycle through `0..n_classes` in trial order.
///
/// # Arguments
/// * `n_trials` - Number of trials
/// * `n_chans` - Number of channels
/// * `n_times` - Number of time samples per trial
/// * `n_classes` - Number of classes
/// * `seed` - Seed for noise and oscillation phases
///
/// # Returns
/// Trials shaped (trials, channels, time samples) and their labels
pub fn band_power_trials(
    n_trials: usize,
    n_chans: usize,
    n_times: usize,
    n_classes: usize,
    seed: u64,
) -> (Array3<f32>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let phase = Uniform::new(0.0f32, 2.0 * PI);

    let labels: Vec<usize> = (0..n_trials).map(|i| i % n_classes.max(1)).collect();
    let mut trials = Array3::zeros((n_trials, n_chans, n_times));

    for (i, &label) in labels.iter().enumerate() {
        let frequency = 0.04 + 0.06 * label as f32;
        let source = label % n_chans.max(1);
        let offset = phase.sample(&mut rng);
        let amplitude = 1.5 + rng.gen::<f32>();

        for c in 0..n_chans {
            for t in 0..n_times {
                let mut value = 0.5 * rng.sample::<f32, _>(StandardNormal);
                if c == source {
                    value += amplitude * (2.0 * PI * frequency * t as f32 + offset).sin();
                }
                trials[[i, c, t]] = value;
            }
        }
    }

    (trials, labels)
}
