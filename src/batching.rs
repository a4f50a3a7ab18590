use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Order in which trial indices are assigned to batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOrder {
    /// Indices stay in ascending order
    Sequential,
    /// Indices are permuted with a generator seeded from `seed`
    Shuffled { seed: u64 },
}

/// Partitions `0..n_trials` into batches of nearly equal size
///
/// The number of batches is `ceil(n_trials / batch_size)`. Trials are spread
/// so that sizes differ by at most one, with the larger batches first, and no
/// batch exceeds `batch_size`.
///
/// # Arguments
/// * `n_trials` - Number of trials to partition
/// * `batch_size` - Upper bound on the batch size, must be positive
/// * `order` - Whether to shuffle the indices before partitioning
///
/// # Returns
/// One vector of trial indices per batch, empty when `n_trials` is zero
pub fn balanced_batches(n_trials: usize, batch_size: usize, order: BatchOrder) -> Vec<Vec<usize>> {
    debug_assert!(batch_size > 0);
    if n_trials == 0 || batch_size == 0 {
        return Vec::new();
    }

    let mut indices: Vec<usize> = (0..n_trials).collect();
    if let BatchOrder::Shuffled { seed } = order {
        indices.shuffle(&mut StdRng::seed_from_u64(seed));
    }

    let n_batches = n_trials.div_ceil(batch_size);
    let base_size = n_trials / n_batches;
    let n_larger = n_trials % n_batches;

    let mut batches = Vec::with_capacity(n_batches);
    let mut start = 0;
    for batch_idx in 0..n_batches {
        let size = if batch_idx < n_larger {
            base_size + 1
        } else {
            base_size
        };
        batches.push(indices[start..start + size].to_vec());
        start += size;
    }

    batches
}
