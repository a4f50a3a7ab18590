use crate::error::{Error, Result};
use ndarray::{Array1, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

/// Estimator interface shared by classifiers that can be cross-validated
pub trait Classifier {
    /// Trains on trials shaped (trials, channels, time samples) with one label each
    fn fit(&mut self, x: ArrayView3<f32>, y: &[usize]) -> Result<&mut Self>;

    /// Predicts one label per trial
    fn predict(&self, x: ArrayView3<f32>) -> Result<Array1<usize>>;

    /// Fraction of trials whose predicted label equals the given one
    fn score(&self, x: ArrayView3<f32>, y: &[usize]) -> Result<f32> {
        let predicted = self.predict(x)?;
        if predicted.len() != y.len() {
            return Err(Error::ShapeMismatch {
                what: "labels",
                expected: predicted.len(),
                found: y.len(),
            });
        }

        let correct = predicted
            .iter()
            .zip(y)
            .filter(|(predicted, label)| predicted == label)
            .count();
        Ok(correct as f32 / y.len() as f32)
    }
}

/// K-fold cross-validation splitter with contiguous folds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KFold {
    n_splits: usize,
    shuffle_seed: Option<u64>,
}

impl KFold {
    /// Creates a splitter that keeps trials in their original order
    pub fn new(n_splits: usize) -> Self {
        KFold {
            n_splits,
            shuffle_seed: None,
        }
    }

    /// Shuffles trial indices with the given seed before forming folds
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generates (train, test) indices for each fold
    ///
    /// The first `n_samples % n_splits` folds hold one extra test sample.
    pub fn split(&self, n_samples: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        if self.n_splits < 2 {
            return Err(Error::InvalidConfig(format!(
                "k-fold needs at least 2 splits, got {}",
                self.n_splits
            )));
        }
        if self.n_splits > n_samples {
            return Err(Error::InvalidConfig(format!(
                "cannot make {} folds from {n_samples} samples",
                self.n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if let Some(seed) = self.shuffle_seed {
            indices.shuffle(&mut StdRng::seed_from_u64(seed));
        }

        let fold_size = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;

        for i in 0..self.n_splits {
            let extra = usize::from(i < remainder);
            let end = start + fold_size + extra;

            let test_indices = indices[start..end].to_vec();
            let train_indices = indices[..start]
                .iter()
                .chain(indices[end..].iter())
                .copied()
                .collect();

            folds.push((train_indices, test_indices));
            start = end;
        }

        Ok(folds)
    }
}

/// Scores a fresh estimator on every fold of a k-fold split
///
/// # Arguments
/// * `make_estimator` - Creates an unfitted estimator for each fold
/// * `x` - Trials shaped (trials, channels, time samples)
/// * `y` - One label per trial
/// * `cv` - Fold splitter
///
/// # Returns
/// Test accuracy of each fold, in fold order
pub fn cross_val_score<C, F>(
    mut make_estimator: F,
    x: ArrayView3<f32>,
    y: &[usize],
    cv: &KFold,
) -> Result<Vec<f32>>
where
    C: Classifier,
    F: FnMut() -> C,
{
    if y.len() != x.len_of(Axis(0)) {
        return Err(Error::ShapeMismatch {
            what: "labels",
            expected: x.len_of(Axis(0)),
            found: y.len(),
        });
    }

    let mut scores = Vec::with_capacity(cv.n_splits());
    for (fold, (train, test)) in cv.split(y.len())?.into_iter().enumerate() {
        let x_train = x.select(Axis(0), &train);
        let y_train: Vec<usize> = train.iter().map(|&i| y[i]).collect();
        let x_test = x.select(Axis(0), &test);
        let y_test: Vec<usize> = test.iter().map(|&i| y[i]).collect();

        let mut estimator = make_estimator();
        estimator.fit(x_train.view(), &y_train)?;
        let score = estimator.score(x_test.view(), &y_test)?;

        info!(fold, train = train.len(), test = test.len(), score, "cross-validation fold");
        scores.push(score);
    }

    Ok(scores)
}
