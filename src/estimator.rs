use crate::architecture::shallow_fbcsp_net;
use crate::config::ShallowFbcspConfig;
use crate::data::{infer_n_classes, split_train_test, validate_trials};
use crate::error::{Error, Result};
use crate::evaluation::{evaluate_split, predict_log_probs, SplitMetrics};
use crate::model_selection::Classifier;
use crate::training::train_epoch;
use crate::{Network, Tensor};
use ndarray::{Array1, Array2, ArrayView3};
use rand::rngs::StdRng;
use rand::{thread_rng, Rng, SeedableRng};
use tracing::{debug, info};

/// Network and bookkeeping produced by a successful fit
#[derive(Debug)]
struct FittedModel {
    network: Network,
    n_chans: usize,
    n_times: usize,
    n_classes: usize,
    /// Per-epoch NLL loss, column 0 train and column 1 test
    loss_records: Array2<f32>,
    /// Per-epoch accuracy, column 0 train and column 1 test
    accuracy_records: Array2<f32>,
}

/// ShallowFBCSPNet trial classifier with a `fit` / `predict` interface
///
/// `fit` holds out the last eighth of the trials as a test split, trains on
/// the rest and records loss and accuracy of both splits after every epoch.
#[derive(Debug, Default)]
pub struct ShallowFbcspClassifier {
    config: ShallowFbcspConfig,
    fitted: Option<FittedModel>,
}

impl ShallowFbcspClassifier {
    pub fn new(config: ShallowFbcspConfig) -> Self {
        ShallowFbcspClassifier {
            config,
            fitted: None,
        }
    }

    pub fn config(&self) -> &ShallowFbcspConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Number of classes seen during fit
    pub fn n_classes(&self) -> Option<usize> {
        self.fitted.as_ref().map(|fitted| fitted.n_classes)
    }

    /// Per-epoch NLL loss of shape (epochs, 2), column 0 train and column 1 test
    pub fn loss_records(&self) -> Option<&Array2<f32>> {
        self.fitted.as_ref().map(|fitted| &fitted.loss_records)
    }

    /// Per-epoch accuracy of shape (epochs, 2), column 0 train and column 1 test
    pub fn accuracy_records(&self) -> Option<&Array2<f32>> {
        self.fitted.as_ref().map(|fitted| &fitted.accuracy_records)
    }

    /// Trains a new network on the given trials, replacing any previous fit
    ///
    /// # Arguments
    /// * `x` - Trials shaped (trials, channels, time samples)
    /// * `y` - 0-based class label of each trial
    pub fn fit(&mut self, x: ArrayView3<f32>, y: &[usize]) -> Result<&mut Self> {
        self.config.validate()?;
        validate_trials(x, y)?;

        let (n_trials, n_chans, n_times) = x.dim();
        let (train_range, test_range) = split_train_test(n_trials);
        if train_range.is_empty() {
            return Err(Error::EmptyInput(format!(
                "{n_trials} trial(s) leave no training split"
            )));
        }
        let train_indices: Vec<usize> = train_range.collect();
        let test_indices: Vec<usize> = test_range.collect();

        let n_classes = infer_n_classes(y);
        let seed = self.config.seed.unwrap_or_else(|| thread_rng().gen());
        let mut rng = StdRng::seed_from_u64(seed);

        let mut network = shallow_fbcsp_net(n_chans, n_times, n_classes, &self.config, &mut rng)?;

        info!(
            trials = n_trials,
            train = train_indices.len(),
            test = test_indices.len(),
            channels = n_chans,
            samples = n_times,
            classes = n_classes,
            parameters = network.parameter_count(),
            seed,
            "fitting ShallowFBCSPNet"
        );

        let n_epochs = self.config.n_epochs;
        let batch_size = self.config.batch_size;
        let learning_rate = self.config.optimizer.learning_rate();
        let mut loss_records = Array2::zeros((n_epochs, 2));
        let mut accuracy_records = Array2::zeros((n_epochs, 2));

        for epoch in 0..n_epochs {
            let mean_batch_loss = train_epoch(
                &mut network,
                x,
                y,
                &train_indices,
                batch_size,
                learning_rate,
                &mut rng,
            );
            debug!(epoch, mean_batch_loss, "finished training pass");

            info!("Epoch {}", epoch);
            for (column, (name, indices)) in [("Train", &train_indices), ("Test", &test_indices)]
                .into_iter()
                .enumerate()
            {
                let SplitMetrics { loss, accuracy } =
                    evaluate_split(&network, x, y, indices, batch_size)?;

                info!("{:6} Loss: {:.5}", name, loss);
                info!("{:6} Accuracy: {:.1}%", name, accuracy * 100.0);

                loss_records[[epoch, column]] = loss;
                accuracy_records[[epoch, column]] = accuracy;
            }
        }

        self.fitted = Some(FittedModel {
            network,
            n_chans,
            n_times,
            n_classes,
            loss_records,
            accuracy_records,
        });
        Ok(self)
    }

    /// Class log-probabilities of shape (trials, classes)
    pub fn predict_log_proba(&self, x: ArrayView3<f32>) -> Result<Array2<f32>> {
        let log_probs = self.forward_all(x)?;
        let (rows, cols) = log_probs.shape;
        Ok(Array2::from_shape_fn((rows, cols), |(i, j)| {
            log_probs.data[i * cols + j]
        }))
    }

    /// Class probabilities of shape (trials, classes)
    pub fn predict_proba(&self, x: ArrayView3<f32>) -> Result<Array2<f32>> {
        Ok(self.predict_log_proba(x)?.mapv(f32::exp))
    }

    /// Most probable class of each trial
    pub fn predict(&self, x: ArrayView3<f32>) -> Result<Array1<usize>> {
        let log_probs = self.forward_all(x)?;
        Ok(Array1::from(log_probs.argmax_rows()))
    }

    /// Runs every trial through the fitted network in sequential balanced batches
    fn forward_all(&self, x: ArrayView3<f32>) -> Result<Tensor> {
        let fitted = self.fitted.as_ref().ok_or(Error::NotFitted)?;

        let (n_trials, n_chans, n_times) = x.dim();
        if n_trials == 0 {
            return Err(Error::EmptyInput("no trials to predict".to_string()));
        }
        if n_chans != fitted.n_chans {
            return Err(Error::ShapeMismatch {
                what: "channels",
                expected: fitted.n_chans,
                found: n_chans,
            });
        }
        if n_times != fitted.n_times {
            return Err(Error::ShapeMismatch {
                what: "time samples",
                expected: fitted.n_times,
                found: n_times,
            });
        }

        let indices: Vec<usize> = (0..n_trials).collect();
        Ok(predict_log_probs(
            &fitted.network,
            x,
            &indices,
            self.config.batch_size,
        ))
    }
}

impl Classifier for ShallowFbcspClassifier {
    fn fit(&mut self, x: ArrayView3<f32>, y: &[usize]) -> Result<&mut Self> {
        ShallowFbcspClassifier::fit(self, x, y)
    }

    fn predict(&self, x: ArrayView3<f32>) -> Result<Array1<usize>> {
        ShallowFbcspClassifier::predict(self, x)
    }
}
