use crate::layers::ForwardMode;
use crate::{LayerBackwardContext, LayerForwardContext, Tensor};

/// Implements Batch Normalization over the feature maps of a convolution.
///
/// Each feature is normalized over the batch and all spatial positions.
#[derive(Debug)]
pub struct BatchNorm {
    /// Small constant for numerical stability
    pub eps: f32,
    /// Momentum for running statistics updates
    pub momentum: f32,
    /// Number of input features/channels
    pub num_features: usize,
    /// Learnable scale parameter
    pub gamma: Tensor,
    /// Learnable shift parameter
    pub beta: Tensor,
    /// Accumulated gradients for gamma
    pub grad_gamma: Tensor,
    /// Accumulated gradients for beta
    pub grad_beta: Tensor,
    /// Running mean for inference
    pub running_mean: Tensor,
    /// Running variance for inference
    pub running_var: Tensor,
}

#[derive(Debug)]
pub struct BatchNormForwardContext {
    /// Normalized values before scaling and shifting
    pub normalized: Tensor,
    /// Standard deviation for each feature
    pub std: Tensor,
    /// Mean of current batch
    pub batch_mean: Tensor,
    /// Biased variance of current batch
    pub batch_var: Tensor,
    /// Number of values each statistic was computed over
    pub count: usize,
}

#[derive(Debug)]
pub struct BatchNormBackwardContext {
    pub grad_gamma: Tensor,
    pub grad_beta: Tensor,
}

impl BatchNorm {
    /// Creates a new BatchNorm layer with specified number of features
    pub fn new(num_features: usize) -> Self {
        let gamma = Tensor::new_with_shape(vec![1.0; num_features], (num_features, 1));
        let beta = Tensor::new_with_shape(vec![0.0; num_features], (num_features, 1));
        let grad_gamma = Tensor::zeros_like(&gamma);
        let grad_beta = Tensor::zeros_like(&beta);
        let running_mean = Tensor::new_with_shape(vec![0.0; num_features], (num_features, 1));
        let running_var = Tensor::new_with_shape(vec![1.0; num_features], (num_features, 1));

        BatchNorm {
            eps: 1e-5,
            momentum: 0.1,
            num_features,
            gamma,
            beta,
            running_mean,
            running_var,
            grad_gamma,
            grad_beta,
        }
    }

    pub fn forward(&self, input: Tensor, mode: &mut ForwardMode) -> (Tensor, LayerForwardContext) {
        let input_shape = input.shape;
        let (batch_size, features) = input.shape;
        let spatial_size = features / self.num_features;

        // During inference, use running statistics
        if !mode.is_training() {
            let mut output = input;
            for i in 0..batch_size {
                for f in 0..self.num_features {
                    let scale = self.gamma.data[f] / (self.running_var.data[f] + self.eps).sqrt();
                    for s in 0..spatial_size {
                        let idx = i * features + f * spatial_size + s;
                        output.data[idx] =
                            (output.data[idx] - self.running_mean.data[f]) * scale
                                + self.beta.data[f];
                    }
                }
            }
            return (
                output,
                LayerForwardContext::BatchNorm(BatchNormForwardContext {
                    normalized: Tensor::zeros(input_shape),
                    std: Tensor::zeros((self.num_features, 1)),
                    batch_mean: Tensor::zeros((self.num_features, 1)),
                    batch_var: Tensor::zeros((self.num_features, 1)),
                    count: 0,
                }),
            );
        }

        let count = batch_size * spatial_size;

        // Compute mean for each feature
        let mut mean = vec![0.0; self.num_features];
        for i in 0..batch_size {
            for (f, m) in mean.iter_mut().enumerate() {
                let offset = i * features + f * spatial_size;
                *m += input.data[offset..offset + spatial_size].iter().sum::<f32>();
            }
        }
        for m in mean.iter_mut() {
            *m /= count as f32;
        }

        // Compute variance for each feature
        let mut var = vec![0.0; self.num_features];
        let mut x_centered = input;
        for i in 0..batch_size {
            for f in 0..self.num_features {
                for s in 0..spatial_size {
                    let idx = i * features + f * spatial_size + s;
                    x_centered.data[idx] -= mean[f];
                    var[f] += x_centered.data[idx] * x_centered.data[idx];
                }
            }
        }
        for v in var.iter_mut() {
            *v /= count as f32;
        }

        let std: Vec<f32> = var.iter().map(|v| (v + self.eps).sqrt()).collect();

        // Normalize input
        let mut normalized = x_centered;
        for i in 0..batch_size {
            for f in 0..self.num_features {
                for s in 0..spatial_size {
                    normalized.data[i * features + f * spatial_size + s] /= std[f];
                }
            }
        }

        // Scale and shift normalized values
        let mut output = normalized.clone();
        for i in 0..batch_size {
            for f in 0..self.num_features {
                for s in 0..spatial_size {
                    let idx = i * features + f * spatial_size + s;
                    output.data[idx] = output.data[idx] * self.gamma.data[f] + self.beta.data[f];
                }
            }
        }

        (
            output,
            LayerForwardContext::BatchNorm(BatchNormForwardContext {
                normalized,
                std: Tensor::new_with_shape(std, (self.num_features, 1)),
                batch_mean: Tensor::new_with_shape(mean, (self.num_features, 1)),
                batch_var: Tensor::new_with_shape(var, (self.num_features, 1)),
                count,
            }),
        )
    }

    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &BatchNormForwardContext,
    ) -> (Tensor, LayerBackwardContext) {
        let (batch_size, features) = grad_output.shape;
        let spatial_size = features / self.num_features;
        let n = (batch_size * spatial_size) as f32;

        // Compute gradients for gamma and beta
        let mut grad_gamma = vec![0.0; self.num_features];
        let mut grad_beta = vec![0.0; self.num_features];
        for i in 0..batch_size {
            for f in 0..self.num_features {
                for s in 0..spatial_size {
                    let idx = i * features + f * spatial_size + s;
                    grad_gamma[f] += grad_output.data[idx] * context.normalized.data[idx];
                    grad_beta[f] += grad_output.data[idx];
                }
            }
        }

        // Scale gradients by gamma
        let mut grad_input = grad_output;
        for i in 0..batch_size {
            for f in 0..self.num_features {
                for s in 0..spatial_size {
                    grad_input.data[i * features + f * spatial_size + s] *= self.gamma.data[f];
                }
            }
        }

        // Compute input gradients
        for f in 0..self.num_features {
            let inv_std = 1.0 / context.std.data[f];

            let mut sum_grad = 0.0;
            let mut sum_grad_normalized = 0.0;
            for i in 0..batch_size {
                for s in 0..spatial_size {
                    let idx = i * features + f * spatial_size + s;
                    sum_grad += grad_input.data[idx];
                    sum_grad_normalized += grad_input.data[idx] * context.normalized.data[idx];
                }
            }

            for i in 0..batch_size {
                for s in 0..spatial_size {
                    let idx = i * features + f * spatial_size + s;
                    grad_input.data[idx] = inv_std
                        * (n * grad_input.data[idx]
                            - sum_grad
                            - context.normalized.data[idx] * sum_grad_normalized)
                        / n
                }
            }
        }

        (
            grad_input,
            LayerBackwardContext::BatchNorm(BatchNormBackwardContext {
                grad_gamma: Tensor::new_with_shape(grad_gamma, (self.num_features, 1)),
                grad_beta: Tensor::new_with_shape(grad_beta, (self.num_features, 1)),
            }),
        )
    }

    /// Accumulates gradients from backward pass
    pub fn update_grads(&mut self, context: &BatchNormBackwardContext) {
        for (dest, src) in self
            .grad_gamma
            .data
            .iter_mut()
            .zip(context.grad_gamma.data.iter())
        {
            *dest += src;
        }

        for (dest, src) in self
            .grad_beta
            .data
            .iter_mut()
            .zip(context.grad_beta.data.iter())
        {
            *dest += src;
        }
    }

    /// Returns references to learnable parameters
    pub fn get_parameters(&self) -> Vec<&Tensor> {
        vec![&self.gamma, &self.beta]
    }

    /// Returns mutable parameter references paired with their gradients
    pub fn get_parameter_pairs(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        vec![
            (&mut self.gamma, &self.grad_gamma),
            (&mut self.beta, &self.grad_beta),
        ]
    }

    /// Resets accumulated gradients to zero
    pub fn clear_grads(&mut self) {
        for val in self.grad_gamma.data.iter_mut() {
            *val = 0.0;
        }
        for val in self.grad_beta.data.iter_mut() {
            *val = 0.0;
        }
    }

    /// Updates running mean and variance using batch statistics.
    /// The running variance tracks the unbiased estimate.
    pub fn update_running_stats(&mut self, context: &BatchNormForwardContext) {
        if context.count == 0 {
            return;
        }
        let correction = if context.count > 1 {
            context.count as f32 / (context.count - 1) as f32
        } else {
            1.0
        };

        for f in 0..self.num_features {
            self.running_mean.data[f] = (1.0 - self.momentum) * self.running_mean.data[f]
                + self.momentum * context.batch_mean.data[f];
            self.running_var.data[f] = (1.0 - self.momentum) * self.running_var.data[f]
                + self.momentum * context.batch_var.data[f] * correction;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::assert_close;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn forward_train(bn: &BatchNorm, input: Tensor) -> (Tensor, BatchNormForwardContext) {
        let mut rng = StdRng::seed_from_u64(0);
        let (output, context) = bn.forward(input, &mut ForwardMode::Train(&mut rng));
        match context {
            LayerForwardContext::BatchNorm(ctx) => (output, ctx),
            _ => panic!(),
        }
    }

    #[test]
    fn test_forward_conv_output() {
        let mut bn = BatchNorm::new(2);
        bn.gamma = Tensor::new_with_shape(vec![0.5, 1.5], (2, 1));
        bn.beta = Tensor::new_with_shape(vec![0.5, 1.5], (2, 1));

        // 2 features, 2 spatial positions each
        let input_data = vec![
            1.0, 2.0, 3.0, 4.0, //
            2.0, 3.0, 4.0, 5.0, //
            3.0, 4.0, 5.0, 6.0, //
            4.0, 5.0, 6.0, 7.0, //
        ];
        let input = Tensor::new_with_shape(input_data, (4, 4));

        let (output, bn_context) = forward_train(&bn, input.clone());
        assert_eq!(output.shape, (4, 4));
        assert_eq!(bn_context.count, 8);

        for i in 0..2 {
            let feature_start = i * 2;
            let values: Vec<f32> = (0..4)
                .flat_map(|batch| (0..2).map(move |s| batch * 4 + feature_start + s))
                .map(|idx| input.data[idx])
                .collect();
            let mean = values.iter().sum::<f32>() / 8.0;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 8.0;

            assert_close(bn_context.batch_mean.data[i], mean, 1e-5);
            assert_close(bn_context.batch_var.data[i], var, 1e-5);
            assert_close(bn_context.std.data[i], (var + bn.eps).sqrt(), 1e-5);

            let outputs: Vec<f32> = (0..4)
                .flat_map(|batch| (0..2).map(move |s| batch * 4 + feature_start + s))
                .map(|idx| output.data[idx])
                .collect();
            let out_mean = outputs.iter().sum::<f32>() / 8.0;
            let out_var = outputs.iter().map(|v| (v - out_mean).powi(2)).sum::<f32>() / 8.0;

            assert_close(out_mean, bn.beta.data[i], 1e-5);
            assert_close(out_var, bn.gamma.data[i].powi(2), 1e-4);
        }
    }

    #[test]
    fn test_eval_uses_running_statistics() {
        let mut bn = BatchNorm::new(1);
        bn.running_mean = Tensor::new_with_shape(vec![2.0], (1, 1));
        bn.running_var = Tensor::new_with_shape(vec![4.0 - bn.eps], (1, 1));
        bn.gamma = Tensor::new_with_shape(vec![3.0], (1, 1));
        bn.beta = Tensor::new_with_shape(vec![1.0], (1, 1));

        let input = Tensor::new_with_shape(vec![2.0, 4.0, 0.0], (1, 3));
        let (output, _) = bn.forward(input, &mut ForwardMode::Eval);

        assert_close(output.data[0], 1.0, 1e-5);
        assert_close(output.data[1], 4.0, 1e-5);
        assert_close(output.data[2], -2.0, 1e-5);
    }

    #[test]
    fn test_running_stats_use_unbiased_variance() {
        let mut bn = BatchNorm::new(1);
        let input = Tensor::new_with_shape(vec![1.0, 3.0, 5.0, 7.0], (2, 2));

        let (_, context) = forward_train(&bn, input);
        bn.update_running_stats(&context);

        // Batch mean 4, biased variance 5, unbiased variance 20 / 3
        assert_close(bn.running_mean.data[0], 0.4, 1e-6);
        assert_close(bn.running_var.data[0], 0.9 + 0.1 * 20.0 / 3.0, 1e-5);

        let (_, eval_context) = bn.forward(
            Tensor::new_with_shape(vec![1.0, 2.0], (1, 2)),
            &mut ForwardMode::Eval,
        );
        let eval_context = match eval_context {
            LayerForwardContext::BatchNorm(ctx) => ctx,
            _ => panic!(),
        };
        let before = bn.running_mean.data[0];
        bn.update_running_stats(&eval_context);
        assert_eq!(bn.running_mean.data[0], before);
    }

    #[test]
    fn test_backward_conv_output() {
        let mut bn = BatchNorm::new(2);
        bn.gamma = Tensor::new_with_shape(vec![0.5, 1.5], (2, 1));
        bn.beta = Tensor::new_with_shape(vec![0.5, 1.5], (2, 1));

        let input_data = vec![
            1.0, 2.0, 0.5, -1.0, //
            2.0, 3.0, 1.5, 2.5, //
            3.0, -4.0, 5.0, 0.0, //
            4.0, 5.0, -2.0, 7.0, //
        ];
        let input = Tensor::new_with_shape(input_data.clone(), (4, 4));

        let grad_output_data = vec![
            1.0, 2.0, -3.0, 0.5, //
            2.0, -3.0, 4.0, 1.0, //
            -1.0, 4.0, 1.0, -2.0, //
            4.0, 1.0, 2.0, 3.0, //
        ];
        let grad_output = Tensor::new_with_shape(grad_output_data, (4, 4));

        let (output, bn_context) = forward_train(&bn, input.clone());
        let (grad_input, back_context) = bn.backward(grad_output.clone(), &bn_context);
        let bn_back_context = match back_context {
            LayerBackwardContext::BatchNorm(ctx) => ctx,
            _ => panic!(),
        };

        let loss = |out: &Tensor| -> f64 {
            out.data
                .iter()
                .zip(grad_output.data.iter())
                .map(|(&o, &g)| o as f64 * g as f64)
                .sum()
        };
        let base = loss(&output);

        // Verify input gradients using differentials
        let epsilon: f64 = 1e-3;
        for j in 0..input_data.len() {
            let mut perturbed_data = input_data.clone();
            perturbed_data[j] += epsilon as f32;
            let (perturbed, _) = forward_train(&bn, Tensor::new_with_shape(perturbed_data, (4, 4)));

            let numeric_grad = (loss(&perturbed) - base) / epsilon;
            assert_close(grad_input.data[j], numeric_grad as f32, 5e-2);
        }

        for i in 0..2 {
            let mut expected_grad_beta: f32 = 0.0;
            let mut expected_grad_gamma: f32 = 0.0;
            for batch in 0..4 {
                for s in 0..2 {
                    let idx = batch * 4 + i * 2 + s;
                    expected_grad_beta += grad_output.data[idx];
                    expected_grad_gamma += grad_output.data[idx] * bn_context.normalized.data[idx];
                }
            }
            assert_close(bn_back_context.grad_beta.data[i], expected_grad_beta, 1e-5);
            assert_close(bn_back_context.grad_gamma.data[i], expected_grad_gamma, 1e-4);
        }
    }
}
