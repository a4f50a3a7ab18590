use crate::layers::ForwardMode;
use crate::{LayerBackwardContext, LayerForwardContext, Tensor};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// Implements a 2D convolutional layer without padding.
///
/// Kernels may be rectangular, which is how both the temporal (L, 1) and the
/// spatial (1, C) filters of the network are expressed.
#[derive(Debug)]
pub struct Conv {
    /// Number of input channels
    pub in_channels: usize,
    /// Input image dimensions (height, width)
    pub in_size: (usize, usize),
    /// Kernel dimensions (height, width)
    pub kernel: (usize, usize),
    /// Stride in both dimensions
    pub stride: (usize, usize),
    /// Whether the bias term is applied and trained
    pub use_bias: bool,
    /// Convolutional filters, one row per output channel
    pub weights: Tensor,
    /// Bias terms for each output channel
    pub bias: Tensor,
    /// Accumulated weight gradients
    pub grad_weights: Tensor,
    /// Accumulated bias gradients
    pub grad_bias: Tensor,
}

#[derive(Debug)]
pub struct ConvForwardContext {
    pub batch_size: usize,
    /// Im2row transformed input for efficient computation
    pub cols: Tensor,
}

#[derive(Debug)]
pub struct ConvBackwardContext {
    pub grad_weights: Tensor,
    pub grad_bias: Tensor,
}

impl Conv {
    /// Creates a new Conv layer with Xavier uniform weights and zero bias
    ///
    /// # Arguments
    /// * `in_channels` - Number of input channels
    /// * `out_channels` - Number of filters
    /// * `in_size` - Input image size as (height, width)
    /// * `kernel` - Kernel size as (height, width), must fit inside `in_size`
    /// * `stride` - Stride as (height, width)
    /// * `use_bias` - Whether to learn a per-filter bias
    /// * `rng` - Random generator for weight initialization
    pub fn new<R: Rng>(
        in_channels: usize,
        out_channels: usize,
        in_size: (usize, usize),
        kernel: (usize, usize),
        stride: (usize, usize),
        use_bias: bool,
        rng: &mut R,
    ) -> Self {
        let (kernel_h, kernel_w) = kernel;
        debug_assert!(kernel_h <= in_size.0 && kernel_w <= in_size.1);

        let receptive_field = kernel_h * kernel_w;
        let fan_in = in_channels * receptive_field;
        let fan_out = out_channels * receptive_field;
        let bound = (6.0 / (fan_in + fan_out) as f32).sqrt();
        let uniform = Uniform::new_inclusive(-bound, bound);

        let weights = (0..out_channels * fan_in)
            .map(|_| uniform.sample(&mut *rng))
            .collect();
        let weights = Tensor::new_with_shape(weights, (out_channels, fan_in));

        let bias = Tensor::new_with_shape(vec![0.0; out_channels], (out_channels, 1));

        let grad_weights = Tensor::zeros_like(&weights);
        let grad_bias = Tensor::zeros_like(&bias);

        Conv {
            in_channels,
            in_size,
            kernel,
            stride,
            use_bias,
            weights,
            bias,
            grad_weights,
            grad_bias,
        }
    }

    pub fn out_channels(&self) -> usize {
        self.weights.shape.0
    }

    /// Output image dimensions (height, width)
    pub fn out_size(&self) -> (usize, usize) {
        let (height, width) = self.in_size;
        (
            (height - self.kernel.0) / self.stride.0 + 1,
            (width - self.kernel.1) / self.stride.1 + 1,
        )
    }

    pub fn forward(&self, input: Tensor, _mode: &mut ForwardMode) -> (Tensor, LayerForwardContext) {
        let batch_size = input.shape.0;
        let out_channels = self.out_channels();
        let (out_height, out_width) = self.out_size();
        let out_spatial = out_height * out_width;

        // Transform input for efficient convolution computation
        let cols = input.im2row(self.in_channels, self.in_size, self.kernel, self.stride);
        let products = cols.matmul(&self.weights.transpose());

        // Rows of `products` are (batch, position), regroup as (batch, channel, position)
        let mut output = vec![0.0; batch_size * out_channels * out_spatial];
        for b in 0..batch_size {
            for p in 0..out_spatial {
                let row = (b * out_spatial + p) * out_channels;
                for c in 0..out_channels {
                    let bias_val = if self.use_bias { self.bias.data[c] } else { 0.0 };
                    output[(b * out_channels + c) * out_spatial + p] =
                        products.data[row + c] + bias_val;
                }
            }
        }

        let output = Tensor::new_with_shape(output, (batch_size, out_channels * out_spatial));
        (
            output,
            LayerForwardContext::Conv(ConvForwardContext { batch_size, cols }),
        )
    }

    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &ConvForwardContext,
    ) -> (Tensor, LayerBackwardContext) {
        let batch_size = context.batch_size;
        let out_channels = self.out_channels();
        let (out_height, out_width) = self.out_size();
        let out_spatial = out_height * out_width;

        // Rearrange gradients to the (batch, position) x channel layout of the forward products
        let mut grad_products = vec![0.0; grad_output.data.len()];
        let mut grad_bias = vec![0.0; out_channels];
        for b in 0..batch_size {
            for c in 0..out_channels {
                for p in 0..out_spatial {
                    let g = grad_output.data[(b * out_channels + c) * out_spatial + p];
                    grad_products[(b * out_spatial + p) * out_channels + c] = g;
                    grad_bias[c] += g;
                }
            }
        }
        if !self.use_bias {
            grad_bias.iter_mut().for_each(|g| *g = 0.0);
        }
        let grad_bias = Tensor::new_with_shape(grad_bias, (out_channels, 1));
        let grad_products =
            Tensor::new_with_shape(grad_products, (batch_size * out_spatial, out_channels));

        // Compute weight and input gradients
        let grad_weights = grad_products.transpose().matmul(&context.cols);
        let grad_cols = grad_products.matmul(&self.weights);
        let grad_input =
            grad_cols.row2im(self.in_channels, self.in_size, self.kernel, self.stride);

        (
            grad_input,
            LayerBackwardContext::Conv(ConvBackwardContext {
                grad_weights,
                grad_bias,
            }),
        )
    }

    pub fn update_grads(&mut self, context: &ConvBackwardContext) {
        for (dest, src) in self
            .grad_weights
            .data
            .iter_mut()
            .zip(context.grad_weights.data.iter())
        {
            *dest += src;
        }

        for (dest, src) in self
            .grad_bias
            .data
            .iter_mut()
            .zip(context.grad_bias.data.iter())
        {
            *dest += src;
        }
    }

    pub fn get_parameters(&self) -> Vec<&Tensor> {
        if self.use_bias {
            vec![&self.weights, &self.bias]
        } else {
            vec![&self.weights]
        }
    }

    pub fn get_parameter_pairs(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        if self.use_bias {
            vec![
                (&mut self.weights, &self.grad_weights),
                (&mut self.bias, &self.grad_bias),
            ]
        } else {
            vec![(&mut self.weights, &self.grad_weights)]
        }
    }

    pub fn clear_grads(&mut self) {
        for val in self.grad_weights.data.iter_mut() {
            *val = 0.0;
        }
        for val in self.grad_bias.data.iter_mut() {
            *val = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_close, assert_tensors_eq};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn weighted_sum(output: &Tensor, weights: &Tensor) -> f64 {
        output
            .data
            .iter()
            .zip(weights.data.iter())
            .map(|(&o, &w)| o as f64 * w as f64)
            .sum()
    }

    #[test]
    fn test_conv_forward_1() {
        // Single image, single channel, 4x4 input, 2x2 kernel, single output channel
        let input = Tensor::new_with_shape(
            vec![
                1.0, 2.0, 3.0, 4.0, //
                5.0, 6.0, 7.0, 8.0, //
                8.0, 7.0, 6.0, 5.0, //
                4.0, 3.0, 2.0, 1.0, //
            ],
            (1, 16),
        );

        let mut conv = Conv::new(1, 1, (4, 4), (2, 2), (1, 1), true, &mut seeded());

        conv.weights = Tensor::new_with_shape(
            vec![
                1.0, -1.0, //
                1.0, -1.0, //
            ],
            (1, 4),
        );
        conv.bias = Tensor::new_with_shape(vec![1.0], (1, 1));

        let (output, _) = conv.forward(input, &mut ForwardMode::Eval);

        assert_eq!(output.shape, (1, 9));

        let expected = Tensor::new_with_shape(
            vec![
                -1.0, -1.0, -1.0, //
                1.0, 1.0, 1.0, //
                3.0, 3.0, 3.0, //
            ],
            (1, 9),
        );
        assert_tensors_eq(&output, &expected);
    }

    #[test]
    fn test_conv_forward_two_images_two_filters() {
        let input = Tensor::new_with_shape(
            vec![
                // First image
                1.0, 2.0, 3.0, 4.0, //
                5.0, 6.0, 7.0, 8.0, //
                9.0, 10.0, 11.0, 12.0, //
                13.0, 14.0, 15.0, 16.0, //
                // Second image
                2.0, 3.0, 4.0, 5.0, //
                6.0, 7.0, 8.0, 9.0, //
                10.0, 11.0, 12.0, 13.0, //
                14.0, 15.0, 16.0, 17.0, //
            ],
            (2, 16),
        );

        let mut conv = Conv::new(1, 2, (4, 4), (2, 2), (1, 1), true, &mut seeded());

        conv.weights = Tensor::new_with_shape(
            vec![
                // First output channel
                1.0, 1.0, //
                1.0, 1.0, //
                // Second output channel
                2.0, 2.0, //
                2.0, 2.0, //
            ],
            (2, 4),
        );
        conv.bias = Tensor::new_with_shape(vec![1.0, -1.0], (2, 1));

        let (output, _) = conv.forward(input, &mut ForwardMode::Eval);

        assert_eq!(output.shape, (2, 18));

        let expected = Tensor::new_with_shape(
            vec![
                // First image, first output channel
                15.0, 19.0, 23.0, //
                31.0, 35.0, 39.0, //
                47.0, 51.0, 55.0, //
                // First image, second output channel
                27.0, 35.0, 43.0, //
                59.0, 67.0, 75.0, //
                91.0, 99.0, 107.0, //
                // Second image, first output channel
                19.0, 23.0, 27.0, //
                35.0, 39.0, 43.0, //
                51.0, 55.0, 59.0, //
                // Second image, second output channel
                35.0, 43.0, 51.0, //
                67.0, 75.0, 83.0, //
                99.0, 107.0, 115.0, //
            ],
            (2, 18),
        );
        assert_tensors_eq(&output, &expected);
    }

    #[test]
    fn test_conv_forward_two_input_channels() {
        let input = Tensor::new_with_shape(
            vec![
                // First channel
                1.0, 2.0, 3.0, 4.0, //
                5.0, 6.0, 7.0, 8.0, //
                9.0, 10.0, 11.0, 12.0, //
                13.0, 14.0, 15.0, 16.0, //
                // Second channel
                16.0, 15.0, 14.0, 13.0, //
                12.0, 11.0, 10.0, 9.0, //
                8.0, 7.0, 6.0, 5.0, //
                4.0, 3.0, 2.0, 1.0, //
            ],
            (1, 32),
        );

        let mut conv = Conv::new(2, 1, (4, 4), (2, 2), (1, 1), true, &mut seeded());

        conv.weights = Tensor::new_with_shape(
            vec![
                1.0, 1.0, //
                1.0, 1.0, //
                // second input channel
                -1.0, -1.0, //
                -1.0, -1.0, //
            ],
            (1, 8),
        );
        conv.bias = Tensor::new_with_shape(vec![1.0], (1, 1));

        let (output, _) = conv.forward(input, &mut ForwardMode::Eval);

        let expected = Tensor::new_with_shape(
            vec![
                -39.0, -31.0, -23.0, //
                -7.0, 1.0, 9.0, //
                25.0, 33.0, 41.0, //
            ],
            (1, 9),
        );
        assert_tensors_eq(&output, &expected);
    }

    #[test]
    fn test_conv_temporal_then_spatial_kernels() {
        // One trial as an image of 4 time samples by 2 electrodes
        let input = Tensor::new_with_shape(
            vec![
                1.0, 2.0, //
                3.0, 4.0, //
                5.0, 6.0, //
                7.0, 8.0, //
            ],
            (1, 8),
        );

        // Temporal filter of length 2 with stride 1 applied per electrode
        let mut temporal = Conv::new(1, 1, (4, 2), (2, 1), (1, 1), true, &mut seeded());
        temporal.weights = Tensor::new_with_shape(vec![1.0, -1.0], (1, 2));
        temporal.bias = Tensor::new_with_shape(vec![0.5], (1, 1));
        assert_eq!(temporal.out_size(), (3, 2));

        let (output, _) = temporal.forward(input, &mut ForwardMode::Eval);
        assert_tensors_eq(
            &output,
            &Tensor::new_with_shape(vec![-1.5, -1.5, -1.5, -1.5, -1.5, -1.5], (1, 6)),
        );

        // Spatial filter spanning both electrodes, no bias
        let mut spatial = Conv::new(1, 1, (3, 2), (1, 2), (1, 1), false, &mut seeded());
        spatial.weights = Tensor::new_with_shape(vec![2.0, 1.0], (1, 2));
        spatial.bias = Tensor::new_with_shape(vec![100.0], (1, 1));
        assert_eq!(spatial.out_size(), (3, 1));

        let input = Tensor::new_with_shape(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (1, 6));
        let (output, _) = spatial.forward(input, &mut ForwardMode::Eval);
        assert_tensors_eq(
            &output,
            &Tensor::new_with_shape(vec![4.0, 10.0, 16.0], (1, 3)),
        );
    }

    #[test]
    fn test_conv_without_bias_exposes_only_weights() {
        let mut conv = Conv::new(3, 4, (5, 2), (1, 2), (1, 1), false, &mut seeded());
        assert_eq!(conv.get_parameters().len(), 1);
        assert_eq!(conv.get_parameter_pairs().len(), 1);

        let mut conv = Conv::new(3, 4, (5, 2), (1, 2), (1, 1), true, &mut seeded());
        assert_eq!(conv.get_parameters().len(), 2);
        assert_eq!(conv.get_parameter_pairs().len(), 2);
    }

    #[test]
    fn test_conv_xavier_bounds() {
        let conv = Conv::new(10, 5, (20, 8), (1, 8), (1, 1), true, &mut seeded());
        let bound = (6.0f32 / (10.0 * 8.0 + 5.0 * 8.0)).sqrt();

        assert_eq!(conv.weights.shape, (5, 80));
        assert!(conv.weights.data.iter().all(|w| w.abs() <= bound));
        assert!(conv.weights.data.iter().any(|&w| w != 0.0));
        assert!(conv.bias.data.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_conv_backward_against_finite_differences() {
        // Two images, two channels, 4x3 input, (2, 2) kernel with stride (2, 1)
        let input_data: Vec<f32> = (0..48).map(|i| ((i * 7) % 11) as f32 * 0.25 - 1.0).collect();
        let input = Tensor::new_with_shape(input_data.clone(), (2, 24));

        let mut rng = seeded();
        let mut conv = Conv::new(2, 3, (4, 3), (2, 2), (2, 1), true, &mut rng);
        conv.bias = Tensor::new_with_shape(vec![0.1, -0.2, 0.3], (3, 1));

        let (output, context) = conv.forward(input.clone(), &mut ForwardMode::Eval);
        assert_eq!(output.shape, (2, 3 * 2 * 2));

        let grad_output_data: Vec<f32> = (0..24).map(|i| ((i * 5) % 7) as f32 - 3.0).collect();
        let grad_output = Tensor::new_with_shape(grad_output_data, output.shape);

        let context = match context {
            LayerForwardContext::Conv(ctx) => ctx,
            _ => panic!(),
        };
        let (grad_input, back_context) = conv.backward(grad_output.clone(), &context);
        let back_context = match back_context {
            LayerBackwardContext::Conv(ctx) => ctx,
            _ => panic!(),
        };

        let epsilon = 1e-2f32;
        let base = weighted_sum(&output, &grad_output);

        for j in 0..input_data.len() {
            let mut perturbed = input_data.clone();
            perturbed[j] += epsilon;
            let (perturbed_output, _) = conv.forward(
                Tensor::new_with_shape(perturbed, (2, 24)),
                &mut ForwardMode::Eval,
            );
            let numeric = (weighted_sum(&perturbed_output, &grad_output) - base) / epsilon as f64;
            assert_close(grad_input.data[j], numeric as f32, 1e-2);
        }

        for j in 0..conv.weights.data.len() {
            let original = conv.weights.data[j];
            conv.weights.data[j] = original + epsilon;
            let (perturbed_output, _) = conv.forward(input.clone(), &mut ForwardMode::Eval);
            conv.weights.data[j] = original;

            let numeric = (weighted_sum(&perturbed_output, &grad_output) - base) / epsilon as f64;
            assert_close(back_context.grad_weights.data[j], numeric as f32, 1e-2);
        }

        // Each filter sees four positions per image
        for c in 0..3 {
            let expected: f32 = (0..2)
                .flat_map(|b| (0..4).map(move |p| (b * 3 + c) * 4 + p))
                .map(|idx| grad_output.data[idx])
                .sum();
            assert_close(back_context.grad_bias.data[c], expected, 1e-5);
        }
    }

    #[test]
    fn test_conv_gradient_accumulation() {
        let mut conv = Conv::new(1, 1, (3, 1), (2, 1), (1, 1), true, &mut seeded());
        let input = Tensor::new_with_shape(vec![1.0, 2.0, 3.0], (1, 3));
        let grad_output = Tensor::new_with_shape(vec![1.0, 1.0], (1, 2));

        let (_, forward_context) = conv.forward(input, &mut ForwardMode::Eval);
        let forward_context = match forward_context {
            LayerForwardContext::Conv(ctx) => ctx,
            _ => panic!(),
        };
        let (_, back_context) = conv.backward(grad_output, &forward_context);
        let back_context = match back_context {
            LayerBackwardContext::Conv(ctx) => ctx,
            _ => panic!(),
        };

        conv.update_grads(&back_context);
        conv.update_grads(&back_context);
        assert_tensors_eq(
            &conv.grad_weights,
            &Tensor::new_with_shape(vec![6.0, 10.0], (1, 2)),
        );
        assert_close(conv.grad_bias.data[0], 4.0, 1e-6);

        conv.clear_grads();
        assert!(conv.grad_weights.data.iter().all(|&g| g == 0.0));
        assert!(conv.grad_bias.data.iter().all(|&g| g == 0.0));
    }
}
