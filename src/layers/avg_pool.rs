use crate::layers::ForwardMode;
use crate::{LayerBackwardContext, LayerForwardContext, Tensor};

/// Implements 2D average pooling without padding.
/// Reduces spatial dimensions by averaging over local regions.
#[derive(Debug)]
pub struct AvgPool {
    /// Number of input channels
    pub in_channels: usize,
    /// Input image dimensions (height, width)
    pub in_size: (usize, usize),
    /// Size of the pooling window (height, width)
    pub kernel: (usize, usize),
    /// Step size between pooling windows (height, width)
    pub stride: (usize, usize),
}

#[derive(Debug)]
pub struct AvgPoolForwardContext {
    pub batch_size: usize,
}

#[derive(Debug)]
pub struct AvgPoolBackwardContext {}

impl AvgPool {
    pub fn new(
        in_channels: usize,
        in_size: (usize, usize),
        kernel: (usize, usize),
        stride: (usize, usize),
    ) -> Self {
        debug_assert!(kernel.0 <= in_size.0 && kernel.1 <= in_size.1);
        AvgPool {
            in_channels,
            in_size,
            kernel,
            stride,
        }
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
        let (height, width) = self.in_size;
        let (out_height, out_width) = self.out_size();
        let (kernel_h, kernel_w) = self.kernel;
        let area = (kernel_h * kernel_w) as f32;

        let mut output_data =
            Vec::with_capacity(batch_size * self.in_channels * out_height * out_width);

        // Process each batch and channel
        for b in 0..batch_size {
            for c in 0..self.in_channels {
                let channel_offset = (b * self.in_channels + c) * height * width;

                // Slide pooling window over height and width
                for i in 0..out_height {
                    for j in 0..out_width {
                        let mut sum = 0.0;
                        for ki in 0..kernel_h {
                            let row_offset = channel_offset + (i * self.stride.0 + ki) * width;
                            for kj in 0..kernel_w {
                                sum += input.data[row_offset + j * self.stride.1 + kj];
                            }
                        }
                        output_data.push(sum / area);
                    }
                }
            }
        }

        let output = Tensor::new_with_shape(
            output_data,
            (batch_size, self.in_channels * out_height * out_width),
        );
        (
            output,
            LayerForwardContext::AvgPool(AvgPoolForwardContext { batch_size }),
        )
    }

    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &AvgPoolForwardContext,
    ) -> (Tensor, LayerBackwardContext) {
        let batch_size = context.batch_size;
        let (height, width) = self.in_size;
        let (out_height, out_width) = self.out_size();
        let (kernel_h, kernel_w) = self.kernel;
        let area = (kernel_h * kernel_w) as f32;

        let mut grad_input = vec![0.0; batch_size * self.in_channels * height * width];

        // Spread each window's gradient evenly over the window, summing overlaps
        for b in 0..batch_size {
            for c in 0..self.in_channels {
                let channel_offset = (b * self.in_channels + c) * height * width;
                let out_offset = (b * self.in_channels + c) * out_height * out_width;

                for i in 0..out_height {
                    for j in 0..out_width {
                        let share = grad_output.data[out_offset + i * out_width + j] / area;
                        for ki in 0..kernel_h {
                            let row_offset = channel_offset + (i * self.stride.0 + ki) * width;
                            for kj in 0..kernel_w {
                                grad_input[row_offset + j * self.stride.1 + kj] += share;
                            }
                        }
                    }
                }
            }
        }

        let grad_input = Tensor::new_with_shape(
            grad_input,
            (batch_size, self.in_channels * height * width),
        );
        (
            grad_input,
            LayerBackwardContext::AvgPool(AvgPoolBackwardContext {}),
        )
    }
}
