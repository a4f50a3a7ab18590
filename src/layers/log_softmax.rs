use crate::layers::ForwardMode;
use crate::{LayerBackwardContext, LayerForwardContext, Tensor};

/// Row-wise log-softmax producing class log-probabilities.
#[derive(Debug, Default)]
pub struct LogSoftmax {}

#[derive(Debug)]
pub struct LogSoftmaxForwardContext {
    pub output: Tensor,
}

#[derive(Debug)]
pub struct LogSoftmaxBackwardContext {}

impl LogSoftmax {
    pub fn new() -> Self {
        LogSoftmax {}
    }

    pub fn forward(&self, input: Tensor, _mode: &mut ForwardMode) -> (Tensor, LayerForwardContext) {
        let output = input.log_softmax();

        (
            output.clone(),
            LayerForwardContext::LogSoftmax(LogSoftmaxForwardContext { output }),
        )
    }

    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &LogSoftmaxForwardContext,
    ) -> (Tensor, LayerBackwardContext) {
        let (rows, cols) = grad_output.shape;
        let mut grad_input = grad_output;

        // d/dx_j = g_j - softmax_j * sum(g)
        for row in 0..rows {
            let offset = row * cols;
            let grad_sum: f32 = grad_input.data[offset..offset + cols].iter().sum();
            for j in 0..cols {
                grad_input.data[offset + j] -= context.output.data[offset + j].exp() * grad_sum;
            }
        }

        (
            grad_input,
            LayerBackwardContext::LogSoftmax(LogSoftmaxBackwardContext {}),
        )
    }
}
