use crate::layers::ForwardMode;
use crate::{LayerBackwardContext, LayerForwardContext, Tensor};

/// Element-wise square nonlinearity, the power step of a band-power estimate.
#[derive(Debug, Default)]
pub struct Square {}

#[derive(Debug)]
pub struct SquareForwardContext {
    pub input: Tensor,
}

#[derive(Debug)]
pub struct SquareBackwardContext {}

impl Square {
    pub fn new() -> Self {
        Square {}
    }

    pub fn forward(&self, input: Tensor, _mode: &mut ForwardMode) -> (Tensor, LayerForwardContext) {
        let mut output = input.clone();
        for val in output.data.iter_mut() {
            *val *= *val;
        }

        (
            output,
            LayerForwardContext::Square(SquareForwardContext { input }),
        )
    }

    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &SquareForwardContext,
    ) -> (Tensor, LayerBackwardContext) {
        let mut grad_input = grad_output;
        for (grad, &x) in grad_input.data.iter_mut().zip(context.input.data.iter()) {
            *grad *= 2.0 * x;
        }

        (
            grad_input,
            LayerBackwardContext::Square(SquareBackwardContext {}),
        )
    }
}
