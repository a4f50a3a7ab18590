use crate::layers::ForwardMode;
use crate::{LayerBackwardContext, LayerForwardContext, Tensor};

/// Natural logarithm with inputs clamped from below, `ln(max(x, eps))`.
#[derive(Debug)]
pub struct SafeLog {
    /// Lower clamp applied before taking the logarithm
    pub eps: f32,
}

#[derive(Debug)]
pub struct SafeLogForwardContext {
    pub input: Tensor,
}

#[derive(Debug)]
pub struct SafeLogBackwardContext {}

impl Default for SafeLog {
    fn default() -> Self {
        SafeLog { eps: 1e-6 }
    }
}

impl SafeLog {
    pub fn new(eps: f32) -> Self {
        SafeLog { eps }
    }

    pub fn forward(&self, input: Tensor, _mode: &mut ForwardMode) -> (Tensor, LayerForwardContext) {
        let mut output = input.clone();
        for val in output.data.iter_mut() {
            *val = val.max(self.eps).ln();
        }

        (
            output,
            LayerForwardContext::SafeLog(SafeLogForwardContext { input }),
        )
    }

    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &SafeLogForwardContext,
    ) -> (Tensor, LayerBackwardContext) {
        let mut grad_input = grad_output;

        // Clamped inputs receive no gradient
        for (grad, &x) in grad_input.data.iter_mut().zip(context.input.data.iter()) {
            if x > self.eps {
                *grad /= x;
            } else {
                *grad = 0.0;
            }
        }

        (
            grad_input,
            LayerBackwardContext::SafeLog(SafeLogBackwardContext {}),
        )
    }
}
