use crate::Tensor;
use rand::rngs::StdRng;

mod avg_pool;
mod batch_norm;
mod conv;
mod dropout;
mod log_softmax;
mod safe_log;
mod square;

pub use avg_pool::{AvgPool, AvgPoolBackwardContext, AvgPoolForwardContext};
pub use batch_norm::{BatchNorm, BatchNormBackwardContext, BatchNormForwardContext};
pub use conv::{Conv, ConvBackwardContext, ConvForwardContext};
pub use dropout::{Dropout, DropoutBackwardContext, DropoutForwardContext};
pub use log_softmax::{LogSoftmax, LogSoftmaxBackwardContext, LogSoftmaxForwardContext};
pub use safe_log::{SafeLog, SafeLogBackwardContext, SafeLogForwardContext};
pub use square::{Square, SquareBackwardContext, SquareForwardContext};

/// Whether a forward pass is part of training or evaluation.
///
/// Training passes carry the random generator used for dropout masks,
/// so a seeded run is reproducible end to end.
pub enum ForwardMode<'a> {
    Train(&'a mut StdRng),
    Eval,
}

impl ForwardMode<'_> {
    pub fn is_training(&self) -> bool {
        matches!(self, ForwardMode::Train(_))
    }
}

/// Available neural network layers
#[derive(Debug)]
pub enum Layer {
    Conv(Conv),
    BatchNorm(BatchNorm),
    Square(Square),
    AvgPool(AvgPool),
    SafeLog(SafeLog),
    Dropout(Dropout),
    LogSoftmax(LogSoftmax),
}

/// Layer-specific context from forward pass for backpropagation
#[derive(Debug)]
pub enum LayerForwardContext {
    Conv(ConvForwardContext),
    BatchNorm(BatchNormForwardContext),
    Square(SquareForwardContext),
    AvgPool(AvgPoolForwardContext),
    SafeLog(SafeLogForwardContext),
    Dropout(DropoutForwardContext),
    LogSoftmax(LogSoftmaxForwardContext),
}

/// Layer-specific gradients and other backward pass information
#[derive(Debug)]
pub enum LayerBackwardContext {
    Conv(ConvBackwardContext),
    BatchNorm(BatchNormBackwardContext),
    Square(SquareBackwardContext),
    AvgPool(AvgPoolBackwardContext),
    SafeLog(SafeLogBackwardContext),
    Dropout(DropoutBackwardContext),
    LogSoftmax(LogSoftmaxBackwardContext),
}

impl Layer {
    /// Performs forward pass through the layer
    /// Returns output tensor and context needed for backward pass
    pub fn forward(&self, input: Tensor, mode: &mut ForwardMode) -> (Tensor, LayerForwardContext) {
        match self {
            Layer::Conv(conv) => conv.forward(input, mode),
            Layer::BatchNorm(batchnorm) => batchnorm.forward(input, mode),
            Layer::Square(square) => square.forward(input, mode),
            Layer::AvgPool(pool) => pool.forward(input, mode),
            Layer::SafeLog(safe_log) => safe_log.forward(input, mode),
            Layer::Dropout(dropout) => dropout.forward(input, mode),
            Layer::LogSoftmax(log_softmax) => log_softmax.forward(input, mode),
        }
    }

    /// Performs backward pass through the layer
    /// Takes gradient from next layer and forward context, returns input gradient and backward context
    pub fn backward(
        &self,
        grad: Tensor,
        context: &LayerForwardContext,
    ) -> (Tensor, LayerBackwardContext) {
        match (self, context) {
            (Layer::Conv(conv), LayerForwardContext::Conv(context)) => conv.backward(grad, context),
            (Layer::BatchNorm(batchnorm), LayerForwardContext::BatchNorm(context)) => {
                batchnorm.backward(grad, context)
            }
            (Layer::Square(square), LayerForwardContext::Square(context)) => {
                square.backward(grad, context)
            }
            (Layer::AvgPool(pool), LayerForwardContext::AvgPool(context)) => {
                pool.backward(grad, context)
            }
            (Layer::SafeLog(safe_log), LayerForwardContext::SafeLog(context)) => {
                safe_log.backward(grad, context)
            }
            (Layer::Dropout(dropout), LayerForwardContext::Dropout(context)) => {
                dropout.backward(grad, context)
            }
            (Layer::LogSoftmax(log_softmax), LayerForwardContext::LogSoftmax(context)) => {
                log_softmax.backward(grad, context)
            }
            _ => unreachable!("forward context does not belong to this layer"),
        }
    }

    /// Updates layer state after backward pass
    pub fn update_state(
        &mut self,
        forward_context: &LayerForwardContext,
        backward_context: &LayerBackwardContext,
    ) {
        match (self, forward_context, backward_context) {
            (
                Layer::BatchNorm(batchnorm),
                LayerForwardContext::BatchNorm(forward_context),
                LayerBackwardContext::BatchNorm(backward_context),
            ) => {
                batchnorm.update_running_stats(forward_context);
                batchnorm.update_grads(backward_context);
            }
            (
                Layer::Conv(conv),
                LayerForwardContext::Conv(_forward_context),
                LayerBackwardContext::Conv(backward_context),
            ) => {
                conv.update_grads(backward_context);
            }
            _ => {}
        };
    }

    /// Returns references to layer's trainable parameters,
    /// used during optimizer initialization
    pub fn get_parameters(&self) -> Vec<&Tensor> {
        match self {
            Layer::BatchNorm(batchnorm) => batchnorm.get_parameters(),
            Layer::Conv(conv) => conv.get_parameters(),
            _ => vec![],
        }
    }

    /// Returns mutable references to parameters paired with their gradients,
    /// used by optimizer to update parameters
    pub fn get_parameter_pairs(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        match self {
            Layer::BatchNorm(batchnorm) => batchnorm.get_parameter_pairs(),
            Layer::Conv(conv) => conv.get_parameter_pairs(),
            _ => vec![],
        }
    }

    /// Resets accumulated gradients to zero after parameter update
    pub fn clear_grads(&mut self) {
        match self {
            Layer::BatchNorm(batchnorm) => batchnorm.clear_grads(),
            Layer::Conv(conv) => conv.clear_grads(),
            _ => {}
        }
    }
}
