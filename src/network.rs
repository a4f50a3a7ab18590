use crate::layers::ForwardMode;
use crate::{Layer, LayerBackwardContext, LayerForwardContext, Optimizer, Tensor};

/// Sequential neural network, handles forward/backward passes and parameter updates
#[derive(Debug)]
pub struct Network {
    /// Network layers in forward order
    pub layers: Vec<Layer>,
    /// Optimizer for parameter updates
    pub optimizer: Box<dyn Optimizer>,
}

impl Network {
    /// Creates a new network with specified optimizer
    pub fn new(optimizer: Box<dyn Optimizer>) -> Self {
        Network {
            layers: Vec::new(),
            optimizer,
        }
    }

    /// Appends a layer to the network
    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Initializes optimizer with all trainable parameters from the network
    pub fn initialize_optimizer(&mut self) {
        let all_params: Vec<&Tensor> = self
            .layers
            .iter()
            .flat_map(|layer| layer.get_parameters())
            .collect();

        self.optimizer.init(&all_params);
    }

    /// Total number of trainable values
    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .flat_map(|layer| layer.get_parameters())
            .map(|param| param.data.len())
            .sum()
    }

    /// Performs forward pass through the network
    ///
    /// # Arguments
    /// * `input` - Input tensor
    /// * `mode` - Training or evaluation (affects dropout and batch normalization)
    ///
    /// # Returns
    /// Tuple of (output tensor, forward contexts needed for backward pass)
    pub fn forward(
        &self,
        input: Tensor,
        mode: &mut ForwardMode,
    ) -> (Tensor, Vec<LayerForwardContext>) {
        let mut current = input;
        let mut contexts = Vec::with_capacity(self.layers.len());

        for layer in &self.layers {
            let (output, context) = layer.forward(current, mode);
            current = output;

            contexts.push(context);
        }

        (current, contexts)
    }

    /// Runs the network in evaluation mode and returns only its output
    pub fn predict(&self, input: Tensor) -> Tensor {
        self.forward(input, &mut ForwardMode::Eval).0
    }

    /// Performs backward pass through the network
    ///
    /// # Arguments
    /// * `grad_output` - Gradient tensor from loss function
    /// * `forward_contexts` - Contexts saved during forward pass
    ///
    /// # Returns
    /// Tuple of (input gradients, backward contexts in reverse layer order)
    pub fn backward(
        &self,
        grad_output: Tensor,
        forward_contexts: &[LayerForwardContext],
    ) -> (Tensor, Vec<LayerBackwardContext>) {
        let mut current = grad_output;
        let mut contexts = Vec::with_capacity(self.layers.len());

        // Process through layers in reverse order
        for (layer, forward_context) in self.layers.iter().zip(forward_contexts.iter()).rev() {
            let (output, context) = layer.backward(current, forward_context);
            current = output;

            contexts.push(context);
        }

        (current, contexts)
    }

    /// Accumulates the batch gradients, updates parameters and clears gradients
    ///
    /// # Arguments
    /// * `forward_contexts` - Forward contexts of the batch
    /// * `backward_contexts` - Backward contexts of the batch, as returned by [`Network::backward`]
    /// * `learning_rate` - Current learning rate
    pub fn update_parameters(
        &mut self,
        forward_contexts: &[LayerForwardContext],
        backward_contexts: &[LayerBackwardContext],
        learning_rate: f32,
    ) {
        let layer_count = self.layers.len();
        for (layer_idx, layer) in self.layers.iter_mut().enumerate() {
            let forward_context = &forward_contexts[layer_idx];
            let backward_context = &backward_contexts[layer_count - 1 - layer_idx];

            layer.update_state(forward_context, backward_context);
        }

        // Collect all parameter-gradient pairs
        let mut param_pairs = Vec::new();
        for layer in self.layers.iter_mut() {
            param_pairs.extend(layer.get_parameter_pairs());
        }

        self.optimizer
            .update_parameters(&mut param_pairs, learning_rate);

        for layer in self.layers.iter_mut() {
            layer.clear_grads();
        }
    }
}
