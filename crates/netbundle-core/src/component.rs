//! Model components: one independently keyed sub-model's parameters.

use crate::descriptor::LayerDescriptor;
use crate::tensor::ParameterTensor;
use crate::{NetBundleError, Result};

/// Activation tokens plus ordered weights and biases of one network.
///
/// Weight and bias counts are equal and never exceed the layer count, since
/// activation-only layers carry a token but no tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelComponent {
    name: String,
    layers: LayerDescriptor,
    weights: Vec<ParameterTensor>,
    biases: Vec<ParameterTensor>,
}

impl ModelComponent {
    pub fn new(
        name: impl Into<String>,
        layers: LayerDescriptor,
        weights: Vec<ParameterTensor>,
        biases: Vec<ParameterTensor>,
    ) -> Result<Self> {
        let name = name.into();
        if weights.len() != biases.len() {
            return Err(NetBundleError::InvalidComponent {
                component: name,
                message: format!(
                    "{} weight tensors but {} bias tensors",
                    weights.len(),
                    biases.len()
                ),
            });
        }
        if weights.len() > layers.len() {
            return Err(NetBundleError::InvalidComponent {
                component: name,
                message: format!(
                    "{} parameterized layers but only {} layers in descriptor",
                    weights.len(),
                    layers.len()
                ),
            });
        }
        Ok(Self {
            name,
            layers,
            weights,
            biases,
        })
    }

    /// Human-readable origin, e.g. `sensor[18]` or a source path.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layers(&self) -> &LayerDescriptor {
        &self.layers
    }

    pub fn weights(&self) -> &[ParameterTensor] {
        &self.weights
    }

    pub fn biases(&self) -> &[ParameterTensor] {
        &self.biases
    }
}
