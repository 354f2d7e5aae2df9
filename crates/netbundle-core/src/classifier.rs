//! Splits a model's parameters into ordered weight and bias sequences.
//!
//! An explicit [`ParameterRole`] on the handle always wins. Handles without
//! one go through the legacy name heuristic: the lower-cased name is checked
//! for the weight marker first, then the bias marker.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::source::{ParameterHandle, ParameterRole};
use crate::tensor::ParameterTensor;
use crate::{NetBundleError, Result};

/// Substrings used to classify untagged parameter names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationMarkers {
    pub weight_marker: String,
    pub bias_marker: String,
}

impl Default for ClassificationMarkers {
    fn default() -> Self {
        Self {
            weight_marker: "w".to_string(),
            bias_marker: "b".to_string(),
        }
    }
}

impl ClassificationMarkers {
    /// Role implied by `name`, if any. Markers are compared lower-cased.
    pub fn role_of(&self, name: &str) -> Option<ParameterRole> {
        let name = name.to_lowercase();
        if name.contains(&self.weight_marker.to_lowercase()) {
            Some(ParameterRole::Weight)
        } else if name.contains(&self.bias_marker.to_lowercase()) {
            Some(ParameterRole::Bias)
        } else {
            None
        }
    }
}

/// How to treat parameters that are neither weights nor biases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownParameterPolicy {
    /// Fail extraction and name the offending parameters.
    #[default]
    Reject,
    /// Drop them and report how many were dropped.
    Ignore,
}

/// Result of classification. Both sequences keep input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedParameters {
    pub weights: Vec<ParameterTensor>,
    pub biases: Vec<ParameterTensor>,
    /// Names dropped under [`UnknownParameterPolicy::Ignore`].
    pub dropped: Vec<String>,
}

/// Classify `(handle, tensor)` pairs into weights and biases.
///
/// `component` only labels errors and log lines.
pub fn classify_parameters(
    component: &str,
    parameters: Vec<(ParameterHandle, ParameterTensor)>,
    markers: &ClassificationMarkers,
    policy: UnknownParameterPolicy,
) -> Result<ClassifiedParameters> {
    let mut classified = ClassifiedParameters::default();

    for (handle, tensor) in parameters {
        match handle.role.or_else(|| markers.role_of(&handle.name)) {
            Some(ParameterRole::Weight) => classified.weights.push(tensor),
            Some(ParameterRole::Bias) => classified.biases.push(tensor),
            None => classified.dropped.push(handle.name),
        }
    }

    if !classified.dropped.is_empty() {
        match policy {
            UnknownParameterPolicy::Reject => {
                return Err(NetBundleError::UnclassifiedParameters {
                    component: component.to_string(),
                    names: classified.dropped,
                });
            }
            UnknownParameterPolicy::Ignore => {
                warn!(
                    "Dropped {} unclassified parameter(s) from {}: {:?}",
                    classified.dropped.len(),
                    component,
                    classified.dropped
                );
            }
        }
    }

    Ok(classified)
}
