//! Capability contracts for trained model artifacts.
//!
//! Extraction never looks at the concrete type of a deserialized model. It
//! only needs these traits, implemented by whatever loaded the artifact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::tensor::TensorValue;
use crate::Result;

/// Identifier of a per-entity sub-network (a sensor board number).
pub type EntityId = u32;

/// Explicit role of a learnable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterRole {
    Weight,
    Bias,
}

/// A declared parameter of a network, before values are materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterHandle {
    pub name: String,
    /// Role attached by the source. Untagged handles fall back to name matching.
    #[serde(default)]
    pub role: Option<ParameterRole>,
}

impl ParameterHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
        }
    }

    pub fn tagged(name: impl Into<String>, role: ParameterRole) -> Self {
        Self {
            name: name.into(),
            role: Some(role),
        }
    }
}

/// A sequential network: a textual layer chain plus its declared parameters.
pub trait SequentialNetwork {
    /// Layer chain text, e.g. `Relu(200) >> Linear(1)`.
    fn descriptor(&self) -> String;

    /// Declared parameters in native enumeration order.
    fn parameters(&self) -> Vec<ParameterHandle>;
}

/// Materializes numeric values for declared parameters.
///
/// This is a blocking compute step with no timeout.
pub trait EvaluationContext {
    fn evaluate(&self, parameters: &[ParameterHandle]) -> Result<Vec<TensorValue>>;
}

/// A standalone network artifact with its own evaluation context.
pub trait SimpleNetworkSource {
    fn network(&self) -> &dyn SequentialNetwork;

    fn context(&self) -> &dyn EvaluationContext;

    /// Entity the network was trained for, when the artifact records it.
    fn entity_id(&self) -> Option<EntityId> {
        None
    }
}

/// Materialized values of a split model, returned by one accessor call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitValues {
    pub sensors: BTreeMap<EntityId, Vec<TensorValue>>,
    pub calibration: Vec<TensorValue>,
}

/// A composite model: per-entity sensor networks sharing one calibration network.
pub trait SplitNetwork {
    /// Identifiers with a sensor network, ascending.
    fn entity_ids(&self) -> Vec<EntityId>;

    fn sensor_network(&self, entity_id: EntityId) -> Option<&dyn SequentialNetwork>;

    fn calibration_network(&self) -> &dyn SequentialNetwork;

    /// Materialize sensor and calibration values in one call.
    fn materialize(&self) -> Result<SplitValues>;
}

/// Boundary to the deserializer of opaque model artifacts.
pub trait ArtifactLoader {
    fn load_simple(&self, path: &Path) -> Result<Box<dyn SimpleNetworkSource>>;

    fn load_split(&self, path: &Path) -> Result<Box<dyn SplitNetwork>>;
}
