//! JSON artifact dumps implementing the model capability contracts.
//!
//! A simple-network artifact:
//!
//! ```json
//! {
//!   "entity_id": 18,
//!   "network": {
//!     "descriptor": "Relu(6, 200) >> Linear(1)",
//!     "parameters": [{"name": "W0"}, {"name": "b0", "role": "bias"}]
//!   },
//!   "values": [{"name": "W0", "shape": [6, 200], "data": [..]}, ..]
//! }
//! ```
//!
//! A split-model artifact has `sensors` (entity id to network), `calibration`
//! (one network) and `values` with matching `sensors` and `calibration` lists.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

use crate::persist::read_json;
use crate::source::{
    ArtifactLoader, EntityId, EvaluationContext, ParameterHandle, SequentialNetwork,
    SimpleNetworkSource, SplitNetwork, SplitValues,
};
use crate::tensor::TensorValue;
use crate::Result;

/// Layer chain and declared parameters of one sequential network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub descriptor: String,
    #[serde(default)]
    pub parameters: Vec<ParameterHandle>,
}

impl SequentialNetwork for NetworkRecord {
    fn descriptor(&self) -> String {
        self.descriptor.clone()
    }

    fn parameters(&self) -> Vec<ParameterHandle> {
        self.parameters.clone()
    }
}

/// Stored values standing in for a live evaluation session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoredValues(pub Vec<TensorValue>);

impl EvaluationContext for StoredValues {
    /// Named values are narrowed to the requested parameters; unnamed values
    /// are returned in stored order.
    fn evaluate(&self, parameters: &[ParameterHandle]) -> Result<Vec<TensorValue>> {
        if !self.0.iter().all(|v| v.name.is_some()) {
            return Ok(self.0.clone());
        }
        let wanted: HashSet<&str> = parameters.iter().map(|p| p.name.as_str()).collect();
        Ok(self
            .0
            .iter()
            .filter(|v| v.name.as_deref().is_some_and(|n| wanted.contains(n)))
            .cloned()
            .collect())
    }
}

/// A standalone trained network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleArtifact {
    #[serde(default)]
    pub entity_id: Option<EntityId>,
    pub network: NetworkRecord,
    pub values: StoredValues,
}

impl SimpleNetworkSource for SimpleArtifact {
    fn network(&self) -> &dyn SequentialNetwork {
        &self.network
    }

    fn context(&self) -> &dyn EvaluationContext {
        &self.values
    }

    fn entity_id(&self) -> Option<EntityId> {
        self.entity_id
    }
}

/// Per-entity sensor networks sharing one calibration network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitArtifact {
    pub sensors: BTreeMap<EntityId, NetworkRecord>,
    pub calibration: NetworkRecord,
    pub values: SplitValues,
}

impl SplitNetwork for SplitArtifact {
    fn entity_ids(&self) -> Vec<EntityId> {
        self.sensors.keys().copied().collect()
    }

    fn sensor_network(&self, entity_id: EntityId) -> Option<&dyn SequentialNetwork> {
        self.sensors
            .get(&entity_id)
            .map(|n| n as &dyn SequentialNetwork)
    }

    fn calibration_network(&self) -> &dyn SequentialNetwork {
        &self.calibration
    }

    fn materialize(&self) -> Result<SplitValues> {
        Ok(self.values.clone())
    }
}

/// Loads the JSON artifact dumps above from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonArtifactLoader;

impl ArtifactLoader for JsonArtifactLoader {
    fn load_simple(&self, path: &Path) -> Result<Box<dyn SimpleNetworkSource>> {
        let artifact: SimpleArtifact = read_json(path)?;
        debug!(
            "Loaded simple network from {} ({} parameters)",
            path.display(),
            artifact.network.parameters.len()
        );
        Ok(Box::new(artifact))
    }

    fn load_split(&self, path: &Path) -> Result<Box<dyn SplitNetwork>> {
        let artifact: SplitArtifact = read_json(path)?;
        debug!(
            "Loaded split model from {} (entities {:?})",
            path.display(),
            artifact.entity_ids()
        );
        Ok(Box::new(artifact))
    }
}
