//! Adapts the two trained-model shapes into [`ModelComponent`]s.
//!
//! A simple network yields exactly one component. A split model yields one
//! component per request: the sensor network of a single entity, or the
//! shared calibration network.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::classifier::{classify_parameters, ClassificationMarkers, UnknownParameterPolicy};
use crate::component::ModelComponent;
use crate::descriptor::parse_descriptor;
use crate::source::{
    EntityId, ParameterHandle, SequentialNetwork, SimpleNetworkSource, SplitNetwork, SplitValues,
};
use crate::tensor::{ParameterTensor, TensorValue};
use crate::{NetBundleError, Result};

/// Options shared by every extraction in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionOptions {
    pub markers: ClassificationMarkers,
    pub unknown_parameters: UnknownParameterPolicy,
}

/// Which sub-network of a split model to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitSelector {
    Sensor,
    Calibration,
}

/// One extracted component and what was left out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub component: ModelComponent,
    /// Parameter names dropped by the classifier.
    pub dropped: Vec<String>,
}

/// A loaded model artifact, tagged by the shape the configuration declared.
pub enum ModelSource {
    Simple(Box<dyn SimpleNetworkSource>),
    Split(Box<dyn SplitNetwork>),
}

impl ModelSource {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelSource::Simple(_) => "simple_network",
            ModelSource::Split(_) => "split_network",
        }
    }
}

/// Extract the single component of a simple network.
///
/// Evaluates the source's context once to materialize every declared parameter.
pub fn extract_simple(
    name: &str,
    source: &dyn SimpleNetworkSource,
    options: &ExtractionOptions,
) -> Result<Extraction> {
    let network = source.network();
    let handles = network.parameters();
    let values = source.context().evaluate(&handles)?;
    if let Some(entity_id) = source.entity_id() {
        debug!("{} was trained for entity {}", name, entity_id);
    }
    build_extraction(name, network, handles, values, options)
}

/// Extract the sensor network of `entity_id` or the shared calibration network.
///
/// Fails with a lookup error, before anything is materialized, when a sensor
/// component is requested for an entity the model does not contain.
pub fn extract_split(
    name: &str,
    model: &dyn SplitNetwork,
    entity_id: EntityId,
    selector: SplitSelector,
    options: &ExtractionOptions,
) -> Result<Extraction> {
    extract_split_cached(name, model, entity_id, selector, &mut None, options)
}

/// Same as [`extract_split`], but materializes the model at most once across
/// calls sharing `cache`. Only the selected sub-network's values are copied
/// out of the cache.
pub fn extract_split_cached(
    name: &str,
    model: &dyn SplitNetwork,
    entity_id: EntityId,
    selector: SplitSelector,
    cache: &mut Option<SplitValues>,
    options: &ExtractionOptions,
) -> Result<Extraction> {
    let lookup_error = || NetBundleError::Lookup {
        entity_id,
        available: model.entity_ids(),
    };

    let network = match selector {
        SplitSelector::Sensor => model.sensor_network(entity_id).ok_or_else(lookup_error)?,
        SplitSelector::Calibration => model.calibration_network(),
    };

    let materialized = match cache.take() {
        Some(values) => values,
        None => {
            debug!("Materializing split model values for {}", name);
            model.materialize()?
        }
    };
    let selected = match selector {
        SplitSelector::Sensor => materialized.sensors.get(&entity_id).cloned(),
        SplitSelector::Calibration => Some(materialized.calibration.clone()),
    };
    *cache = Some(materialized);
    let values = selected.ok_or_else(lookup_error)?;

    build_extraction(name, network, network.parameters(), values, options)
}

fn build_extraction(
    name: &str,
    network: &dyn SequentialNetwork,
    handles: Vec<ParameterHandle>,
    values: Vec<TensorValue>,
    options: &ExtractionOptions,
) -> Result<Extraction> {
    let layers = parse_descriptor(&network.descriptor())?;
    let aligned = align_parameters(name, handles, values)?;
    let classified = classify_parameters(
        name,
        aligned,
        &options.markers,
        options.unknown_parameters,
    )?;

    let component = ModelComponent::new(name, layers, classified.weights, classified.biases)?;
    info!(
        "Extracted {}: {} layers, {} weight/bias pairs",
        name,
        component.layers().len(),
        component.weights().len()
    );

    Ok(Extraction {
        component,
        dropped: classified.dropped,
    })
}

/// Pair declared parameters with materialized values.
///
/// When every value carries a name, pairing is by name and each declared
/// parameter must match exactly one value. Otherwise the two lists must have
/// the same length and are paired by position, and any value that does carry
/// a name must name the parameter at its position.
pub fn align_parameters(
    component: &str,
    handles: Vec<ParameterHandle>,
    values: Vec<TensorValue>,
) -> Result<Vec<(ParameterHandle, ParameterTensor)>> {
    let mismatch = |message: String| NetBundleError::ParameterMismatch {
        component: component.to_string(),
        message,
    };

    let all_named = !values.is_empty() && values.iter().all(|v| v.name.is_some());
    if !all_named {
        if handles.len() != values.len() {
            return Err(mismatch(format!(
                "{} declared parameters but {} materialized values",
                handles.len(),
                values.len()
            )));
        }
        return handles
            .into_iter()
            .zip(values)
            .enumerate()
            .map(|(position, (handle, value))| {
                if let Some(value_name) = value.name.as_deref() {
                    if value_name != handle.name {
                        return Err(mismatch(format!(
                            "value {:?} at position {} does not match parameter {:?}",
                            value_name, position, handle.name
                        )));
                    }
                }
                let tensor = ParameterTensor::from_value(handle.name.clone(), value)?;
                Ok((handle, tensor))
            })
            .collect();
    }

    let mut by_name: HashMap<String, TensorValue> = HashMap::with_capacity(values.len());
    for value in values {
        let value_name = value.name.clone().unwrap_or_default();
        if by_name.insert(value_name.clone(), value).is_some() {
            return Err(mismatch(format!("value {:?} materialized twice", value_name)));
        }
    }

    let mut aligned = Vec::with_capacity(handles.len());
    for handle in handles {
        let value = by_name
            .remove(&handle.name)
            .ok_or_else(|| mismatch(format!("no value for parameter {:?}", handle.name)))?;
        let tensor = ParameterTensor::from_value(handle.name.clone(), value)?;
        aligned.push((handle, tensor));
    }

    if !by_name.is_empty() {
        let mut extra: Vec<String> = by_name.into_keys().collect();
        extra.sort();
        return Err(mismatch(format!("values without declared parameter: {:?}", extra)));
    }

    Ok(aligned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::EvaluationContext;
    use std::cell::Cell;
    use std::collections::BTreeMap;

    struct Net {
        descriptor: &'static str,
        params: Vec<&'static str>,
    }

    impl SequentialNetwork for Net {
        fn descriptor(&self) -> String {
            self.descriptor.to_string()
        }

        fn parameters(&self) -> Vec<ParameterHandle> {
            self.params.iter().map(|p| ParameterHandle::new(*p)).collect()
        }
    }

    /// Returns one single-element value per handle, numbered by position.
    struct Counting;

    impl EvaluationContext for Counting {
        fn evaluate(&self, parameters: &[ParameterHandle]) -> Result<Vec<TensorValue>> {
            Ok(parameters
                .iter()
                .enumerate()
                .map(|(i, _)| TensorValue::new(vec![1], vec![i as f64]))
                .collect())
        }
    }

    struct Simple(Net);

    impl SimpleNetworkSource for Simple {
        fn network(&self) -> &dyn SequentialNetwork {
            &self.0
        }

        fn context(&self) -> &dyn EvaluationContext {
            &Counting
        }
    }

    fn two_layer(prefix: f64) -> Vec<TensorValue> {
        vec![
            TensorValue::new(vec![1], vec![prefix]),
            TensorValue::new(vec![1], vec![prefix + 1.0]),
            TensorValue::new(vec![1], vec![prefix + 2.0]),
            TensorValue::new(vec![1], vec![prefix + 3.0]),
        ]
    }

    struct Split {
        sensors: BTreeMap<EntityId, Net>,
        calibration: Net,
        materialized: Cell<usize>,
    }

    impl Split {
        fn boards() -> Self {
            let net = || Net {
                descriptor: "Relu(3, 4) >> Linear(1)",
                params: vec!["W0", "b0", "W1", "b1"],
            };
            Self {
                sensors: BTreeMap::from([(12, net()), (18, net())]),
                calibration: Net {
                    descriptor: "Relu(2) >> Relu(2) >> Linear(2)",
                    params: vec!["W0", "b0", "W1", "b1"],
                },
                materialized: Cell::new(0),
            }
        }
    }

    impl SplitNetwork for Split {
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
            self.materialized.set(self.materialized.get() + 1);
            Ok(SplitValues {
                sensors: BTreeMap::from([(12, two_layer(12.0)), (18, two_layer(18.0))]),
                calibration: two_layer(100.0),
            })
        }
    }

    #[test]
    fn test_extract_simple_network() {
        let source = Simple(Net {
            descriptor: "Relu(6, 200) >> Relu(200) >> Linear(1)",
            params: vec!["W0", "b0", "W1", "b1", "W2", "b2"],
        });
        let extraction = extract_simple("co", &source, &ExtractionOptions::default()).unwrap();
        let component = extraction.component;

        assert_eq!(component.layers().tokens(), ["relu", "relu", "linear"]);
        assert_eq!(component.weights().len(), 3);
        assert_eq!(component.biases()[2].data(), &[5.0]);
        assert!(extraction.dropped.is_empty());
    }

    #[test]
    fn test_extract_split_sensor_only_uses_requested_entity() {
        let model = Split::boards();
        let extraction = extract_split(
            "sensor_no2_o3",
            &model,
            18,
            SplitSelector::Sensor,
            &ExtractionOptions::default(),
        )
        .unwrap();

        let component = extraction.component;
        assert_eq!(component.layers().tokens(), ["relu", "linear"]);
        let weights: Vec<f64> = component.weights().iter().map(|t| t.data()[0]).collect();
        assert_eq!(weights, vec![18.0, 20.0]);
    }

    #[test]
    fn test_extract_split_calibration() {
        let model = Split::boards();
        let extraction = extract_split(
            "calibration_no2_o3",
            &model,
            18,
            SplitSelector::Calibration,
            &ExtractionOptions::default(),
        )
        .unwrap();

        assert_eq!(extraction.component.layers().len(), 3);
        assert_eq!(extraction.component.biases()[0].data(), &[101.0]);
    }

    #[test]
    fn test_extract_split_unknown_entity() {
        let model = Split::boards();
        let err = extract_split(
            "sensor_no2_o3",
            &model,
            99,
            SplitSelector::Sensor,
            &ExtractionOptions::default(),
        )
        .unwrap_err();

        match err {
            NetBundleError::Lookup {
                entity_id,
                available,
            } => {
                assert_eq!(entity_id, 99);
                assert_eq!(available, vec![12, 18]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_align_by_name_ignores_value_order() {
        let handles = vec![ParameterHandle::new("W0"), ParameterHandle::new("b0")];
        let values = vec![
            TensorValue::named("b0", vec![1], vec![2.0]),
            TensorValue::named("W0", vec![1], vec![1.0]),
        ];
        let aligned = align_parameters("net", handles, values).unwrap();
        assert_eq!(aligned[0].0.name, "W0");
        assert_eq!(aligned[0].1.data(), &[1.0]);
        assert_eq!(aligned[1].1.data(), &[2.0]);
    }

    #[test]
    fn test_align_by_name_reports_missing_and_extra() {
        let handles = vec![ParameterHandle::new("W0"), ParameterHandle::new("b0")];
        let values = vec![
            TensorValue::named("W0", vec![1], vec![1.0]),
            TensorValue::named("b9", vec![1], vec![2.0]),
        ];
        let err = align_parameters("net", handles, values).unwrap_err();
        assert!(err.to_string().contains("no value for parameter \"b0\""));

        let handles = vec![ParameterHandle::new("W0")];
        let values = vec![
            TensorValue::named("W0", vec![1], vec![1.0]),
            TensorValue::named("extra", vec![1], vec![2.0]),
        ];
        let err = align_parameters("net", handles, values).unwrap_err();
        assert!(err.to_string().contains("extra"));
    }

    #[test]
    fn test_align_positional_requires_equal_counts() {
        let handles = vec![ParameterHandle::new("W0"), ParameterHandle::new("b0")];
        let values = vec![TensorValue::new(vec![1], vec![1.0])];
        let err = align_parameters("net", handles, values).unwrap_err();
        assert!(matches!(err, NetBundleError::ParameterMismatch { .. }));
    }

    #[test]
    fn test_align_positional_checks_names_that_are_present() {
        let handles = vec![ParameterHandle::new("W0"), ParameterHandle::new("b0")];
        let values = vec![
            TensorValue::named("b0", vec![1], vec![2.0]),
            TensorValue::new(vec![1], vec![1.0]),
        ];
        let err = align_parameters("net", handles, values).unwrap_err();
        match err {
            NetBundleError::ParameterMismatch { message, .. } => {
                assert!(message.contains("\"b0\" at position 0"));
                assert!(message.contains("\"W0\""));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_align_positional_accepts_partially_named_in_order() {
        let handles = vec![ParameterHandle::new("W0"), ParameterHandle::new("b0")];
        let values = vec![
            TensorValue::named("W0", vec![1], vec![1.0]),
            TensorValue::new(vec![1], vec![2.0]),
        ];
        let aligned = align_parameters("net", handles, values).unwrap();
        assert_eq!(aligned[0].1.data(), &[1.0]);
        assert_eq!(aligned[1].0.name, "b0");
        assert_eq!(aligned[1].1.data(), &[2.0]);
    }

    #[test]
    fn test_split_values_materialized_once_per_cache() {
        let model = Split::boards();
        let options = ExtractionOptions::default();
        let mut cache = None;

        let sensor = extract_split_cached(
            "sensor_no2_o3",
            &model,
            18,
            SplitSelector::Sensor,
            &mut cache,
            &options,
        )
        .unwrap();
        let calibration = extract_split_cached(
            "calibration_no2_o3",
            &model,
            18,
            SplitSelector::Calibration,
            &mut cache,
            &options,
        )
        .unwrap();

        assert_eq!(model.materialized.get(), 1);
        assert_eq!(sensor.component.weights()[0].data(), &[18.0]);
        assert_eq!(calibration.component.weights()[0].data(), &[100.0]);
    }

    #[test]
    fn test_unknown_entity_never_materializes() {
        let model = Split::boards();
        let mut cache = None;
        let result = extract_split_cached(
            "sensor_no2_o3",
            &model,
            99,
            SplitSelector::Sensor,
            &mut cache,
            &ExtractionOptions::default(),
        );
        assert!(matches!(result, Err(NetBundleError::Lookup { .. })));
        assert_eq!(model.materialized.get(), 0);
        assert!(cache.is_none());
    }

    #[test]
    fn test_bad_descriptor_fails_extraction() {
        let source = Simple(Net {
            descriptor: "",
            params: vec![],
        });
        let err = extract_simple("co", &source, &ExtractionOptions::default()).unwrap_err();
        assert!(matches!(err, NetBundleError::Parse { .. }));
    }
}
