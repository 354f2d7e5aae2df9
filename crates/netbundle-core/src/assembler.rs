//! Assembles extracted components into the flat interchange document.
//!
//! Every component contributes exactly three keys, `act_functions_<suffix>`,
//! `weights_<suffix>` and `biases_<suffix>`, in component order. The document
//! is rebuilt from scratch on every run.

use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::info;

use crate::component::ModelComponent;
use crate::config::{validate_suffix, ComponentTarget, ExportConfig, SourceConfig};
use crate::extractor::{extract_simple, extract_split_cached, Extraction, ModelSource};
use crate::persist::atomic_write_json;
use crate::source::ArtifactLoader;
use crate::tensor::{NonFinitePolicy, ParameterTensor};
use crate::{NetBundleError, Result};

/// Key prefix for activation tokens.
pub const ACT_FUNCTIONS_FIELD: &str = "act_functions";
/// Key prefix for weight tensors.
pub const WEIGHTS_FIELD: &str = "weights";
/// Key prefix for bias tensors.
pub const BIASES_FIELD: &str = "biases";

/// Document key for `field` of the component stored under `suffix`.
pub fn document_key(field: &str, suffix: &str) -> String {
    format!("{}_{}", field, suffix)
}

/// Components keyed by suffix, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelBundle {
    components: Vec<(String, ModelComponent)>,
}

impl ModelBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component. Suffixes must be unique and well-formed.
    pub fn insert(&mut self, suffix: impl Into<String>, component: ModelComponent) -> Result<()> {
        let suffix = suffix.into();
        validate_suffix(&suffix)?;
        if self.components.iter().any(|(s, _)| *s == suffix) {
            return Err(NetBundleError::Validation {
                field: "suffix".to_string(),
                message: format!("component {:?} already in bundle", suffix),
            });
        }
        self.components.push((suffix, component));
        Ok(())
    }

    pub fn get(&self, suffix: &str) -> Option<&ModelComponent> {
        self.components
            .iter()
            .find(|(s, _)| s == suffix)
            .map(|(_, c)| c)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|(s, _)| s.as_str())
    }

    /// Encode the bundle as a flat JSON object of plain arrays.
    pub fn to_document(&self, policy: NonFinitePolicy) -> Result<Map<String, Value>> {
        let mut document = Map::new();
        for (suffix, component) in &self.components {
            let act_key = document_key(ACT_FUNCTIONS_FIELD, suffix);
            let weights_key = document_key(WEIGHTS_FIELD, suffix);
            let biases_key = document_key(BIASES_FIELD, suffix);

            let tokens = component
                .layers()
                .tokens()
                .iter()
                .map(|t| Value::String(t.clone()))
                .collect();
            let weights = encode_tensors(&weights_key, component.weights(), policy)?;
            let biases = encode_tensors(&biases_key, component.biases(), policy)?;

            document.insert(act_key, Value::Array(tokens));
            document.insert(weights_key, weights);
            document.insert(biases_key, biases);
        }
        Ok(document)
    }
}

fn encode_tensors(key: &str, tensors: &[ParameterTensor], policy: NonFinitePolicy) -> Result<Value> {
    tensors
        .iter()
        .map(|t| {
            t.to_json(policy).map_err(|e| match e {
                NetBundleError::Serialization { key: name, message } => {
                    NetBundleError::Serialization {
                        key: key.to_string(),
                        message: format!("{} in tensor {}", message, name),
                    }
                }
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

/// Per-component outcome of an export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSummary {
    pub suffix: String,
    pub layers: usize,
    pub parameterized_layers: usize,
    pub dropped_parameters: Vec<String>,
}

/// Outcome of a successful export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub output_path: PathBuf,
    pub components: Vec<ComponentSummary>,
}

impl ExportReport {
    /// Total parameters dropped across all components.
    pub fn dropped_count(&self) -> usize {
        self.components
            .iter()
            .map(|c| c.dropped_parameters.len())
            .sum()
    }
}

/// Load every configured source and extract its components into a bundle.
///
/// Sources are dispatched on their configured kind, never on the shape of the
/// loaded object.
pub fn assemble(
    config: &ExportConfig,
    loader: &dyn ArtifactLoader,
) -> Result<(ModelBundle, Vec<ComponentSummary>)> {
    config.validate()?;
    let options = config.extraction_options();
    let mut bundle = ModelBundle::new();
    let mut summaries = Vec::new();

    for source_config in &config.sources {
        let source = load_source(source_config, loader)?;
        info!(
            "Loaded {} from {}",
            source.kind(),
            source_config.path().display()
        );

        // A split model is materialized once, however many components it yields.
        let mut split_values = None;
        for target in source_config.targets() {
            let Extraction { component, dropped } = match (&source, target) {
                (ModelSource::Simple(network), ComponentTarget::Network { suffix }) => {
                    extract_simple(suffix, network.as_ref(), &options)?
                }
                (
                    ModelSource::Split(model),
                    ComponentTarget::Split {
                        suffix,
                        entity_id,
                        selector,
                    },
                ) => extract_split_cached(
                    suffix,
                    model.as_ref(),
                    entity_id,
                    selector,
                    &mut split_values,
                    &options,
                )?,
                (source, target) => {
                    return Err(NetBundleError::Config {
                        message: format!(
                            "component {} cannot be taken from a {}",
                            target.suffix(),
                            source.kind()
                        ),
                    })
                }
            };

            summaries.push(ComponentSummary {
                suffix: target.suffix().to_string(),
                layers: component.layers().len(),
                parameterized_layers: component.weights().len(),
                dropped_parameters: dropped,
            });
            bundle.insert(target.suffix(), component)?;
        }
    }

    Ok((bundle, summaries))
}

fn load_source(config: &SourceConfig, loader: &dyn ArtifactLoader) -> Result<ModelSource> {
    match config {
        SourceConfig::SimpleNetwork { path, .. } => loader.load_simple(path).map(ModelSource::Simple),
        SourceConfig::SplitNetwork { path, .. } => loader.load_split(path).map(ModelSource::Split),
    }
}

/// Run a full export: extract everything, encode, then write the document.
///
/// Nothing is written unless extraction and encoding both succeed.
pub fn export(config: &ExportConfig, loader: &dyn ArtifactLoader) -> Result<ExportReport> {
    let (bundle, components) = assemble(config, loader)?;
    let document = bundle.to_document(config.non_finite)?;

    atomic_write_json(
        &config.output_path,
        &document,
        config.pretty,
        config.keep_backup,
    )?;
    info!(
        "Saved {} components ({} keys) to {}",
        bundle.len(),
        document.len(),
        config.output_path.display()
    );

    Ok(ExportReport {
        output_path: config.output_path.clone(),
        components,
    })
}
