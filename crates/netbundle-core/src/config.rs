//! Export configuration.
//!
//! One [`ExportConfig`] describes a whole run: which artifacts to read, which
//! components to pull out of each, how to classify parameters and where the
//! interchange document goes. The default reproduces the MetaSense board-18
//! export (split NO2/O3 model plus the standalone CO network).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::classifier::{ClassificationMarkers, UnknownParameterPolicy};
use crate::extractor::{ExtractionOptions, SplitSelector};
use crate::persist::read_json;
use crate::source::EntityId;
use crate::tensor::NonFinitePolicy;
use crate::{NetBundleError, Result};

/// Default locations and identifiers.
pub struct Defaults;

impl Defaults {
    pub const ENTITY_ID: EntityId = 18;
    pub const SPLIT_MODEL_PATH: &'static str = "models/MultiSensor/3-elcajon-20.json";
    pub const CO_MODEL_PATH: &'static str = "models/NN4/alt_board18_co.json";
    pub const OUTPUT_PATH: &'static str =
        "model_jsons/MultiSensor/alt_complete_board18_from_pickles.json";
    pub const SENSOR_SUFFIX: &'static str = "sensor_no2_o3";
    pub const CALIBRATION_SUFFIX: &'static str = "calibration_no2_o3";
    pub const CO_SUFFIX: &'static str = "co";
}

/// One configured model artifact and the components to take from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// A standalone sequential network, exported under `suffix`.
    SimpleNetwork { path: PathBuf, suffix: String },
    /// A split model. Each present suffix exports that sub-network.
    SplitNetwork {
        path: PathBuf,
        entity_id: EntityId,
        #[serde(default)]
        sensor_suffix: Option<String>,
        #[serde(default)]
        calibration_suffix: Option<String>,
    },
}

/// A single component to extract from a loaded source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentTarget<'a> {
    Network {
        suffix: &'a str,
    },
    Split {
        suffix: &'a str,
        entity_id: EntityId,
        selector: SplitSelector,
    },
}

impl ComponentTarget<'_> {
    pub fn suffix(&self) -> &str {
        match self {
            ComponentTarget::Network { suffix } | ComponentTarget::Split { suffix, .. } => suffix,
        }
    }
}

impl SourceConfig {
    pub fn path(&self) -> &Path {
        match self {
            SourceConfig::SimpleNetwork { path, .. } | SourceConfig::SplitNetwork { path, .. } => {
                path
            }
        }
    }

    /// Components requested from this source, sensor before calibration.
    pub fn targets(&self) -> Vec<ComponentTarget<'_>> {
        match self {
            SourceConfig::SimpleNetwork { suffix, .. } => {
                vec![ComponentTarget::Network { suffix }]
            }
            SourceConfig::SplitNetwork {
                entity_id,
                sensor_suffix,
                calibration_suffix,
                ..
            } => {
                let sensor = sensor_suffix.as_deref().map(|suffix| ComponentTarget::Split {
                    suffix,
                    entity_id: *entity_id,
                    selector: SplitSelector::Sensor,
                });
                let calibration =
                    calibration_suffix
                        .as_deref()
                        .map(|suffix| ComponentTarget::Split {
                            suffix,
                            entity_id: *entity_id,
                            selector: SplitSelector::Calibration,
                        });
                sensor.into_iter().chain(calibration).collect()
            }
        }
    }
}

/// Full configuration of one export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    pub output_path: PathBuf,
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub classification: ClassificationMarkers,
    #[serde(default)]
    pub unknown_parameters: UnknownParameterPolicy,
    #[serde(default)]
    pub non_finite: NonFinitePolicy,
    /// Pretty-print the document. Off by default for compact output.
    #[serde(default)]
    pub pretty: bool,
    /// Copy the previous document to `.json.bak` before replacing it.
    #[serde(default)]
    pub keep_backup: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(Defaults::OUTPUT_PATH),
            sources: vec![
                SourceConfig::SplitNetwork {
                    path: PathBuf::from(Defaults::SPLIT_MODEL_PATH),
                    entity_id: Defaults::ENTITY_ID,
                    sensor_suffix: Some(Defaults::SENSOR_SUFFIX.to_string()),
                    calibration_suffix: Some(Defaults::CALIBRATION_SUFFIX.to_string()),
                },
                SourceConfig::SimpleNetwork {
                    path: PathBuf::from(Defaults::CO_MODEL_PATH),
                    suffix: Defaults::CO_SUFFIX.to_string(),
                },
            ],
            classification: ClassificationMarkers::default(),
            unknown_parameters: UnknownParameterPolicy::default(),
            non_finite: NonFinitePolicy::default(),
            pretty: false,
            keep_backup: false,
        }
    }
}

impl ExportConfig {
    /// Load and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Options handed to every extraction.
    pub fn extraction_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            markers: self.classification.clone(),
            unknown_parameters: self.unknown_parameters,
        }
    }

    /// Check that the run would produce unique, well-formed document keys.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(NetBundleError::Config {
                message: "no model sources configured".to_string(),
            });
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(NetBundleError::Validation {
                field: "output_path".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.classification.weight_marker.is_empty()
            || self.classification.bias_marker.is_empty()
        {
            return Err(NetBundleError::Validation {
                field: "classification".to_string(),
                message: "weight and bias markers must not be empty".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            let targets = source.targets();
            if targets.is_empty() {
                return Err(NetBundleError::Validation {
                    field: "sources".to_string(),
                    message: format!(
                        "split model {} requests neither sensor nor calibration",
                        source.path().display()
                    ),
                });
            }
            for target in targets {
                validate_suffix(target.suffix())?;
                if !seen.insert(target.suffix().to_string()) {
                    return Err(NetBundleError::Validation {
                        field: "suffix".to_string(),
                        message: format!("suffix {:?} is used more than once", target.suffix()),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Suffixes become part of document keys, so keep them to `[A-Za-z0-9_]`.
pub fn validate_suffix(suffix: &str) -> Result<()> {
    if suffix.is_empty() {
        return Err(NetBundleError::Validation {
            field: "suffix".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    if let Some(bad) = suffix
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(NetBundleError::Validation {
            field: "suffix".to_string(),
            message: format!("{:?} contains invalid character {:?}", suffix, bad),
        });
    }
    Ok(())
}
