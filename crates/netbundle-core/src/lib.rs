//! netbundle core - extracts trained regression networks into one portable
//! interchange document.
//!
//! Trained MetaSense models come in two shapes: a single sequential network,
//! and a split model with one sensor network per board sharing a calibration
//! network. This crate turns either into canonical [`ModelComponent`]s
//! (activation tokens, weights, biases) and writes all of them into a flat JSON
//! document that downstream code can read without the original model classes.
//!
//! # Example
//!
//! ```rust,no_run
//! use netbundle_core::{export, ExportConfig, JsonArtifactLoader};
//!
//! fn main() -> netbundle_core::Result<()> {
//!     let config = ExportConfig::default();
//!     let report = export(&config, &JsonArtifactLoader)?;
//!     println!("Saved as {}", report.output_path.display());
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod assembler;
pub mod classifier;
pub mod component;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod extractor;
pub mod persist;
pub mod source;
pub mod tensor;

pub use artifact::{JsonArtifactLoader, NetworkRecord, SimpleArtifact, SplitArtifact};
pub use assembler::{
    assemble, document_key, export, ComponentSummary, ExportReport, ModelBundle,
    ACT_FUNCTIONS_FIELD, BIASES_FIELD, WEIGHTS_FIELD,
};
pub use classifier::{
    classify_parameters, ClassificationMarkers, ClassifiedParameters, UnknownParameterPolicy,
};
pub use component::ModelComponent;
pub use config::{ExportConfig, SourceConfig};
pub use descriptor::{parse_descriptor, LayerDescriptor};
pub use error::{NetBundleError, Result};
pub use extractor::{
    align_parameters, extract_simple, extract_split, extract_split_cached, Extraction,
    ExtractionOptions, ModelSource, SplitSelector,
};
pub use persist::{atomic_read_json, atomic_write_json};
pub use source::{
    ArtifactLoader, EntityId, EvaluationContext, ParameterHandle, ParameterRole,
    SequentialNetwork, SimpleNetworkSource, SplitNetwork, SplitValues,
};
pub use tensor::{NonFinitePolicy, ParameterTensor, TensorValue};
