//! Layer descriptor parsing.
//!
//! A trained network describes itself as a chain of layer constructors, e.g.
//! `Relu(6, 200) >> Relu(200) >> Linear(1)`. Each fragment reduces to the
//! lower-cased alphabetic part of its constructor name.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

use crate::{NetBundleError, Result};

/// Separator between layer fragments in a descriptor.
pub const DESCRIPTOR_SEPARATOR: &str = ">>";

/// Everything that is not a letter.
static NON_ALPHA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{Alphabetic}]").expect("static regex is valid"));

/// Ordered activation tokens, one per layer, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerDescriptor(Vec<String>);

impl LayerDescriptor {
    /// Number of layers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }
}

impl std::str::FromStr for LayerDescriptor {
    type Err = NetBundleError;

    fn from_str(s: &str) -> Result<Self> {
        parse_descriptor(s)
    }
}

/// Parse a layer-chain descriptor into canonical activation tokens.
///
/// # Examples
///
/// ```
/// use netbundle_core::parse_descriptor;
///
/// let layers = parse_descriptor("Relu(200) >> Relu(200) >> Linear(1)").unwrap();
/// assert_eq!(layers.tokens(), ["relu", "relu", "linear"]);
/// ```
pub fn parse_descriptor(descriptor: &str) -> Result<LayerDescriptor> {
    if descriptor.trim().is_empty() {
        return Err(NetBundleError::parse(descriptor, "descriptor is empty"));
    }

    let tokens = descriptor
        .split(DESCRIPTOR_SEPARATOR)
        .enumerate()
        .map(|(index, fragment)| {
            let token = NON_ALPHA.replace_all(fragment, "").to_lowercase();
            if token.is_empty() {
                Err(NetBundleError::parse(
                    descriptor,
                    format!("layer {} ({:?}) has no activation name", index, fragment.trim()),
                ))
            } else {
                Ok(token)
            }
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("Parsed descriptor into {} layers: {:?}", tokens.len(), tokens);
    Ok(LayerDescriptor(tokens))
}
