//! Weights manifest loading and weights-map resolution.
//!
//! The manifest names the weight files available for download, grouped
//! by category. The derived [`WeightsMap`] tells the execution layer
//! where each file comes from and where it must be installed. Nothing
//! here touches the network.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::CoreError;
use crate::graph::{Node, WorkflowGraph};
use crate::preprocessor_weights::preprocessor_weights;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default location of weight archives.
pub const DEFAULT_WEIGHTS_BASE_URL: &str = "https://weights.replicate.delivery/default/comfy-ui";

/// Default install root for model weights.
pub const DEFAULT_MODELS_PATH: &str = "ComfyUI/models";

/// Default install root for custom nodes.
pub const DEFAULT_CUSTOM_NODES_PATH: &str = "ComfyUI/custom_nodes";

/// Default manifest file name.
pub const DEFAULT_MANIFEST_PATH: &str = "weights.json";

/// Key holding categories in the explicit manifest schema.
const CATEGORIES_KEY: &str = "categories";

/// `IPAdapterUnifiedLoader` presets → weights the node loads implicitly.
const IPADAPTER_PRESET_WEIGHTS: &[(&str, &[&str])] = &[
    (
        "PLUS (high strength)",
        &[
            "ip-adapter-plus_sdxl_vit-h.safetensors",
            "CLIP-ViT-H-14-laion2B-s32B-b79K.safetensors",
        ],
    ),
    (
        "STANDARD (medium strength)",
        &[
            "ip-adapter_sdxl_vit-h.safetensors",
            "CLIP-ViT-H-14-laion2B-s32B-b79K.safetensors",
        ],
    ),
];

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Weight file names grouped by category (e.g. `CHECKPOINTS`), in file
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightsManifest {
    categories: IndexMap<String, Vec<String>>,
}

impl WeightsManifest {
    /// Read the manifest at `path`.
    ///
    /// A missing file is not an error: an empty manifest is returned and
    /// a warning logged. A file that exists but cannot be parsed is a
    /// [`CoreError::Config`].
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Local weights manifest file does not exist",
            );
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            CoreError::Config(format!("Invalid weights manifest {}: {e}", path.display()))
        })?;
        let manifest = Self::from_value(&value)?;

        tracing::info!(
            path = %path.display(),
            categories = manifest.categories.len(),
            weights = manifest.weight_count(),
            "Weights manifest loaded",
        );
        Ok(manifest)
    }

    /// Parse a manifest value.
    ///
    /// Two shapes are accepted:
    ///
    /// - explicit: `{"categories": {"checkpoints": ["a", ...]}, ...}`
    /// - flat: `{"CHECKPOINTS": ["a", ...], "note": "..."}`, where only
    ///   all-upper-case keys are categories and every other key is
    ///   metadata.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, CoreError> {
        let obj = value
            .as_object()
            .ok_or_else(|| CoreError::Config("Weights manifest must be a JSON object".into()))?;

        let mut categories = IndexMap::new();

        match obj.get(CATEGORIES_KEY) {
            Some(explicit) => {
                let explicit = explicit.as_object().ok_or_else(|| {
                    CoreError::Config("Manifest 'categories' must be a JSON object".into())
                })?;
                for (category, names) in explicit {
                    categories.insert(category.to_lowercase(), parse_names(category, names)?);
                }
            }
            None => {
                for (key, names) in obj.iter().filter(|(key, _)| is_category_key(key)) {
                    categories.insert(key.to_lowercase(), parse_names(key, names)?);
                }
            }
        }

        Ok(Self { categories })
    }

    /// Build a manifest directly from `(category, names)` pairs.
    pub fn from_categories<I, C, N>(categories: I) -> Self
    where
        I: IntoIterator<Item = (C, Vec<N>)>,
        C: Into<String>,
        N: Into<String>,
    {
        Self {
            categories: categories
                .into_iter()
                .map(|(c, names)| {
                    (
                        c.into().to_lowercase(),
                        names.into_iter().map(Into::into).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Lower-cased category names.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn weights_in(&self, category: &str) -> &[String] {
        self.categories
            .get(&category.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn weight_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Flat-manifest convention: a key names a category only if it has at
/// least one cased character and no lower-case ones.
fn is_category_key(key: &str) -> bool {
    key.chars().any(char::is_uppercase) && !key.chars().any(char::is_lowercase)
}

fn parse_names(category: &str, value: &serde_json::Value) -> Result<Vec<String>, CoreError> {
    let invalid = || CoreError::Config(format!("Manifest category '{category}' must be a list of strings"));
    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

// ---------------------------------------------------------------------------
// Weights map
// ---------------------------------------------------------------------------

/// Where a weight archive is fetched from and the directory it unpacks into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightSource {
    pub url: String,
    pub dest: String,
}

/// Roots used to expand manifest entries into [`WeightSource`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightsLayout {
    pub base_url: String,
    pub models_path: String,
    pub custom_nodes_path: String,
}

impl Default for WeightsLayout {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_WEIGHTS_BASE_URL.to_string(),
            models_path: DEFAULT_MODELS_PATH.to_string(),
            custom_nodes_path: DEFAULT_CUSTOM_NODES_PATH.to_string(),
        }
    }
}

/// A weight a workflow needs, with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredWeight {
    pub name: String,
    pub source: WeightSource,
}

impl RequiredWeight {
    /// Installed location, relative to the working directory unless
    /// `dest` is absolute.
    pub fn local_path(&self) -> PathBuf {
        Path::new(&self.source.dest).join(&self.name)
    }
}

/// Lookup from weight file name to its [`WeightSource`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WeightsMap {
    entries: HashMap<String, WeightSource>,
}

impl WeightsMap {
    /// Expand every manifest category in file order, then merge the
    /// preprocessor weights. On a name collision the later entry wins.
    pub fn build(manifest: &WeightsManifest, layout: &WeightsLayout) -> Self {
        let mut map = Self::default();

        for (category, names) in &manifest.categories {
            for name in names {
                map.insert(
                    name.clone(),
                    WeightSource {
                        url: format!("{}/{category}/{name}.tar", layout.base_url),
                        dest: format!("{}/{category}", layout.models_path),
                    },
                );
            }
        }

        for (name, source) in preprocessor_weights(&layout.base_url, &layout.custom_nodes_path) {
            map.insert(name, source);
        }

        tracing::debug!(entries = map.len(), "Weights map built");
        map
    }

    fn insert(&mut self, name: String, source: WeightSource) {
        if let Some(previous) = self.entries.insert(name.clone(), source) {
            tracing::debug!(
                weight = %name,
                replaced_url = %previous.url,
                "Weights map entry overwritten",
            );
        }
    }

    pub fn get(&self, name: &str) -> Option<&WeightSource> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Weights referenced by `graph` that this map knows how to fetch.
    ///
    /// Considers every literal string input plus weights that some
    /// loader nodes pull in implicitly. Returned in graph order with
    /// duplicates removed. Names the map does not know are skipped; they
    /// are assumed to be bundled with the backend.
    pub fn required_by(&self, graph: &WorkflowGraph) -> Vec<RequiredWeight> {
        let mut seen = HashSet::new();
        let mut required = Vec::new();

        let referenced = graph.nodes().flat_map(|(_, node)| {
            node_string_literals(node)
                .chain(implied_weights(node).iter().copied())
                .collect::<Vec<_>>()
        });

        for name in referenced {
            if !seen.insert(name) {
                continue;
            }
            if let Some(source) = self.get(name) {
                required.push(RequiredWeight {
                    name: name.to_string(),
                    source: source.clone(),
                });
            }
        }

        required
    }
}

fn node_string_literals(node: &Node) -> impl Iterator<Item = &str> {
    node.inputs
        .values()
        .filter_map(|v| v.as_literal().and_then(serde_json::Value::as_str))
}

/// Weights a node loads without naming them in an input slot.
fn implied_weights(node: &Node) -> &'static [&'static str] {
    if node.class_type != "IPAdapterUnifiedLoader" {
        return &[];
    }
    let preset = node.literal("preset").and_then(|v| v.as_str());
    IPADAPTER_PRESET_WEIGHTS
        .iter()
        .find(|(name, _)| Some(*name) == preset)
        .map(|(_, weights)| *weights)
        .unwrap_or(&[])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
