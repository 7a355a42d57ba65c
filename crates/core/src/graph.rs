//! ComfyUI API-format workflow graph.
//!
//! A workflow is an object keyed by node ID where each value has a
//! `class_type` and an `inputs` map:
//!
//! ```json
//! {
//!   "3": {
//!     "class_type": "KSampler",
//!     "inputs": { "seed": 42, "model": ["2", 0] }
//!   }
//! }
//! ```
//!
//! Inputs are either literal JSON values or links to another node's
//! output (`[node_id, output_index]`). The graph is parsed into typed
//! structures once; mutation goes through the typed views in
//! [`crate::nodes`].

use std::marker::PhantomData;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::nodes::NodeKind;

/// Node identifier (the string key in the workflow JSON).
pub type NodeId = String;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// Value of a single node input slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    /// Edge to another node's output, serialized as `[node_id, output_index]`.
    Link(NodeId, u32),
    /// Any literal value (number, string, bool, ...).
    Literal(serde_json::Value),
}

impl InputValue {
    /// The literal value, or `None` for links.
    pub fn as_literal(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Literal(v) => Some(v),
            Self::Link(..) => None,
        }
    }
}

/// Optional editor metadata ComfyUI attaches to exported nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Any other editor keys, written back untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A single node in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Raw input slots keyed by slot name.
    #[serde(default)]
    pub inputs: IndexMap<String, InputValue>,
    /// ComfyUI class type (e.g. "KSampler", "CLIPTextEncode").
    pub class_type: String,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<NodeMeta>,
}

impl Node {
    /// Literal value of an input slot, if present and not a link.
    pub fn literal(&self, slot: &str) -> Option<&serde_json::Value> {
        self.inputs.get(slot).and_then(InputValue::as_literal)
    }
}

/// A complete workflow graph.
///
/// Nodes keep the order they have in the template, so a serialized
/// graph lists them as the file did. Cloning produces a fully independent deep copy, which is how
/// per-prediction instances are derived from shared templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowGraph {
    nodes: IndexMap<NodeId, Node>,
}

/// Mutable, kind-checked view of one node. See [`crate::nodes`] for the
/// per-kind setters.
pub struct TypedNodeMut<'a, K: NodeKind> {
    pub(crate) id: &'a str,
    pub(crate) node: &'a mut Node,
    _kind: PhantomData<K>,
}

// ---------------------------------------------------------------------------
// Graph API
// ---------------------------------------------------------------------------

impl WorkflowGraph {
    /// Parse a workflow from JSON text and check link integrity.
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        let graph: Self = serde_json::from_str(text)
            .map_err(|e| CoreError::Config(format!("Invalid workflow JSON: {e}")))?;
        graph.validate()?;
        Ok(graph)
    }

    /// Build a workflow from an already-parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CoreError> {
        let graph: Self = serde_json::from_value(value)
            .map_err(|e| CoreError::Config(format!("Invalid workflow JSON: {e}")))?;
        graph.validate()?;
        Ok(graph)
    }

    /// Serialize into the JSON shape ComfyUI's `/prompt` endpoint expects.
    pub fn to_value(&self) -> Result<serde_json::Value, CoreError> {
        serde_json::to_value(self)
            .map_err(|e| CoreError::Internal(format!("Failed to serialize workflow: {e}")))
    }

    /// Check that the graph is non-empty and every link targets an
    /// existing node.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.nodes.is_empty() {
            return Err(CoreError::Config("Workflow must contain at least one node".into()));
        }
        for (id, node) in &self.nodes {
            for (slot, value) in &node.inputs {
                if let InputValue::Link(target, _) = value {
                    if !self.nodes.contains_key(target) {
                        return Err(CoreError::Config(format!(
                            "Node '{id}' input '{slot}' links to missing node '{target}'"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Iterate nodes in template order.
    pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Borrow node `id` as kind `K`.
    ///
    /// Fails with [`CoreError::StructuralMismatch`] if the node is absent
    /// or has a different `class_type`; never creates a node.
    pub fn typed_mut<'a, K: NodeKind>(
        &'a mut self,
        id: &'a str,
    ) -> Result<TypedNodeMut<'a, K>, CoreError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| CoreError::mismatch(id, format!("expected {} node", K::CLASS_TYPE)))?;

        if node.class_type != K::CLASS_TYPE {
            return Err(CoreError::mismatch(
                id,
                format!("expected {}, found {}", K::CLASS_TYPE, node.class_type),
            ));
        }

        Ok(TypedNodeMut {
            id,
            node,
            _kind: PhantomData,
        })
    }
}

impl<K: NodeKind> TypedNodeMut<'_, K> {
    pub fn id(&self) -> &str {
        self.id
    }

    /// Overwrite a literal slot, inserting it if the template omits it.
    pub(crate) fn set(&mut self, slot: &str, value: impl Into<serde_json::Value>) {
        self.node
            .inputs
            .insert(slot.to_string(), InputValue::Literal(value.into()));
    }

    pub(crate) fn get(&self, slot: &str) -> Option<&serde_json::Value> {
        self.node.literal(slot)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
