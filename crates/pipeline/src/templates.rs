//! Workflow template store.
//!
//! Both graph variants are read and validated once at setup. Every
//! prediction gets its own clone via [`TemplateStore::instantiate`].

use std::path::Path;

use styler_core::error::CoreError;
use styler_core::graph::WorkflowGraph;

/// Which graph variant a prediction runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Style image only; output size comes from width/height.
    Base,
    /// Style plus structure image; output size follows the structure.
    WithStructure,
}

impl TemplateKind {
    pub fn for_structure(has_structure: bool) -> Self {
        if has_structure {
            Self::WithStructure
        } else {
            Self::Base
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemplateStore {
    base: WorkflowGraph,
    with_structure: Option<WorkflowGraph>,
}

impl TemplateStore {
    /// Read both templates from disk.
    ///
    /// A missing or malformed file is a [`CoreError::Config`].
    pub fn load(base_path: &Path, structure_path: &Path) -> Result<Self, CoreError> {
        let base = read_template(base_path)?;
        let with_structure = read_template(structure_path)?;

        tracing::info!(
            base = %base_path.display(),
            base_nodes = base.len(),
            structure = %structure_path.display(),
            structure_nodes = with_structure.len(),
            "Workflow templates loaded",
        );

        Ok(Self {
            base,
            with_structure: Some(with_structure),
        })
    }

    /// Load only the base template.
    pub fn load_base(base_path: &Path) -> Result<Self, CoreError> {
        Ok(Self {
            base: read_template(base_path)?,
            with_structure: None,
        })
    }

    /// Build from in-memory JSON.
    pub fn from_json(base: &str, with_structure: Option<&str>) -> Result<Self, CoreError> {
        Ok(Self {
            base: WorkflowGraph::from_json(base)?,
            with_structure: with_structure.map(WorkflowGraph::from_json).transpose()?,
        })
    }

    pub fn supports(&self, kind: TemplateKind) -> bool {
        match kind {
            TemplateKind::Base => true,
            TemplateKind::WithStructure => self.with_structure.is_some(),
        }
    }

    /// A fresh copy of the template for `kind`.
    pub fn instantiate(&self, kind: TemplateKind) -> Result<WorkflowGraph, CoreError> {
        match kind {
            TemplateKind::Base => Ok(self.base.clone()),
            TemplateKind::WithStructure => self.with_structure.clone().ok_or_else(|| {
                CoreError::Config("No structure workflow template loaded".to_string())
            }),
        }
    }
}

fn read_template(path: &Path) -> Result<WorkflowGraph, CoreError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Config(format!("Cannot read workflow template {}: {e}", path.display()))
    })?;
    WorkflowGraph::from_json(&text).map_err(|e| {
        CoreError::Config(format!("Invalid workflow template {}: {e}", path.display()))
    })
}
