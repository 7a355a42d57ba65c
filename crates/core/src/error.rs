#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Caller-supplied prediction input was rejected.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A manifest or workflow template on disk could not be used.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The loaded template does not have the node the mutator expects.
    #[error("Structural mismatch at node {node_id}: {reason}")]
    StructuralMismatch { node_id: String, reason: String },

    /// The execution backend failed or disconnected mid-run.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A required weight file could not be made available.
    #[error("Weights error: {0}")]
    Weights(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a [`CoreError::StructuralMismatch`].
    pub fn mismatch(node_id: &str, reason: impl Into<String>) -> Self {
        Self::StructuralMismatch {
            node_id: node_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the failure was caused by the caller's input rather than
    /// the system.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
