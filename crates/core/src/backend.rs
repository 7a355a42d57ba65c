//! Seams to the external collaborators: the workflow execution backend
//! and the weight archive fetcher.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::graph::WorkflowGraph;
use crate::manifest::RequiredWeight;

/// A server that executes workflow graphs and writes their outputs to
/// its output directory.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Open (or reopen) the event channel used to observe runs.
    async fn connect(&self) -> Result<(), CoreError>;

    /// Submit `graph` and block until it reaches a terminal state.
    ///
    /// Returns `Err(CoreError::Backend)` if the run fails or the backend
    /// disconnects before completion. There is no timeout.
    async fn run_workflow(&self, graph: &WorkflowGraph) -> Result<(), CoreError>;

    /// Drop anything still queued on the backend.
    async fn clear_queue(&self) -> Result<(), CoreError>;
}

/// Makes a weight archive available at its local destination.
#[async_trait]
pub trait WeightsFetcher: Send + Sync {
    async fn fetch(&self, weight: &RequiredWeight) -> Result<(), CoreError>;
}
