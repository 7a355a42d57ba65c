//! [`ExecutionBackend`] implementation backed by a ComfyUI server.
//!
//! Submits over REST, observes over the WebSocket, and maps every
//! failure into [`CoreError::Backend`].

use async_trait::async_trait;
use styler_core::backend::ExecutionBackend;
use styler_core::error::CoreError;
use styler_core::graph::WorkflowGraph;
use tokio::sync::Mutex;

use crate::api::{has_node_errors, ComfyUIApi};
use crate::client::{ComfyUIClient, ComfyUIConnection};
use crate::processor::{wait_for_completion, RunError};

pub struct ComfyUIBackend {
    api: ComfyUIApi,
    client: ComfyUIClient,
    /// Held for the whole run so frames are read by one watcher at a time.
    connection: Mutex<Option<ComfyUIConnection>>,
}

impl ComfyUIBackend {
    /// * `api_url` - e.g. `http://127.0.0.1:8188`.
    /// * `ws_url` - e.g. `ws://127.0.0.1:8188`.
    pub fn new(api_url: String, ws_url: String) -> Self {
        Self {
            api: ComfyUIApi::new(api_url),
            client: ComfyUIClient::new(ws_url),
            connection: Mutex::new(None),
        }
    }

    pub fn api(&self) -> &ComfyUIApi {
        &self.api
    }

    async fn open(&self) -> Result<ComfyUIConnection, CoreError> {
        self.client
            .connect()
            .await
            .map_err(|e| CoreError::Backend(e.to_string()))
    }

    /// Log the output files ComfyUI recorded for a finished prompt.
    async fn log_outputs(&self, prompt_id: &str) {
        let history = match self.api.get_history(prompt_id).await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(prompt_id, error = %e, "Failed to fetch run history");
                return;
            }
        };

        let Some(outputs) = history
            .get(prompt_id)
            .and_then(|entry| entry.get("outputs"))
            .and_then(|outputs| outputs.as_object())
        else {
            return;
        };

        for (node_id, output) in outputs {
            let images = output.get("images").and_then(|v| v.as_array());
            for image in images.into_iter().flatten() {
                if let Some(filename) = image.get("filename").and_then(|v| v.as_str()) {
                    tracing::info!(prompt_id, node_id = %node_id, filename, "Run produced output");
                }
            }
        }
    }
}

#[async_trait]
impl ExecutionBackend for ComfyUIBackend {
    async fn connect(&self) -> Result<(), CoreError> {
        let conn = self.open().await?;
        *self.connection.lock().await = Some(conn);
        Ok(())
    }

    async fn run_workflow(&self, graph: &WorkflowGraph) -> Result<(), CoreError> {
        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            *guard = Some(self.open().await?);
        }

        let workflow = graph.to_value()?;
        let submitted = self
            .api
            .submit_workflow(&workflow, self.client.client_id())
            .await
            .map_err(|e| CoreError::Backend(format!("Failed to queue workflow: {e}")))?;

        if has_node_errors(&submitted) {
            return Err(CoreError::Backend(format!(
                "Workflow rejected: {}",
                submitted.node_errors
            )));
        }

        tracing::info!(
            prompt_id = %submitted.prompt_id,
            queue_number = submitted.number,
            "Workflow queued",
        );

        let result = match (*guard).as_mut() {
            Some(conn) => wait_for_completion(&mut conn.ws_stream, &submitted.prompt_id).await,
            None => Err(RunError::Closed),
        };

        if let Err(e) = result {
            if matches!(e, RunError::Closed | RunError::Receive(_)) {
                // Reopen on the next run.
                *guard = None;
            }
            return Err(CoreError::Backend(e.to_string()));
        }

        self.log_outputs(&submitted.prompt_id).await;
        Ok(())
    }

    async fn clear_queue(&self) -> Result<(), CoreError> {
        self.api
            .clear_queue()
            .await
            .map_err(|e| CoreError::Backend(format!("Failed to clear queue: {e}")))
    }
}
