//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps workflow submission, queue clearing, history retrieval and the
//! readiness probe using [`reqwest`].

use serde::Deserialize;

/// HTTP client for a single ComfyUI server.
#[derive(Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the ComfyUI `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue.
    pub number: i32,
    /// Per-node validation errors; non-empty means the prompt was rejected.
    #[serde(default)]
    pub node_errors: serde_json::Value,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ComfyUIApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://127.0.0.1:8188`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a workflow for execution.
    ///
    /// Sends `POST /prompt` with the workflow JSON and the client ID of
    /// the WebSocket that will observe the run.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Remove every pending item from the execution queue.
    pub async fn clear_queue(&self) -> Result<(), ComfyUIApiError> {
        let response = self
            .client
            .post(format!("{}/queue", self.api_url))
            .json(&serde_json::json!({ "clear": true }))
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// The returned JSON contains output file names per node.
    pub async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `GET /system_stats`; succeeds once the server is accepting requests.
    pub async fn system_stats(&self) -> Result<serde_json::Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/system_stats", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Returns the response unchanged on success, or an
    /// [`ComfyUIApiError::ApiError`] with status and body on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<(), ComfyUIApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// Whether a `/prompt` response reports node validation errors.
pub fn has_node_errors(response: &SubmitResponse) -> bool {
    match &response.node_errors {
        serde_json::Value::Object(map) => !map.is_empty(),
        serde_json::Value::Null => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_response_without_node_errors() {
        let resp: SubmitResponse =
            serde_json::from_str(r#"{"prompt_id":"p-1","number":3,"node_errors":{}}"#).unwrap();
        assert_eq!(resp.prompt_id, "p-1");
        assert_eq!(resp.number, 3);
        assert!(!has_node_errors(&resp));
    }

    #[test]
    fn submit_response_missing_node_errors_field() {
        let resp: SubmitResponse =
            serde_json::from_str(r#"{"prompt_id":"p-1","number":0}"#).unwrap();
        assert!(!has_node_errors(&resp));
    }

    #[test]
    fn submit_response_with_node_errors() {
        let resp: SubmitResponse = serde_json::from_str(
            r#"{"prompt_id":"p-1","number":0,"node_errors":{"3":{"errors":["bad"]}}}"#,
        )
        .unwrap();
        assert!(has_node_errors(&resp));
    }
}
