//! Run completion watcher.
//!
//! Reads frames from a ComfyUI WebSocket connection, parses them into
//! typed [`ComfyUIMessage`] variants and returns once the watched prompt
//! finishes, fails, or the socket goes away. Messages for other prompts
//! are logged and skipped.

use futures::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};

use crate::messages::{parse_message, ComfyUIMessage};

/// Why a watched run did not complete.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Execution error in node {node_id} ({node_type}): {exception_type}: {message}")]
    Execution {
        node_id: String,
        node_type: String,
        exception_type: String,
        message: String,
    },

    #[error("Execution interrupted")]
    Interrupted,

    #[error("WebSocket closed before the run completed")]
    Closed,

    #[error("WebSocket receive error: {0}")]
    Receive(String),
}

/// Result of handling one text frame.
enum Step {
    Continue,
    Done,
}

/// Wait until `prompt_id` finishes executing.
///
/// Completion is an `executing` message with a null node for our prompt,
/// or `execution_success`. Binary frames (previews) are ignored.
pub async fn wait_for_completion<S>(ws_stream: &mut S, prompt_id: &str) -> Result<(), RunError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = ws_stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                if let Step::Done = handle_text_message(&text, prompt_id)? {
                    return Ok(());
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::trace!(prompt_id, "Ignoring binary message (preview image)");
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
            Ok(Message::Close(frame)) => {
                tracing::warn!(prompt_id, ?frame, "ComfyUI WebSocket closed mid-run");
                return Err(RunError::Closed);
            }
            Err(e) => {
                tracing::error!(prompt_id, error = %e, "WebSocket receive error");
                return Err(RunError::Receive(e.to_string()));
            }
        }
    }

    Err(RunError::Closed)
}

/// Dispatch a single text frame.
fn handle_text_message(text: &str, prompt_id: &str) -> Result<Step, RunError> {
    let msg = match parse_message(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(error = %e, raw_message = %text, "Skipping unrecognised ComfyUI message");
            return Ok(Step::Continue);
        }
    };

    match msg {
        ComfyUIMessage::Status(data) => {
            tracing::debug!(
                queue_remaining = data.status.exec_info.queue_remaining,
                "ComfyUI queue status",
            );
        }
        ComfyUIMessage::ExecutionStart(data) if data.prompt_id == prompt_id => {
            tracing::info!(prompt_id, "Execution started");
        }
        ComfyUIMessage::ExecutionCached(data) if data.prompt_id == prompt_id => {
            tracing::debug!(prompt_id, cached = data.nodes.len(), "Execution used cache");
        }
        ComfyUIMessage::Executing(data) if is_ours(data.prompt_id.as_deref(), prompt_id) => {
            match data.node {
                Some(node) => tracing::debug!(prompt_id, node = %node, "Executing node"),
                None => {
                    tracing::info!(prompt_id, "Execution completed (all nodes done)");
                    return Ok(Step::Done);
                }
            }
        }
        ComfyUIMessage::Progress(data) if is_ours(data.prompt_id.as_deref(), prompt_id) => {
            tracing::debug!(
                prompt_id,
                value = data.value,
                max = data.max,
                percent = data.percent(),
                "Generation progress",
            );
        }
        ComfyUIMessage::Executed(data) if data.prompt_id == prompt_id => {
            tracing::debug!(prompt_id, node = %data.node, "Node executed with output");
        }
        ComfyUIMessage::ExecutionSuccess(data) if data.prompt_id == prompt_id => {
            tracing::info!(prompt_id, "Execution succeeded");
            return Ok(Step::Done);
        }
        ComfyUIMessage::ExecutionError(data) if data.prompt_id == prompt_id => {
            tracing::error!(
                prompt_id,
                node_id = %data.node_id,
                error_type = %data.exception_type,
                error_message = %data.exception_message,
                "Execution error",
            );
            return Err(RunError::Execution {
                node_id: data.node_id,
                node_type: data.node_type.unwrap_or_default(),
                exception_type: data.exception_type,
                message: data.exception_message,
            });
        }
        ComfyUIMessage::ExecutionInterrupted(data) if data.prompt_id == prompt_id => {
            tracing::warn!(prompt_id, node_id = ?data.node_id, "Execution interrupted");
            return Err(RunError::Interrupted);
        }
        other => {
            tracing::trace!(prompt_id, message = ?other, "Ignoring message for another prompt");
        }
    }

    Ok(Step::Continue)
}

/// Older servers omit `prompt_id` on some frames; treat those as ours.
fn is_ours(message_prompt: Option<&str>, prompt_id: &str) -> bool {
    message_prompt.map_or(true, |id| id == prompt_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use futures::stream;

    fn text(json: &str) -> Result<Message, tungstenite::Error> {
        Ok(Message::text(json))
    }

    async fn run(frames: Vec<Result<Message, tungstenite::Error>>) -> Result<(), RunError> {
        let mut s = stream::iter(frames);
        wait_for_completion(&mut s, "p-1").await
    }

    #[tokio::test]
    async fn completes_on_executing_with_null_node() {
        let result = run(vec![
            text(r#"{"type":"execution_start","data":{"prompt_id":"p-1"}}"#),
            text(r#"{"type":"executing","data":{"node":"3","prompt_id":"p-1"}}"#),
            text(r#"{"type":"progress","data":{"value":2,"max":4,"prompt_id":"p-1","node":"3"}}"#),
            text(r#"{"type":"executing","data":{"node":null,"prompt_id":"p-1"}}"#),
        ])
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn completes_on_execution_success() {
        let result = run(vec![text(
            r#"{"type":"execution_success","data":{"prompt_id":"p-1","timestamp":0}}"#,
        )])
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn other_prompt_completion_is_ignored() {
        let result = run(vec![text(
            r#"{"type":"executing","data":{"node":null,"prompt_id":"someone-else"}}"#,
        )])
        .await;
        assert_matches!(result, Err(RunError::Closed));
    }

    #[tokio::test]
    async fn execution_error_fails_the_run() {
        let result = run(vec![text(
            r#"{"type":"execution_error","data":{"prompt_id":"p-1","node_id":"13","node_type":"DepthAnythingPreprocessor","exception_message":"boom","exception_type":"RuntimeError"}}"#,
        )])
        .await;
        assert_matches!(result, Err(RunError::Execution { node_id, .. }) if node_id == "13");
    }

    #[tokio::test]
    async fn interruption_fails_the_run() {
        let result = run(vec![text(
            r#"{"type":"execution_interrupted","data":{"prompt_id":"p-1","node_id":"3"}}"#,
        )])
        .await;
        assert_matches!(result, Err(RunError::Interrupted));
    }

    #[tokio::test]
    async fn close_frame_fails_the_run() {
        let result = run(vec![
            text(r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":1}}}}"#),
            Ok(Message::Close(None)),
        ])
        .await;
        assert_matches!(result, Err(RunError::Closed));
    }

    #[tokio::test]
    async fn unknown_and_binary_frames_are_skipped() {
        let result = run(vec![
            text(r#"{"type":"crystools.monitor","data":{}}"#),
            Ok(Message::binary(vec![0u8, 1, 2])),
            text(r#"{"type":"executing","data":{"node":null,"prompt_id":"p-1"}}"#),
        ])
        .await;
        assert!(result.is_ok());
    }
}
