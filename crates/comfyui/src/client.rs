//! WebSocket client for observing runs on a ComfyUI server.
//!
//! [`ComfyUIClient`] holds the WebSocket URL and a stable client ID.
//! Call [`ComfyUIClient::connect`] to open a [`ComfyUIConnection`]; the
//! same client ID must be passed when submitting prompts so ComfyUI
//! routes their progress messages to this socket.

use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// Raw WebSocket stream type used by the connection.
pub type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection settings for one ComfyUI server.
pub struct ComfyUIClient {
    ws_url: String,
    client_id: String,
}

/// A live WebSocket connection to ComfyUI.
pub struct ComfyUIConnection {
    /// Client ID sent during the WebSocket handshake.
    pub client_id: String,
    /// The raw WebSocket stream for reading frames.
    pub ws_stream: WsStream,
}

impl ComfyUIClient {
    /// Create a client with a fresh UUID v4 client ID.
    ///
    /// * `ws_url` - WebSocket base URL, e.g. `ws://127.0.0.1:8188`.
    pub fn new(ws_url: String) -> Self {
        Self {
            ws_url,
            client_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Connect to `{ws_url}/ws?clientId={client_id}`.
    pub async fn connect(&self) -> Result<ComfyUIConnection, ComfyUIClientError> {
        let url = format!("{}/ws?clientId={}", self.ws_url, self.client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ComfyUIClientError::Connection(format!(
                "Failed to connect to ComfyUI at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(
            client_id = %self.client_id,
            "Connected to ComfyUI at {}",
            self.ws_url,
        );

        Ok(ComfyUIConnection {
            client_id: self.client_id.clone(),
            ws_stream,
        })
    }
}

/// Errors from opening the WebSocket.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIClientError {
    /// Failed to establish the initial WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ids_are_unique_per_client() {
        let a = ComfyUIClient::new("ws://127.0.0.1:8188".into());
        let b = ComfyUIClient::new("ws://127.0.0.1:8188".into());
        assert_ne!(a.client_id(), b.client_id());
        assert_eq!(a.ws_url(), "ws://127.0.0.1:8188");
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let client = ComfyUIClient::new("ws://127.0.0.1:9".into());
        let err = client.connect().await.err().unwrap();
        assert!(matches!(err, ComfyUIClientError::Connection(_)));
    }
}
