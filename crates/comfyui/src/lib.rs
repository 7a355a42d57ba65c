//! ComfyUI WebSocket and REST client library.
//!
//! Provides typed message parsing, the WebSocket connection, HTTP API
//! wrappers, a readiness probe, and the [`backend::ComfyUIBackend`]
//! execution backend used by the prediction pipeline.

pub mod api;
pub mod backend;
pub mod client;
pub mod messages;
pub mod processor;
pub mod readiness;
