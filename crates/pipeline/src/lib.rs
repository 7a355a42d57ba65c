//! Style-transfer prediction pipeline.
//!
//! Wires the core graph mutation and weights resolution to an
//! [`ExecutionBackend`](styler_core::backend::ExecutionBackend): input
//! staging, template selection, execution, output collection and
//! post-processing.

pub mod config;
pub mod inputs;
pub mod outputs;
pub mod postprocess;
pub mod predictor;
pub mod staging;
pub mod templates;
pub mod weights;
