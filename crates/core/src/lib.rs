//! Core types for the style-transfer prediction service.
//!
//! Holds the typed workflow graph, model profiles, prediction
//! parameters, the parameter-to-graph mutation, weights manifest
//! resolution, and the traits the pipeline uses to reach the execution
//! backend and weight storage.

pub mod backend;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod mutation;
pub mod nodes;
pub mod params;
pub mod preprocessor_weights;
pub mod profiles;
