//! Style-transfer worker: CLI parsing and command implementations.

pub mod cli;
pub mod commands;
