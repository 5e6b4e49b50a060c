// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! CLI module for classifying sign clips.
//!
//! This module contains the command-line interface logic, including argument parsing,
//! console output and the `predict` and `config` commands.

// Modules
/// Console output macros and `tracing` setup.
pub mod logging;

/// CLI arguments.
pub mod args;

/// Command implementations.
pub mod predict;
