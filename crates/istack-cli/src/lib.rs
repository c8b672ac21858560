//! # istack-cli
//!
//! Library half of the `int-stack` binary: script execution against the
//! device, the stress runner and the model-check report.

pub mod error;
pub mod model;
pub mod script;
pub mod stress;

pub use error::CliError;
