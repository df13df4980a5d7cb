#![forbid(unsafe_code)]
//! rollup-core library.
//!
//! Resolves every category of a hierarchy to its top-level ancestor and rolls
//! product and transaction data up to those ancestors.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums in library modules; `anyhow::Result`
//!   for configuration glue.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod config;
pub mod error;
pub mod hierarchy;
pub mod load;
pub mod model;
pub mod report;
pub mod timing;

pub use error::ErrorCode;
pub use hierarchy::{CategoryGraph, HierarchyError};
