//! ---
//! sds_section: "01-core-functionality"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Shared primitives and utilities for the simulator runtime."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
//! Core shared primitives for the Spray Data Simulator workspace.
//! This crate exposes configuration loading, tracing bootstrap, and the
//! timestamp helpers consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    AppConfig, BackendConfig, LoadedAppConfig, LoggingConfig, PathPattern, SessionConfig,
    UnknownPathPattern,
};
pub use logging::{init_tracing, LogFormat};
