//! ---
//! sds_section: "04-networking"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Network adapters for the collaborator backend."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
//! HTTP delivery of simulator telemetry.

pub mod client;

pub use client::{DispatchClient, DispatchError, RemoveDayRequest};
