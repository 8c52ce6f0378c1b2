//! fwdeploy data model
//!
//! Environments, deployment plans, executions, health reports and the REST
//! request/response envelopes built from them. Shared by the orchestrator,
//! its HTTP server and the CLI client.

pub mod models;

pub use models::*;
