//! fwdeploy library
//!
//! Deployment orchestration for firmware fleets: plans, validation, staged
//! rollout strategies, health gates, quality gates and automatic rollback,
//! plus the REST server, background monitor and CLI client built on them.

pub mod app;
pub mod cli;
pub mod deploy;
pub mod environments;
pub mod errors;
pub mod health;
pub mod http;
pub mod logs;
pub mod notify;
pub mod server;
pub mod storage;
pub mod telemetry;
pub mod utils;
pub mod workers;
