//! Environment health checks

pub mod checker;

pub use checker::HealthChecker;
