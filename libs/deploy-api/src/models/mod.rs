//! Deployment API models

pub mod environment;
pub mod execution;
pub mod health;
pub mod plan;
pub mod responses;

pub use environment::*;
pub use execution::*;
pub use health::*;
pub use plan::*;
pub use responses::*;
