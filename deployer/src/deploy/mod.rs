//! Deployment planning and execution

pub mod collaborators;
pub mod fsm;
pub mod ledger;
pub mod orchestrator;
pub mod strategies;
pub mod validator;

pub use collaborators::Collaborators;
pub use orchestrator::{Orchestrator, OrchestratorOptions};
