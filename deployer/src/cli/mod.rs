//! Command-line client for the deployment manager REST API

pub mod commands;
pub mod output;

use clap::Subcommand;

/// Environment commands
#[derive(Debug, Subcommand)]
pub enum EnvCommands {
    /// List configured environments
    List,

    /// Show one environment with its live status
    Get { name: String },
}

/// Deployment plan commands
#[derive(Debug, Subcommand)]
pub enum PlanCommands {
    /// List deployment plans
    List,

    /// Show a deployment plan
    Get { plan_id: String },

    /// Create a plan from a YAML or JSON file
    Create {
        #[arg(short, long)]
        file: std::path::PathBuf,
    },

    /// Validate a plan without executing it
    Validate { plan_id: String },

    /// Approve a plan
    Approve {
        plan_id: String,

        #[arg(short, long, env = "USER", default_value = "cli_user")]
        approver: String,
    },
}

/// Execution commands
#[derive(Debug, Subcommand)]
pub enum DeployCommands {
    /// Execute an approved plan
    Execute {
        plan_id: String,

        /// Follow the execution until it finishes
        #[arg(short, long)]
        watch: bool,
    },

    /// List executions
    List,

    /// Show execution status
    Status { execution_id: String },

    /// Cancel a running execution
    Cancel { execution_id: String },

    /// Roll back a completed execution
    Rollback { execution_id: String },

    /// Follow an execution until it finishes
    Watch {
        execution_id: String,

        /// Seconds between polls
        #[arg(short, long, default_value_t = 5)]
        interval: u64,
    },
}

/// Health commands
#[derive(Debug, Subcommand)]
pub enum HealthCommands {
    /// Probe every environment
    Check,
}

/// Report commands
#[derive(Debug, Subcommand)]
pub enum ReportCommands {
    /// Summary over the last days
    Summary {
        #[arg(short, long, default_value_t = 7)]
        days: u32,
    },

    /// Detailed report of one execution
    Execution { execution_id: String },
}

/// Utility commands
#[derive(Debug, Subcommand)]
pub enum UtilCommands {
    /// Print a plan template
    Template,
}
