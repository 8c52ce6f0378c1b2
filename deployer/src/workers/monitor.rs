//! Execution monitor worker
//!
//! Fails executions that outlive their timeout, re-probes environments with a
//! health URL and prunes the execution history.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::deploy::orchestrator::Orchestrator;

/// Monitor worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Interval between monitoring passes
    pub interval: Duration,

    /// Probe environments that declare a health URL
    pub probe_environments: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            probe_environments: true,
        }
    }
}

/// One monitoring pass
pub async fn tick(options: &Options, orchestrator: &Orchestrator) {
    let timed_out = orchestrator.check_timeouts(Utc::now()).await;
    if !timed_out.is_empty() {
        warn!("Timed out {} deployment(s): {}", timed_out.len(), timed_out.join(", "));
    }

    if options.probe_environments {
        let probes = orchestrator
            .environments()
            .all()
            .into_iter()
            .filter(|env| env.health_check_url.is_some());
        for environment in probes {
            let report = orchestrator.collaborators().health.check(environment).await;
            if report.is_healthy() {
                debug!("Environment {} is healthy", environment.name);
            } else {
                warn!(
                    "Environment {} health check failed: {}",
                    environment.name,
                    report.failed_checks.join(", ")
                );
            }
        }
    }

    orchestrator.prune_history(Utc::now());
}

/// Run the monitor worker
pub async fn run<S, F>(
    options: &Options,
    orchestrator: &Orchestrator,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Monitor worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Monitor worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        debug!("Running monitoring pass...");
        tick(options, orchestrator).await;
    }
}
