//! Rollout strategies
//!
//! Strategies report progress on their own 0-100 scale; the context maps it
//! into the deploying band of the execution so that 100 is only ever reached
//! by a completed execution.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use deploy_api::{DeploymentPlan, DeviceOutcome, Environment, Strategy, PREVIOUS_VERSION};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::deploy::orchestrator::Orchestrator;
use crate::storage::settings::StrategySettings;

/// Progress at which the strategy takes over
pub const DEPLOY_PROGRESS_START: f64 = 10.0;

/// Progress reached when the strategy finishes
pub const DEPLOY_PROGRESS_END: f64 = 90.0;

#[derive(Debug, Clone, PartialEq)]
pub enum RolloutOutcome {
    Succeeded,
    Failed(String),

    /// Cancelled, or the execution was finalized elsewhere
    Stopped,
}

impl RolloutOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RolloutOutcome::Succeeded)
    }
}

/// Devices left after applying the rollout percentage
pub fn rollout_limit(total: usize, rollout_percentage: u32) -> usize {
    if total == 0 {
        return 0;
    }
    (total * rollout_percentage as usize / 100).clamp(1, total)
}

/// Size of the canary population
pub fn canary_count(total: usize, canary_percentage: u32) -> usize {
    if total == 0 {
        return 0;
    }
    (total * canary_percentage as usize / 100).clamp(1, total)
}

/// Rolling batch size, about ten batches
pub fn rolling_batch_size(total: usize) -> usize {
    (total / 10).max(1)
}

/// Per-execution view handed to a strategy
pub struct RolloutContext<'a> {
    orchestrator: &'a Orchestrator,
    execution_id: &'a str,
    plan: &'a DeploymentPlan,
    environment: &'a Environment,
    cancel: &'a CancellationToken,
    settings: &'a StrategySettings,
    min_success_rate: f64,

    /// Device -> version to restore, set for rollback executions
    rollback_targets: Option<HashMap<String, Option<String>>>,

    batches: usize,
}

impl<'a> RolloutContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        orchestrator: &'a Orchestrator,
        execution_id: &'a str,
        plan: &'a DeploymentPlan,
        environment: &'a Environment,
        cancel: &'a CancellationToken,
        settings: &'a StrategySettings,
        min_success_rate: f64,
        rollback_targets: Option<HashMap<String, Option<String>>>,
    ) -> Self {
        Self {
            orchestrator,
            execution_id,
            plan,
            environment,
            cancel,
            settings,
            min_success_rate,
            rollback_targets,
            batches: 0,
        }
    }

    fn log(&self, message: String) {
        info!("[{}] {}", self.execution_id, message);
        self.orchestrator
            .with_execution(self.execution_id, |exec| exec.log(&message));
    }

    fn stage(&self, name: &str) {
        self.orchestrator.with_execution(self.execution_id, |exec| {
            exec.enter_stage(name, Utc::now());
            exec.log(format!("Stage: {}", name));
        });
    }

    /// Report strategy progress (0-100)
    fn progress(&self, percent: f64) {
        let mapped = DEPLOY_PROGRESS_START
            + percent.clamp(0.0, 100.0) / 100.0 * (DEPLOY_PROGRESS_END - DEPLOY_PROGRESS_START);
        self.orchestrator
            .with_execution(self.execution_id, |exec| exec.advance_progress(mapped));
    }

    /// Sleep unless cancelled first; false when cancelled
    async fn pause(&self, secs: u64) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if secs == 0 {
            return true;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(Duration::from_secs(secs)) => true,
        }
    }

    /// Resolve, truncate to the rollout percentage and record the target count
    async fn resolve_devices(&self) -> Result<Vec<String>, RolloutOutcome> {
        let collaborators = self.orchestrator.collaborators();
        let mut devices = match collaborators
            .devices
            .resolve(&self.plan.device_filters, self.environment)
            .await
        {
            Ok(devices) => devices,
            Err(e) => {
                error!("Device resolution failed for {}: {}", self.execution_id, e);
                return Err(RolloutOutcome::Failed(format!(
                    "device resolution failed: {}",
                    e
                )));
            }
        };

        let resolved = devices.len();
        devices.truncate(rollout_limit(resolved, self.plan.rollout_percentage));
        let targeted = devices.len();

        let recorded = self
            .orchestrator
            .with_execution(self.execution_id, |exec| {
                exec.devices_targeted = targeted;
                exec.log(format!(
                    "Targeting {} of {} resolved devices ({}% rollout)",
                    targeted, resolved, self.plan.rollout_percentage
                ));
            });
        match recorded {
            Some(()) => Ok(devices),
            None => Err(RolloutOutcome::Stopped),
        }
    }

    /// `None` when the execution stopped before the device reported back
    async fn deploy_device(&self, device_id: &str, batch: usize) -> Option<DeviceOutcome> {
        let mut outcome = DeviceOutcome {
            device_id: device_id.to_string(),
            firmware_version: self.plan.firmware_version.clone(),
            previous_version: None,
            success: false,
            error: None,
            skipped: false,
            batch,
            finished_at: Utc::now(),
        };

        if let Some(targets) = &self.rollback_targets {
            match targets.get(device_id) {
                None => {
                    outcome.success = true;
                    outcome.skipped = true;
                    return Some(outcome);
                }
                Some(None) => {
                    outcome.firmware_version = PREVIOUS_VERSION.to_string();
                    outcome.error = Some("no recorded previous version".to_string());
                    return Some(outcome);
                }
                Some(Some(version)) => outcome.firmware_version = version.clone(),
            }
        }

        if !self
            .orchestrator
            .begin_send(self.execution_id, &self.environment.name, device_id)
        {
            return None;
        }

        info!("Deploying {} to {}", outcome.firmware_version, device_id);
        let firmware = &self.orchestrator.collaborators().firmware;
        let sent = tokio::select! {
            _ = self.cancel.cancelled() => {
                warn!("Firmware send to {} interrupted", device_id);
                return None;
            }
            sent = firmware.send_firmware(
                device_id,
                &outcome.firmware_version,
                self.environment,
            ) => sent,
        };

        match sent {
            Ok(delivery) if delivery.accepted => {
                let replaced = self.orchestrator.record_install(
                    &self.environment.name,
                    device_id,
                    &outcome.firmware_version,
                );
                outcome.previous_version = replaced.or(delivery.replaced_version);
                outcome.success = true;
            }
            Ok(_) => {
                outcome.error = Some("firmware update rejected".to_string());
            }
            Err(e) => {
                warn!("Failed to deploy to {}: {}", device_id, e);
                outcome.error = Some(e.to_string());
            }
        }
        outcome.finished_at = Utc::now();
        Some(outcome)
    }

    /// Deploy to every device of the batch, then apply the quality gate
    pub async fn deploy_batch(&mut self, devices: &[String]) -> RolloutOutcome {
        self.batches += 1;
        let batch = self.batches;

        for device_id in devices {
            if self.cancel.is_cancelled() {
                return RolloutOutcome::Stopped;
            }
            let Some(outcome) = self.deploy_device(device_id, batch).await else {
                return RolloutOutcome::Stopped;
            };
            if !self.orchestrator.record_device(self.execution_id, outcome) {
                return RolloutOutcome::Stopped;
            }
        }

        let gate = self
            .orchestrator
            .with_execution(self.execution_id, |exec| {
                (exec.devices_processed(), exec.success_rate())
            });
        let Some((processed, success_rate)) = gate else {
            return RolloutOutcome::Stopped;
        };

        if processed > 0 && success_rate < self.min_success_rate {
            let message = format!(
                "Success rate ({:.1}%) below threshold ({:.1}%)",
                success_rate, self.min_success_rate
            );
            error!("[{}] {}", self.execution_id, message);
            return RolloutOutcome::Failed(message);
        }

        self.log(format!(
            "Batch {} done: {} devices, success rate {:.1}%",
            batch,
            devices.len(),
            success_rate
        ));
        RolloutOutcome::Succeeded
    }

    async fn run_validation_test(&self, test: &str) -> bool {
        self.log(format!("Running validation test: {}", test));
        match self
            .orchestrator
            .collaborators()
            .checks
            .run_check(test, self.execution_id, self.environment)
            .await
        {
            Ok(passed) => passed,
            Err(e) => {
                error!("Validation test {} errored: {}", test, e);
                false
            }
        }
    }
}

/// Dispatch to the strategy selected by the plan
pub async fn run_strategy(ctx: &mut RolloutContext<'_>) -> RolloutOutcome {
    match ctx.plan.strategy {
        Strategy::BlueGreen => blue_green(ctx).await,
        Strategy::Canary => canary(ctx).await,
        Strategy::Rolling => rolling(ctx).await,
        Strategy::Immediate => immediate(ctx).await,
    }
}

async fn immediate(ctx: &mut RolloutContext<'_>) -> RolloutOutcome {
    ctx.stage("immediate_deployment");
    let devices = match ctx.resolve_devices().await {
        Ok(devices) => devices,
        Err(outcome) => return outcome,
    };

    let outcome = ctx.deploy_batch(&devices).await;
    if outcome.is_success() {
        ctx.progress(100.0);
    }
    outcome
}

async fn blue_green(ctx: &mut RolloutContext<'_>) -> RolloutOutcome {
    ctx.stage("blue_green_deployment");
    let devices = match ctx.resolve_devices().await {
        Ok(devices) => devices,
        Err(outcome) => return outcome,
    };

    ctx.progress(10.0);
    ctx.log("Deploying to green environment".to_string());
    let outcome = ctx.deploy_batch(&devices).await;
    if !outcome.is_success() {
        return outcome;
    }

    ctx.progress(50.0);
    ctx.log("Validating green environment".to_string());
    if !ctx.pause(ctx.settings.blue_green_validation_secs).await {
        return RolloutOutcome::Stopped;
    }

    ctx.progress(80.0);
    ctx.log("Switching traffic to green".to_string());
    if !ctx.pause(ctx.settings.blue_green_switch_secs).await {
        return RolloutOutcome::Stopped;
    }

    ctx.progress(100.0);
    RolloutOutcome::Succeeded
}

async fn canary(ctx: &mut RolloutContext<'_>) -> RolloutOutcome {
    ctx.stage("canary_deployment");
    let devices = match ctx.resolve_devices().await {
        Ok(devices) => devices,
        Err(outcome) => return outcome,
    };

    let count = canary_count(devices.len(), ctx.plan.canary_percentage);
    let (canaries, rest) = devices.split_at(count);

    ctx.progress(10.0);
    ctx.log(format!(
        "Deploying to canary group ({}%, {} devices)",
        ctx.plan.canary_percentage,
        canaries.len()
    ));
    let outcome = ctx.deploy_batch(canaries).await;
    if !outcome.is_success() {
        return outcome;
    }

    ctx.progress(30.0);
    ctx.log("Monitoring canary deployment".to_string());
    if !ctx.pause(ctx.settings.canary_validation_period_secs).await {
        return RolloutOutcome::Stopped;
    }

    for test in &ctx.plan.validation_tests {
        if ctx.cancel.is_cancelled() {
            return RolloutOutcome::Stopped;
        }
        if !ctx.run_validation_test(test).await {
            error!("Canary validation test failed: {}", test);
            return RolloutOutcome::Failed(format!("Canary validation test failed: {}", test));
        }
    }

    ctx.progress(60.0);
    ctx.log(format!("Proceeding with full rollout ({} devices)", rest.len()));
    if !rest.is_empty() {
        let outcome = ctx.deploy_batch(rest).await;
        if !outcome.is_success() {
            return outcome;
        }
    }

    ctx.progress(100.0);
    RolloutOutcome::Succeeded
}

async fn rolling(ctx: &mut RolloutContext<'_>) -> RolloutOutcome {
    ctx.stage("rolling_deployment");
    let devices = match ctx.resolve_devices().await {
        Ok(devices) => devices,
        Err(outcome) => return outcome,
    };

    let total = devices.len();
    let batch_size = rolling_batch_size(total);
    let batch_count = total.div_ceil(batch_size);
    let mut processed = 0;

    for (index, batch) in devices.chunks(batch_size).enumerate() {
        ctx.log(format!(
            "Deploying to batch {} of {} ({} devices)",
            index + 1,
            batch_count,
            batch.len()
        ));
        let outcome = ctx.deploy_batch(batch).await;
        if !outcome.is_success() {
            return outcome;
        }

        processed += batch.len();
        ctx.progress(processed as f64 / total as f64 * 100.0);

        if index + 1 < batch_count && !ctx.pause(ctx.settings.rolling_batch_pause_secs).await {
            return RolloutOutcome::Stopped;
        }
    }

    ctx.progress(100.0);
    RolloutOutcome::Succeeded
}
