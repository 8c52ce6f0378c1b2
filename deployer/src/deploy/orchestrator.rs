//! Deployment orchestrator: plan lifecycle and execution state machine

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use deploy_api::{
    DeploymentExecution, DeploymentPlan, DeploymentSummary, DeviceOutcome, DeviceSummary,
    Environment,
    EnvironmentStatus, ExecutionReport, ExecutionStatus, HealthReport, MetricsResponse, PlanSpec,
    Strategy, SummaryReport, ValidationResult, PREVIOUS_VERSION,
};
use futures::future::join_all;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::deploy::collaborators::Collaborators;
use crate::deploy::fsm::{ExecutionEvent, ExecutionFsm};
use crate::deploy::ledger::FirmwareLedger;
use crate::deploy::strategies::{self, RolloutContext, RolloutOutcome};
use crate::deploy::validator::PlanValidator;
use crate::environments::EnvironmentRegistry;
use crate::errors::DeployError;
use crate::notify::NotificationLevel;
use crate::storage::settings::{Settings, StrategySettings};
use crate::utils::{generate_id, percent, round2};

pub const PRE_HEALTH_FAILED: &str = "pre-deployment health check failed";
pub const POST_HEALTH_FAILED: &str = "post-deployment health check failed";
pub const TIMED_OUT: &str = "deployment timed out";

/// Author and approver of generated rollback plans
pub const SYSTEM_USER: &str = "system";

/// Orchestrator options
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Quality gate used when a plan names no `min_success_rate`
    pub default_min_success_rate: f64,

    pub strategies: StrategySettings,

    /// Age after which the monitor fails a non-rollback execution
    pub execution_timeout: Duration,

    pub history_retention_days: u32,

    /// Log lines included in execution status
    pub log_tail_lines: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            default_min_success_rate: 80.0,
            strategies: StrategySettings::default(),
            execution_timeout: Duration::from_secs(3600),
            history_retention_days: 30,
            log_tail_lines: 50,
        }
    }
}

impl OrchestratorOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_min_success_rate: settings.quality_gates.default_min_success_rate,
            strategies: settings.strategies.clone(),
            execution_timeout: Duration::from_secs(settings.monitor.execution_timeout_secs),
            history_retention_days: settings.monitor.history_retention_days,
            ..Default::default()
        }
    }
}

struct ActiveExecution {
    execution: DeploymentExecution,
    fsm: ExecutionFsm,
    cancel: CancellationToken,

    /// Devices with a firmware send under way -> version installed before it
    in_flight: HashMap<String, Option<String>>,
}

#[derive(Default)]
struct Registry {
    plans: HashMap<String, DeploymentPlan>,
    active: HashMap<String, ActiveExecution>,
    history: Vec<DeploymentExecution>,
    ledger: FirmwareLedger,
}

impl Registry {
    fn find(&self, execution_id: &str) -> Option<&DeploymentExecution> {
        self.active
            .get(execution_id)
            .map(|entry| &entry.execution)
            .or_else(|| {
                self.history
                    .iter()
                    .find(|exec| exec.execution_id == execution_id)
            })
    }

    fn running(&self) -> impl Iterator<Item = &ActiveExecution> {
        self.active.values().filter(|entry| !entry.fsm.is_terminal())
    }

    fn running_in(&self, environment: &str) -> usize {
        self.running()
            .filter(|entry| entry.execution.plan.target_environment == environment)
            .count()
    }

    fn all_executions(&self) -> impl Iterator<Item = &DeploymentExecution> {
        self.active
            .values()
            .map(|entry| &entry.execution)
            .chain(self.history.iter())
    }

    /// Device -> version to restore: the successful outcomes of `source`
    /// plus every device whose send never reported back
    fn rollback_targets(&self, source: &str) -> HashMap<String, Option<String>> {
        let mut targets: HashMap<String, Option<String>> = self
            .find(source)
            .map(|exec| {
                exec.device_results
                    .iter()
                    .filter(|outcome| outcome.success && !outcome.skipped)
                    .map(|outcome| (outcome.device_id.clone(), outcome.previous_version.clone()))
                    .collect()
            })
            .unwrap_or_default();
        if let Some(entry) = self.active.get(source) {
            for (device_id, previous) in &entry.in_flight {
                targets
                    .entry(device_id.clone())
                    .or_insert_with(|| previous.clone());
            }
        }
        targets
    }
}

struct Inner {
    environments: EnvironmentRegistry,
    collaborators: Collaborators,
    options: OrchestratorOptions,
    registry: Mutex<Registry>,
}

/// Owns plans and executions; cheap to clone
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        environments: EnvironmentRegistry,
        collaborators: Collaborators,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                environments,
                collaborators,
                options,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn environments(&self) -> &EnvironmentRegistry {
        &self.inner.environments
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.inner.options
    }

    pub(crate) fn collaborators(&self) -> &Collaborators {
        &self.inner.collaborators
    }

    // ---------------------------------------------------------------------
    // Plans
    // ---------------------------------------------------------------------

    pub fn create_plan(&self, spec: PlanSpec) -> DeploymentPlan {
        let plan = DeploymentPlan::new(generate_id("plan"), spec, Utc::now());
        self.store_plan(plan.clone());
        info!("Created deployment plan: {} ({})", plan.plan_id, plan.name);
        plan
    }

    fn store_plan(&self, plan: DeploymentPlan) {
        self.lock().plans.insert(plan.plan_id.clone(), plan);
    }

    /// Plans, newest first
    pub fn list_plans(&self) -> Vec<DeploymentPlan> {
        let mut plans: Vec<DeploymentPlan> = self.lock().plans.values().cloned().collect();
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        plans
    }

    pub fn get_plan(&self, plan_id: &str) -> Option<DeploymentPlan> {
        self.lock().plans.get(plan_id).cloned()
    }

    pub fn validate_plan(&self, plan_id: &str) -> Option<ValidationResult> {
        let plan = self.get_plan(plan_id)?;
        Some(self.validate(&plan))
    }

    fn validate(&self, plan: &DeploymentPlan) -> ValidationResult {
        PlanValidator::new(&self.inner.environments).validate(plan, Utc::now())
    }

    /// Record approval; false for an unknown plan
    pub async fn approve(&self, plan_id: &str, approver: &str) -> bool {
        let Some(plan) = self.set_approval(plan_id, approver) else {
            warn!("Cannot approve unknown deployment plan {}", plan_id);
            return false;
        };

        info!("Deployment plan {} approved by {}", plan_id, approver);
        let message = format!(
            "Deployment plan '{}' has been approved by {}",
            plan.name, approver
        );
        self.notify(&plan.target_environment, &message, NotificationLevel::Info)
            .await;
        true
    }

    fn set_approval(&self, plan_id: &str, approver: &str) -> Option<DeploymentPlan> {
        let mut registry = self.lock();
        let plan = registry.plans.get_mut(plan_id)?;
        plan.approved_by = Some(approver.to_string());
        plan.approved_at = Some(Utc::now());
        Some(plan.clone())
    }

    // ---------------------------------------------------------------------
    // Executions
    // ---------------------------------------------------------------------

    /// Admit and start an execution of `plan_id`
    ///
    /// Nothing is created when the plan is unknown, lacks a required
    /// approval, fails validation or targets a saturated environment.
    pub fn execute(&self, plan_id: &str) -> Result<DeploymentExecution, DeployError> {
        let plan = self
            .get_plan(plan_id)
            .ok_or_else(|| DeployError::PlanNotFound(plan_id.to_string()))?;

        let environment = self.inner.environments.get(&plan.target_environment);
        if environment.is_some_and(|env| env.approval_required) && !plan.is_approved() {
            warn!("Deployment plan {} requires approval", plan_id);
            return Err(DeployError::ApprovalRequired(plan_id.to_string()));
        }

        let validation = self.validate(&plan);
        if !validation.valid {
            warn!(
                "Deployment plan {} validation failed: {}",
                plan_id,
                validation.errors.join("; ")
            );
            return Err(DeployError::ValidationFailed(validation.errors));
        }

        let environment = environment
            .cloned()
            .ok_or_else(|| DeployError::EnvironmentNotFound(plan.target_environment.clone()))?;

        let cancel = CancellationToken::new();
        let (execution, rollback_targets) = {
            let mut registry = self.lock();
            let running = registry.running_in(&environment.name);
            if running >= environment.max_concurrent_deployments {
                warn!(
                    "Environment {} is saturated ({} running)",
                    environment.name, running
                );
                return Err(DeployError::EnvironmentSaturated {
                    env: environment.name.clone(),
                    active: running,
                });
            }

            let rollback_targets = plan
                .rollback_of
                .as_deref()
                .map(|source| registry.rollback_targets(source));

            let mut execution = DeploymentExecution::new(generate_id("exec"), plan, Utc::now());
            execution.log(format!("Execution created for plan {}", plan_id));
            for warning in &validation.warnings {
                execution.log(format!("Validation warning: {}", warning));
            }

            registry.active.insert(
                execution.execution_id.clone(),
                ActiveExecution {
                    execution: execution.clone(),
                    fsm: ExecutionFsm::new(),
                    cancel: cancel.clone(),
                    in_flight: HashMap::new(),
                },
            );
            (execution, rollback_targets)
        };

        info!("Started deployment execution: {}", execution.execution_id);

        let runner = self.clone();
        let execution_id = execution.execution_id.clone();
        tokio::spawn(async move {
            runner
                .run(execution_id, environment, cancel, rollback_targets)
                .await;
        });

        Ok(execution)
    }

    /// Executions, newest first
    pub fn list_executions(&self) -> Vec<DeploymentExecution> {
        let mut executions: Vec<DeploymentExecution> =
            self.lock().all_executions().cloned().collect();
        executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        executions
    }

    /// Execution status with the recent log tail
    pub fn get_execution(&self, execution_id: &str) -> Option<DeploymentExecution> {
        self.lock()
            .find(execution_id)
            .map(|exec| exec.with_log_tail(self.inner.options.log_tail_lines))
    }

    pub fn execution_report(&self, execution_id: &str) -> Option<ExecutionReport> {
        self.lock().find(execution_id).map(ExecutionReport::from)
    }

    /// Cancel a running execution; false when unknown or already terminal
    pub async fn cancel(&self, execution_id: &str) -> bool {
        let sealed = self.seal(execution_id, ExecutionEvent::Cancel, |exec| {
            exec.log("Deployment cancelled");
        });
        let Some(execution) = sealed else {
            return false;
        };
        self.archive(execution_id, None);

        info!("Deployment {} cancelled", execution_id);
        let message = format!(
            "Deployment '{}' has been cancelled (ID: {})",
            execution.plan.name, execution_id
        );
        self.notify(
            &execution.plan.target_environment,
            &message,
            NotificationLevel::Warning,
        )
        .await;
        true
    }

    /// Roll back a completed execution by running a rollback plan
    pub fn rollback(&self, execution_id: &str) -> Result<DeploymentExecution, DeployError> {
        let source = {
            let registry = self.lock();
            if registry.active.contains_key(execution_id) {
                return Err(DeployError::RollbackNotAllowed(format!(
                    "execution {} is still active",
                    execution_id
                )));
            }
            registry
                .history
                .iter()
                .find(|exec| exec.execution_id == execution_id)
                .cloned()
        }
        .ok_or_else(|| DeployError::ExecutionNotFound(execution_id.to_string()))?;

        if source.status != ExecutionStatus::Completed {
            return Err(DeployError::RollbackNotAllowed(format!(
                "execution {} is {}, only completed executions can be rolled back",
                execution_id, source.status
            )));
        }

        info!("Rolling back deployment {}", execution_id);
        self.start_rollback(
            &source,
            format!("Rollback of deployment {}", source.execution_id),
        )
    }

    fn start_rollback(
        &self,
        source: &DeploymentExecution,
        description: String,
    ) -> Result<DeploymentExecution, DeployError> {
        let target = source.plan.target_environment.clone();
        let mut spec = PlanSpec::new(
            format!("Rollback - {}", source.plan.name),
            PREVIOUS_VERSION,
            target.clone(),
            target,
            Strategy::Immediate,
        );
        spec.description = description;
        spec.created_by = SYSTEM_USER.to_string();
        spec.device_filters = source.plan.device_filters.clone();

        let now = Utc::now();
        let mut plan = DeploymentPlan::new(generate_id("plan"), spec, now);
        plan.approved_by = Some(SYSTEM_USER.to_string());
        plan.approved_at = Some(now);
        plan.rollback_of = Some(source.execution_id.clone());

        let plan_id = plan.plan_id.clone();
        self.store_plan(plan);
        self.execute(&plan_id)
    }

    // ---------------------------------------------------------------------
    // Execution task
    // ---------------------------------------------------------------------

    async fn run(
        self,
        execution_id: String,
        environment: Environment,
        cancel: CancellationToken,
        rollback_targets: Option<HashMap<String, Option<String>>>,
    ) {
        if let Some(name) = self.with_execution(&execution_id, |exec| exec.plan.name.clone()) {
            let message = format!(
                "Deployment '{}' has been started (ID: {})",
                name, execution_id
            );
            self.notify_environment(&environment, &message, NotificationLevel::Info)
                .await;
        }

        let outcome = AssertUnwindSafe(self.drive(
            &execution_id,
            &environment,
            &cancel,
            rollback_targets,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| RolloutOutcome::Failed("deployment task panicked".to_string()));

        match outcome {
            RolloutOutcome::Succeeded => self.complete(&execution_id, &environment).await,
            RolloutOutcome::Failed(message) => {
                self.fail(&execution_id, &message).await;
            }
            RolloutOutcome::Stopped => debug!("Execution {} stopped", execution_id),
        }
    }

    async fn drive(
        &self,
        execution_id: &str,
        environment: &Environment,
        cancel: &CancellationToken,
        rollback_targets: Option<HashMap<String, Option<String>>>,
    ) -> RolloutOutcome {
        let Some(plan) = self.with_execution(execution_id, |exec| exec.plan.clone()) else {
            return RolloutOutcome::Stopped;
        };

        // Pre-deployment gates
        if !self.transition(execution_id, ExecutionEvent::Validate) {
            return RolloutOutcome::Stopped;
        }
        self.stage(execution_id, "pre_deployment_health_check");
        match self.health_gate(execution_id, environment, "pre_deployment", 5.0).await {
            Some(true) => {}
            Some(false) => return RolloutOutcome::Failed(PRE_HEALTH_FAILED.to_string()),
            None => return RolloutOutcome::Stopped,
        }

        self.stage(execution_id, "pre_deployment_checks");
        for check in &plan.pre_deployment_checks {
            if cancel.is_cancelled() {
                return RolloutOutcome::Stopped;
            }
            if !self.run_check(execution_id, check, environment).await {
                return RolloutOutcome::Failed(format!("Pre-deployment check failed: {}", check));
            }
        }
        self.with_execution(execution_id, |exec| {
            exec.advance_progress(strategies::DEPLOY_PROGRESS_START)
        });

        // Rollout
        if !self.transition(execution_id, ExecutionEvent::Deploy) {
            return RolloutOutcome::Stopped;
        }
        let min_success_rate = plan
            .rollback_criteria
            .min_success_rate
            .unwrap_or(self.inner.options.default_min_success_rate);
        let mut ctx = RolloutContext::new(
            self,
            execution_id,
            &plan,
            environment,
            cancel,
            &self.inner.options.strategies,
            min_success_rate,
            rollback_targets,
        );
        let outcome = strategies::run_strategy(&mut ctx).await;
        if !outcome.is_success() {
            return outcome;
        }

        // Post-deployment gates
        self.stage(execution_id, "post_deployment_validation");
        for check in &plan.post_deployment_checks {
            if cancel.is_cancelled() {
                return RolloutOutcome::Stopped;
            }
            if !self.run_check(execution_id, check, environment).await {
                return RolloutOutcome::Failed(format!("Post-deployment check failed: {}", check));
            }
        }
        self.with_execution(execution_id, |exec| exec.advance_progress(92.0));

        if cancel.is_cancelled() {
            return RolloutOutcome::Stopped;
        }
        match self.health_gate(execution_id, environment, "post_deployment", 95.0).await {
            Some(true) => RolloutOutcome::Succeeded,
            Some(false) => RolloutOutcome::Failed(POST_HEALTH_FAILED.to_string()),
            None => RolloutOutcome::Stopped,
        }
    }

    /// Run the health probe and store its report; `None` once the execution
    /// is no longer running
    async fn health_gate(
        &self,
        execution_id: &str,
        environment: &Environment,
        gate: &str,
        progress: f64,
    ) -> Option<bool> {
        let report = self.inner.collaborators.health.check(environment).await;
        let healthy = report.is_healthy();
        let failed = report.failed_checks.join(", ");

        self.with_execution(execution_id, |exec| {
            exec.health_check_results.insert(gate.to_string(), report);
            if healthy {
                exec.advance_progress(progress);
                exec.log(format!("Health check {} passed", gate));
            } else {
                exec.log(format!("Health check {} failed: {}", gate, failed));
            }
        })?;
        Some(healthy)
    }

    async fn run_check(&self, execution_id: &str, check: &str, environment: &Environment) -> bool {
        info!("Running deployment check: {}", check);
        self.with_execution(execution_id, |exec| {
            exec.log(format!("Running deployment check: {}", check))
        });
        match self
            .inner
            .collaborators
            .checks
            .run_check(check, execution_id, environment)
            .await
        {
            Ok(passed) => passed,
            Err(e) => {
                error!("Deployment check {} errored: {}", check, e);
                false
            }
        }
    }

    async fn complete(&self, execution_id: &str, environment: &Environment) {
        let sealed = self.seal(execution_id, ExecutionEvent::Complete, |exec| {
            exec.progress = 100.0;
            exec.log("Deployment completed successfully");
        });
        let Some(execution) = sealed else {
            return;
        };
        self.archive(execution_id, None);

        info!("Deployment {} completed successfully", execution_id);
        let message = format!("Deployment '{}' completed successfully", execution.plan.name);
        self.notify_environment(environment, &message, NotificationLevel::Success)
            .await;
    }

    /// Fail a running execution, start the automatic rollback when the
    /// environment asks for one, archive and notify
    pub(crate) async fn fail(&self, execution_id: &str, message: &str) -> bool {
        let sealed = self.seal(
            execution_id,
            ExecutionEvent::Fail(message.to_string()),
            |exec| {
                exec.error_message = Some(message.to_string());
                exec.log(format!("Deployment failed: {}", message));
            },
        );
        let Some(execution) = sealed else {
            return false;
        };
        error!("Deployment {} failed: {}", execution_id, message);

        let environment = self
            .inner
            .environments
            .get(&execution.plan.target_environment)
            .cloned();

        let mut rollback_id = None;
        let mut rollback_error = None;
        if let Some(env) = &environment {
            if env.auto_rollback && !execution.plan.is_rollback() {
                info!("Initiating auto-rollback for {}", execution_id);
                let description =
                    format!("Automatic rollback for failed deployment {}", execution_id);
                match self.start_rollback(&execution, description) {
                    Ok(rollback) => rollback_id = Some(rollback.execution_id),
                    Err(e) => {
                        error!("Rollback initiation failed for {}: {}", execution_id, e);
                        rollback_error = Some(e);
                    }
                }
            }
        }
        self.archive(execution_id, rollback_id);

        if let Some(env) = &environment {
            let text = failure_notice(&execution.plan.name, message, rollback_error.as_ref());
            self.notify_environment(env, &text, NotificationLevel::Error)
                .await;
        }
        true
    }

    // ---------------------------------------------------------------------
    // Registry mutation
    // ---------------------------------------------------------------------

    /// Mutate a running execution; `None` once it is terminal or archived
    pub(crate) fn with_execution<R>(
        &self,
        execution_id: &str,
        f: impl FnOnce(&mut DeploymentExecution) -> R,
    ) -> Option<R> {
        let mut registry = self.lock();
        let entry = registry.active.get_mut(execution_id)?;
        if entry.fsm.is_terminal() {
            return None;
        }
        Some(f(&mut entry.execution))
    }

    fn transition(&self, execution_id: &str, event: ExecutionEvent) -> bool {
        let mut registry = self.lock();
        let Some(entry) = registry.active.get_mut(execution_id) else {
            return false;
        };
        match entry.fsm.process(event) {
            Ok(state) => {
                entry.execution.status = state;
                entry.execution.log(format!("Status: {}", state));
                true
            }
            Err(e) => {
                debug!("Execution {}: {}", execution_id, e);
                false
            }
        }
    }

    fn stage(&self, execution_id: &str, name: &str) {
        self.with_execution(execution_id, |exec| {
            exec.enter_stage(name, Utc::now());
            exec.log(format!("Stage: {}", name));
        });
    }

    /// Move a running execution into a terminal state and stop its task
    ///
    /// Only the first terminal event wins; later ones get `None`.
    fn seal(
        &self,
        execution_id: &str,
        event: ExecutionEvent,
        f: impl FnOnce(&mut DeploymentExecution),
    ) -> Option<DeploymentExecution> {
        let mut registry = self.lock();
        let entry = registry.active.get_mut(execution_id)?;
        let state = entry.fsm.process(event).ok()?;

        let now = Utc::now();
        let exec = &mut entry.execution;
        exec.status = state;
        exec.completed_at = Some(now);
        exec.close_phase(now);
        f(exec);
        entry.cancel.cancel();
        Some(exec.clone())
    }

    /// Note a firmware send about to start; false once the execution is no
    /// longer running
    pub(crate) fn begin_send(
        &self,
        execution_id: &str,
        environment: &str,
        device_id: &str,
    ) -> bool {
        let mut registry = self.lock();
        let installed = registry
            .ledger
            .installed(environment, device_id)
            .map(str::to_string);
        let Some(entry) = registry.active.get_mut(execution_id) else {
            return false;
        };
        if entry.fsm.is_terminal() {
            return false;
        }
        entry.in_flight.insert(device_id.to_string(), installed);
        true
    }

    /// Record a device outcome and clear its send; false once the execution
    /// is no longer running
    pub(crate) fn record_device(&self, execution_id: &str, outcome: DeviceOutcome) -> bool {
        let mut registry = self.lock();
        let Some(entry) = registry.active.get_mut(execution_id) else {
            return false;
        };
        if entry.fsm.is_terminal() {
            return false;
        }
        entry.in_flight.remove(&outcome.device_id);

        let exec = &mut entry.execution;
        if outcome.success {
            exec.devices_successful += 1;
        } else {
            exec.devices_failed += 1;
            exec.log(format!(
                "Device {} failed: {}",
                outcome.device_id,
                outcome.error.as_deref().unwrap_or("unknown error")
            ));
        }
        exec.device_results.push(outcome);
        true
    }

    /// Move a sealed execution into history
    fn archive(&self, execution_id: &str, rollback_execution_id: Option<String>) {
        let mut registry = self.lock();
        let Some(entry) = registry.active.remove(execution_id) else {
            return;
        };
        let mut execution = entry.execution;
        if let Some(rollback_id) = rollback_execution_id {
            execution.log(format!("Auto-rollback started: {}", rollback_id));
            execution.rollback_execution_id = Some(rollback_id);
        }
        registry.history.push(execution);
    }

    pub(crate) fn record_install(
        &self,
        environment: &str,
        device_id: &str,
        version: &str,
    ) -> Option<String> {
        self.lock().ledger.record(environment, device_id, version)
    }

    /// Firmware version last installed on a device by this orchestrator
    pub fn installed_version(&self, environment: &str, device_id: &str) -> Option<String> {
        self.lock()
            .ledger
            .installed(environment, device_id)
            .map(str::to_string)
    }

    // ---------------------------------------------------------------------
    // Monitoring
    // ---------------------------------------------------------------------

    /// Fail every running execution older than its timeout; returns the ids
    pub async fn check_timeouts(&self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = {
            let registry = self.lock();
            registry
                .running()
                .filter(|entry| {
                    let exec = &entry.execution;
                    let limit = if exec.plan.is_rollback() {
                        self.inner
                            .environments
                            .get(&exec.plan.target_environment)
                            .map(|env| Duration::from_secs(env.rollback_timeout))
                            .unwrap_or(self.inner.options.execution_timeout)
                    } else {
                        self.inner.options.execution_timeout
                    };
                    let age = now
                        .signed_duration_since(exec.started_at)
                        .to_std()
                        .unwrap_or_default();
                    age > limit
                })
                .map(|entry| entry.execution.execution_id.clone())
                .collect()
        };

        let mut timed_out = Vec::new();
        for execution_id in expired {
            warn!("Deployment {} timed out", execution_id);
            if self.fail(&execution_id, TIMED_OUT).await {
                timed_out.push(execution_id);
            }
        }
        timed_out
    }

    /// Drop history entries started before the retention window
    pub fn prune_history(&self, now: DateTime<Utc>) -> usize {
        let retention = i64::from(self.inner.options.history_retention_days);
        let cutoff = now - chrono::Duration::days(retention);
        let mut registry = self.lock();
        let before = registry.history.len();
        registry.history.retain(|exec| exec.started_at > cutoff);
        let pruned = before - registry.history.len();
        if pruned > 0 {
            info!("Pruned {} executions from history", pruned);
        }
        pruned
    }

    pub async fn health_check_all(&self) -> BTreeMap<String, HealthReport> {
        let probes = self.inner.environments.all().into_iter().map(|env| async move {
            (
                env.name.clone(),
                self.inner.collaborators.health.check(env).await,
            )
        });
        join_all(probes).await.into_iter().collect()
    }

    pub async fn environment_status(&self, name: &str) -> Option<EnvironmentStatus> {
        let environment = self.inner.environments.get(name)?;
        let report = self.inner.collaborators.health.check(environment).await;
        let active_deployments = self.lock().running_in(name);
        Some(EnvironmentStatus {
            name: environment.name.clone(),
            stage: environment.stage,
            health_status: report.overall_status,
            health_details: report,
            active_deployments,
        })
    }

    pub fn metrics(&self) -> MetricsResponse {
        let registry = self.lock();
        let count = |status: ExecutionStatus| {
            registry
                .history
                .iter()
                .filter(|exec| exec.status == status)
                .count()
        };
        let completed = count(ExecutionStatus::Completed);
        let failed = count(ExecutionStatus::Failed);
        let cancelled = count(ExecutionStatus::Cancelled);
        let terminal = registry.history.len();

        MetricsResponse {
            total_deployments: registry.active.len() + registry.history.len(),
            completed_deployments: completed,
            failed_deployments: failed,
            cancelled_deployments: cancelled,
            active_deployments: registry.running().count(),
            success_rate: round2(percent(completed, terminal)),
            environments: self.inner.environments.len(),
            plans: registry.plans.len(),
        }
    }

    /// Summary over executions started in the last `days` days
    pub fn summary_report(&self, days: u32, now: DateTime<Utc>) -> SummaryReport {
        let cutoff = now - chrono::Duration::days(i64::from(days));
        let registry = self.lock();
        let executions: Vec<&DeploymentExecution> = registry
            .all_executions()
            .filter(|exec| exec.started_at >= cutoff)
            .collect();

        let mut deployments = DeploymentSummary {
            total: executions.len(),
            ..Default::default()
        };
        let mut devices = DeviceSummary::default();
        let mut by_strategy = BTreeMap::new();
        let mut by_environment = BTreeMap::new();

        for exec in &executions {
            match exec.status {
                ExecutionStatus::Completed => deployments.completed += 1,
                ExecutionStatus::Failed => deployments.failed += 1,
                ExecutionStatus::Cancelled => deployments.cancelled += 1,
                _ => {}
            }
            devices.targeted += exec.devices_targeted;
            devices.successful += exec.devices_successful;
            devices.failed += exec.devices_failed;
            *by_strategy
                .entry(exec.plan.strategy.to_string())
                .or_insert(0) += 1;
            *by_environment
                .entry(exec.plan.target_environment.clone())
                .or_insert(0) += 1;
        }
        deployments.success_rate = round2(percent(deployments.completed, deployments.total));
        devices.success_rate = round2(percent(devices.successful, devices.targeted));

        SummaryReport {
            period_days: days,
            generated_at: now,
            deployments,
            devices,
            by_strategy,
            by_environment,
        }
    }

    /// Cancel every running execution
    pub async fn shutdown(&self) {
        info!("Shutting down deployment orchestrator");
        let running: Vec<String> = self
            .lock()
            .running()
            .map(|entry| entry.execution.execution_id.clone())
            .collect();
        for execution_id in running {
            self.cancel(&execution_id).await;
        }
    }

    async fn notify(&self, environment: &str, message: &str, level: NotificationLevel) {
        let Some(env) = self.inner.environments.get(environment) else {
            return;
        };
        self.notify_environment(env, message, level).await;
    }

    async fn notify_environment(
        &self,
        environment: &Environment,
        message: &str,
        level: NotificationLevel,
    ) {
        self.inner
            .collaborators
            .notifier
            .notify(environment, message, level)
            .await;
    }
}

/// Text of the failure notification
fn failure_notice(plan_name: &str, message: &str, rollback_error: Option<&DeployError>) -> String {
    match rollback_error {
        Some(e) => format!(
            "Deployment '{}' failed: {} (automatic rollback not started: {})",
            plan_name, message, e
        ),
        None => format!("Deployment '{}' failed: {}", plan_name, message),
    }
}
