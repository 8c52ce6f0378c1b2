//! Fake collaborators and helpers shared by the integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use deploy_api::{
    CheckResult, DeploymentExecution, DeploymentStage, Environment, HealthReport, PlanSpec,
    Strategy,
};
use fwdeploy::deploy::collaborators::{
    CheckRunner, Collaborators, Delivery, FirmwareSender, HealthProbe, Notifier,
    StaticDeviceRegistry,
};
use fwdeploy::deploy::orchestrator::{Orchestrator, OrchestratorOptions};
use fwdeploy::environments::EnvironmentRegistry;
use fwdeploy::errors::DeployError;
use fwdeploy::notify::NotificationLevel;
use fwdeploy::storage::settings::{InventoryDevice, StrategySettings};

// ---------------------------------------------------------------------------
// Firmware sender
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ScriptedSender {
    failing: Mutex<HashSet<String>>,
    replaced: Mutex<HashMap<String, String>>,
    delay: Mutex<Duration>,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl ScriptedSender {
    pub fn fail(&self, device_ids: &[&str]) {
        let mut failing = self.failing.lock().unwrap();
        failing.extend(device_ids.iter().map(|id| id.to_string()));
    }

    /// Report `version` as the version every listed device ran before
    pub fn replacing(&self, device_ids: &[String], version: &str) {
        let mut replaced = self.replaced.lock().unwrap();
        for id in device_ids {
            replaced.insert(id.clone(), version.to_string());
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl FirmwareSender for ScriptedSender {
    async fn send_firmware(
        &self,
        device_id: &str,
        firmware_version: &str,
        _environment: &Environment,
    ) -> Result<Delivery, DeployError> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.sent
            .lock()
            .unwrap()
            .push((device_id.to_string(), firmware_version.to_string()));

        if self.failing.lock().unwrap().contains(device_id) {
            return Err(DeployError::TransportError(format!(
                "{} unreachable",
                device_id
            )));
        }
        let delivery = Delivery::accepted();
        Ok(match self.replaced.lock().unwrap().get(device_id) {
            Some(version) => delivery.replacing(version.clone()),
            None => delivery,
        })
    }
}

// ---------------------------------------------------------------------------
// Health probe
// ---------------------------------------------------------------------------

/// Answers from a script, then `default`
pub struct ScriptedHealth {
    script: Mutex<VecDeque<bool>>,
    default: AtomicBool,
}

impl Default for ScriptedHealth {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: AtomicBool::new(true),
        }
    }
}

impl ScriptedHealth {
    pub fn script(&self, verdicts: &[bool]) {
        self.script.lock().unwrap().extend(verdicts.iter().copied());
    }

    pub fn set_default(&self, healthy: bool) {
        self.default.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl HealthProbe for ScriptedHealth {
    async fn check(&self, environment: &Environment) -> HealthReport {
        let healthy = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.load(Ordering::SeqCst));
        let result = if healthy {
            CheckResult::healthy()
        } else {
            CheckResult::unhealthy("api down")
        };
        let mut checks = BTreeMap::new();
        checks.insert("api".to_string(), result);
        HealthReport::from_checks(&environment.name, checks, 0.0)
    }
}

// ---------------------------------------------------------------------------
// Check runner
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ScriptedChecks {
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    pub ran: Mutex<Vec<String>>,
}

impl ScriptedChecks {
    pub fn fail(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    /// Make the named check panic instead of answering
    pub fn panic_on(&self, name: &str) {
        self.panicking.lock().unwrap().insert(name.to_string());
    }

    pub fn ran(&self) -> Vec<String> {
        self.ran.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckRunner for ScriptedChecks {
    async fn run_check(
        &self,
        name: &str,
        _execution_id: &str,
        _environment: &Environment,
    ) -> Result<bool, DeployError> {
        self.ran.lock().unwrap().push(name.to_string());
        let panics = self.panicking.lock().unwrap().contains(name);
        if panics {
            panic!("check {} blew up", name);
        }
        Ok(!self.failing.lock().unwrap().contains(name))
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(NotificationLevel, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(NotificationLevel, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn contains(&self, level: NotificationLevel, fragment: &str) -> bool {
        self.messages()
            .iter()
            .any(|(l, message)| *l == level && message.contains(fragment))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, _environment: &Environment, message: &str, level: NotificationLevel) {
        self.messages
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub fn device_ids(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("ESP32_{:03}", i)).collect()
}

pub fn fleet(count: usize) -> Vec<InventoryDevice> {
    device_ids(count)
        .into_iter()
        .map(|device_id| InventoryDevice {
            device_id,
            device_type: Some("ESP32".to_string()),
            location: None,
            firmware_version: Some("1.0.0".to_string()),
            tags: Vec::new(),
            environment: None,
            online: true,
        })
        .collect()
}

pub fn development() -> Environment {
    let mut env = Environment::new("development", DeploymentStage::Development);
    env.approval_required = false;
    env.auto_rollback = false;
    env
}

pub fn production() -> Environment {
    let mut env = Environment::new("production", DeploymentStage::Production);
    env.approval_required = true;
    env.auto_rollback = true;
    env
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub sender: Arc<ScriptedSender>,
    pub health: Arc<ScriptedHealth>,
    pub checks: Arc<ScriptedChecks>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(devices: usize, environments: Vec<Environment>) -> Self {
        Self::with_options(devices, environments, test_options())
    }

    pub fn with_options(
        devices: usize,
        environments: Vec<Environment>,
        options: OrchestratorOptions,
    ) -> Self {
        let sender = Arc::new(ScriptedSender::default());
        let health = Arc::new(ScriptedHealth::default());
        let checks = Arc::new(ScriptedChecks::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let collaborators = Collaborators {
            devices: Arc::new(StaticDeviceRegistry::new(fleet(devices))),
            firmware: sender.clone(),
            checks: checks.clone(),
            health: health.clone(),
            notifier: notifier.clone(),
        };
        let orchestrator = Orchestrator::new(
            EnvironmentRegistry::new(environments),
            collaborators,
            options,
        );

        Self {
            orchestrator,
            sender,
            health,
            checks,
            notifier,
        }
    }

    /// Create a plan and start it, panicking on refusal
    pub fn start(&self, spec: PlanSpec) -> DeploymentExecution {
        let plan = self.orchestrator.create_plan(spec);
        self.orchestrator
            .execute(&plan.plan_id)
            .expect("execution should be admitted")
    }

    pub async fn wait_terminal(&self, execution_id: &str) -> DeploymentExecution {
        wait_terminal(&self.orchestrator, execution_id).await
    }
}

pub fn test_options() -> OrchestratorOptions {
    OrchestratorOptions {
        strategies: StrategySettings::no_pauses(),
        ..Default::default()
    }
}

pub fn spec(name: &str, environment: &str, strategy: Strategy) -> PlanSpec {
    let mut spec = PlanSpec::new(name, "1.2.0", "development", environment, strategy);
    spec.device_filters.device_type = Some("ESP32".to_string());
    spec
}

/// Poll until the execution reaches a terminal state
pub async fn wait_terminal(orchestrator: &Orchestrator, execution_id: &str) -> DeploymentExecution {
    for _ in 0..1000 {
        if let Some(exec) = orchestrator.get_execution(execution_id) {
            if exec.status.is_terminal() {
                return exec;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("execution {} did not finish", execution_id);
}
