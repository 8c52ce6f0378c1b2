//! Finite state machine for deployment executions

use deploy_api::ExecutionStatus;

/// Execution event
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    /// Start pre-deployment health and checks
    Validate,

    /// Pre-deployment gates passed, hand over to the strategy
    Deploy,

    /// Strategy, post checks and post health passed
    Complete,

    /// Any gate failed, or the monitor timed the execution out
    Fail(String),

    /// Operator or shutdown cancellation
    Cancel,
}

/// Execution FSM
///
/// Terminal states accept no further events, so an archived execution can
/// never change state again.
#[derive(Debug, Clone)]
pub struct ExecutionFsm {
    state: ExecutionStatus,
    error: Option<String>,
}

impl ExecutionFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self::resume(ExecutionStatus::Pending)
    }

    /// Continue from a recorded state
    pub fn resume(state: ExecutionStatus) -> Self {
        Self { state, error: None }
    }

    pub fn state(&self) -> ExecutionStatus {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: ExecutionEvent) -> Result<ExecutionStatus, String> {
        let new_state = match (self.state, &event) {
            (ExecutionStatus::Pending, ExecutionEvent::Validate) => ExecutionStatus::Validating,
            (ExecutionStatus::Validating, ExecutionEvent::Deploy) => ExecutionStatus::Deploying,
            (ExecutionStatus::Deploying, ExecutionEvent::Complete) => ExecutionStatus::Completed,

            (state, ExecutionEvent::Fail(err)) if !state.is_terminal() => {
                self.error = Some(err.clone());
                ExecutionStatus::Failed
            }
            (state, ExecutionEvent::Cancel) if !state.is_terminal() => ExecutionStatus::Cancelled,

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}

impl Default for ExecutionFsm {
    fn default() -> Self {
        Self::new()
    }
}
