//! FSM unit tests

use deploy_api::ExecutionStatus;
use fwdeploy::deploy::fsm::{ExecutionEvent, ExecutionFsm};

#[test]
fn test_fsm_initial_state() {
    let fsm = ExecutionFsm::new();
    assert_eq!(fsm.state(), ExecutionStatus::Pending);
    assert!(fsm.error().is_none());
    assert!(!fsm.is_terminal());
}

#[test]
fn test_fsm_success_flow() {
    let mut fsm = ExecutionFsm::new();

    // Pending -> Validating
    fsm.process(ExecutionEvent::Validate).unwrap();
    assert_eq!(fsm.state(), ExecutionStatus::Validating);

    // Validating -> Deploying
    fsm.process(ExecutionEvent::Deploy).unwrap();
    assert_eq!(fsm.state(), ExecutionStatus::Deploying);

    // Deploying -> Completed
    fsm.process(ExecutionEvent::Complete).unwrap();
    assert_eq!(fsm.state(), ExecutionStatus::Completed);
    assert!(fsm.is_terminal());
}

#[test]
fn test_fsm_failure_from_any_running_state() {
    for steps in 0..3 {
        let mut fsm = ExecutionFsm::new();
        let path = [
            ExecutionEvent::Validate,
            ExecutionEvent::Deploy,
            ExecutionEvent::Complete,
        ];
        for event in path.iter().take(steps).cloned() {
            fsm.process(event).unwrap();
        }
        if fsm.is_terminal() {
            continue;
        }

        fsm.process(ExecutionEvent::Fail("gate failed".to_string()))
            .unwrap();
        assert_eq!(fsm.state(), ExecutionStatus::Failed);
        assert_eq!(fsm.error(), Some("gate failed"));
    }
}

#[test]
fn test_fsm_terminal_states_are_final() {
    let mut fsm = ExecutionFsm::new();
    fsm.process(ExecutionEvent::Validate).unwrap();
    fsm.process(ExecutionEvent::Cancel).unwrap();
    assert_eq!(fsm.state(), ExecutionStatus::Cancelled);

    assert!(fsm.process(ExecutionEvent::Fail("late".to_string())).is_err());
    assert!(fsm.process(ExecutionEvent::Cancel).is_err());
    assert!(fsm.process(ExecutionEvent::Deploy).is_err());
    assert_eq!(fsm.state(), ExecutionStatus::Cancelled);
    assert!(fsm.error().is_none());
}

#[test]
fn test_fsm_invalid_transition() {
    let mut fsm = ExecutionFsm::new();

    // Cannot deploy before validating
    assert!(fsm.process(ExecutionEvent::Deploy).is_err());
    assert!(fsm.process(ExecutionEvent::Complete).is_err());
    assert_eq!(fsm.state(), ExecutionStatus::Pending);
}

#[test]
fn test_fsm_resume() {
    let mut fsm = ExecutionFsm::resume(ExecutionStatus::Deploying);
    fsm.process(ExecutionEvent::Complete).unwrap();
    assert_eq!(fsm.state(), ExecutionStatus::Completed);
}
