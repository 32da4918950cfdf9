//! Test: Task retry - timeouts, retries, and failure policies

use crate::helpers::*;
use gnss_tracker::core::{CommandTask, FailurePolicy, TaskError, TaskPoll, TaskState};
use gnss_tracker::execution::TaskMachine;
use std::time::Duration;

fn registration_task(max_retries: u32) -> CommandTask {
    CommandTask::new("AT+CEREG?", "+CEREG: 0,5", max_retries, Duration::from_millis(100))
}

/// Poll every 150 ms until the task reports something other than `Pending`
fn poll_until_settled(
    machine: &TaskMachine,
    task: &mut CommandTask,
    modem: &mut ScriptedModem,
    clock: &mut Clock,
) -> TaskPoll {
    for _ in 0..200 {
        let now = clock.advance(150);
        match machine.poll(task, modem, now) {
            TaskPoll::Pending => continue,
            other => return other,
        }
    }
    panic!("task never settled (state {:?})", task.state);
}

#[test]
fn test_silent_modem_exhausts_retries() {
    let machine = TaskMachine::new("scenario");
    let mut task = registration_task(3);
    let mut modem = ScriptedModem::silent();
    let mut clock = Clock::new();

    let outcome = poll_until_settled(&machine, &mut task, &mut modem, &mut clock);

    assert_eq!(
        outcome,
        TaskPoll::Failed(TaskError::TransportStarved {
            command: "AT+CEREG?".to_string(),
            attempts: 4,
        })
    );
    assert_eq!(task.state, TaskState::Failed);
    assert!(task.finished);
    // first attempt plus max_retries re-sends
    assert_eq!(modem.count("AT+CEREG?"), 4);
}

#[test]
fn test_wrong_answer_is_protocol_timeout() {
    let machine = TaskMachine::new("scenario");
    let mut task = registration_task(1);
    let mut modem = ScriptedModem::silent().reply("AT+CEREG?", "\r\n+CEREG: 0,2\r\n\r\nOK\r\n");
    let mut clock = Clock::new();

    let outcome = poll_until_settled(&machine, &mut task, &mut modem, &mut clock);

    assert!(matches!(
        outcome,
        TaskPoll::Failed(TaskError::ProtocolTimeout { attempts: 2, .. })
    ));
    assert_eq!(modem.count("AT+CEREG?"), 2);
}

#[test]
fn test_default_policy_reattempts_forever() {
    let machine = TaskMachine::new("scenario");
    let mut task = registration_task(1);
    let mut modem = ScriptedModem::silent();
    let mut clock = Clock::new();

    poll_until_settled(&machine, &mut task, &mut modem, &mut clock);
    assert_eq!(modem.count("AT+CEREG?"), 2);

    // Failed -> Idle, then a fresh attempt cycle
    assert_eq!(machine.poll(&mut task, &mut modem, clock.advance(150)), TaskPoll::Pending);
    assert_eq!(task.state, TaskState::Idle);
    poll_until_settled(&machine, &mut task, &mut modem, &mut clock);
    assert_eq!(modem.count("AT+CEREG?"), 4);
}

#[test]
fn test_late_answer_completes_task() {
    let machine = TaskMachine::new("scenario");
    let mut task = registration_task(5);
    let mut modem = ScriptedModem::silent();
    let mut clock = Clock::new();

    for _ in 0..6 {
        machine.poll(&mut task, &mut modem, clock.advance(150));
    }
    assert!(modem.count("AT+CEREG?") >= 2);

    modem = modem.reply("AT+CEREG?", "\r\n+CEREG: 0,5\r\n\r\nOK\r\n");
    let outcome = poll_until_settled(&machine, &mut task, &mut modem, &mut clock);

    assert_eq!(outcome, TaskPoll::Done);
    assert_eq!(task.result.as_deref(), Some("+CEREG: 0,5\n"));
}

#[test]
fn test_handler_policy_can_rewrite_task() {
    let machine = TaskMachine::new("scenario");
    let mut task = registration_task(0).on_failure(|task| {
        task.command = "AT+CEREG=0".to_string();
        task.expected = "OK".into();
        task.rearm();
    });
    let mut modem = ScriptedModem::silent().reply("AT+CEREG=0", "\r\nOK\r\n");
    let mut clock = Clock::new();

    poll_until_settled(&machine, &mut task, &mut modem, &mut clock);
    let outcome = poll_until_settled(&machine, &mut task, &mut modem, &mut clock);

    assert_eq!(outcome, TaskPoll::Done);
    assert_eq!(modem.commands_sent(), &["AT+CEREG?", "AT+CEREG=0"]);
}

#[test]
fn test_escalate_policy_reports_once_and_resets() {
    let machine = TaskMachine::new("scenario");
    let mut task = CommandTask::new("AT+CASEND=0,12", ">", 1, Duration::from_millis(100))
        .with_failure_policy(FailurePolicy::Escalate);
    let mut modem = ScriptedModem::silent();
    let mut clock = Clock::new();

    poll_until_settled(&machine, &mut task, &mut modem, &mut clock);
    let outcome = machine.poll(&mut task, &mut modem, clock.advance(150));

    assert!(matches!(outcome, TaskPoll::Escalated(TaskError::TransportStarved { .. })));
    assert_eq!(task.state, TaskState::Idle);
    assert!(matches!(task.on_failure, FailurePolicy::Escalate));
}
