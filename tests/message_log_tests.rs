use chrono::Utc;
use heyday::app::models::message_log::{MessageLog, MessageStatus, NewMessageLog};
use heyday::app::models::DieselUlid;

fn new_log() -> NewMessageLog {
    NewMessageLog::new(
        DieselUlid::new(),
        "BIRTHDAY".to_string(),
        "Hey, Alice Johnson it's your birthday".to_string(),
        Utc::now(),
        "key".to_string(),
    )
}

fn log_with_status(status: MessageStatus) -> MessageLog {
    let new = new_log();
    MessageLog {
        id: new.id,
        user_id: new.user_id,
        message_type: new.message_type,
        message_content: new.message_content,
        scheduled_send_time: new.scheduled_send_time,
        actual_send_time: None,
        status: status.as_str().to_string(),
        retry_count: 0,
        last_retry_at: None,
        api_response_code: None,
        api_response_body: None,
        error_message: None,
        idempotency_key: new.idempotency_key,
        created_at: new.created_at,
        updated_at: new.updated_at,
    }
}

#[test]
fn new_rows_start_scheduled_with_zero_retries() {
    let row = new_log();
    assert_eq!(row.status, "SCHEDULED");
    assert_eq!(row.retry_count, 0);
    assert_eq!(row.created_at, row.updated_at);
}

#[test]
fn status_strings_round_trip() {
    for status in [
        MessageStatus::Scheduled,
        MessageStatus::Queued,
        MessageStatus::Sending,
        MessageStatus::Sent,
        MessageStatus::Retrying,
        MessageStatus::Failed,
    ] {
        assert_eq!(MessageStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(MessageStatus::parse("NOT_A_STATUS"), None);
}

#[test]
fn only_sent_and_failed_are_terminal() {
    assert!(MessageStatus::Sent.is_terminal());
    assert!(MessageStatus::Failed.is_terminal());
    assert!(!MessageStatus::Scheduled.is_terminal());
    assert!(!MessageStatus::Queued.is_terminal());
    assert!(!MessageStatus::Sending.is_terminal());
    assert!(!MessageStatus::Retrying.is_terminal());
}

#[test]
fn pipeline_transitions_are_legal() {
    use MessageStatus::*;

    assert!(Scheduled.can_transition_to(Queued));
    assert!(Queued.can_transition_to(Sending));
    assert!(Retrying.can_transition_to(Sending));
    assert!(Sending.can_transition_to(Sent));
    assert!(Sending.can_transition_to(Retrying));
    assert!(Sending.can_transition_to(Failed));
    // Lost-confirm republish: a SCHEDULED row can be consumed directly.
    assert!(Scheduled.can_transition_to(Sending));
    // Redelivery after a crash mid-send.
    assert!(Sending.can_transition_to(Sending));
}

#[test]
fn terminal_states_do_not_move() {
    use MessageStatus::*;

    for next in [Scheduled, Queued, Sending, Sent, Retrying, Failed] {
        assert!(!Sent.can_transition_to(next));
        assert!(!Failed.can_transition_to(next));
    }
    // No skipping the broker: SCHEDULED never lands on SENT directly.
    assert!(!Scheduled.can_transition_to(Sent));
    assert!(!Queued.can_transition_to(Sent));
}

#[test]
fn retry_budget_is_enforced_by_can_retry() {
    let mut log = log_with_status(MessageStatus::Retrying);
    log.retry_count = 2;
    assert!(log.can_retry(3));

    log.retry_count = 3;
    assert!(!log.can_retry(3));

    let sent = log_with_status(MessageStatus::Sent);
    assert!(!sent.can_retry(3));
}
