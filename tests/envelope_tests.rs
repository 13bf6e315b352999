use chrono::{DateTime, Utc};
use heyday::app::models::message_log::{MessageLog, MessageStatus};
use heyday::app::models::DieselUlid;
use heyday::app::queue::JobEnvelope;

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn sample_log() -> MessageLog {
    let now = Utc::now();
    MessageLog {
        id: DieselUlid::new(),
        user_id: DieselUlid::new(),
        message_type: "BIRTHDAY".to_string(),
        message_content: "Hey, Alice Johnson it's your birthday".to_string(),
        scheduled_send_time: utc("2026-05-15T13:00:00Z"),
        actual_send_time: None,
        status: MessageStatus::Queued.as_str().to_string(),
        retry_count: 1,
        last_retry_at: None,
        api_response_code: None,
        api_response_body: None,
        error_message: None,
        idempotency_key: "key".to_string(),
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn envelope_carries_the_log_row() {
    let log = sample_log();
    let now = utc("2026-05-15T12:05:00Z");
    let envelope = JobEnvelope::for_log(&log, now);

    assert_eq!(envelope.message_id, log.id.to_string());
    assert_eq!(envelope.user_id, log.user_id.to_string());
    assert_eq!(envelope.message_type, "BIRTHDAY");
    assert_eq!(envelope.scheduled_send_time, log.scheduled_send_time);
    assert_eq!(envelope.retry_count, 1);
    assert_eq!(envelope.timestamp, now.timestamp_millis());
}

#[test]
fn republishes_get_fresh_envelope_ids() {
    let log = sample_log();
    let now = Utc::now();
    let first = JobEnvelope::for_log(&log, now);
    let second = JobEnvelope::for_log(&log, now);
    assert_ne!(first.envelope_id, second.envelope_id);
    assert_eq!(first.message_id, second.message_id);
}

#[test]
fn wire_format_is_camel_case_json() {
    let envelope = JobEnvelope::for_log(&sample_log(), utc("2026-05-15T12:05:00Z"));
    let value: serde_json::Value =
        serde_json::from_slice(&envelope.to_bytes().unwrap()).unwrap();

    for key in [
        "envelopeId",
        "messageId",
        "userId",
        "messageType",
        "scheduledSendTime",
        "retryCount",
        "timestamp",
    ] {
        assert!(value.get(key).is_some(), "missing key {key}");
    }
}

#[test]
fn envelope_round_trips_through_bytes() {
    let envelope = JobEnvelope::for_log(&sample_log(), Utc::now());
    let decoded = JobEnvelope::from_bytes(&envelope.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded.message_id, envelope.message_id);
    assert_eq!(decoded.scheduled_send_time, envelope.scheduled_send_time);
}

#[test]
fn routing_key_is_kind_scoped() {
    let envelope = JobEnvelope::for_log(&sample_log(), Utc::now());
    assert_eq!(envelope.routing_key(), "message.birthday");
}

#[test]
fn headers_carry_retry_and_identity() {
    let envelope = JobEnvelope::for_log(&sample_log(), Utc::now());
    let headers = envelope.headers();
    let keys: Vec<&str> = headers.inner().keys().map(|k| k.as_str()).collect();

    assert!(keys.contains(&"x-retry-count"));
    assert!(keys.contains(&"x-message-type"));
    assert!(keys.contains(&"x-user-id"));
}
