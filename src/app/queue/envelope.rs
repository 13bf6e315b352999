use chrono::{DateTime, Utc};
use lapin::types::{AMQPValue, FieldTable};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::app::models::message_log::MessageLog;

/// Broker payload for one pending delivery. The row id is the durable
/// identity; the envelope id distinguishes republishes of the same row in
/// logs and traces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEnvelope {
    pub envelope_id: Uuid,
    /// `message_logs.id` of the row this delivery drives.
    pub message_id: String,
    pub user_id: String,
    pub message_type: String,
    pub scheduled_send_time: DateTime<Utc>,
    pub retry_count: i32,
    /// Publish time, epoch milliseconds.
    pub timestamp: i64,
}

impl JobEnvelope {
    pub fn for_log(log: &MessageLog, now: DateTime<Utc>) -> Self {
        JobEnvelope {
            envelope_id: Uuid::new_v4(),
            message_id: log.id.to_string(),
            user_id: log.user_id.to_string(),
            message_type: log.message_type.clone(),
            scheduled_send_time: log.scheduled_send_time,
            retry_count: log.retry_count,
            timestamp: now.timestamp_millis(),
        }
    }

    /// Topic routing key, one suffix per kind: `message.birthday`,
    /// `message.anniversary`, ...
    pub fn routing_key(&self) -> String {
        format!("message.{}", self.message_type.to_lowercase())
    }

    pub fn headers(&self) -> FieldTable {
        let mut headers = FieldTable::default();
        headers.insert(
            "x-retry-count".into(),
            AMQPValue::LongInt(self.retry_count),
        );
        headers.insert(
            "x-message-type".into(),
            AMQPValue::LongString(self.message_type.clone().into()),
        );
        headers.insert(
            "x-user-id".into(),
            AMQPValue::LongString(self.user_id.clone().into()),
        );
        headers
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
