use serde::{Deserialize, Serialize};
use diesel::prelude::*;
use chrono::{DateTime, Utc};
use super::DieselUlid;

/// Delivery lifecycle of one scheduled occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageStatus {
    Scheduled,
    Queued,
    Sending,
    Sent,
    Retrying,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Scheduled => "SCHEDULED",
            MessageStatus::Queued => "QUEUED",
            MessageStatus::Sending => "SENDING",
            MessageStatus::Sent => "SENT",
            MessageStatus::Retrying => "RETRYING",
            MessageStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SCHEDULED" => Some(MessageStatus::Scheduled),
            "QUEUED" => Some(MessageStatus::Queued),
            "SENDING" => Some(MessageStatus::Sending),
            "SENT" => Some(MessageStatus::Sent),
            "RETRYING" => Some(MessageStatus::Retrying),
            "FAILED" => Some(MessageStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Sent | MessageStatus::Failed)
    }

    /// Whether the pipeline state machine permits moving to `next`.
    ///
    /// A SCHEDULED row may reach SENDING directly: the sweeper republishes
    /// rows whose publish confirm was lost, so a worker can see a message
    /// whose row never made it to QUEUED. SENDING -> SENDING covers broker
    /// redelivery after a worker crash mid-send.
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        matches!(
            (self, next),
            (Scheduled, Queued)
                | (Scheduled, Sending)
                | (Queued, Sending)
                | (Retrying, Sending)
                | (Sending, Sending)
                | (Sending, Sent)
                | (Sending, Retrying)
                | (Sending, Failed)
        )
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per scheduled occurrence. Content is rendered at pre-calculation
/// time and immutable afterwards; everything else is delivery bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::message_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MessageLog {
    pub id: DieselUlid,
    pub user_id: DieselUlid,
    pub message_type: String,
    pub message_content: String,
    pub scheduled_send_time: DateTime<Utc>,
    pub actual_send_time: Option<DateTime<Utc>>,
    pub status: String,
    pub retry_count: i32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub api_response_code: Option<i32>,
    pub api_response_body: Option<String>,
    pub error_message: Option<String>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable row for the pre-calculator.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::message_logs)]
pub struct NewMessageLog {
    pub id: DieselUlid,
    pub user_id: DieselUlid,
    pub message_type: String,
    pub message_content: String,
    pub scheduled_send_time: DateTime<Utc>,
    pub status: String,
    pub retry_count: i32,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewMessageLog {
    pub fn new(
        user_id: DieselUlid,
        message_type: String,
        message_content: String,
        scheduled_send_time: DateTime<Utc>,
        idempotency_key: String,
    ) -> Self {
        let now = Utc::now();
        NewMessageLog {
            id: DieselUlid::new(),
            user_id,
            message_type,
            message_content,
            scheduled_send_time,
            status: MessageStatus::Scheduled.as_str().to_string(),
            retry_count: 0,
            idempotency_key,
            created_at: now,
            updated_at: now,
        }
    }
}

impl MessageLog {
    pub fn status(&self) -> Option<MessageStatus> {
        MessageStatus::parse(&self.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().map(|s| s.is_terminal()).unwrap_or(false)
    }

    pub fn can_retry(&self, max_retries: i32) -> bool {
        self.retry_count < max_retries && !self.is_terminal()
    }
}
