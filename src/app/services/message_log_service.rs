use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Bool, Int4, Nullable, Text};
use crate::app::models::DieselUlid;
use crate::app::models::message_log::{MessageLog, MessageStatus, NewMessageLog};
use crate::database::DbPool;
use crate::schema::message_logs;

#[derive(QueryableByName)]
struct StatusRow {
    #[diesel(sql_type = Text)]
    status: String,
}

/// Durable event log. Every state transition is a single UPDATE whose WHERE
/// clause names the source status, so concurrent writers cannot clobber each
/// other's transitions.
pub struct MessageLogService;

impl MessageLogService {
    /// Insert unless a row with the same idempotency key already exists.
    /// Returns whether the row was inserted; a lost race is not an error.
    pub fn insert_if_absent(pool: &DbPool, row: NewMessageLog) -> Result<bool> {
        let mut conn = pool.get()?;

        let inserted = diesel::insert_into(message_logs::table)
            .values(&row)
            .on_conflict_do_nothing()
            .execute(&mut conn)?;

        Ok(inserted == 1)
    }

    pub fn find_by_id(pool: &DbPool, id: &DieselUlid) -> Result<Option<MessageLog>> {
        let mut conn = pool.get()?;

        let result = message_logs::table
            .filter(message_logs::id.eq(id.to_string()))
            .select(MessageLog::as_select())
            .first::<MessageLog>(&mut conn)
            .optional()?;

        Ok(result)
    }

    pub fn find_by_key(pool: &DbPool, key: &str) -> Result<Option<MessageLog>> {
        let mut conn = pool.get()?;

        let result = message_logs::table
            .filter(message_logs::idempotency_key.eq(key))
            .select(MessageLog::as_select())
            .first::<MessageLog>(&mut conn)
            .optional()?;

        Ok(result)
    }

    /// Rows in `status` whose send time falls inside `[start, end)`, oldest
    /// first.
    pub fn find_due_between(
        pool: &DbPool,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: MessageStatus,
        limit: i64,
    ) -> Result<Vec<MessageLog>> {
        let mut conn = pool.get()?;

        let result = message_logs::table
            .filter(message_logs::status.eq(status.as_str()))
            .filter(message_logs::scheduled_send_time.ge(start))
            .filter(message_logs::scheduled_send_time.lt(end))
            .order(message_logs::scheduled_send_time.asc())
            .limit(limit)
            .select(MessageLog::as_select())
            .load::<MessageLog>(&mut conn)?;

        Ok(result)
    }

    /// Non-terminal rows whose send time passed before `older_than`.
    pub fn find_missed(
        pool: &DbPool,
        older_than: DateTime<Utc>,
        statuses: &[MessageStatus],
        limit: i64,
    ) -> Result<Vec<MessageLog>> {
        let mut conn = pool.get()?;
        let status_strs: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();

        let result = message_logs::table
            .filter(message_logs::status.eq_any(status_strs))
            .filter(message_logs::scheduled_send_time.lt(older_than))
            .order(message_logs::scheduled_send_time.asc())
            .limit(limit)
            .select(MessageLog::as_select())
            .load::<MessageLog>(&mut conn)?;

        Ok(result)
    }

    /// Transition `id` to `to`, but only from one of the `from` statuses.
    /// Returns whether a row moved.
    pub fn mark_status(
        pool: &DbPool,
        id: &DieselUlid,
        from: &[MessageStatus],
        to: MessageStatus,
    ) -> Result<bool> {
        let mut conn = pool.get()?;
        let from_strs: Vec<&str> = from.iter().map(|s| s.as_str()).collect();

        let updated = diesel::update(
            message_logs::table
                .filter(message_logs::id.eq(id.to_string()))
                .filter(message_logs::status.eq_any(from_strs)),
        )
        .set((
            message_logs::status.eq(to.as_str()),
            message_logs::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated == 1)
    }

    /// Record a confirmed delivery. Terminal; nothing moves a SENT row.
    pub fn record_success(
        pool: &DbPool,
        id: &DieselUlid,
        sent_at: DateTime<Utc>,
        code: i32,
        body: Option<&str>,
    ) -> Result<()> {
        let mut conn = pool.get()?;

        diesel::update(message_logs::table.filter(message_logs::id.eq(id.to_string())))
            .set((
                message_logs::status.eq(MessageStatus::Sent.as_str()),
                message_logs::actual_send_time.eq(sent_at),
                message_logs::api_response_code.eq(code),
                message_logs::api_response_body.eq(body),
                message_logs::error_message.eq::<Option<String>>(None),
                message_logs::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    /// Record a failed attempt: bumps the retry counter and lands on RETRYING
    /// while budget remains, FAILED once it is spent or the failure is
    /// permanent. Returns the resulting status.
    pub fn record_failure(
        pool: &DbPool,
        id: &DieselUlid,
        code: Option<i32>,
        body: Option<&str>,
        error: &str,
        max_retries: i32,
        permanent: bool,
    ) -> Result<MessageStatus> {
        let mut conn = pool.get()?;

        let row: StatusRow = sql_query(
            r#"
            UPDATE message_logs
            SET retry_count = retry_count + 1,
                last_retry_at = NOW(),
                api_response_code = $2,
                api_response_body = $3,
                error_message = $4,
                status = CASE
                    WHEN $5 OR retry_count + 1 >= $6 THEN 'FAILED'
                    ELSE 'RETRYING'
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING status
            "#,
        )
        .bind::<Text, _>(id.to_string())
        .bind::<Nullable<Int4>, _>(code)
        .bind::<Nullable<Text>, _>(body)
        .bind::<Text, _>(error)
        .bind::<Bool, _>(permanent)
        .bind::<Int4, _>(max_retries)
        .get_result(&mut conn)?;

        MessageStatus::parse(&row.status)
            .ok_or_else(|| anyhow::anyhow!("unknown status '{}' on log {}", row.status, id))
    }

    pub fn count_by_status(pool: &DbPool) -> Result<Vec<(String, i64)>> {
        let mut conn = pool.get()?;

        let result = message_logs::table
            .group_by(message_logs::status)
            .select((message_logs::status, diesel::dsl::count_star()))
            .load::<(String, i64)>(&mut conn)?;

        Ok(result)
    }

    pub fn count_by_type(pool: &DbPool) -> Result<Vec<(String, i64)>> {
        let mut conn = pool.get()?;

        let result = message_logs::table
            .group_by(message_logs::message_type)
            .select((message_logs::message_type, diesel::dsl::count_star()))
            .load::<(String, i64)>(&mut conn)?;

        Ok(result)
    }
}
