use anyhow::Result;
use metrics::{describe_counter, describe_gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const MESSAGES_SCHEDULED: &str = "heyday_messages_scheduled_total";
pub const MESSAGES_DUPLICATE: &str = "heyday_messages_duplicate_total";
pub const MESSAGES_QUEUED: &str = "heyday_messages_queued_total";
pub const MESSAGES_SENT: &str = "heyday_messages_sent_total";
pub const MESSAGES_FAILED: &str = "heyday_messages_failed_total";
pub const MESSAGES_DEAD_LETTERED: &str = "heyday_messages_dead_lettered_total";
pub const MESSAGES_MISSED: &str = "heyday_messages_missed_total";
pub const DELIVERY_RETRIES: &str = "heyday_delivery_retries_total";
pub const PUBLISH_FAILURES: &str = "heyday_publish_failures_total";
pub const VALIDATION_SKIPS: &str = "heyday_validation_skips_total";
pub const CIRCUIT_STATE: &str = "heyday_circuit_breaker_state";
pub const QUEUE_DEPTH: &str = "heyday_queue_depth";
pub const DLQ_DEPTH: &str = "heyday_dlq_depth";
pub const JOB_LAST_RUN: &str = "heyday_job_last_run_timestamp_seconds";

/// Install the process-wide Prometheus recorder and keep the render handle
/// for the /metrics route.
pub fn install_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    describe();
    Ok(handle)
}

fn describe() {
    describe_counter!(MESSAGES_SCHEDULED, Unit::Count, "Occurrences inserted by the pre-calculator");
    describe_counter!(MESSAGES_DUPLICATE, Unit::Count, "Occurrences skipped because they were already scheduled");
    describe_counter!(MESSAGES_QUEUED, Unit::Count, "Rows published to the broker and confirmed");
    describe_counter!(MESSAGES_SENT, Unit::Count, "Deliveries confirmed by the delivery API");
    describe_counter!(MESSAGES_FAILED, Unit::Count, "Deliveries that ended FAILED");
    describe_counter!(MESSAGES_DEAD_LETTERED, Unit::Count, "Messages rejected to the dead-letter queue");
    describe_counter!(MESSAGES_MISSED, Unit::Count, "Past-due rows republished by the recovery sweeper");
    describe_counter!(DELIVERY_RETRIES, Unit::Count, "Failed delivery attempts that will be retried");
    describe_counter!(PUBLISH_FAILURES, Unit::Count, "Publishes the broker did not confirm");
    describe_counter!(VALIDATION_SKIPS, Unit::Count, "Candidates skipped by strategy validation");
    describe_gauge!(CIRCUIT_STATE, Unit::Count, "Circuit breaker state: 0 closed, 1 half-open, 2 open");
    describe_gauge!(QUEUE_DEPTH, Unit::Count, "Messages waiting in the main queue");
    describe_gauge!(DLQ_DEPTH, Unit::Count, "Messages parked in the dead-letter queue");
    describe_gauge!(JOB_LAST_RUN, Unit::Seconds, "Unix timestamp of each job's last completed tick");
}
