use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, BasicRejectOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::app::models::DieselUlid;
use crate::app::models::message_log::MessageStatus;
use crate::app::queue::envelope::JobEnvelope;
use crate::app::queue::topology::MESSAGE_QUEUE;
use crate::app::resilience::{DeliveryEnvelope, RetryPolicy};
use crate::app::services::message_log_service::MessageLogService;
use crate::app::services::metrics::{DELIVERY_RETRIES, MESSAGES_DEAD_LETTERED, MESSAGES_FAILED, MESSAGES_SENT};
use crate::app::services::user_service::UserService;
use crate::database::DbPool;

const CONSUMER_TAG: &str = "heyday-worker";

/// Consumes the main queue and fans deliveries out to workers, bounded by
/// the configured concurrency. Prefetch matches the bound so the broker
/// never hands this process more than it can chew.
pub struct WorkerPool {
    channel: Channel,
    worker: Arc<DeliveryWorker>,
    concurrency: usize,
    shutdown: CancellationToken,
}

impl WorkerPool {
    pub async fn new(
        connection: &Connection,
        pool: DbPool,
        envelope: DeliveryEnvelope,
        policy: RetryPolicy,
        concurrency: u16,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let channel = connection.create_channel().await?;
        channel
            .basic_qos(concurrency, BasicQosOptions::default())
            .await?;

        Ok(WorkerPool {
            channel,
            worker: Arc::new(DeliveryWorker {
                pool,
                envelope,
                policy,
            }),
            concurrency: concurrency as usize,
            shutdown,
        })
    }

    pub async fn run(&self) -> Result<()> {
        let mut consumer = self
            .channel
            .basic_consume(
                MESSAGE_QUEUE,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        tracing::info!(concurrency = self.concurrency, "Worker pool consuming");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = consumer.next() => {
                    match next {
                        None => {
                            tracing::warn!("Consumer stream closed by broker");
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "Consumer delivery error");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                        Some(Ok(delivery)) => {
                            let permit = semaphore.clone().acquire_owned().await?;
                            let worker = self.worker.clone();
                            tokio::spawn(async move {
                                worker.process(delivery).await;
                                drop(permit);
                            });
                        }
                    }
                }
            }
        }

        // Drain: every permit back means every in-flight message is acked
        // or nacked. Anything unacked when the connection closes redelivers.
        let _drained = semaphore.acquire_many(self.concurrency as u32).await;
        tracing::info!("Worker pool drained");
        Ok(())
    }
}

/// Processes one delivery end to end: idempotency check, SENDING
/// transition, one guarded API attempt, persisted outcome, broker ack.
/// Transient retries travel through broker redelivery, not an in-process
/// loop.
pub struct DeliveryWorker {
    pool: DbPool,
    envelope: DeliveryEnvelope,
    policy: RetryPolicy,
}

impl DeliveryWorker {
    pub async fn process(&self, delivery: Delivery) {
        let envelope = match JobEnvelope::from_bytes(&delivery.data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(error = %e, "Malformed envelope, dead-lettering");
                metrics::counter!(MESSAGES_DEAD_LETTERED).increment(1);
                Self::reject(&delivery).await;
                return;
            }
        };

        self.handle(&envelope, &delivery).await;
    }

    async fn handle(&self, envelope: &JobEnvelope, delivery: &Delivery) {
        let log_id = match DieselUlid::from_string(&envelope.message_id) {
            Ok(id) => id,
            Err(_) => {
                tracing::error!(message_id = %envelope.message_id, "Envelope carries a bad log id");
                metrics::counter!(MESSAGES_DEAD_LETTERED).increment(1);
                Self::reject(delivery).await;
                return;
            }
        };

        let log = match MessageLogService::find_by_id(&self.pool, &log_id) {
            Ok(Some(log)) => log,
            Ok(None) => {
                // The row is the source of truth; no row means nothing to do.
                tracing::warn!(message_id = %log_id, "Log row missing, treating as handled");
                Self::ack(delivery).await;
                return;
            }
            Err(e) => {
                tracing::error!(message_id = %log_id, error = %e, "Failed to load log row");
                Self::requeue(delivery).await;
                return;
            }
        };

        // Idempotency checkpoint: redelivery after a crash-past-send lands
        // here and drops without touching the delivery API again.
        match log.status() {
            Some(MessageStatus::Sent) => {
                tracing::debug!(message_id = %log_id, "Already sent, dropping redelivery");
                Self::ack(delivery).await;
                return;
            }
            Some(MessageStatus::Failed) => {
                tracing::debug!(message_id = %log_id, "Already failed, dropping redelivery");
                Self::ack(delivery).await;
                return;
            }
            _ => {}
        }

        let user = match UserService::find_by_id(&self.pool, &log.user_id) {
            Ok(Some(user)) => user,
            Ok(None) => {
                // Logs outlive users; a vanished user is a permanent failure.
                tracing::warn!(message_id = %log_id, user_id = %log.user_id, "User missing or deleted");
                let _ = MessageLogService::record_failure(
                    &self.pool,
                    &log_id,
                    None,
                    None,
                    "user not found",
                    self.policy.max_retries,
                    true,
                );
                metrics::counter!(MESSAGES_FAILED, "kind" => envelope.message_type.clone()).increment(1);
                metrics::counter!(MESSAGES_DEAD_LETTERED).increment(1);
                Self::reject(delivery).await;
                return;
            }
            Err(e) => {
                tracing::error!(message_id = %log_id, error = %e, "Failed to load user");
                Self::requeue(delivery).await;
                return;
            }
        };

        match MessageLogService::mark_status(
            &self.pool,
            &log_id,
            &[
                MessageStatus::Scheduled,
                MessageStatus::Queued,
                MessageStatus::Retrying,
                MessageStatus::Sending,
            ],
            MessageStatus::Sending,
        ) {
            Ok(true) => {}
            Ok(false) => {
                // Another worker won the transition; whatever it decides
                // stands.
                tracing::debug!(message_id = %log_id, "Lost the SENDING race, dropping");
                Self::ack(delivery).await;
                return;
            }
            Err(e) => {
                tracing::error!(message_id = %log_id, error = %e, "Failed to mark SENDING");
                Self::requeue(delivery).await;
                return;
            }
        }

        self.attempt_delivery(
            envelope,
            delivery,
            &log_id,
            log.retry_count,
            &user.email,
            &log.message_content,
        )
        .await;
    }

    /// One guarded API attempt, then settle the delivery: ack on success,
    /// reject to the DLQ on a terminal outcome, nack with requeue while
    /// retry budget remains. The topology declares no delay exchange, so
    /// the backoff pause is the worker holding the unacked delivery before
    /// the nack; prefetch bounds how many deliveries can be parked at once.
    async fn attempt_delivery(
        &self,
        envelope: &JobEnvelope,
        delivery: &Delivery,
        log_id: &DieselUlid,
        prior_retries: i32,
        email: &str,
        content: &str,
    ) {
        match self.envelope.attempt(email, content).await {
            Ok(receipt) => {
                if let Err(e) = MessageLogService::record_success(
                    &self.pool,
                    log_id,
                    Utc::now(),
                    receipt.code,
                    Some(&receipt.body),
                ) {
                    // Delivered but unrecorded: requeue so the row
                    // converges to SENT. The redelivered message may call
                    // the API once more; the SENT check bounds it there.
                    tracing::error!(message_id = %log_id, error = %e, "Delivered but failed to record success");
                    Self::requeue(delivery).await;
                    return;
                }
                metrics::counter!(MESSAGES_SENT, "kind" => envelope.message_type.clone()).increment(1);
                tracing::info!(message_id = %log_id, code = receipt.code, "Delivery confirmed");
                Self::ack(delivery).await;
            }
            Err(failed) => {
                let permanent = !failed.error.is_transient();
                let new_status = match MessageLogService::record_failure(
                    &self.pool,
                    log_id,
                    failed.error.code(),
                    failed.error.body(),
                    &failed.error.to_string(),
                    self.policy.max_retries,
                    permanent,
                ) {
                    Ok(status) => status,
                    Err(e) => {
                        tracing::error!(message_id = %log_id, error = %e, "Failed to record failure");
                        Self::requeue(delivery).await;
                        return;
                    }
                };

                match new_status {
                    MessageStatus::Failed => {
                        tracing::warn!(
                            message_id = %log_id,
                            error = %failed.error,
                            permanent,
                            "Delivery failed terminally, dead-lettering"
                        );
                        metrics::counter!(MESSAGES_FAILED, "kind" => envelope.message_type.clone()).increment(1);
                        metrics::counter!(MESSAGES_DEAD_LETTERED).increment(1);
                        Self::reject(delivery).await;
                    }
                    MessageStatus::Retrying => {
                        metrics::counter!(DELIVERY_RETRIES).increment(1);

                        if failed.circuit_open {
                            // Endpoint is unhealthy; hand the message back
                            // without burning the backoff here.
                            tracing::warn!(message_id = %log_id, "Circuit open, requeueing");
                            Self::requeue(delivery).await;
                            return;
                        }

                        let delay = self.policy.delay_with_jitter(prior_retries.max(0) as u32);
                        tracing::info!(
                            message_id = %log_id,
                            error = %failed.error,
                            delay_ms = delay.as_millis() as u64,
                            "Transient failure, requeueing after backoff"
                        );
                        tokio::time::sleep(delay).await;
                        Self::requeue(delivery).await;
                    }
                    other => {
                        tracing::error!(message_id = %log_id, status = %other, "Unexpected status after failure");
                        Self::requeue(delivery).await;
                    }
                }
            }
        }
    }

    async fn ack(delivery: &Delivery) {
        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            tracing::error!(error = %e, "Failed to ack delivery");
        }
    }

    async fn requeue(delivery: &Delivery) {
        let options = BasicNackOptions {
            requeue: true,
            ..Default::default()
        };
        if let Err(e) = delivery.nack(options).await {
            tracing::error!(error = %e, "Failed to nack delivery");
        }
    }

    async fn reject(delivery: &Delivery) {
        let options = BasicRejectOptions { requeue: false };
        if let Err(e) = delivery.reject(options).await {
            tracing::error!(error = %e, "Failed to reject delivery");
        }
    }
}
