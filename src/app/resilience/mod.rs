pub mod circuit_breaker;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use crate::app::services::delivery_service::{DeliveryError, DeliveryReceipt, DeliveryService};

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use retry::RetryPolicy;

/// One guarded attempt against the delivery API: circuit check, call
/// timeout, breaker bookkeeping. Attempt scheduling (backoff, requeue, the
/// retry budget on the log row) stays with the worker.
pub struct DeliveryEnvelope {
    delivery: DeliveryService,
    breaker: Arc<CircuitBreaker>,
    call_timeout: Duration,
}

impl DeliveryEnvelope {
    pub fn new(
        delivery: DeliveryService,
        breaker: Arc<CircuitBreaker>,
        call_timeout: Duration,
    ) -> Self {
        DeliveryEnvelope {
            delivery,
            breaker,
            call_timeout,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub async fn attempt(
        &self,
        email: &str,
        message: &str,
    ) -> Result<DeliveryReceipt, AttemptError> {
        if !self.breaker.try_acquire().await {
            return Err(AttemptError {
                error: DeliveryError::transient("circuit breaker is open"),
                circuit_open: true,
            });
        }

        let outcome = tokio::time::timeout(self.call_timeout, self.delivery.send(email, message))
            .await
            .unwrap_or_else(|_| {
                Err(DeliveryError::transient(format!(
                    "delivery call exceeded {:?}",
                    self.call_timeout
                )))
            });

        match outcome {
            Ok(receipt) => {
                self.breaker.record_success().await;
                Ok(receipt)
            }
            Err(error) => {
                // Permanent failures say nothing about endpoint health; only
                // transient ones feed the breaker.
                if error.is_transient() {
                    self.breaker.record_failure().await;
                }
                Err(AttemptError {
                    error,
                    circuit_open: false,
                })
            }
        }
    }
}

/// A failed attempt, flagged when it was a circuit fast-fail rather than a
/// real call.
#[derive(Debug)]
pub struct AttemptError {
    pub error: DeliveryError,
    pub circuit_open: bool,
}
