pub mod enqueue_job;
pub mod pre_calculate_job;
pub mod recovery_sweep_job;
pub mod scheduler;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use enqueue_job::EnqueueJob;
pub use pre_calculate_job::PreCalculateJob;
pub use recovery_sweep_job::RecoverySweepJob;
pub use scheduler::JobScheduler;

/// A job the scheduler fires on a cron cadence. Ticks never propagate
/// errors; each implementation logs and swallows its own failures so one
/// bad row cannot kill the loop.
#[async_trait]
pub trait PeriodicJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn tick(&self, now: DateTime<Utc>);
}
