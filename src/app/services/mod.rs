pub mod delivery_service;
pub mod idempotency;
pub mod message_log_service;
pub mod metrics;
pub mod timezone_service;
pub mod user_service;
