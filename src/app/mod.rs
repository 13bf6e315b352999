pub mod http;
pub mod jobs;
pub mod models;
pub mod queue;
pub mod resilience;
pub mod services;
pub mod strategies;
