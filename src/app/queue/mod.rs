pub mod consumer;
pub mod envelope;
pub mod publisher;
pub mod topology;

use anyhow::Result;
use lapin::{Connection, ConnectionProperties};
use crate::config::broker::BrokerConfig;

pub use consumer::WorkerPool;
pub use envelope::JobEnvelope;
pub use publisher::Publisher;

/// Open the process-wide broker connection. Publisher and consumer each
/// hold their own channel on top of it.
pub async fn connect(config: &BrokerConfig) -> Result<Connection> {
    let connection = Connection::connect(&config.url, ConnectionProperties::default()).await?;
    tracing::info!("Broker connection established");
    Ok(connection)
}
