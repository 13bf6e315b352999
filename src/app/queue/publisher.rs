use anyhow::Result;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::{BasicProperties, Channel, Connection};

use super::envelope::JobEnvelope;
use super::topology::MESSAGE_EXCHANGE;

const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Publisher with broker confirms. A publish only counts once the broker
/// has written the message; an unconfirmed publish leaves the log row in
/// SCHEDULED for the next enqueuer tick.
pub struct Publisher {
    channel: Channel,
}

impl Publisher {
    pub async fn new(connection: &Connection) -> Result<Self> {
        let channel = connection.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        Ok(Publisher { channel })
    }

    pub async fn publish(&self, envelope: &JobEnvelope) -> Result<()> {
        let payload = envelope.to_bytes()?;
        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
            .with_content_type("application/json".into())
            .with_headers(envelope.headers());

        let confirmation = self
            .channel
            .basic_publish(
                MESSAGE_EXCHANGE,
                &envelope.routing_key(),
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await?
            .await?;

        if let Confirmation::Nack(_) = confirmation {
            anyhow::bail!(
                "broker nacked publish for message {}",
                envelope.message_id
            );
        }

        tracing::debug!(
            message_id = %envelope.message_id,
            routing_key = %envelope.routing_key(),
            "Publish confirmed"
        );

        Ok(())
    }
}
