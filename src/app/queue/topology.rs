use anyhow::Result;
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, ExchangeKind};

pub const MESSAGE_EXCHANGE: &str = "heyday.messages";
pub const MESSAGE_QUEUE: &str = "heyday.messages.main";
pub const DEAD_LETTER_EXCHANGE: &str = "heyday.messages.dlx";
pub const DEAD_LETTER_QUEUE: &str = "heyday.messages.dlq";
pub const ROUTING_KEY_PATTERN: &str = "message.*";
pub const DEAD_LETTER_ROUTING_KEY: &str = "dead-letter";

/// Declare the full topology. Idempotent; every process runs it at startup.
///
/// Both queues are quorum queues, so a single broker node failing loses
/// nothing. Rejects without requeue on the main queue dead-letter into the
/// DLQ, which has no onward DLX of its own.
pub async fn declare(channel: &Channel) -> Result<()> {
    let durable = ExchangeDeclareOptions {
        durable: true,
        ..Default::default()
    };

    channel
        .exchange_declare(
            DEAD_LETTER_EXCHANGE,
            ExchangeKind::Direct,
            durable.clone(),
            FieldTable::default(),
        )
        .await?;

    let mut dlq_args = FieldTable::default();
    dlq_args.insert("x-queue-type".into(), AMQPValue::LongString("quorum".into()));
    channel
        .queue_declare(
            DEAD_LETTER_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            dlq_args,
        )
        .await?;
    channel
        .queue_bind(
            DEAD_LETTER_QUEUE,
            DEAD_LETTER_EXCHANGE,
            DEAD_LETTER_ROUTING_KEY,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    channel
        .exchange_declare(
            MESSAGE_EXCHANGE,
            ExchangeKind::Topic,
            durable,
            FieldTable::default(),
        )
        .await?;

    let mut main_args = FieldTable::default();
    main_args.insert("x-queue-type".into(), AMQPValue::LongString("quorum".into()));
    main_args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(DEAD_LETTER_EXCHANGE.into()),
    );
    main_args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(DEAD_LETTER_ROUTING_KEY.into()),
    );
    channel
        .queue_declare(
            MESSAGE_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            main_args,
        )
        .await?;
    channel
        .queue_bind(
            MESSAGE_QUEUE,
            MESSAGE_EXCHANGE,
            ROUTING_KEY_PATTERN,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    tracing::info!(
        exchange = MESSAGE_EXCHANGE,
        queue = MESSAGE_QUEUE,
        dlq = DEAD_LETTER_QUEUE,
        "Broker topology declared"
    );

    Ok(())
}

/// Current depth of a queue via a passive declare.
pub async fn queue_depth(channel: &Channel, queue: &str) -> Result<u32> {
    let state = channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                passive: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    Ok(state.message_count())
}
