//! AMQP publisher: one durable queue on the default exchange, persistent delivery
//! and publisher confirms so a returned `Ok` means the broker took the message.

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::publisher_confirm::Confirmation;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};

use crate::broker::{Broker, BrokerError, ConsumerNotifier, FragmentMessage};

const PERSISTENT: u8 = 2;

#[derive(Debug, Clone)]
pub struct AmqpConfig {
    pub url: String,
    /// Routing key; the queue is declared under the same name.
    pub queue: String,
}

pub struct AmqpBroker {
    connection: Connection,
    channel: Channel,
    queue: String,
    notifier: ConsumerNotifier,
}

impl AmqpBroker {
    pub async fn connect(config: AmqpConfig, notifier: ConsumerNotifier) -> Result<Self, BrokerError> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        tracing::info!("connected to AMQP broker, publishing to queue {}", config.queue);

        Ok(Self {
            connection,
            channel,
            queue: config.queue,
            notifier,
        })
    }
}

fn header_table(message: &FragmentMessage) -> FieldTable {
    let mut table = FieldTable::default();
    for (key, value) in message.headers() {
        table.insert(key.into(), AMQPValue::LongString(value.into()));
    }
    table
}

fn properties(message: &FragmentMessage) -> BasicProperties {
    let props = BasicProperties::default()
        .with_timestamp(message.timestamp.timestamp().max(0) as u64)
        .with_headers(header_table(message));
    if message.durable {
        props.with_delivery_mode(PERSISTENT)
    } else {
        props
    }
}

/// A publish only counts once the broker acked it and did not hand it back as
/// unroutable (`mandatory` publishes come back with the ack when no queue matches).
fn check_confirmation(confirmation: Confirmation) -> Result<(), String> {
    match confirmation {
        Confirmation::Ack(None) | Confirmation::NotRequested => Ok(()),
        Confirmation::Ack(Some(returned)) => Err(format!(
            "returned as unroutable ({} {})",
            returned.reply_code, returned.reply_text
        )),
        Confirmation::Nack(_) => Err("refused by the broker".to_string()),
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn publish(&self, message: FragmentMessage) -> Result<(), BrokerError> {
        let confirmation = self
            .channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions {
                    mandatory: true,
                    ..Default::default()
                },
                &message.payload,
                properties(&message),
            )
            .await?
            .await?;

        check_confirmation(confirmation).map_err(|reason| {
            BrokerError::from(format!(
                "fragment {} of {} was not queued: {reason}",
                message.sequence, message.file_id
            ))
        })
    }

    async fn notify_consumers(&self) {
        self.notifier.notify_all().await;
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.channel.close(200, "shutdown").await?;
        self.connection.close(200, "shutdown").await?;
        tracing::info!("closed AMQP connection for queue {}", self.queue);
        Ok(())
    }
}
