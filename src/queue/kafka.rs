//! Kafka queue adapter with manual offset commits.

use async_trait::async_trait;
use futures_util::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message as _;
use rdkafka::TopicPartitionList;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::KafkaConfig;
use crate::error::WebhookError;
use crate::queue::{Message, Queue};

/// Kafka-backed [`Queue`] over a stream consumer.
///
/// Auto-commit is disabled; offsets advance only through [`Queue::commit`],
/// after the worker has persisted every attempt for the message.
pub struct KafkaQueue {
    consumer: StreamConsumer,
}

impl KafkaQueue {
    /// Create a consumer and subscribe to the configured topics.
    pub fn new(config: &KafkaConfig) -> Result<Self, WebhookError> {
        let mut client_config = ClientConfig::new();

        client_config
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("client.id", &config.client_id)
            .set("group.id", &config.group_id)
            .set("security.protocol", config.security_protocol.as_str())
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", "30000");

        if let Some(sasl) = &config.sasl {
            client_config
                .set("sasl.mechanism", sasl.mechanism.as_str())
                .set("sasl.username", &sasl.username)
                .set("sasl.password", &sasl.password);
        }

        let consumer: StreamConsumer =
            client_config
                .create()
                .map_err(|e| WebhookError::Queue(format!(
                    "connection to broker {} failed: {e}",
                    config.bootstrap_servers
                )))?;

        let topics: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topics)
            .map_err(|e| WebhookError::Queue(format!("subscribe failed: {e}")))?;

        info!(
            group_id = %config.group_id,
            bootstrap_servers = %config.bootstrap_servers,
            topics = ?config.topics,
            "Kafka queue consumer created"
        );

        Ok(Self { consumer })
    }
}

#[async_trait]
impl Queue for KafkaQueue {
    async fn fetch_next(&self, cancel: &CancellationToken) -> Result<Message, WebhookError> {
        let mut stream = self.consumer.stream();

        tokio::select! {
            () = cancel.cancelled() => {
                Err(WebhookError::Queue("cancelled while fetching".to_string()))
            }
            next = stream.next() => match next {
                Some(Ok(borrowed)) => {
                    let payload = borrowed.payload().unwrap_or_default().to_vec();
                    Ok(Message {
                        topic: borrowed.topic().to_string(),
                        offset: borrowed.offset(),
                        partition: borrowed.partition(),
                        payload,
                    })
                }
                Some(Err(e)) => Err(WebhookError::Queue(format!("fetch failed: {e}"))),
                None => Err(WebhookError::Queue("consumer stream ended".to_string())),
            }
        }
    }

    async fn commit(&self, message: &Message) -> Result<(), WebhookError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            rdkafka::Offset::Offset(message.offset + 1),
        )
        .map_err(|e| WebhookError::Queue(format!("commit failed: {e}")))?;

        self.consumer
            .commit(&tpl, rdkafka::consumer::CommitMode::Async)
            .map_err(|e| WebhookError::Queue(format!("commit failed: {e}")))?;

        Ok(())
    }

    async fn close(&self) -> Result<(), WebhookError> {
        self.consumer.unsubscribe();
        Ok(())
    }
}
