use crate::{config::KafkaConfig, Error, Result};
use async_trait::async_trait;
use futures::future::join_all;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{debug, info};

/// Capability the pipeline publishes through.
///
/// `send_batch` reports how many messages the broker accepted. A returned
/// error means the call as a whole failed; callers do not retry it.
#[async_trait]
pub trait BatchSink: Send + Sync + 'static {
    async fn send_batch(&self, topic: &str, messages: Vec<Vec<u8>>) -> Result<usize>;

    async fn close(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
    send_timeout: Duration,
    close_timeout: Duration,
}

impl KafkaProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .set("compression.type", &config.compression)
            .set("acks", &config.acks)
            .set("linger.ms", config.linger_ms.to_string())
            .set("message.max.bytes", config.max_message_bytes.to_string())
            .set("message.send.max.retries", config.retries.to_string())
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .set("queue.buffering.max.messages", "100000")
            .create()
            .map_err(Error::Kafka)?;

        Ok(Self {
            producer,
            send_timeout: Duration::from_millis(config.message_timeout_ms),
            close_timeout: config.connect_timeout().max(Duration::from_secs(5)),
        })
    }

    /// Creates the producer and checks that at least one broker answers a
    /// metadata request within the connect timeout.
    pub async fn connect(config: &KafkaConfig) -> Result<Self> {
        let kafka = Self::new(config)?;
        let timeout = config.connect_timeout();
        let producer = kafka.producer.clone();

        let metadata = tokio::task::spawn_blocking(move || {
            producer.client().fetch_metadata(None, timeout)
        })
        .await
        .map_err(|e| Error::Connection(format!("metadata task failed: {}", e)))?
        .map_err(|e| {
            Error::Connection(format!(
                "cannot reach brokers {}: {}",
                config.bootstrap_servers(),
                e
            ))
        })?;

        if metadata.brokers().is_empty() {
            return Err(Error::Connection(format!(
                "no brokers available at {}",
                config.bootstrap_servers()
            )));
        }

        info!(
            brokers = metadata.brokers().len(),
            topics = metadata.topics().len(),
            "Connected to Kafka"
        );
        Ok(kafka)
    }
}

#[async_trait]
impl BatchSink for KafkaProducer {
    async fn send_batch(&self, topic: &str, messages: Vec<Vec<u8>>) -> Result<usize> {
        let count = messages.len();
        let deliveries = messages.iter().map(|payload| {
            let record = FutureRecord::<(), _>::to(topic).payload(payload.as_slice());
            self.producer.send(record, Timeout::After(self.send_timeout))
        });

        let mut first_error = None;
        for result in join_all(deliveries).await {
            if let Err((e, _)) = result {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(Error::Kafka(e)),
            None => {
                debug!(topic, count, "Batch delivered");
                Ok(count)
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let producer = self.producer.clone();
        let timeout = self.close_timeout;

        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| Error::Connection(format!("flush task failed: {}", e)))??;

        info!("Kafka producer flushed");
        Ok(())
    }
}
