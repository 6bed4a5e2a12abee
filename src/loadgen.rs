use crate::generator::ReadingGenerator;
use crate::kafka::{KafkaProducer, TopicManager};
use crate::pipeline::{Pipeline, RunSummary};
use crate::{Config, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Wires configuration, generator, Kafka producer and pipeline together.
pub struct LoadGenerator {
    config: Config,
}

impl LoadGenerator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs one load generation session.
    ///
    /// Everything that can fail at startup (configuration, topic creation,
    /// broker connection) happens before any task is spawned.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunSummary> {
        let config = &self.config;
        config.validate()?;

        if config.kafka.create_topic {
            TopicManager::new(&config.kafka)?
                .ensure_topic_exists(&config.kafka.topic)
                .await?;
        }

        let producer = Arc::new(KafkaProducer::connect(&config.kafka).await?);

        let generator = ReadingGenerator::new(&config.generator);
        info!(
            meters = generator.meters().len(),
            peak_load_modeling = config.generator.peak_load_modeling,
            "Meter profiles initialized"
        );
        let sources: Vec<ReadingGenerator> = (0..config.pipeline.generator_tasks)
            .map(|stream| generator.fork(stream as u64))
            .collect();

        let pipeline = Pipeline::new(
            config.pipeline.clone(),
            config.kafka.topic.clone(),
            sources,
            producer,
        )?;

        pipeline.run(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn test_invalid_config_fails_before_connecting() {
        let mut config = Config::default();
        config.pipeline.batch_size = 0;

        let result = LoadGenerator::new(config).run(CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_broker_aborts_startup() {
        let mut config = Config::default();
        config.kafka.brokers = vec!["127.0.0.1:1".to_string()];
        config.kafka.connect_timeout_ms = 1_500;
        config.pipeline.target_records = 10;

        let result = LoadGenerator::new(config).run(CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::Connection(_))));
    }
}
