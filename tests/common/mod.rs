#![allow(dead_code)]

use async_trait::async_trait;
use grid_loadgen::config::{GeneratorConfig, KafkaConfig, PipelineConfig};
use grid_loadgen::generator::{ReadingGenerator, RecordSource};
use grid_loadgen::kafka::BatchSink;
use grid_loadgen::model::Reading;
use grid_loadgen::{Error, Result};
use std::env;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// In-memory stand-in for the Kafka producer.
#[derive(Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Vec<Vec<u8>>>>,
    calls: AtomicUsize,
    fail_every: Option<usize>,
    delay: Option<Duration>,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every `n`th send call (1-based).
    pub fn failing_every(n: usize) -> Self {
        Self {
            fail_every: Some(n),
            ..Self::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self.batches.lock().unwrap().iter().map(Vec::len).collect();
        sizes.sort_unstable();
        sizes
    }

    /// Ids of every accepted reading, sorted.
    pub fn published_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|payload| {
                let reading: Reading = serde_json::from_slice(payload).unwrap();
                reading.id
            })
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl BatchSink for MemorySink {
    async fn send_batch(&self, _topic: &str, messages: Vec<Vec<u8>>) -> Result<usize> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if matches!(self.fail_every, Some(n) if call % n == 0) {
            return Err(Error::Connection(format!("injected failure on call {}", call)));
        }

        let count = messages.len();
        self.batches.lock().unwrap().push(messages);
        Ok(count)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Wraps a generator and cancels `cancel` once `limit` readings were produced.
pub struct CancellingSource {
    inner: ReadingGenerator,
    remaining: u64,
    cancel: CancellationToken,
}

impl CancellingSource {
    pub fn new(inner: ReadingGenerator, limit: u64, cancel: CancellationToken) -> Self {
        Self {
            inner,
            remaining: limit,
            cancel,
        }
    }
}

impl RecordSource for CancellingSource {
    fn next_record(&mut self) -> Reading {
        if self.remaining == 0 {
            self.cancel.cancel();
        } else {
            self.remaining -= 1;
        }
        self.inner.next_record()
    }
}

pub fn seeded_generator(seed: u64) -> ReadingGenerator {
    ReadingGenerator::new(&GeneratorConfig {
        seed: Some(seed),
        ..GeneratorConfig::default()
    })
}

pub fn pipeline_config(target_records: i64, batch_size: usize, workers: usize) -> PipelineConfig {
    PipelineConfig {
        target_records,
        batch_size,
        workers: Some(workers),
        queue_capacity: 50_000,
        progress_every: 1_000,
        progress_interval_secs: 1,
        shutdown_grace_secs: 5,
        ..PipelineConfig::default()
    }
}

/// Kafka settings for tests that need a live broker.
pub fn get_test_kafka_config() -> KafkaConfig {
    KafkaConfig {
        brokers: env::var("TEST_KAFKA_BROKERS")
            .unwrap_or_else(|_| "localhost:9092".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect(),
        topic: format!("grid_loadgen_test_{}", std::process::id()),
        compression: "none".to_string(),
        acks: "all".to_string(),
        linger_ms: 0,
        create_topic: true,
        partitions: 3,
        ..KafkaConfig::default()
    }
}
