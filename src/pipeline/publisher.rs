use super::stats::PipelineStats;
use crate::kafka::{BatchSink, JsonSerializer, RecordEncoder};
use crate::model::Reading;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Encodes a batch and hands it to the broker in a single call.
///
/// Records that fail to encode are skipped and counted; the rest of the
/// batch still goes out. A failed send is returned as [`Error::Publish`]
/// and is never retried here.
pub struct PublisherAdapter<S, E = JsonSerializer> {
    sink: Arc<S>,
    encoder: E,
    topic: String,
    stats: Arc<PipelineStats>,
}

impl<S: BatchSink> PublisherAdapter<S> {
    pub fn new(sink: Arc<S>, topic: impl Into<String>, stats: Arc<PipelineStats>) -> Self {
        Self::with_encoder(sink, JsonSerializer, topic, stats)
    }
}

impl<S: BatchSink, E: RecordEncoder> PublisherAdapter<S, E> {
    pub fn with_encoder(
        sink: Arc<S>,
        encoder: E,
        topic: impl Into<String>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            sink,
            encoder,
            topic: topic.into(),
            stats,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publishes `batch`, returning how many records the broker accepted.
    pub async fn submit(&self, worker_id: usize, batch: Vec<Reading>) -> Result<usize> {
        let batch_size = batch.len();
        let mut messages = Vec::with_capacity(batch_size);

        for reading in &batch {
            match self.encoder.encode(reading) {
                Ok(payload) => messages.push(payload),
                Err(e) => {
                    warn!(
                        worker_id,
                        reading_id = %reading.id,
                        error = %e,
                        "Skipping reading that failed to encode"
                    );
                    self.stats.record_skipped(1);
                }
            }
        }
        drop(batch);

        if messages.is_empty() {
            return Ok(0);
        }

        let records = messages.len();
        match self.sink.send_batch(&self.topic, messages).await {
            Ok(sent) => {
                debug!(worker_id, batch_size, sent, "Published batch");
                Ok(sent)
            }
            Err(e) => {
                warn!(
                    worker_id,
                    batch_size = records,
                    error = %e,
                    "Failed to publish batch"
                );
                Err(Error::Publish {
                    records,
                    source: Box::new(e),
                })
            }
        }
    }
}
