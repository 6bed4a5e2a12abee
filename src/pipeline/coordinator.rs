//! Pipeline lifecycle: generation tasks feed the bounded queue, a pool of
//! publishing workers drains it in batches.
//!
//! ```text
//! Initializing -> Running -> Draining -> Stopped
//! ```
//!
//! The pipeline enters `Draining` once every generation task has finished,
//! either because the target count was reached or because the cancellation
//! token fired. Workers keep publishing buffered readings until the queue is
//! empty. After cancellation they get `shutdown_grace` to do so before the
//! remaining tasks are aborted.

use super::batch::BatchAccumulator;
use super::publisher::PublisherAdapter;
use super::queue::{self, Dequeued, QueueConsumer, QueueProducer};
use super::stats::{crossed_step, PipelineStats, RunSummary};
use crate::config::PipelineConfig;
use crate::generator::RecordSource;
use crate::kafka::BatchSink;
use crate::model::Reading;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Publish exactly this many readings, then stop.
    Bounded(u64),
    /// Run until cancelled.
    Continuous,
}

impl RunMode {
    pub fn from_target(target: i64) -> Self {
        if target > 0 {
            RunMode::Bounded(target as u64)
        } else {
            RunMode::Continuous
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initializing,
    Running,
    Draining,
    Stopped,
}

pub struct Pipeline<G, S> {
    config: PipelineConfig,
    mode: RunMode,
    sources: Vec<G>,
    sink: Arc<S>,
    publisher: Arc<PublisherAdapter<S>>,
    stats: Arc<PipelineStats>,
    state: watch::Sender<PipelineState>,
}

impl<G: RecordSource, S: BatchSink> Pipeline<G, S> {
    /// Builds a pipeline around already-constructed sources and sink.
    ///
    /// One generation task is started per source.
    pub fn new(
        config: PipelineConfig,
        topic: impl Into<String>,
        sources: Vec<G>,
        sink: Arc<S>,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::Config(
                "pipeline needs at least one record source".to_string(),
            ));
        }
        config.validate()?;

        let stats = Arc::new(PipelineStats::new());
        let publisher = Arc::new(PublisherAdapter::new(sink.clone(), topic, stats.clone()));
        let (state, _) = watch::channel(PipelineState::Initializing);

        Ok(Self {
            mode: RunMode::from_target(config.target_records),
            config,
            sources,
            sink,
            publisher,
            stats,
            state,
        })
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Runs the pipeline to completion.
    ///
    /// Returns once every task has exited and the sink has been closed. In
    /// continuous mode that only happens after `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<RunSummary> {
        let Pipeline {
            config,
            mode,
            sources,
            sink,
            publisher,
            stats,
            state,
        } = self;

        stats.mark_started();
        let worker_count = config.worker_count();
        info!(
            mode = ?mode,
            workers = worker_count,
            generators = sources.len(),
            batch_size = config.batch_size,
            queue_capacity = config.queue_capacity,
            topic = publisher.topic(),
            "Starting pipeline"
        );

        let (producer, consumer) = queue::bounded::<Reading>(config.queue_capacity);
        state.send_replace(PipelineState::Running);

        let reporter_stop = CancellationToken::new();
        let reporter = match mode {
            RunMode::Continuous => Some(tokio::spawn(report_progress(
                stats.clone(),
                config.progress_interval(),
                reporter_stop.clone(),
            ))),
            RunMode::Bounded(_) => None,
        };

        let claimed = Arc::new(AtomicU64::new(0));
        let mut generators = JoinSet::new();
        for (task_id, source) in sources.into_iter().enumerate() {
            generators.spawn(generate(
                task_id,
                source,
                producer.clone(),
                mode,
                claimed.clone(),
                stats.clone(),
                cancel.clone(),
            ));
        }
        producer.close();

        let progress_every = match mode {
            RunMode::Bounded(_) => Some(config.progress_every),
            RunMode::Continuous => None,
        };
        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            workers.spawn(publish(
                worker_id,
                consumer.clone(),
                publisher.clone(),
                config.batch_size,
                mode,
                progress_every,
                stats.clone(),
                cancel.clone(),
            ));
        }
        drop(consumer);

        tokio::select! {
            _ = join_tasks(&mut generators, "generator") => {
                info!("Generation finished, draining queue");
            }
            _ = cancel.cancelled() => {
                info!("Cancellation requested, draining queue");
            }
        }
        state.send_replace(PipelineState::Draining);
        join_tasks(&mut generators, "generator").await;

        let finished = tokio::select! {
            _ = join_tasks(&mut workers, "worker") => true,
            _ = cancel.cancelled() => false,
        };
        if !finished {
            let grace = config.shutdown_grace();
            if timeout(grace, join_tasks(&mut workers, "worker")).await.is_err() {
                warn!(
                    grace_secs = grace.as_secs(),
                    remaining = workers.len(),
                    "Workers did not drain within the grace period, aborting"
                );
                workers.abort_all();
                join_tasks(&mut workers, "worker").await;
            }
        }

        reporter_stop.cancel();
        if let Some(reporter) = reporter {
            if let Err(e) = reporter.await {
                if e.is_panic() {
                    error!(kind = "reporter", error = %e, "Task panicked");
                }
            }
        }

        if let Err(e) = sink.close().await {
            warn!(error = %e, "Failed to close publisher cleanly");
        }

        state.send_replace(PipelineState::Stopped);

        let summary = stats.summary();
        info!(
            published = summary.published,
            failed = summary.failed,
            skipped = summary.skipped,
            batches = summary.batches,
            "Completed! Published {} readings in {:.2} seconds ({:.2} msgs/sec)",
            summary.published,
            summary.elapsed.as_secs_f64(),
            summary.throughput()
        );

        Ok(summary)
    }
}

async fn join_tasks(tasks: &mut JoinSet<()>, kind: &str) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            if e.is_panic() {
                error!(kind, error = %e, "Task panicked");
            } else {
                debug!(kind, "Task aborted");
            }
        }
    }
}

async fn generate<G: RecordSource>(
    task_id: usize,
    mut source: G,
    producer: QueueProducer<Reading>,
    mode: RunMode,
    claimed: Arc<AtomicU64>,
    stats: Arc<PipelineStats>,
    cancel: CancellationToken,
) {
    match mode {
        RunMode::Bounded(target) => {
            info!(task_id, target_records = target, "Starting bounded generation")
        }
        RunMode::Continuous => info!(task_id, "Starting continuous generation"),
    }

    let mut produced = 0u64;
    while !cancel.is_cancelled() {
        if let RunMode::Bounded(target) = mode {
            if claimed.fetch_add(1, Ordering::Relaxed) >= target {
                break;
            }
        }

        let reading = source.next_record();
        match producer.enqueue(reading, &cancel).await {
            Ok(()) => {
                produced += 1;
                stats.record_enqueued();
            }
            Err(Error::Shutdown) => break,
            Err(e) => {
                warn!(task_id, error = %e, "Stopping generation");
                break;
            }
        }
    }

    if cancel.is_cancelled() {
        info!(task_id, "Stopping generation due to cancellation");
    }
    producer.close();
    info!(task_id, produced, "Generation task completed");
}

#[allow(clippy::too_many_arguments)]
async fn publish<S: BatchSink>(
    worker_id: usize,
    consumer: QueueConsumer<Reading>,
    publisher: Arc<PublisherAdapter<S>>,
    batch_size: usize,
    mode: RunMode,
    progress_every: Option<u64>,
    stats: Arc<PipelineStats>,
    cancel: CancellationToken,
) {
    let mut accumulator = BatchAccumulator::new(batch_size);
    let mut published = 0u64;

    'batches: loop {
        let mut lease = consumer.lease().await;
        loop {
            match lease.dequeue(&cancel).await {
                Dequeued::Item(reading) => {
                    if let Some(batch) = accumulator.add(reading) {
                        drop(lease);
                        published +=
                            submit(worker_id, &publisher, batch, mode, progress_every, &stats)
                                .await;
                        continue 'batches;
                    }
                }
                Dequeued::Drained => break 'batches,
                Dequeued::Cancelled => {
                    debug!(worker_id, "Queue empty after cancellation");
                    break 'batches;
                }
            }
        }
    }

    if let Some(batch) = accumulator.finish() {
        debug!(worker_id, batch_size = batch.len(), "Submitting final partial batch");
        published += submit(worker_id, &publisher, batch, mode, progress_every, &stats).await;
    }

    info!(worker_id, published, "Worker completed");
}

async fn submit<S: BatchSink>(
    worker_id: usize,
    publisher: &PublisherAdapter<S>,
    batch: Vec<Reading>,
    mode: RunMode,
    progress_every: Option<u64>,
    stats: &PipelineStats,
) -> u64 {
    stats.record_batch();
    let batch_size = batch.len();

    match publisher.submit(worker_id, batch).await {
        Ok(sent) => {
            let (previous, total) = stats.record_published(sent as u64);
            if let (Some(step), RunMode::Bounded(target)) = (progress_every, mode) {
                if crossed_step(previous, total, step) {
                    stats.record_progress_report();
                    info!(
                        "Progress: {}/{} readings published ({:.2} msgs/sec)",
                        total,
                        target,
                        total as f64 / stats.elapsed().as_secs_f64()
                    );
                }
            }
            sent as u64
        }
        Err(Error::Publish { records, .. }) => {
            stats.record_failed(records as u64);
            0
        }
        Err(e) => {
            stats.record_failed(batch_size as u64);
            warn!(worker_id, batch_size, error = %e, "Unexpected publish error");
            0
        }
    }
}

async fn report_progress(stats: Arc<PipelineStats>, every: Duration, stop: CancellationToken) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                stats.record_progress_report();
                let summary = stats.summary();
                info!(
                    "Progress: {} readings published ({:.2} msgs/sec)",
                    summary.published,
                    summary.throughput()
                );
            }
        }
    }
}
