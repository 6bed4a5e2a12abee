mod common;

use common::{pipeline_config, seeded_generator, MemorySink};
use grid_loadgen::generator::ReadingGenerator;
use grid_loadgen::pipeline::{Pipeline, PipelineState, RunMode};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

async fn run_bounded(
    target: i64,
    batch_size: usize,
    workers: usize,
    sources: Vec<ReadingGenerator>,
    sink: Arc<MemorySink>,
) -> grid_loadgen::pipeline::RunSummary {
    let pipeline = Pipeline::new(
        pipeline_config(target, batch_size, workers),
        "smart-grid-readings",
        sources,
        sink,
    )
    .unwrap();
    assert_eq!(pipeline.mode(), RunMode::Bounded(target as u64));

    timeout(Duration::from_secs(30), pipeline.run(CancellationToken::new()))
        .await
        .expect("bounded run terminates")
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ten_thousand_readings_in_ten_full_batches() {
    let sink = Arc::new(MemorySink::new());
    let pipeline = Pipeline::new(
        pipeline_config(10_000, 1_000, 4),
        "smart-grid-readings",
        vec![seeded_generator(1)],
        sink.clone(),
    )
    .unwrap();
    let state = pipeline.subscribe();
    assert_eq!(*state.borrow(), PipelineState::Initializing);

    let summary = pipeline.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.published, 10_000);
    assert_eq!(summary.enqueued, 10_000);
    assert_eq!(summary.batches, 10);
    assert_eq!(summary.failed, 0);
    assert_eq!(sink.batch_sizes(), vec![1_000; 10]);
    assert_eq!(*state.borrow(), PipelineState::Stopped);
    assert!(sink.is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_final_partial_batch_is_submitted() {
    let sink = Arc::new(MemorySink::new());
    let summary = run_bounded(2_500, 1_000, 4, vec![seeded_generator(2)], sink.clone()).await;

    assert_eq!(summary.published, 2_500);
    assert_eq!(summary.batches, 3);
    assert_eq!(sink.batch_sizes(), vec![500, 1_000, 1_000]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batches_are_full_except_the_last() {
    for batch_size in [1, 7, 333, 5_000] {
        let sink = Arc::new(MemorySink::new());
        let summary =
            run_bounded(1_000, batch_size, 3, vec![seeded_generator(3)], sink.clone()).await;

        let sizes = sink.batch_sizes();
        assert_eq!(summary.published, 1_000);
        assert_eq!(sizes.iter().sum::<usize>(), 1_000);
        assert_eq!(sizes.len(), 1_000usize.div_ceil(batch_size));
        let partial = sizes.iter().filter(|&&s| s != batch_size).count();
        assert!(partial <= 1, "batch size {}: sizes {:?}", batch_size, sizes);
        assert!(sizes.iter().all(|&s| s >= 1 && s <= batch_size));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_pool_size_does_not_change_published_readings() {
    let single = Arc::new(MemorySink::new());
    let summary_single = run_bounded(5_000, 100, 1, vec![seeded_generator(99)], single.clone()).await;

    let pool = Arc::new(MemorySink::new());
    let summary_pool = run_bounded(5_000, 100, 8, vec![seeded_generator(99)], pool.clone()).await;

    assert_eq!(single.published_ids(), pool.published_ids());
    assert_eq!(summary_single.published, 5_000);
    assert_eq!(summary_pool.published, 5_000);
    assert_eq!(
        summary_pool.published as usize,
        pool.batch_sizes().iter().sum::<usize>()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_multiple_generation_tasks_produce_exact_target() {
    let generator = seeded_generator(5);
    let sources: Vec<ReadingGenerator> = (0..3).map(|s| generator.fork(s)).collect();
    let sink = Arc::new(MemorySink::new());

    let summary = run_bounded(1_000, 64, 4, sources, sink.clone()).await;

    assert_eq!(summary.enqueued, 1_000);
    assert_eq!(summary.published, 1_000);
    let ids = sink.published_ids();
    let mut unique = ids.clone();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_batches_are_dropped_not_retried() {
    let sink = Arc::new(MemorySink::failing_every(3));
    let summary = run_bounded(3_000, 100, 2, vec![seeded_generator(6)], sink.clone()).await;

    // 30 batches, every third send fails
    assert_eq!(sink.calls(), 30);
    assert_eq!(summary.batches, 30);
    assert_eq!(summary.failed, 1_000);
    assert_eq!(summary.published, 2_000);
    assert_eq!(
        summary.published as usize,
        sink.batch_sizes().iter().sum::<usize>()
    );
}

#[test]
fn test_pipeline_rejects_missing_sources() {
    let result = Pipeline::<ReadingGenerator, MemorySink>::new(
        pipeline_config(10, 10, 1),
        "smart-grid-readings",
        Vec::new(),
        Arc::new(MemorySink::new()),
    );
    assert!(matches!(result, Err(grid_loadgen::Error::Config(_))));
}

#[test]
fn test_pipeline_rejects_zero_progress_settings() {
    let mut no_interval = pipeline_config(0, 10, 2);
    no_interval.progress_interval_secs = 0;
    let mut no_step = pipeline_config(1_000, 10, 2);
    no_step.progress_every = 0;

    for config in [no_interval, no_step] {
        let result = Pipeline::new(
            config,
            "smart-grid-readings",
            vec![seeded_generator(10)],
            Arc::new(MemorySink::new()),
        );
        assert!(matches!(result, Err(grid_loadgen::Error::Config(_))));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_elapsed_time_starts_when_run_begins() {
    let sink = Arc::new(MemorySink::new());
    let pipeline = Pipeline::new(
        pipeline_config(1_000, 100, 2),
        "smart-grid-readings",
        vec![seeded_generator(11)],
        sink,
    )
    .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    let summary = pipeline.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.published, 1_000);
    assert!(
        summary.elapsed < Duration::from_secs(1),
        "elapsed {:?} includes time before run",
        summary.elapsed
    );
}
