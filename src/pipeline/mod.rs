pub mod batch;
pub mod coordinator;
pub mod publisher;
pub mod queue;
pub mod stats;

pub use batch::BatchAccumulator;
pub use coordinator::{Pipeline, PipelineState, RunMode};
pub use publisher::PublisherAdapter;
pub use queue::{bounded, Dequeued, QueueConsumer, QueueLease, QueueProducer};
pub use stats::{PipelineStats, RunSummary};
