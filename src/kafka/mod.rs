pub mod producer;
pub mod serializer;
pub mod topic_manager;


pub use producer::{BatchSink, KafkaProducer};
pub use serializer::{JsonSerializer, RecordEncoder};
pub use topic_manager::TopicManager;
