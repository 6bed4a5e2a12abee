use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const COMPRESSION_CODECS: &[&str] = &["none", "gzip", "snappy", "lz4", "zstd"];
const ACKS_VALUES: &[&str] = &["0", "1", "all", "-1"];

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub kafka: KafkaConfig,
    pub generator: GeneratorConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub compression: String,
    pub acks: String,
    pub linger_ms: u32,
    pub max_message_bytes: usize,
    pub retries: u32,
    pub message_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub create_topic: bool,
    pub partitions: i32,
    pub replication_factor: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    pub meter_count: usize,
    pub fault_probability: f64,
    pub offline_probability: f64,
    pub peak_load_modeling: bool,
    pub seed: Option<u64>,
    pub regions: Vec<Region>,
}

/// A geographic area meters are placed in.
///
/// `meter_share` is the fraction of meters assigned to the region; shares
/// are cumulative in declaration order.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Region {
    pub name: String,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_long: f64,
    pub max_long: f64,
    pub meter_share: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Records to publish before stopping; zero or negative runs until cancelled.
    pub target_records: i64,
    pub batch_size: usize,
    /// Publishing workers; defaults to the available parallelism.
    pub workers: Option<usize>,
    pub generator_tasks: usize,
    pub queue_capacity: usize,
    pub progress_every: u64,
    pub progress_interval_secs: u64,
    pub shutdown_grace_secs: u64,
}

impl Config {
    /// Loads `path` (if present), then `GRID_LOADGEN_*` variables, then the
    /// legacy `KAFKA_*` variables. Unknown keys are rejected.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path.as_ref(), None)?;
        config.apply_legacy_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// `env` replaces the process environment when set.
    fn load(path: &Path, env: Option<config::Map<String, String>>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("GRID_LOADGEN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("kafka.brokers")
                    .source(env),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Applies the `KAFKA_BROKERS` and `KAFKA_TOPIC` overrides.
    ///
    /// `KAFKA_BROKERS` accepts either a JSON list (`["a:9092","b:9092"]`) or
    /// a comma-separated string.
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(brokers) = lookup("KAFKA_BROKERS").filter(|s| !s.trim().is_empty()) {
            self.kafka.brokers = match serde_json::from_str::<Vec<String>>(&brokers) {
                Ok(list) => list,
                Err(_) => brokers
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            };
        }

        if let Some(topic) = lookup("KAFKA_TOPIC").filter(|s| !s.trim().is_empty()) {
            self.kafka.topic = topic;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.kafka.validate()?;
        self.generator.validate()?;
        self.pipeline.validate()
    }
}

impl KafkaConfig {
    fn validate(&self) -> Result<()> {
        if self.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(Error::Config("kafka.brokers must not be empty".to_string()));
        }
        if self.topic.trim().is_empty() {
            return Err(Error::Config("kafka.topic must not be empty".to_string()));
        }
        if !COMPRESSION_CODECS.contains(&self.compression.as_str()) {
            return Err(Error::Config(format!(
                "kafka.compression '{}' is not one of {:?}",
                self.compression, COMPRESSION_CODECS
            )));
        }
        if !ACKS_VALUES.contains(&self.acks.as_str()) {
            return Err(Error::Config(format!(
                "kafka.acks '{}' is not one of {:?}",
                self.acks, ACKS_VALUES
            )));
        }
        if self.create_topic && (self.partitions < 1 || self.replication_factor < 1) {
            return Err(Error::Config(
                "kafka.partitions and kafka.replication_factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl GeneratorConfig {
    fn validate(&self) -> Result<()> {
        if self.meter_count == 0 {
            return Err(Error::Config("generator.meter_count must be at least 1".to_string()));
        }
        for (name, p) in [
            ("fault_probability", self.fault_probability),
            ("offline_probability", self.offline_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::Config(format!(
                    "generator.{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        if self.regions.is_empty() {
            return Err(Error::Config("generator.regions must not be empty".to_string()));
        }
        let total_share: f64 = self.regions.iter().map(|r| r.meter_share).sum();
        if !(total_share > 0.0) {
            return Err(Error::Config(
                "generator.regions meter_share must add up to more than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl PipelineConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("pipeline.batch_size must be at least 1".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("pipeline.queue_capacity must be at least 1".to_string()));
        }
        if self.workers == Some(0) {
            return Err(Error::Config("pipeline.workers must be at least 1".to_string()));
        }
        if self.generator_tasks == 0 {
            return Err(Error::Config(
                "pipeline.generator_tasks must be at least 1".to_string(),
            ));
        }
        if self.progress_every == 0 || self.progress_interval_secs == 0 {
            return Err(Error::Config("pipeline progress reporting must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: "smart-grid-readings".to_string(),
            compression: "lz4".to_string(),
            acks: "1".to_string(),
            linger_ms: 20,
            max_message_bytes: 2_000_000,
            retries: 3,
            message_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            create_topic: false,
            partitions: 3,
            replication_factor: 1,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            meter_count: 100,
            fault_probability: 0.01,
            offline_probability: 0.005,
            peak_load_modeling: true,
            seed: None,
            regions: default_regions(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_records: 0,
            batch_size: 5000,
            workers: None,
            generator_tasks: 1,
            queue_capacity: 50_000,
            progress_every: 100_000,
            progress_interval_secs: 5,
            shutdown_grace_secs: 30,
        }
    }
}

fn default_regions() -> Vec<Region> {
    vec![
        Region {
            name: "Urban".to_string(),
            min_lat: 40.7128,
            max_lat: 40.8128,
            min_long: -74.0060,
            max_long: -73.9060,
            meter_share: 0.6,
        },
        Region {
            name: "Suburban".to_string(),
            min_lat: 40.6128,
            max_lat: 40.7128,
            min_long: -74.1060,
            max_long: -74.0060,
            meter_share: 0.3,
        },
        Region {
            name: "Rural".to_string(),
            min_lat: 40.5128,
            max_lat: 40.6128,
            min_long: -74.2060,
            max_long: -74.1060,
            meter_share: 0.1,
        },
    ]
}
