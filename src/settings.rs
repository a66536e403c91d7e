use crate::error::Result;
use crate::readers::line_parser::MalformedPolicy;
use crate::utils::constants::*;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Tuning knobs of the pipeline: sizes, worker counts, queue capacities
/// and the malformed-record policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    /// Target chunk size in bytes, at most 1 GiB
    #[validate(range(min = 1, max = 1073741824))]
    pub chunk_size: usize,

    /// Maximum lines per batch
    #[validate(range(min = 1))]
    pub batch_size: usize,

    #[validate(range(min = 1))]
    pub splitter_workers: usize,

    #[validate(range(min = 1))]
    pub aggregator_workers: usize,

    #[validate(range(min = 1))]
    pub reducer_workers: usize,

    #[validate(range(min = 1))]
    pub chunk_queue_capacity: usize,

    #[validate(range(min = 1))]
    pub batch_queue_capacity: usize,

    #[validate(range(min = 1))]
    pub partial_queue_capacity: usize,

    pub malformed_policy: MalformedPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            splitter_workers: DEFAULT_SPLITTER_WORKERS,
            aggregator_workers: DEFAULT_AGGREGATOR_WORKERS,
            reducer_workers: DEFAULT_REDUCER_WORKERS,
            chunk_queue_capacity: DEFAULT_CHUNK_QUEUE_CAPACITY,
            batch_queue_capacity: DEFAULT_BATCH_QUEUE_CAPACITY,
            partial_queue_capacity: DEFAULT_PARTIAL_QUEUE_CAPACITY,
            malformed_policy: MalformedPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load defaults, then the optional config file, then `BRC_*`
    /// environment variables. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: PipelineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Size the worker pools for `cpus` cores: a quarter each for splitting
    /// and reducing, the rest for aggregation.
    pub fn scaled_to(mut self, cpus: usize) -> Self {
        let quarter = (cpus / 4).max(1);
        self.splitter_workers = quarter;
        self.reducer_workers = quarter;
        self.aggregator_workers = cpus.saturating_sub(2 * quarter).max(1);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_workers(mut self, splitters: usize, aggregators: usize, reducers: usize) -> Self {
        self.splitter_workers = splitters;
        self.aggregator_workers = aggregators;
        self.reducer_workers = reducers;
        self
    }

    pub fn with_queue_capacities(mut self, chunks: usize, batches: usize, partials: usize) -> Self {
        self.chunk_queue_capacity = chunks;
        self.batch_queue_capacity = batches;
        self.partial_queue_capacity = partials;
        self
    }

    pub fn with_malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.malformed_policy = policy;
        self
    }
}
