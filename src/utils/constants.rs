/// Fixed-point scale of measurement values (one decimal digit)
pub const VALUE_SCALE: i32 = 10;

/// Record layout
pub const FIELD_SEPARATOR: u8 = b';';
pub const RECORD_TERMINATOR: u8 = b'\n';

/// Pipeline defaults
pub const DEFAULT_CHUNK_SIZE: usize = 50 * 1024 * 1024; // 50MB
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024 * 1024; // 1GB, keep in sync with PipelineConfig
pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_SPLITTER_WORKERS: usize = 2;
pub const DEFAULT_AGGREGATOR_WORKERS: usize = 3;
pub const DEFAULT_REDUCER_WORKERS: usize = 3;

/// Bounded queue capacities between stages
pub const DEFAULT_CHUNK_QUEUE_CAPACITY: usize = 20;
pub const DEFAULT_BATCH_QUEUE_CAPACITY: usize = 150;
pub const DEFAULT_PARTIAL_QUEUE_CAPACITY: usize = 150;

/// I/O defaults
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB
pub const DEFAULT_STATION_CAPACITY: usize = 512;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "BRC";
