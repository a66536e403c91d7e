pub mod aggregator;
pub mod chunk_splitter;
pub mod pipeline;
pub mod reducer;

pub use aggregator::{AggregateStats, AggregatingWorker};
pub use chunk_splitter::{ChunkSplitter, LineBatch, SplitStats};
pub use pipeline::Pipeline;
pub use reducer::{merge_accumulators, Reducer};
