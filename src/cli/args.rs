use crate::readers::MalformedPolicy;
use crate::writers::ReportFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "brc-processor")]
#[command(about = "Concurrent min/mean/max aggregator for `station;value` measurement files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate a measurements file and print the per-station report
    Process {
        #[arg(short, long, help = "Input measurements file")]
        input: PathBuf,

        #[arg(short, long, help = "Write the report to this file instead of stdout")]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,

        #[command(flatten)]
        pipeline: PipelineArgs,

        #[arg(long, value_enum, help = "How to handle malformed lines")]
        on_malformed: Option<MalformedPolicy>,
    },

    /// Check every line of a measurements file and count malformed ones
    Validate {
        #[arg(short, long, help = "Input measurements file")]
        input: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

/// Pipeline tuning flags shared by all commands. Unset flags fall back to
/// the config file, then `BRC_*` environment variables, then defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    #[arg(short, long, help = "Pipeline config file (TOML, JSON, YAML, ...)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Read the input through a memory map")]
    pub mmap: bool,

    #[arg(short, long, help = "Hide the progress bar")]
    pub quiet: bool,

    #[arg(long, help = "Target chunk size in bytes")]
    pub chunk_size: Option<usize>,

    #[arg(long, help = "Maximum lines per batch")]
    pub batch_size: Option<usize>,

    #[arg(long, help = "Number of chunk splitter workers")]
    pub splitters: Option<usize>,

    #[arg(long, help = "Number of aggregating workers")]
    pub aggregators: Option<usize>,

    #[arg(long, help = "Number of reducer workers")]
    pub reducers: Option<usize>,

    #[arg(
        long,
        help = "Size the worker pools from the number of CPUs",
        conflicts_with_all = ["splitters", "aggregators", "reducers"]
    )]
    pub auto_workers: bool,
}
