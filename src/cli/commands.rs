use crate::cli::args::{Cli, Commands, PipelineArgs};
use crate::error::{ProcessingError, Result};
use crate::models::Aggregate;
use crate::processors::Pipeline;
use crate::readers::MalformedPolicy;
use crate::settings::PipelineConfig;
use crate::utils::progress::ProgressReporter;
use crate::writers::ReportWriter;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Execute a parsed command line. Logging is set up by the caller.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Process {
            input,
            output,
            format,
            pipeline,
            on_malformed,
        } => {
            let mut config = pipeline.resolve()?;
            if let Some(policy) = on_malformed {
                config = config.with_malformed_policy(policy);
            }

            let aggregate = aggregate_file(&input, &pipeline, config)?;

            let writer = ReportWriter::new(format);
            match output {
                Some(path) => {
                    writer.write_file(&aggregate, &path)?;
                    info!(path = %path.display(), "Report written");
                }
                None => writer.write_to(&aggregate, std::io::stdout().lock())?,
            }
        }

        Commands::Validate { input, pipeline } => {
            let config = pipeline
                .resolve()?
                .with_malformed_policy(MalformedPolicy::Skip);

            let aggregate = aggregate_file(&input, &pipeline, config)?;

            println!("Records:         {}", aggregate.total_records());
            println!("Stations:        {}", aggregate.len());
            println!("Malformed lines: {}", aggregate.skipped_lines);

            if aggregate.skipped_lines > 0 {
                return Err(ProcessingError::MalformedInput {
                    count: aggregate.skipped_lines,
                });
            }
            println!("All lines match the record format");
        }
    }

    Ok(())
}

impl PipelineArgs {
    /// Merge the layered configuration with the flags given on the
    /// command line. Flags win.
    pub fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::load(self.config.as_deref())?;

        if let Some(chunk_size) = self.chunk_size {
            config = config.with_chunk_size(chunk_size);
        }
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        if self.auto_workers {
            config = config.scaled_to(num_cpus::get());
        }
        if let Some(splitters) = self.splitters {
            config.splitter_workers = splitters;
        }
        if let Some(aggregators) = self.aggregators {
            config.aggregator_workers = aggregators;
        }
        if let Some(reducers) = self.reducers {
            config.reducer_workers = reducers;
        }

        Ok(config)
    }
}

fn aggregate_file(input: &Path, args: &PipelineArgs, config: PipelineConfig) -> Result<Aggregate> {
    let total_bytes = std::fs::metadata(input)?.len();
    let pipeline = Pipeline::new(config)?;
    let message = format!("Reading {}", input.display());
    // Pipes and special files report no length
    let progress = if total_bytes > 0 {
        ProgressReporter::new(total_bytes, &message, args.quiet)
    } else {
        ProgressReporter::new_spinner(&message, args.quiet)
    };

    let started = Instant::now();
    let aggregate = if args.mmap {
        pipeline.run_mmap(input, Some(&progress))?
    } else {
        pipeline.run_file(input, Some(&progress))?
    };
    let elapsed = started.elapsed();
    progress.finish_with_message(&format!("Aggregated {} stations", aggregate.len()));

    let records = aggregate.total_records();
    let seconds = elapsed.as_secs_f64();
    let throughput = if seconds > 0.0 {
        records as f64 / seconds
    } else {
        0.0
    };
    info!(
        records,
        stations = aggregate.len(),
        records_per_sec = throughput as u64,
        "Execution time: {:.2?}",
        elapsed
    );

    Ok(aggregate)
}
