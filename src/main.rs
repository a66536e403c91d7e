use brc_processor::cli::{run, Cli};
use brc_processor::error::Result;
use brc_processor::utils::logging::init_logging;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;
    run(cli)
}
