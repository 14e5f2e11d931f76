use anyhow::Result;
use clap::Parser;
use sbgrade_core::cli::Args;

fn main() -> Result<()> {
    let args = Args::parse();
    sbgrade_core::init_logging(args.quiet);
    sbgrade_core::run_cli(&args)
}
