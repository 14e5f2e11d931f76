use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sbgrade",
    about = "Grade a Scratch 3 project against a reference solution."
)]
pub struct Args {
    #[arg(value_name = "SUBMISSION", help = "Submitted .sb3 archive or project.json.")]
    pub submission: PathBuf,

    #[arg(value_name = "REFERENCE", help = "Reference .sb3 archive or project.json.")]
    pub reference: PathBuf,

    #[arg(
        long,
        value_name = "FILE",
        help = "JSON array of hand-curated requirements; skips extraction from the reference."
    )]
    pub requirements: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "JSON file with grading options.")]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        help = "Use exact variable matching instead of greedy for small programs."
    )]
    pub exact_matching: bool,

    #[arg(short, long, value_name = "FILE", help = "Write the report to this path instead of stdout.")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Print a plain-text report instead of JSON.")]
    pub text: bool,

    #[arg(short, long, help = "Suppress progress lines and warnings.")]
    pub quiet: bool,
}
