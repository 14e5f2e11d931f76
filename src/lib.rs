pub mod checker;
pub mod engine;
pub mod error;
pub mod extras;
pub mod feedback;
pub mod indexer;
pub mod mapper;
pub mod normalize;
pub mod opcode;
pub mod options;
pub mod profile;
pub mod project;
pub mod requirements;
pub mod score;

#[cfg(not(target_arch = "wasm32"))]
pub mod archive;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(all(target_arch = "wasm32", feature = "wasm-bindings"))]
pub mod wasm;

pub use engine::{evaluate, EvaluationResult, Grader};
pub use error::GradeError;
pub use feedback::{Feedback, FeedbackDetail, Severity};
pub use options::GradingOptions;
pub use requirements::Requirement;

#[cfg(not(target_arch = "wasm32"))]
use anyhow::Result;
#[cfg(not(target_arch = "wasm32"))]
use std::path::{Path, PathBuf};

/// Installs the stderr log subscriber. `RUST_LOG` overrides the default filter.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging(quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if quiet { "error" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when embedded in tests.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(not(target_arch = "wasm32"))]
pub fn run_cli(args: &cli::Args) -> Result<()> {
    let total_stages = 4
        + usize::from(args.requirements.is_some())
        + usize::from(args.config.is_some());
    let progress = CliProgress::new("Grade", total_stages, args.quiet);
    let mut stage = 0usize;

    stage += 1;
    progress.emit(stage, "Reading submission");
    let submitted = archive::load_project(&canonicalize_file(&args.submission)?)?;

    stage += 1;
    progress.emit(stage, "Reading reference");
    let reference = archive::load_project(&canonicalize_file(&args.reference)?)?;

    let requirements = match &args.requirements {
        Some(path) => {
            stage += 1;
            progress.emit(stage, "Reading requirements");
            Some(archive::load_requirements(&canonicalize_file(path)?)?)
        }
        None => None,
    };

    let mut options = match &args.config {
        Some(path) => {
            stage += 1;
            progress.emit(stage, "Reading grading options");
            archive::load_options(&canonicalize_file(path)?)?
        }
        None => GradingOptions::default(),
    };
    if args.exact_matching {
        options.exact_matching = true;
    }

    stage += 1;
    progress.emit(stage, "Grading");
    let result = Grader::new(options).evaluate(&submitted, &reference, requirements.as_deref());

    stage += 1;
    progress.emit(stage, "Writing report");
    let report = if args.text {
        render_text_report(&result)
    } else {
        serde_json::to_string_pretty(&result)?
    };
    match &args.output {
        Some(path) => std::fs::write(path, format!("{}\n", report))?,
        None => println!("{}", report),
    }

    Ok(())
}

/// Plain-text rendering of a result, one detail per line.
pub fn render_text_report(result: &EvaluationResult) -> String {
    let verdict = if result.is_correct { "PASS" } else { "FAIL" };
    let mut out = format!("Score: {}/100 ({})\n{}\n", result.score, verdict, result.feedback.summary);
    for detail in &result.feedback.details {
        out.push_str(&format!("{} {}\n", detail.icon, detail.message));
    }
    if !result.feedback.hints.is_empty() {
        out.push_str("Hints:\n");
        for hint in &result.feedback.hints {
            out.push_str(&format!("  - {}\n", hint));
        }
    }
    out.trim_end().to_string()
}

#[cfg(not(target_arch = "wasm32"))]
pub fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!("Input file not found: '{}'.", path.display()));
    }
    Ok(path.canonicalize()?)
}

#[cfg(not(target_arch = "wasm32"))]
struct CliProgress {
    prefix: &'static str,
    total: usize,
    quiet: bool,
}

#[cfg(not(target_arch = "wasm32"))]
impl CliProgress {
    fn new(prefix: &'static str, total: usize, quiet: bool) -> Self {
        Self {
            prefix,
            total: total.max(1),
            quiet,
        }
    }

    fn emit(&self, step: usize, label: &str) {
        if self.quiet {
            return;
        }
        let step = step.clamp(1, self.total);
        let bar = render_progress_bar(step, self.total, 14);
        eprintln!(
            "[{}] {}... ({}/{}) {}",
            self.prefix, label, step, self.total, bar
        );
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width) + (total / 2)) / total;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < filled { '=' } else { '-' });
    }
    s.push(']');
    s
}
