use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use common::SubmissionMetadata;
use evaluator::{DEFAULT_PHASE, Evaluator};

/// Score a submission CSV against a ground-truth CSV and print the result document.
#[derive(Parser, Debug)]
#[command(name = "podium-evaluate", version)]
struct Args {
    /// Ground-truth annotation file (ID,label).
    #[arg(long)]
    annotations: PathBuf,

    /// Participant submission file (ID,label).
    #[arg(long)]
    submission: PathBuf,

    /// Codename of the phase the submission was made to.
    #[arg(long, default_value = DEFAULT_PHASE)]
    phase: String,

    /// Dataset split codename to report under. Defaults to the phase codename.
    #[arg(long)]
    split: Option<String>,

    /// JSON file with submission metadata.
    #[arg(long)]
    metadata: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let metadata = match &args.metadata {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read metadata file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse metadata file {}", path.display()))?
        }
        None => SubmissionMetadata::default(),
    };

    let split = args.split.as_deref().unwrap_or(&args.phase);
    let evaluator = Evaluator::new().with_phase(&args.phase, split);

    let output = evaluator
        .evaluate(&args.annotations, &args.submission, &args.phase, &metadata)
        .context("Evaluation failed")?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
