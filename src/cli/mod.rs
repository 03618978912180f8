// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands off to Layer 2.
//
//   1. `train`   — trains a DCN reader (or evaluates with --test)
//   2. `predict` — answers a question about a context paragraph
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, PredictArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "dcn-qa",
    version,
    about = "Train a Dynamic Coattention Network reader and answer questions with it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting run '{}' on dataset {}", args.run_id, args.dataset);

    let use_case = TrainUseCase::new(args.into()).context("Invalid training configuration")?;
    let history  = use_case.execute()?;

    match history.last() {
        Some(m) if use_case.config().test => {
            println!("Evaluation complete (checkpoint epoch {}).", m.epoch)
        }
        Some(m) => println!("Training complete. Last checkpoint: epoch {}.", m.epoch),
        None    => println!("Nothing to do: the run already reached its final epoch."),
    }
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let context = match (args.context, args.context_file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read context file '{path}'"))?,
        (None, None) => anyhow::bail!("Provide --context or --context-file"),
    };

    let use_case   = PredictUseCase::new(&args.checkpoint_dir, &args.run_id, &args.glove_path)?;
    let prediction = use_case.answer(&args.question, &context)?;

    println!("\nAnswer: {}", prediction.answer);
    println!("Span:   words {}..={}", prediction.start, prediction.end);
    Ok(())
}
