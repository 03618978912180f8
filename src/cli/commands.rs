// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands: `train` (also evaluation via --test) and
// `predict`.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train (or with --test, evaluate) a DCN reader
    Train(TrainArgs),

    /// Answer a question about a context paragraph with a trained run
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Number of passes through the training data
    #[arg(long, default_value_t = 100)]
    pub num_epochs: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Size of every LSTM hidden state (H); the encoding U has width 2H
    #[arg(long, alias = "lstm-size", default_value_t = 200)]
    pub hidden_state_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    /// Dropout on the document and question encodings
    #[arg(long, default_value_t = 0.3)]
    pub dropout: f64,

    /// Decoder iterations per batch; every one contributes to the loss
    #[arg(long, default_value_t = 4)]
    pub num_decoding_steps: usize,

    /// Continue from the run's latest checkpoint
    #[arg(long)]
    pub restore: bool,

    /// Evaluate the latest checkpoint without training
    #[arg(long)]
    pub test: bool,

    /// SQuAD or synthetic
    #[arg(long, default_value = "SQuAD")]
    pub dataset: String,

    /// Maxout pool size of the HMN
    #[arg(long, default_value_t = 16)]
    pub pool_size: usize,

    /// Word vector width; must match the GloVe file
    #[arg(long, default_value_t = 300)]
    pub embedding_dim: usize,

    #[arg(long, default_value_t = 600)]
    pub max_document_length: usize,

    #[arg(long, default_value_t = 60)]
    pub max_question_length: usize,

    /// Logits are clamped to ±this before masking
    #[arg(long, default_value_t = 50.0)]
    pub logit_clip: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Share of samples used for training when no --dev-path is given
    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    #[arg(long, default_value = "data/train-v1.1.json")]
    pub train_path: String,

    #[arg(long)]
    pub dev_path: Option<String>,

    #[arg(long, default_value = "data/glove.840B.300d.txt")]
    pub glove_path: String,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Checkpoints and metrics go to <checkpoint_dir>/<run_id>
    #[arg(long, default_value = "dcn")]
    pub run_id: String,

    /// Corpus size for --dataset synthetic
    #[arg(long, default_value_t = 512)]
    pub synthetic_samples: usize,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            num_epochs:          a.num_epochs,
            batch_size:          a.batch_size,
            hidden_state_size:   a.hidden_state_size,
            learning_rate:       a.learning_rate,
            dropout:             a.dropout,
            num_decoding_steps:  a.num_decoding_steps,
            restore:             a.restore,
            test:                a.test,
            dataset:             a.dataset,
            pool_size:           a.pool_size,
            embedding_dim:       a.embedding_dim,
            max_document_length: a.max_document_length,
            max_question_length: a.max_question_length,
            logit_clip:          a.logit_clip,
            seed:                a.seed,
            train_fraction:      a.train_fraction,
            train_path:          a.train_path,
            dev_path:            a.dev_path,
            glove_path:          a.glove_path,
            checkpoint_dir:      a.checkpoint_dir,
            run_id:              a.run_id,
            synthetic_samples:   a.synthetic_samples,
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    #[arg(long)]
    pub question: String,

    /// Context paragraph text
    #[arg(long, conflicts_with = "context_file", required_unless_present = "context_file")]
    pub context: Option<String>,

    /// Read the context paragraph from a file
    #[arg(long)]
    pub context_file: Option<String>,

    #[arg(long, default_value = "data/glove.840B.300d.txt")]
    pub glove_path: String,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, default_value = "dcn")]
    pub run_id: String,
}
