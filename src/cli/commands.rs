// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `evaluate`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Flag spellings are kebab-case (--batch-size, --lambda-u);
// clap derives them from the snake_case field names.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::evaluate_use_case::EvaluateOptions;
use crate::application::train_use_case::TrainOptions;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the crossmodal sentiment model on one dataset
    Train(TrainArgs),

    /// Score the test split with a previously trained checkpoint
    Evaluate(EvaluateArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line; the
/// defaults reproduce the reference MulT recipe.
#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Name of the model architecture (only MulT is supported)
    #[arg(long, default_value = "MulT")]
    pub model: String,

    /// Name of the trial — keys the checkpoint files
    #[arg(long, default_value = "mult")]
    pub name: String,

    /// Dataset to use (mosi, mosei_senti or iemocap)
    #[arg(long, default_value = "mosei_senti")]
    pub dataset: String,

    /// Directory holding one subdirectory of .jsonl splits per dataset
    #[arg(long, default_value = "data")]
    pub data_path: String,

    /// Use the word-aligned feature files instead of the
    /// _noalign variants
    #[arg(long)]
    pub aligned: bool,

    /// Fuse into the language/text branch only
    #[arg(long)]
    pub lonly: bool,

    /// Fuse into the audio branch only
    #[arg(long)]
    pub aonly: bool,

    /// Fuse into the vision branch only
    #[arg(long)]
    pub vonly: bool,

    /// Number of layers in each crossmodal stack
    #[arg(long, default_value_t = 5)]
    pub nlevels: usize,

    /// Number of heads for the transformer attention
    #[arg(long, default_value_t = 5)]
    pub num_heads: usize,

    /// Disable the future-timestep attention mask
    #[arg(long)]
    pub no_attn_mask: bool,

    /// Attention dropout (text-sourced and memory stacks)
    #[arg(long, default_value_t = 0.1)]
    pub attn_dropout: f64,

    /// Attention dropout for audio-sourced stacks
    #[arg(long, default_value_t = 0.0)]
    pub attn_dropout_a: f64,

    /// Attention dropout for vision-sourced stacks
    #[arg(long, default_value_t = 0.0)]
    pub attn_dropout_v: f64,

    /// ReLU dropout inside the feed-forward blocks
    #[arg(long, default_value_t = 0.1)]
    pub relu_dropout: f64,

    /// Embedding dropout on the raw text input
    #[arg(long, default_value_t = 0.25)]
    pub embed_dropout: f64,

    /// Residual block dropout
    #[arg(long, default_value_t = 0.1)]
    pub res_dropout: f64,

    /// Output layer dropout
    #[arg(long, default_value_t = 0.0)]
    pub out_dropout: f64,

    /// Optimiser to use (only Adam is supported)
    #[arg(long, default_value = "Adam")]
    pub optim: String,

    /// Number of samples per forward/backward pass
    #[arg(long, default_value_t = 24)]
    pub batch_size: usize,

    /// Gradient clip value (L2 norm)
    #[arg(long, default_value_t = 0.8)]
    pub clip: f64,

    /// Initial learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 40)]
    pub num_epochs: usize,

    /// Epochs without validation improvement before the
    /// learning rate decays
    #[arg(long, default_value_t = 20)]
    pub when: usize,

    /// Batches between progress lines
    #[arg(long, default_value_t = 30)]
    pub log_interval: usize,

    /// Random seed for the labeled mask, shuffling and init
    #[arg(long, default_value_t = 1111)]
    pub seed: u64,

    /// Train on the host CPU even when a GPU adapter exists
    #[arg(long)]
    pub no_gpu: bool,

    /// Directory for checkpoints and hyperparams.json
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Fraction of training samples that keep their labels
    #[arg(long, default_value_t = 0.5)]
    pub labeled_ratio: f64,

    /// Confidence threshold for admitting pseudo-labels
    #[arg(long, default_value_t = 0.95)]
    pub pseudolabel_threshold: f64,

    /// Optimiser steps between pseudo-label refreshes
    #[arg(long, default_value_t = 100)]
    pub pseudolabel_update_interval: usize,

    /// Weight of the unsupervised loss term
    #[arg(long, default_value_t = 1.0)]
    pub lambda_u: f64,
}

/// Convert CLI TrainArgs into the application-layer options.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainOptions {
    fn from(a: TrainArgs) -> Self {
        TrainOptions {
            model:   a.model,
            name:    a.name,
            dataset: a.dataset,
            aligned: a.aligned,

            lonly: a.lonly,
            aonly: a.aonly,
            vonly: a.vonly,

            nlevels:        a.nlevels,
            num_heads:      a.num_heads,
            // The flag disables; the option records what is enabled
            attn_mask:      !a.no_attn_mask,
            attn_dropout:   a.attn_dropout,
            attn_dropout_a: a.attn_dropout_a,
            attn_dropout_v: a.attn_dropout_v,
            relu_dropout:   a.relu_dropout,
            embed_dropout:  a.embed_dropout,
            res_dropout:    a.res_dropout,
            out_dropout:    a.out_dropout,

            optim:        a.optim,
            batch_size:   a.batch_size,
            clip:         a.clip,
            lr:           a.lr,
            num_epochs:   a.num_epochs,
            when:         a.when,
            log_interval: a.log_interval,
            seed:         a.seed,

            labeled_ratio:               a.labeled_ratio,
            pseudolabel_threshold:       a.pseudolabel_threshold,
            pseudolabel_update_interval: a.pseudolabel_update_interval,
            lambda_u:                    a.lambda_u,

            data_path:      a.data_path,
            checkpoint_dir: a.checkpoint_dir,
            no_gpu:         a.no_gpu,
        }
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Overrides the data path recorded at train time
    #[arg(long)]
    pub data_path: Option<String>,

    /// Evaluate on the host CPU even when a GPU adapter exists
    #[arg(long)]
    pub no_gpu: bool,
}

impl From<EvaluateArgs> for EvaluateOptions {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateOptions {
            checkpoint_dir: a.checkpoint_dir,
            data_path:      a.data_path,
            no_gpu:         a.no_gpu,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(subcommand)]
        cmd: Commands,
    }

    fn train_options(argv: &[&str]) -> TrainOptions {
        match Harness::try_parse_from(argv).unwrap().cmd {
            Commands::Train(args) => args.into(),
            other => panic!("expected train, parsed {other:?}"),
        }
    }

    #[test]
    fn test_bare_train_reproduces_the_reference_defaults() {
        let opts = train_options(&["prog", "train"]);
        assert_eq!(opts.dataset, "mosei_senti");
        assert_eq!(opts.batch_size, 24);
        assert_eq!(opts.lr, 1e-3);
        assert_eq!(opts.seed, 1111);
        assert_eq!(opts.when, 20);
        assert!(opts.attn_mask);
        assert!(!opts.aligned);
        assert_eq!(opts.pseudolabel_threshold, 0.95);
    }

    #[test]
    fn test_kebab_case_flags_parse_and_invert() {
        let opts = train_options(&[
            "prog", "train",
            "--no-attn-mask",
            "--lambda-u", "0.5",
            "--pseudolabel-update-interval", "7",
            "--attn-dropout-a", "0.2",
            "--no-gpu",
        ]);
        assert!(!opts.attn_mask);
        assert_eq!(opts.lambda_u, 0.5);
        assert_eq!(opts.pseudolabel_update_interval, 7);
        assert_eq!(opts.attn_dropout_a, 0.2);
        assert!(opts.no_gpu);
    }

    #[test]
    fn test_evaluate_args_with_data_path_override() {
        let parsed = Harness::try_parse_from(&[
            "prog", "evaluate",
            "--data-path", "elsewhere",
        ])
        .unwrap();
        let Commands::Evaluate(args) = parsed.cmd else {
            panic!("expected evaluate");
        };
        let opts: EvaluateOptions = args.into();
        assert_eq!(opts.checkpoint_dir, "checkpoints");
        assert_eq!(opts.data_path.as_deref(), Some("elsewhere"));
        assert!(!opts.no_gpu);
    }
}
