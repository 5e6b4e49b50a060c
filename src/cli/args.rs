// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::{Args, Parser, Subcommand};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Predict Options:
    --source, -s <SOURCE>        Clip to classify (video file, frame directory, glob, or image)
    --model, -m <MODEL>          Checkpoint (.pt, .pth, .bin, .safetensors) [default: models/best_model.pt]
    --config, -c <CONFIG>        TOML configuration file
    --landmarks, -l <LANDMARKS>  Recorded landmark JSON for the clip
    --device <DEVICE>            Device (cpu, cuda:0, metal:0, mps)
    --json                       Print the result as JSON
    --verbose                    Show verbose output

Examples:
    sign-inference predict --source clip.mp4 --landmarks clip.json
    sign-inference predict -s frames/ -l frames.json -m models/best_model.safetensors --json
    sign-inference predict -s clip.mp4 -l clip.json -c sign.toml --device cuda:0
    sign-inference config -c sign.toml"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a sign clip
    Predict(PredictArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

/// Arguments for the predict command.
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Clip to classify (video file, frame directory, glob, or image)
    #[arg(short, long)]
    pub source: String,

    /// Checkpoint path, overriding the configuration
    #[arg(short, long)]
    pub model: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Recorded landmark JSON for the clip
    #[arg(short, long)]
    pub landmarks: Option<String>,

    /// Device to use (cpu, cuda:0, metal:0, mps)
    #[arg(long)]
    pub device: Option<String>,

    /// Print the result as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// TOML configuration file to merge over the defaults
    #[arg(short, long)]
    pub config: Option<String>,
}
