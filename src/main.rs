// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! `sign-inference` command-line interface.

mod cli;

use std::process;

use clap::Parser;

use cli::args::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let code = match &cli.command {
        Commands::Predict(args) => {
            cli::logging::set_verbose(args.verbose && !args.json);
            cli::logging::init_tracing(args.verbose);
            cli::predict::run_prediction(args)
        }
        Commands::Config(args) => {
            cli::logging::init_tracing(false);
            cli::predict::run_config(args)
        }
    };

    process::exit(code);
}
