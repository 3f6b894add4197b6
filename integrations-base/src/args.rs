//! CLI argument parsing for checks.

use std::path::PathBuf;

use clap::Parser;

/// Common CLI arguments for all checks.
#[derive(Parser, Debug, Clone)]
#[command(about = "Agent integration check")]
pub struct CheckArgs {
    /// Path to configuration file (YAML or JSON5).
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Run every instance once, print the submissions as JSON and exit.
    #[arg(long)]
    pub once: bool,
}

impl CheckArgs {
    /// Parse CLI arguments with a default config path.
    ///
    /// If no `--config` argument is provided, uses the default.
    pub fn parse_with_default(default_config: &'static str) -> Self {
        let command = <Self as clap::CommandFactory>::command()
            .mut_arg("config", |arg| arg.default_value(default_config));

        let matches = command.get_matches();
        match <Self as clap::FromArgMatches>::from_arg_matches(&matches) {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Parse CLI arguments (requires --config to be specified).
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
