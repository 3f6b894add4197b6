use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use integrations_common::{LoggingConfig, init_tracing};
use integrations_dev::{SpecLoader, TemplateLibrary, render, write_examples};

#[derive(Parser, Debug)]
#[command(name = "integrations-dev", about = "Developer tooling for agent integrations")]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the example configuration files of a specification.
    Render {
        /// Path to the specification (spec.yaml).
        spec: PathBuf,

        /// Directory receiving the examples; defaults to the spec's directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Only verify the files on disk match the rendering.
        #[arg(long)]
        check: bool,

        /// Additional template directory, searched before the built-ins.
        #[arg(long = "templates")]
        templates: Vec<PathBuf>,
    },

    /// Validate a specification and print its errors.
    Validate {
        spec: PathBuf,

        #[arg(long = "templates")]
        templates: Vec<PathBuf>,
    },
}

fn load(spec: &Path, templates: &[PathBuf]) -> anyhow::Result<SpecLoader> {
    let library = templates
        .iter()
        .fold(TemplateLibrary::new(), |library, dir| library.with_directory(dir));
    let mut loader = SpecLoader::from_path(spec)
        .with_context(|| format!("Unable to read {}", spec.display()))?
        .with_templates(library);

    for error in loader.load() {
        eprintln!("{}", error);
    }
    Ok(loader)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&LoggingConfig {
        level: cli.log_level.clone(),
        ..Default::default()
    })?;

    match cli.command {
        Command::Validate { spec, templates } => {
            let loader = load(&spec, &templates)?;
            if !loader.errors().is_empty() {
                anyhow::bail!("{} error(s) in {}", loader.errors().len(), spec.display());
            }
            println!("{} is valid", spec.display());
        }
        Command::Render {
            spec,
            output_dir,
            check,
            templates,
        } => {
            let loader = load(&spec, &templates)?;
            let files = render(&loader)?;

            let dir = output_dir
                .or_else(|| spec.parent().map(Path::to_path_buf))
                .unwrap_or_default();
            let problems = write_examples(&files, &dir, check)?;
            for problem in &problems {
                eprintln!("{}", problem);
            }
            if !problems.is_empty() {
                anyhow::bail!("{} problem(s) rendering {}", problems.len(), spec.display());
            }
            if check {
                println!("All example files are in sync");
            }
        }
    }

    Ok(())
}
