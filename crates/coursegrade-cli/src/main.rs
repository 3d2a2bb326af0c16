//! coursegrade CLI: validate course catalogs and grade quiz submissions.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "coursegrade", version, about = "Course catalog quiz grader")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade every submission in a catalog
    Grade {
        /// Path to .toml catalog or directory
        #[arg(long)]
        catalog: PathBuf,

        /// Weighting policy: unweighted, weighted (overrides config)
        #[arg(long)]
        weighting: Option<String>,

        /// Output directory (overrides config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: json, markdown, all
        #[arg(long, default_value = "json")]
        format: String,

        /// Print the summary without writing a report
        #[arg(long)]
        no_save: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check a selection of choices against one question
    Check {
        /// Path to .toml catalog
        #[arg(long)]
        catalog: PathBuf,

        /// Question key
        #[arg(long)]
        question: String,

        /// Selected choice keys (comma-separated, may be empty)
        #[arg(long, default_value = "")]
        choices: String,
    },

    /// List the questions an enrollment is graded against
    Questions {
        /// Path to .toml catalog
        #[arg(long)]
        catalog: PathBuf,

        /// Enrollment key
        #[arg(long)]
        enrollment: String,
    },

    /// Validate catalog TOML files
    Validate {
        /// Path to catalog file or directory
        #[arg(long)]
        catalog: PathBuf,
    },

    /// Compare two grade reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Grade change threshold
        #[arg(long, default_value = "0.01")]
        threshold: f64,

        /// Exit code 1 if regressions found
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create starter config and example catalog
    Init,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("coursegrade=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Grade {
            catalog,
            weighting,
            output,
            format,
            no_save,
            config,
        } => commands::grade::execute(catalog, weighting, output, format, no_save, config),
        Commands::Check {
            catalog,
            question,
            choices,
        } => commands::check::execute(catalog, question, choices),
        Commands::Questions {
            catalog,
            enrollment,
        } => commands::questions::execute(catalog, enrollment),
        Commands::Validate { catalog } => commands::validate::execute(catalog),
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_regression, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
