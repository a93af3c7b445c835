//! qtiscore CLI — score QTI result documents from the command line.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "qtiscore", version, about = "QTI response and outcome processing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score result documents
    Score {
        /// Item definition JSON file or directory
        #[arg(long)]
        items: PathBuf,

        /// Test definition JSON file; enables outcome processing
        #[arg(long)]
        test: Option<PathBuf>,

        /// Result document JSON file or directory
        #[arg(long)]
        results: PathBuf,

        /// Output directory (default: output_dir from config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: json, xml, html, all
        #[arg(long, default_value = "json")]
        format: String,

        /// Score results in parallel
        #[arg(long)]
        parallel: bool,

        /// Add total and per-category score outcomes to the test
        #[arg(long)]
        add_totals: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate item and test definitions
    Validate {
        /// Item definition JSON file or directory
        #[arg(long)]
        items: PathBuf,

        /// Test definition JSON file
        #[arg(long)]
        test: Option<PathBuf>,
    },

    /// Create a starter config and a sample item, test and result set
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "qtiscore=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Score {
            items,
            test,
            results,
            output,
            format,
            parallel,
            add_totals,
            config,
        } => {
            commands::score::execute(commands::score::ScoreArgs {
                items,
                test,
                results,
                output,
                format,
                parallel,
                add_totals,
                config,
            })
            .await
        }
        Commands::Validate { items, test } => commands::validate::execute(items, test),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
