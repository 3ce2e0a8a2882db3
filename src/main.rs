use clap::{Parser, Subcommand};
use miette::{miette, Result};
use std::path::PathBuf;

use unused_value_analyzer::cli;
use unused_value_analyzer::cli::analyze::OutputFormat;

#[derive(Parser)]
#[command(name = "unused-value-analyzer")]
#[command(about = "Dead store and unused parameter analysis over a semantic IR dump")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report unused values, dropped expression values and unused parameters
    Analyze {
        /// Input compilation (JSON)
        input: PathBuf,

        /// Analyzer options (JSON); defaults apply when omitted
        #[arg(short, long)]
        options: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show escape flags and tier selection per code unit
    Scan {
        /// Input compilation (JSON)
        input: PathBuf,
    },

    /// Build the usage graph of one declaration
    Cfg {
        /// Input compilation (JSON)
        input: PathBuf,
        /// Declaration name
        #[arg(short, long)]
        declaration: String,
        /// Output DOT file for visualization (optional)
        #[arg(long)]
        dot: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            options,
            format,
        } => cli::analyze::analyze(&input, options.as_deref(), format)
            .map_err(|e| miette!("{:#}", e)),
        Commands::Scan { input } => cli::scan::scan(&input).map_err(|e| miette!("{:#}", e)),
        Commands::Cfg {
            input,
            declaration,
            dot,
        } => cli::cfg::cfg(&input, &declaration, dot.as_deref())
            .map_err(|e| miette!("{:#}", e)),
    }
}
