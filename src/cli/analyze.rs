//! `analyze`: run every rule over a compilation and print the findings

use crate::cancellation::CancellationToken;
use crate::options::AnalyzerOptions;
use crate::UnusedValueAnalyzer;
use anyhow::{Context, Result};
use std::path::Path;

/// Output format for findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Run the analyze subcommand
pub fn analyze(input: &Path, options_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let compilation = super::load_compilation(input)?;
    let options = match options_path {
        Some(path) => AnalyzerOptions::from_json_file(path)
            .with_context(|| format!("Failed to load options from {}", path.display()))?,
        None => AnalyzerOptions::default(),
    };

    let analyzer = UnusedValueAnalyzer::new(options);
    let diagnostics = analyzer.analyze_compilation(&compilation, &CancellationToken::none())?;
    log::info!("{} finding(s) in {}", diagnostics.len(), input.display());

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        }
        OutputFormat::Text => {
            if diagnostics.is_empty() {
                println!("No findings");
            }
            for diagnostic in &diagnostics {
                println!("{}", diagnostic);
            }
        }
    }
    Ok(())
}
