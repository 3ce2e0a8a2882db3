//! Command-line interface module
//!
//! This module contains the implementations for the CLI subcommands.

pub mod analyze;
pub mod cfg;
pub mod scan;

use crate::ir::Compilation;
use anyhow::{Context, Result};
use std::path::Path;

/// Load a compilation dump written as JSON
pub fn load_compilation(path: &Path) -> Result<Compilation> {
    Compilation::from_json_file(path)
        .with_context(|| format!("Failed to load compilation from {}", path.display()))
}
