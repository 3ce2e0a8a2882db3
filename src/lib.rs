//! unused-value-analyzer: dead store and unused parameter analysis
//!
//! This library analyzes the operation trees of a compiler's semantic IR and
//! reports writes whose value is never read, expression statements whose value
//! is dropped, and parameters whose caller-supplied value is never used. It
//! stays sound around closures by scanning for delegate escapes first and
//! skipping what it cannot follow.

pub mod aggregate;
pub mod analyzer;
pub mod cancellation;
pub mod cli;
pub mod diagnostics;
pub mod error;
pub mod escape;
pub mod ir;
pub mod options;
pub mod side_effects;
pub mod usage;

pub use analyzer::{TierDecision, UnitPlan, UnusedValueAnalyzer};
pub use error::{Error as AnalyzerError, Result as AnalyzerResult};

// Re-export commonly used types
pub use cancellation::{CancellationSource, CancellationToken};
pub use diagnostics::{Diagnostic, RuleKind};
pub use escape::{EscapeFlags, EscapeScanner};
pub use ir::{CodeUnit, Compilation, Declaration, IrBuilder, Operation, SymbolTable};
pub use options::{AnalyzerOptions, Severity};
pub use usage::{ReachingWritesSolver, SymbolUsageOracle, SymbolUsageResult};
