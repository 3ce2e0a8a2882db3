//! Symbol usage oracle
//!
//! The engine asks an oracle, per code unit, which symbols are read, which
//! writes are never read, how many writes each symbol has, and whether each
//! parameter's caller-supplied value was used. The oracle has two modes:
//!
//! - fast: a structured walk over the operation tree. Only trustworthy for
//!   proving that a unit has no unread writes.
//! - slow: reaching-writes over the control flow graph. Authoritative.
//!
//! `ReachingWritesSolver` is the bundled oracle; anything implementing
//! `SymbolUsageOracle` can replace it.

pub mod cfg;
pub mod tree;
pub mod walker;

pub use cfg::{FlowEdge, UsageBlock, UsageEvent, UsageGraph};
pub use walker::{WriteId, WriteInfo, WriteTable};

use crate::cancellation::CancellationToken;
use crate::error::Result;
use crate::ir::{CodeUnit, Declaration, Operation, SymbolId, SymbolTable};
use std::collections::{HashMap, HashSet};

/// What the oracle needs besides the code unit itself
#[derive(Debug, Clone, Copy)]
pub struct UsageContext<'a> {
    pub declaration: &'a Declaration,
    pub symbols: &'a SymbolTable,
}

impl<'a> UsageContext<'a> {
    pub fn new(declaration: &'a Declaration, symbols: &'a SymbolTable) -> Self {
        Self {
            declaration,
            symbols,
        }
    }

    /// Only the declaration's own parameters and locals are tracked
    pub fn is_tracked(&self, symbol: SymbolId) -> bool {
        self.symbols
            .get(symbol)
            .is_some_and(|s| s.owner == self.declaration.id)
    }

    /// Parameters whose final value flows back to the caller
    pub fn ref_or_out_parameters(&self) -> impl Iterator<Item = SymbolId> + 'a {
        let symbols = self.symbols;
        let declaration = self.declaration;
        declaration
            .parameters
            .iter()
            .copied()
            .filter(move |id| symbols.get(*id).is_some_and(|s| s.is_ref_or_out_parameter()))
    }
}

/// A write whose value is never read. `site` is `None` for the synthetic
/// initial write of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnreadWrite<'a> {
    pub symbol: SymbolId,
    pub site: Option<&'a Operation>,
}

/// Usage facts for one code unit
#[derive(Debug, Clone, Default)]
pub struct SymbolUsageResult<'a> {
    read_symbols: HashSet<SymbolId>,
    unread_writes: Vec<UnreadWrite<'a>>,
    write_counts: HashMap<SymbolId, usize>,
    initial_values_used: HashSet<SymbolId>,
}

impl<'a> SymbolUsageResult<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&mut self, symbol: SymbolId) {
        self.read_symbols.insert(symbol);
    }

    pub fn record_unread_write(&mut self, symbol: SymbolId, site: Option<&'a Operation>) {
        self.unread_writes.push(UnreadWrite { symbol, site });
    }

    pub fn set_write_count(&mut self, symbol: SymbolId, count: usize) {
        self.write_counts.insert(symbol, count);
    }

    pub fn mark_initial_value_used(&mut self, parameter: SymbolId) {
        self.initial_values_used.insert(parameter);
    }

    pub fn is_symbol_read(&self, symbol: SymbolId) -> bool {
        self.read_symbols.contains(&symbol)
    }

    /// Unread writes, initial values first, then in source order
    pub fn unread_writes(&self) -> &[UnreadWrite<'a>] {
        &self.unread_writes
    }

    pub fn has_unread_writes(&self) -> bool {
        !self.unread_writes.is_empty()
    }

    pub fn write_count(&self, symbol: SymbolId) -> usize {
        self.write_counts.get(&symbol).copied().unwrap_or(0)
    }

    pub fn was_initial_value_used(&self, parameter: SymbolId) -> bool {
        self.initial_values_used.contains(&parameter)
    }

    fn sort(&mut self) {
        self.unread_writes.sort_by_key(|write| match write.site {
            None => (0, write.symbol.0, 0, 0),
            Some(site) => (1, site.span.start, site.id.0, write.symbol.0),
        });
    }
}

/// Raw facts gathered by either tier before they become a result
#[derive(Debug, Default)]
pub(crate) struct UsageFacts {
    pub reads: HashSet<SymbolId>,
    pub read_writes: HashSet<WriteId>,
}

impl UsageFacts {
    /// Captured symbols count as read everywhere: the closure may run at any time
    pub fn into_result<'a>(
        self,
        writes: &WriteTable<'a>,
        captured: &HashSet<SymbolId>,
    ) -> SymbolUsageResult<'a> {
        let mut result = SymbolUsageResult::new();
        result.read_symbols = self.reads;
        result.read_symbols.extend(captured.iter().copied());

        for (id, write) in writes.iter() {
            *result.write_counts.entry(write.symbol).or_default() += 1;
            let is_read = captured.contains(&write.symbol) || self.read_writes.contains(&id);
            match (is_read, write.site) {
                (true, None) => result.mark_initial_value_used(write.symbol),
                (true, Some(_)) => {}
                (false, site) => result.record_unread_write(write.symbol, site),
            }
        }

        result.sort();
        result
    }
}

/// The two-mode contract the per-block analyzer relies on
pub trait SymbolUsageOracle: Sync {
    /// Tree-walk approximation. May report a write as unread when it is
    /// read, never the reverse. Only valid for units without delegates.
    fn run_fast<'a>(
        &self,
        unit: &'a CodeUnit,
        context: &UsageContext<'a>,
        cancellation: &CancellationToken,
    ) -> Result<SymbolUsageResult<'a>>;

    /// Precise control-flow-graph analysis
    fn run_slow<'a>(
        &self,
        unit: &'a CodeUnit,
        context: &UsageContext<'a>,
        cancellation: &CancellationToken,
    ) -> Result<SymbolUsageResult<'a>>;
}

/// Bundled reaching-writes oracle
#[derive(Debug, Clone, Copy, Default)]
pub struct ReachingWritesSolver;

impl ReachingWritesSolver {
    pub fn new() -> Self {
        Self
    }
}

impl SymbolUsageOracle for ReachingWritesSolver {
    fn run_fast<'a>(
        &self,
        unit: &'a CodeUnit,
        context: &UsageContext<'a>,
        cancellation: &CancellationToken,
    ) -> Result<SymbolUsageResult<'a>> {
        tree::TreeWalker::run(unit, context, cancellation)
    }

    fn run_slow<'a>(
        &self,
        unit: &'a CodeUnit,
        context: &UsageContext<'a>,
        cancellation: &CancellationToken,
    ) -> Result<SymbolUsageResult<'a>> {
        let graph = UsageGraph::build(unit, context, cancellation)?;
        graph.solve(cancellation)
    }
}
