//! Per-code-unit analysis driver
//!
//! Every code unit of a declaration goes through the same steps: bail out on
//! input that cannot be analyzed, scan for delegate escapes, pick a tier, run
//! the oracle, and turn unread writes into findings. Parameter findings of
//! ordinary methods are deferred to the cross-block aggregator.

use crate::aggregate::{self, ParameterUsageAccumulator};
use crate::cancellation::CancellationToken;
use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::escape::{EscapeScan, EscapeScanner};
use crate::ir::{
    CodeUnit, CodeUnitKind, Compilation, Declaration, OperationId, SymbolId, SymbolTable,
};
use crate::options::AnalyzerOptions;
use crate::side_effects::{is_removable_write, is_reportable_dropped_value};
use crate::usage::{
    ReachingWritesSolver, SymbolUsageOracle, SymbolUsageResult, UnreadWrite, UsageContext,
};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Why a code unit produced no usage result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Field/property initializer or attribute argument
    NotAnalyzable,
    Empty,
    SyntaxErrors,
    /// A delegate is stored into a member or converted to a non-delegate
    DelegateMayEscape,
    /// Delegate-typed return value or ref/out parameter
    DelegateSignature,
}

impl SkipReason {
    /// Unanalyzable input gets no findings at all; unsound-risk input still
    /// gets the expression statement rule
    pub fn is_unanalyzable(self) -> bool {
        matches!(
            self,
            SkipReason::NotAnalyzable | SkipReason::Empty | SkipReason::SyntaxErrors
        )
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::NotAnalyzable => "not analyzable",
            SkipReason::Empty => "empty",
            SkipReason::SyntaxErrors => "syntax errors",
            SkipReason::DelegateMayEscape => "delegate may escape",
            SkipReason::DelegateSignature => "delegate in signature",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "tier", content = "reason")]
pub enum TierDecision {
    Fast,
    Slow,
    Skip(SkipReason),
}

impl fmt::Display for TierDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierDecision::Fast => write!(f, "fast"),
            TierDecision::Slow => write!(f, "slow"),
            TierDecision::Skip(reason) => write!(f, "skip ({})", reason),
        }
    }
}

/// Tier decision for one code unit, with the escape scan that drove it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitPlan {
    pub kind: CodeUnitKind,
    /// Absent when the unit was rejected before scanning
    pub escape: Option<EscapeScan>,
    pub decision: TierDecision,
}

/// Decide how `unit` of `declaration` is analyzed
pub fn plan_unit(
    declaration: &Declaration,
    symbols: &SymbolTable,
    unit: &CodeUnit,
    cancellation: &CancellationToken,
) -> Result<UnitPlan> {
    let rejected = |reason: SkipReason| UnitPlan {
        kind: unit.kind,
        escape: None,
        decision: TierDecision::Skip(reason),
    };
    if !unit.kind.is_analyzable() {
        return Ok(rejected(SkipReason::NotAnalyzable));
    }
    if unit.is_empty() {
        return Ok(rejected(SkipReason::Empty));
    }
    if unit.has_syntax_errors || unit.body.contains_invalid() {
        return Ok(rejected(SkipReason::SyntaxErrors));
    }

    let scan = EscapeScanner::scan(&unit.body, cancellation)?;
    let decision = if !scan.flags.has_delegate_creation {
        TierDecision::Fast
    } else if scan.flags.may_escape() {
        TierDecision::Skip(SkipReason::DelegateMayEscape)
    } else if has_delegate_signature(declaration, symbols)? {
        TierDecision::Skip(SkipReason::DelegateSignature)
    } else {
        TierDecision::Slow
    };

    Ok(UnitPlan {
        kind: unit.kind,
        escape: Some(scan),
        decision,
    })
}

/// Plans for every code unit of `declaration`, in order
pub fn plan_declaration(
    declaration: &Declaration,
    symbols: &SymbolTable,
    cancellation: &CancellationToken,
) -> Result<Vec<UnitPlan>> {
    declaration
        .code_units
        .iter()
        .map(|unit| plan_unit(declaration, symbols, unit, cancellation))
        .collect()
}

fn has_delegate_signature(declaration: &Declaration, symbols: &SymbolTable) -> Result<bool> {
    if declaration.return_type.is_delegate() {
        return Ok(true);
    }
    Ok(declaration
        .parameter_symbols(symbols)?
        .iter()
        .any(|p| p.is_ref_or_out_parameter() && p.ty.is_delegate()))
}

type WriteKey = (SymbolId, Option<OperationId>);

fn write_key(write: &UnreadWrite) -> WriteKey {
    (write.symbol, write.site.map(|site| site.id))
}

/// Unused value and unused parameter analysis over one compilation
#[derive(Debug, Clone)]
pub struct UnusedValueAnalyzer<O = ReachingWritesSolver> {
    oracle: O,
    options: AnalyzerOptions,
}

impl UnusedValueAnalyzer<ReachingWritesSolver> {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self::with_oracle(ReachingWritesSolver::new(), options)
    }
}

impl Default for UnusedValueAnalyzer<ReachingWritesSolver> {
    fn default() -> Self {
        Self::new(AnalyzerOptions::default())
    }
}

impl<O: SymbolUsageOracle> UnusedValueAnalyzer<O> {
    pub fn with_oracle(oracle: O, options: AnalyzerOptions) -> Self {
        Self { oracle, options }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Analyze every declaration, nested ones included, in parallel.
    /// Findings are ordered by position, then rule.
    pub fn analyze_compilation(
        &self,
        compilation: &Compilation,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Diagnostic>> {
        let declarations = compilation.all_declarations();
        log::debug!("Analyzing {} declarations", declarations.len());

        let per_declaration = declarations
            .par_iter()
            .map(|declaration| {
                self.analyze_declaration(declaration, &compilation.symbols, cancellation)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut diagnostics: Vec<Diagnostic> = per_declaration.into_iter().flatten().collect();
        diagnostics.sort_by_key(|d| (d.span.start, d.rule));
        Ok(diagnostics)
    }

    /// Analyze the code units of one declaration, then aggregate its
    /// parameters. Nested declarations are not visited.
    pub fn analyze_declaration(
        &self,
        declaration: &Declaration,
        symbols: &SymbolTable,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Diagnostic>> {
        let context = UsageContext::new(declaration, symbols);
        let mut accumulator = ParameterUsageAccumulator::new();
        let mut diagnostics = Vec::new();

        for unit in &declaration.code_units {
            cancellation.check()?;
            let mut found = self.analyze_unit(unit, &context, &mut accumulator, cancellation)?;
            found.sort_by_key(|d| (d.span.start, d.rule));
            diagnostics.extend(found);
        }

        diagnostics.extend(aggregate::aggregate(
            declaration,
            symbols,
            &self.options,
            &accumulator,
        )?);
        Ok(diagnostics)
    }

    fn analyze_unit<'a>(
        &self,
        unit: &'a CodeUnit,
        context: &UsageContext<'a>,
        accumulator: &mut ParameterUsageAccumulator<'a>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Diagnostic>> {
        let declaration = context.declaration;
        let plan = plan_unit(declaration, context.symbols, unit, cancellation)?;
        let mut diagnostics = Vec::new();

        let result = match plan.decision {
            TierDecision::Skip(reason) => {
                log::debug!(
                    "{}: skipping {:?} unit ({})",
                    declaration.name,
                    unit.kind,
                    reason
                );
                accumulator.record_skipped_references(unit.referenced_symbols());
                if !reason.is_unanalyzable() {
                    self.report_dropped_values(unit, &mut diagnostics, cancellation)?;
                }
                return Ok(diagnostics);
            }
            TierDecision::Fast => {
                let fast = self.oracle.run_fast(unit, context, cancellation)?;
                if !fast.has_unread_writes() {
                    if cfg!(debug_assertions) {
                        let slow = self.oracle.run_slow(unit, context, cancellation)?;
                        check_tier_agreement(declaration, &fast, &slow);
                    }
                    log::trace!("{}: {:?} unit is fully used", declaration.name, unit.kind);
                    accumulator.mark_fully_used_block();
                    None
                } else {
                    let slow = self.oracle.run_slow(unit, context, cancellation)?;
                    check_tier_agreement(declaration, &fast, &slow);
                    Some(slow)
                }
            }
            TierDecision::Slow => Some(self.oracle.run_slow(unit, context, cancellation)?),
        };

        if let Some(result) = result {
            self.report_unread_writes(&result, context, accumulator, &mut diagnostics)?;
            accumulator.push_result(result);
        }
        self.report_dropped_values(unit, &mut diagnostics, cancellation)?;
        Ok(diagnostics)
    }

    fn report_unread_writes(
        &self,
        result: &SymbolUsageResult,
        context: &UsageContext,
        accumulator: &ParameterUsageAccumulator,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<()> {
        let options = &self.options;
        for write in result.unread_writes() {
            let symbol = context.symbols.resolve(write.symbol)?;
            match write.site {
                Some(site) => {
                    if !options.unused_value_assignment_severity.is_enabled()
                        || symbol.has_discard_name()
                    {
                        continue;
                    }
                    diagnostics.push(Diagnostic::unused_value_assignment(
                        site.span,
                        options.unused_value_assignment_severity,
                        &symbol.name,
                        options.unused_value_assignment_preference,
                        symbol.is_local() && !result.is_symbol_read(symbol.id),
                        is_removable_write(site),
                    ));
                }
                // Local function parameters are judged on their own body
                None if context.declaration.is_local_function() => {
                    if !options.reports_unused_parameters()
                        || !aggregate::is_reportable_parameter(symbol, accumulator)
                    {
                        continue;
                    }
                    if let Some(unused) =
                        aggregate::evaluate_parameter(symbol, std::slice::from_ref(result))
                    {
                        diagnostics.push(Diagnostic::unused_parameter(
                            symbol.span,
                            options.unused_parameters_severity,
                            &symbol.name,
                            unused.is_referenced,
                        ));
                    }
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Expression statements whose value is silently dropped. Nested
    /// function bodies are their own code units and are not visited.
    fn report_dropped_values(
        &self,
        unit: &CodeUnit,
        diagnostics: &mut Vec<Diagnostic>,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        let severity = self.options.unused_value_expression_statement_severity;
        if !severity.is_enabled() {
            return Ok(());
        }

        let mut stack = vec![&unit.body];
        while let Some(operation) = stack.pop() {
            cancellation.check()?;
            if operation.nested_function().is_some() {
                continue;
            }
            if is_reportable_dropped_value(operation) {
                diagnostics.push(Diagnostic::unused_value_expression_statement(
                    operation.span,
                    severity,
                    self.options.unused_value_expression_statement_preference,
                ));
            }
            stack.extend(operation.children());
        }
        Ok(())
    }
}

/// Every write the slow tier leaves unread must also be unread in the fast
/// tier. The slow result wins either way.
fn check_tier_agreement(
    declaration: &Declaration,
    fast: &SymbolUsageResult,
    slow: &SymbolUsageResult,
) {
    let fast_unread: HashSet<WriteKey> = fast.unread_writes().iter().map(write_key).collect();
    let missed = slow
        .unread_writes()
        .iter()
        .filter(|write| !fast_unread.contains(&write_key(write)))
        .count();
    if missed > 0 {
        log::warn!(
            "{}: fast tier missed {} unread write(s) found by the slow tier",
            declaration.name,
            missed
        );
        debug_assert!(
            missed == 0,
            "fast tier under-reported unread writes in '{}'",
            declaration.name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{IrBuilder, MethodRef, ParameterModifier, TypeRef};

    #[test]
    fn test_plain_body_uses_fast_tier() {
        let mut b = IrBuilder::new();
        let mut f = b.method("f", TypeRef::int());
        let x = b.local(&f, "x", TypeRef::int());
        let one = b.int(1);
        let declare = b.declare(x, Some(one));
        let read = b.local_ref(x);
        let ret = b.ret(Some(read));
        b.body(&mut f, CodeUnitKind::MethodBody, vec![declare, ret]);

        let token = CancellationToken::none();
        let plan = plan_unit(&f, b.symbols(), &f.code_units[0], &token).unwrap();
        assert_eq!(plan.decision, TierDecision::Fast);
        assert!(plan.escape.unwrap().flags.is_clear());
    }

    #[test]
    fn test_local_lambda_uses_slow_tier() {
        let mut b = IrBuilder::new();
        let mut f = b.method("f", TypeRef::void());
        let action = b.local(&f, "action", TypeRef::delegate("System.Action"));
        let mut lambda = b.declaration(
            crate::ir::DeclarationKind::AnonymousFunction,
            "lambda",
            TypeRef::void(),
        );
        b.body(&mut lambda, CodeUnitKind::LambdaBody, vec![]);
        let lambda = b.lambda(lambda);
        let declare = b.declare(action, Some(lambda));
        let invoke = b.local_ref(action);
        let call = b.delegate_call(invoke, vec![], TypeRef::void());
        let statement = b.expr_stmt(call);
        b.body(&mut f, CodeUnitKind::MethodBody, vec![declare, statement]);

        let token = CancellationToken::none();
        let plan = plan_unit(&f, b.symbols(), &f.code_units[0], &token).unwrap();
        assert_eq!(plan.decision, TierDecision::Slow);
    }

    #[test]
    fn test_delegate_signature_is_skipped() {
        let mut b = IrBuilder::new();
        let mut f = b.method("f", TypeRef::void());
        b.parameter(
            &mut f,
            "callback",
            TypeRef::delegate("System.Action"),
            ParameterModifier::Out,
        );
        let target = b.method_ref(MethodRef::new_static("C", "Run"), None);
        let created = b.delegate(target, TypeRef::delegate("System.Action"));
        let statement = b.expr_stmt(created);
        b.body(&mut f, CodeUnitKind::MethodBody, vec![statement]);

        let token = CancellationToken::none();
        let plan = plan_unit(&f, b.symbols(), &f.code_units[0], &token).unwrap();
        assert_eq!(plan.decision, TierDecision::Skip(SkipReason::DelegateSignature));
    }

    #[test]
    fn test_unanalyzable_units() {
        let mut b = IrBuilder::new();
        let mut f = b.method("f", TypeRef::void());
        b.body(&mut f, CodeUnitKind::MethodBody, vec![]);
        let one = b.int(1);
        let statement = b.expr_stmt(one);
        b.body(&mut f, CodeUnitKind::FieldInitializer, vec![statement]);
        let broken = b.invalid(vec![]);
        let statement = b.expr_stmt(broken);
        b.body(&mut f, CodeUnitKind::MethodBody, vec![statement]);

        let plans = plan_declaration(&f, b.symbols(), &CancellationToken::none()).unwrap();
        let decisions: Vec<_> = plans.iter().map(|plan| plan.decision).collect();
        assert_eq!(
            decisions,
            vec![
                TierDecision::Skip(SkipReason::Empty),
                TierDecision::Skip(SkipReason::NotAnalyzable),
                TierDecision::Skip(SkipReason::SyntaxErrors),
            ]
        );
    }
}
