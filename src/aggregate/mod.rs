//! Cross-block parameter aggregation
//!
//! A declaration may own several code units (constructor initializer and
//! body, for instance). A parameter is only unused when every analyzed unit
//! agrees, so per-unit results are collected here and judged together once
//! the last unit of the declaration has been processed.

use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::ir::{Declaration, ParameterModifier, Symbol, SymbolId, SymbolTable};
use crate::options::AnalyzerOptions;
use crate::usage::SymbolUsageResult;
use std::collections::HashSet;

/// Per-declaration state gathered while its code units are analyzed
#[derive(Debug, Default)]
pub struct ParameterUsageAccumulator<'a> {
    results: Vec<SymbolUsageResult<'a>>,
    saw_fully_used_block: bool,
    skipped_references: HashSet<SymbolId>,
}

impl<'a> ParameterUsageAccumulator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_result(&mut self, result: SymbolUsageResult<'a>) {
        self.results.push(result);
    }

    /// A unit with no unread writes proves every parameter is used
    pub fn mark_fully_used_block(&mut self) {
        self.saw_fully_used_block = true;
    }

    /// Remember what a skipped unit references; it may hide a read
    pub fn record_skipped_references(&mut self, symbols: impl IntoIterator<Item = SymbolId>) {
        self.skipped_references.extend(symbols);
    }

    pub fn saw_fully_used_block(&self) -> bool {
        self.saw_fully_used_block
    }

    pub fn is_referenced_by_skipped_unit(&self, symbol: SymbolId) -> bool {
        self.skipped_references.contains(&symbol)
    }

    pub fn results(&self) -> &[SymbolUsageResult<'a>] {
        &self.results
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// A parameter whose caller-supplied value is never used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnusedParameter {
    pub parameter: SymbolId,
    /// Read or reassigned in some unit, just never for its initial value
    pub is_referenced: bool,
}

/// Whether `parameter` can be reported at all, independent of usage facts
pub fn is_reportable_parameter(
    parameter: &Symbol,
    accumulator: &ParameterUsageAccumulator,
) -> bool {
    parameter.is_parameter()
        && parameter.modifier() != Some(ParameterModifier::Params)
        && !parameter.has_discard_name()
        && !accumulator.is_referenced_by_skipped_unit(parameter.id)
}

/// Judge one parameter against every analyzed unit of its declaration
pub fn evaluate_parameter(
    parameter: &Symbol,
    results: &[SymbolUsageResult],
) -> Option<UnusedParameter> {
    let is_ref_or_out = parameter.is_ref_or_out_parameter();
    let mut is_referenced = false;

    for result in results {
        if result.was_initial_value_used(parameter.id) {
            return None;
        }
        let read_here = result.is_symbol_read(parameter.id);
        let written_here = result.write_count(parameter.id) > 1;
        is_referenced |= read_here || written_here;

        // Writes to ref/out parameters are visible to the caller
        if is_ref_or_out && (read_here || written_here) {
            return None;
        }
    }

    Some(UnusedParameter {
        parameter: parameter.id,
        is_referenced,
    })
}

/// Report the unused parameters of an ordinary method once all of its units
/// have been analyzed
pub fn aggregate(
    declaration: &Declaration,
    symbols: &SymbolTable,
    options: &AnalyzerOptions,
    accumulator: &ParameterUsageAccumulator,
) -> Result<Vec<Diagnostic>> {
    if !declaration.is_ordinary_method()
        || !options.reports_unused_parameters()
        || accumulator.saw_fully_used_block()
        || accumulator.is_empty()
    {
        return Ok(Vec::new());
    }
    if !options.is_in_scope_for_unused_parameters(declaration, symbols) {
        log::trace!("{} is out of scope for unused parameters", declaration.name);
        return Ok(Vec::new());
    }

    let mut diagnostics = Vec::new();
    for parameter in declaration.parameter_symbols(symbols)? {
        if !is_reportable_parameter(parameter, accumulator) {
            continue;
        }
        if let Some(unused) = evaluate_parameter(parameter, accumulator.results()) {
            log::debug!(
                "{}: parameter '{}' is unused across {} unit(s)",
                declaration.name,
                parameter.name,
                accumulator.results().len()
            );
            diagnostics.push(Diagnostic::unused_parameter(
                parameter.span,
                options.unused_parameters_severity,
                &parameter.name,
                unused.is_referenced,
            ));
        }
    }
    Ok(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MessageVariant;
    use crate::ir::{IrBuilder, TypeRef};
    use crate::options::Severity;

    fn method_with(modifier: ParameterModifier, name: &str) -> (IrBuilder, Declaration, SymbolId) {
        let mut b = IrBuilder::new();
        let mut f = b.method("f", TypeRef::void());
        let p = b.parameter(&mut f, name, TypeRef::int(), modifier);
        (b, f, p)
    }

    fn unread_initial<'a>(p: SymbolId) -> SymbolUsageResult<'a> {
        let mut result = SymbolUsageResult::new();
        result.set_write_count(p, 1);
        result.record_unread_write(p, None);
        result
    }

    #[test]
    fn test_used_in_any_unit_wins() {
        let (b, f, p) = method_with(ParameterModifier::None, "p");
        let mut used = SymbolUsageResult::new();
        used.record_read(p);
        used.mark_initial_value_used(p);

        let mut accumulator = ParameterUsageAccumulator::new();
        accumulator.push_result(unread_initial(p));
        accumulator.push_result(used);

        let found = aggregate(&f, b.symbols(), &AnalyzerOptions::default(), &accumulator).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_unused_everywhere_is_reported() {
        let (b, f, p) = method_with(ParameterModifier::None, "p");
        let mut accumulator = ParameterUsageAccumulator::new();
        accumulator.push_result(unread_initial(p));
        accumulator.push_result(unread_initial(p));

        let found = aggregate(&f, b.symbols(), &AnalyzerOptions::default(), &accumulator).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message_args, vec!["p".to_string()]);
        assert_eq!(found[0].span, b.symbols().get(p).unwrap().span);
        assert_eq!(found[0].variant, MessageVariant::Default);
    }

    #[test]
    fn test_overwritten_parameter_gets_initial_value_variant() {
        let (b, f, p) = method_with(ParameterModifier::None, "p");
        let mut result = unread_initial(p);
        result.record_read(p);
        result.set_write_count(p, 2);
        let mut accumulator = ParameterUsageAccumulator::new();
        accumulator.push_result(result);

        let found = aggregate(&f, b.symbols(), &AnalyzerOptions::default(), &accumulator).unwrap();
        assert_eq!(found[0].variant, MessageVariant::InitialValueNeverUsed);
    }

    #[test]
    fn test_written_only_parameter_is_referenced() {
        let (b, _, p) = method_with(ParameterModifier::None, "p");
        let mut result = unread_initial(p);
        result.set_write_count(p, 2);
        let parameter = b.symbols().get(p).unwrap();

        let unused = evaluate_parameter(parameter, &[result]).unwrap();
        assert!(unused.is_referenced);
        assert!(!evaluate_parameter(parameter, &[unread_initial(p)]).unwrap().is_referenced);
    }

    #[test]
    fn test_ref_parameter_written_twice_is_used() {
        let (b, _, p) = method_with(ParameterModifier::Ref, "p");
        let mut result = unread_initial(p);
        result.set_write_count(p, 2);
        let parameter = b.symbols().get(p).unwrap();
        assert_eq!(evaluate_parameter(parameter, &[result]), None);

        // Only the implicit initial write: still unused
        let parameter = b.symbols().get(p).unwrap();
        assert!(evaluate_parameter(parameter, &[unread_initial(p)]).is_some());
    }

    #[test]
    fn test_preconditions() {
        let (b, f, p) = method_with(ParameterModifier::None, "p");

        let empty = ParameterUsageAccumulator::new();
        let found = aggregate(&f, b.symbols(), &AnalyzerOptions::default(), &empty).unwrap();
        assert!(found.is_empty());

        let mut fully_used = ParameterUsageAccumulator::new();
        fully_used.push_result(unread_initial(p));
        fully_used.mark_fully_used_block();
        let found = aggregate(&f, b.symbols(), &AnalyzerOptions::default(), &fully_used).unwrap();
        assert!(found.is_empty());

        let mut accumulator = ParameterUsageAccumulator::new();
        accumulator.push_result(unread_initial(p));
        let disabled = AnalyzerOptions {
            unused_parameters_severity: Severity::None,
            ..AnalyzerOptions::default()
        };
        assert!(aggregate(&f, b.symbols(), &disabled, &accumulator).unwrap().is_empty());
    }

    #[test]
    fn test_filtered_parameters() {
        let (b, f, p) = method_with(ParameterModifier::Params, "rest");
        let mut accumulator = ParameterUsageAccumulator::new();
        accumulator.push_result(unread_initial(p));
        assert!(aggregate(&f, b.symbols(), &AnalyzerOptions::default(), &accumulator)
            .unwrap()
            .is_empty());

        let (b, f, p) = method_with(ParameterModifier::None, "_");
        let mut accumulator = ParameterUsageAccumulator::new();
        accumulator.push_result(unread_initial(p));
        assert!(aggregate(&f, b.symbols(), &AnalyzerOptions::default(), &accumulator)
            .unwrap()
            .is_empty());

        let (b, f, p) = method_with(ParameterModifier::None, "p");
        let mut accumulator = ParameterUsageAccumulator::new();
        accumulator.push_result(unread_initial(p));
        accumulator.record_skipped_references([p]);
        assert!(aggregate(&f, b.symbols(), &AnalyzerOptions::default(), &accumulator)
            .unwrap()
            .is_empty());
    }
}
