//! Fast tier: structured walk over the operation tree
//!
//! Branches fork the reaching state and merge it at the join. Loops are
//! walked once, with the condition re-walked after the body, so reads that
//! only happen on a later iteration are missed. Every read recorded here is
//! feasible on the control flow graph, which makes the set of unread writes a
//! superset of the precise tier's.

use super::walker::{self, captured_symbols, FlowVisitor, WriteId, WriteTable};
use super::{SymbolUsageResult, UsageContext, UsageFacts};
use crate::cancellation::CancellationToken;
use crate::error::Result;
use crate::ir::{CodeUnit, Operation, SymbolId};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Reaching writes per symbol; `None` once control cannot reach this point
type ReachingState = Option<HashMap<SymbolId, BTreeSet<WriteId>>>;

fn merge(left: ReachingState, right: ReachingState) -> ReachingState {
    match (left, right) {
        (None, other) | (other, None) => other,
        (Some(mut left), Some(right)) => {
            for (symbol, writes) in right {
                left.entry(symbol).or_default().extend(writes);
            }
            Some(left)
        }
    }
}

pub struct TreeWalker<'a, 'c> {
    context: &'c UsageContext<'a>,
    cancellation: &'c CancellationToken,
    writes: WriteTable<'a>,
    facts: UsageFacts,
    state: ReachingState,
}

impl<'a, 'c> TreeWalker<'a, 'c> {
    pub fn run(
        unit: &'a CodeUnit,
        context: &'c UsageContext<'a>,
        cancellation: &'c CancellationToken,
    ) -> Result<SymbolUsageResult<'a>> {
        let mut tree = TreeWalker {
            context,
            cancellation,
            writes: WriteTable::new(),
            facts: UsageFacts::default(),
            state: Some(HashMap::new()),
        };

        for parameter in &context.declaration.parameters {
            if context.is_tracked(*parameter) {
                let id = tree.writes.intern(*parameter, None);
                tree.kill_and_insert(*parameter, id);
            }
        }

        walker::walk(&mut tree, &unit.body)?;
        tree.read_ref_or_out_at_exit();

        let captured: HashSet<SymbolId> = captured_symbols(context, &unit.body);
        log::trace!(
            "Tree walk of '{}': {} writes, {} captured",
            context.declaration.name,
            tree.writes.len(),
            captured.len()
        );
        Ok(tree.facts.into_result(&tree.writes, &captured))
    }

    fn kill_and_insert(&mut self, symbol: SymbolId, id: WriteId) {
        if let Some(state) = &mut self.state {
            state.insert(symbol, BTreeSet::from([id]));
        }
    }

    /// Ref/out values flow back to the caller; the caller's own value does not count
    fn read_ref_or_out_at_exit(&mut self) {
        let Some(state) = &self.state else {
            return;
        };
        for parameter in self.context.ref_or_out_parameters() {
            if let Some(reaching) = state.get(&parameter) {
                for id in reaching {
                    if !self.writes.get(*id).is_initial() {
                        self.facts.read_writes.insert(*id);
                    }
                }
            }
        }
    }
}

impl<'a> FlowVisitor<'a> for TreeWalker<'a, '_> {
    fn context(&self) -> &UsageContext<'a> {
        self.context
    }

    fn cancellation(&self) -> &CancellationToken {
        self.cancellation
    }

    fn read(&mut self, symbol: SymbolId) {
        self.facts.reads.insert(symbol);
        if let Some(reaching) = self.state.as_ref().and_then(|state| state.get(&symbol)) {
            self.facts.read_writes.extend(reaching.iter().copied());
        }
    }

    fn write(&mut self, symbol: SymbolId, site: &'a Operation) {
        // Stores after a return never run
        if self.state.is_none() {
            return;
        }
        let id = self.writes.intern(symbol, Some(site));
        self.kill_and_insert(symbol, id);
    }

    fn conditional(
        &mut self,
        condition: &'a Operation,
        when_true: &'a Operation,
        when_false: Option<&'a Operation>,
    ) -> Result<()> {
        walker::walk(self, condition)?;
        let after_condition = self.state.clone();

        walker::walk(self, when_true)?;
        let after_true = std::mem::replace(&mut self.state, after_condition);

        if let Some(when_false) = when_false {
            walker::walk(self, when_false)?;
        }
        let after_false = self.state.take();
        self.state = merge(after_true, after_false);
        Ok(())
    }

    fn while_loop(&mut self, condition: &'a Operation, body: &'a Operation) -> Result<()> {
        walker::walk(self, condition)?;
        let skipped = self.state.clone();

        walker::walk(self, body)?;
        walker::walk(self, condition)?;

        let after_body = self.state.take();
        self.state = merge(skipped, after_body);
        Ok(())
    }

    fn exit(&mut self, value: Option<&'a Operation>) -> Result<()> {
        if let Some(value) = value {
            walker::walk(self, value)?;
        }
        self.read_ref_or_out_at_exit();
        self.state = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CodeUnitKind, IrBuilder, TypeRef};

    #[test]
    fn test_branch_write_is_not_read_by_other_branch() {
        // if (c) { x = 1; } else { use(x); }
        let mut b = IrBuilder::new();
        let mut f = b.method("f", TypeRef::void());
        let c = b.parameter(&mut f, "c", TypeRef::boolean(), Default::default());
        let x = b.local(&f, "x", TypeRef::int());
        let zero = b.int(0);
        let declare = b.declare(x, Some(zero));
        let cond = b.param_ref(c);
        let target = b.local_ref(x);
        let one = b.int(1);
        let assign = b.assign(target, one);
        let then = b.expr_stmt(assign);
        let read = b.local_ref(x);
        let other = b.expr_stmt(read);
        let branch = b.if_(cond, then, Some(other));
        b.body(&mut f, CodeUnitKind::MethodBody, vec![declare, branch]);

        b.add(f);
        let compilation = b.finish();
        let f = &compilation.declarations[0];
        let context = UsageContext::new(f, &compilation.symbols);
        let result =
            TreeWalker::run(&f.code_units[0], &context, &CancellationToken::none()).unwrap();

        let unread: Vec<_> = result
            .unread_writes()
            .iter()
            .filter_map(|w| w.site.map(|site| site.span.start))
            .collect();
        assert_eq!(unread.len(), 1, "only `x = 1` is unread");
        assert!(result.was_initial_value_used(c));
        assert_eq!(result.write_count(x), 2);
    }
}
