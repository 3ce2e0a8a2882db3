//! Shared evaluation-order walk for both solver tiers
//!
//! `walk` knows which operations read and write which symbols and in what
//! order. Control flow (branches, loops, returns) is delegated to the
//! `FlowVisitor`, which is where the tree tier and the CFG tier differ.

use super::UsageContext;
use crate::cancellation::CancellationToken;
use crate::error::Result;
use crate::ir::{ArgumentPassing, Operation, OperationId, OperationKind, SymbolId};
use std::collections::{HashMap, HashSet};

pub type WriteId = usize;

/// One write of a tracked symbol. A `None` site is the caller-supplied
/// initial value of a parameter.
#[derive(Debug, Clone, Copy)]
pub struct WriteInfo<'a> {
    pub symbol: SymbolId,
    pub site: Option<&'a Operation>,
}

impl WriteInfo<'_> {
    pub fn is_initial(&self) -> bool {
        self.site.is_none()
    }
}

/// Interned writes, deduplicated by (symbol, site)
#[derive(Debug, Default)]
pub struct WriteTable<'a> {
    writes: Vec<WriteInfo<'a>>,
    by_site: HashMap<(SymbolId, Option<OperationId>), WriteId>,
}

impl<'a> WriteTable<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, symbol: SymbolId, site: Option<&'a Operation>) -> WriteId {
        let key = (symbol, site.map(|op| op.id));
        if let Some(id) = self.by_site.get(&key) {
            return *id;
        }
        let id = self.writes.len();
        self.writes.push(WriteInfo { symbol, site });
        self.by_site.insert(key, id);
        id
    }

    pub fn get(&self, id: WriteId) -> &WriteInfo<'a> {
        &self.writes[id]
    }

    pub fn symbol_of(&self, id: WriteId) -> SymbolId {
        self.writes[id].symbol
    }

    pub fn iter(&self) -> impl Iterator<Item = (WriteId, &WriteInfo<'a>)> {
        self.writes.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Tier-specific handling of reads, writes and control flow
pub trait FlowVisitor<'a> {
    fn context(&self) -> &UsageContext<'a>;
    fn cancellation(&self) -> &CancellationToken;
    fn read(&mut self, symbol: SymbolId);
    fn write(&mut self, symbol: SymbolId, site: &'a Operation);
    fn conditional(
        &mut self,
        condition: &'a Operation,
        when_true: &'a Operation,
        when_false: Option<&'a Operation>,
    ) -> Result<()>;
    fn while_loop(&mut self, condition: &'a Operation, body: &'a Operation) -> Result<()>;
    fn exit(&mut self, value: Option<&'a Operation>) -> Result<()>;
}

fn read<'a, V: FlowVisitor<'a>>(visitor: &mut V, symbol: SymbolId) {
    if visitor.context().is_tracked(symbol) {
        log::trace!("read {}", symbol);
        visitor.read(symbol);
    }
}

fn write<'a, V: FlowVisitor<'a>>(visitor: &mut V, symbol: SymbolId, site: &'a Operation) {
    if visitor.context().is_tracked(symbol) {
        log::trace!("write {} at {}", symbol, site.span);
        visitor.write(symbol, site);
    }
}

/// Evaluate what an assignment target needs before the store happens
fn walk_target<'a, V: FlowVisitor<'a>>(visitor: &mut V, target: &'a Operation) -> Result<()> {
    match target.kind {
        OperationKind::LocalReference { .. }
        | OperationKind::ParameterReference { .. }
        | OperationKind::Discard => Ok(()),
        _ => walk(visitor, target),
    }
}

/// Arguments are evaluated left to right; ref/out stores land after the call
fn walk_arguments<'a, V: FlowVisitor<'a>>(
    visitor: &mut V,
    arguments: &'a [Operation],
) -> Result<()> {
    for argument in arguments {
        evaluate_argument(visitor, argument)?;
    }
    for argument in arguments {
        store_argument(visitor, argument);
    }
    Ok(())
}

fn evaluate_argument<'a, V: FlowVisitor<'a>>(
    visitor: &mut V,
    argument: &'a Operation,
) -> Result<()> {
    match &argument.kind {
        OperationKind::Argument { value, passing } => match passing {
            ArgumentPassing::Out => walk_target(visitor, value),
            ArgumentPassing::Ref => {
                walk_target(visitor, value)?;
                if let Some(symbol) = value.referenced_symbol() {
                    read(visitor, symbol);
                }
                Ok(())
            }
            ArgumentPassing::Value | ArgumentPassing::In => walk(visitor, value),
        },
        _ => walk(visitor, argument),
    }
}

fn store_argument<'a, V: FlowVisitor<'a>>(visitor: &mut V, argument: &'a Operation) {
    if let OperationKind::Argument {
        value,
        passing: ArgumentPassing::Ref | ArgumentPassing::Out,
    } = &argument.kind
    {
        if let Some(symbol) = value.referenced_symbol() {
            write(visitor, symbol, argument);
        }
    }
}

/// Walk `operation` in evaluation order
pub fn walk<'a, V: FlowVisitor<'a>>(visitor: &mut V, operation: &'a Operation) -> Result<()> {
    use OperationKind::*;

    visitor.cancellation().check()?;

    match &operation.kind {
        Block { operations } | Invalid { children: operations } => {
            for child in operations {
                walk(visitor, child)?;
            }
        }
        ExpressionStatement { expression } => walk(visitor, expression)?,
        VariableDeclarator { local, initializer } => {
            if let Some(initializer) = initializer {
                walk(visitor, initializer)?;
                write(visitor, *local, operation);
            }
        }
        Literal { .. } | InstanceReference | Discard => {}
        LocalReference { local } => read(visitor, *local),
        ParameterReference { parameter } => read(visitor, *parameter),
        FieldReference { instance, .. }
        | PropertyReference { instance, .. }
        | MethodReference { instance, .. } => {
            if let Some(instance) = instance {
                walk(visitor, instance)?;
            }
        }
        SimpleAssignment { target, value } => {
            walk_target(visitor, target)?;
            walk(visitor, value)?;
            if let Some(symbol) = target.referenced_symbol() {
                write(visitor, symbol, operation);
            }
        }
        CompoundAssignment { target, value } => {
            walk_target(visitor, target)?;
            let symbol = target.referenced_symbol();
            if let Some(symbol) = symbol {
                read(visitor, symbol);
            }
            walk(visitor, value)?;
            if let Some(symbol) = symbol {
                write(visitor, symbol, operation);
            }
        }
        Increment { target, .. } => {
            walk_target(visitor, target)?;
            if let Some(symbol) = target.referenced_symbol() {
                read(visitor, symbol);
                write(visitor, symbol, operation);
            }
        }
        Binary { left, right } => {
            walk(visitor, left)?;
            walk(visitor, right)?;
        }
        Unary { operand } | Conversion { operand } => walk(visitor, operand)?,
        Invocation {
            instance,
            arguments,
            ..
        } => {
            if let Some(instance) = instance {
                walk(visitor, instance)?;
            }
            walk_arguments(visitor, arguments)?;
        }
        DelegateInvocation { target, arguments } => {
            walk(visitor, target)?;
            walk_arguments(visitor, arguments)?;
        }
        Argument { .. } => walk_arguments(visitor, std::slice::from_ref(operation))?,
        DelegateCreation { target } => walk(visitor, target)?,
        // Captured symbols are handled up front by `captured_symbols`
        AnonymousFunction { .. } | LocalFunction { .. } => {}
        Conditional {
            condition,
            when_true,
            when_false,
        } => visitor.conditional(condition, when_true, when_false.as_deref())?,
        WhileLoop { condition, body } => visitor.while_loop(condition, body)?,
        Return { value } => visitor.exit(value.as_deref())?,
    }

    Ok(())
}

/// Tracked symbols referenced from inside nested lambdas or local functions
pub fn captured_symbols(context: &UsageContext<'_>, root: &Operation) -> HashSet<SymbolId> {
    root.descendants()
        .filter_map(Operation::nested_function)
        .flat_map(|function| function.code_units.iter())
        .flat_map(|unit| unit.body.descendants())
        .filter_map(Operation::referenced_symbol)
        .filter(|symbol| context.is_tracked(*symbol))
        .collect()
}
