//! Operation tree
//!
//! A closed tagged union over the operation kinds the analyses understand.
//! Adding a kind forces every exhaustive match in `escape`, `usage::walker`
//! and `side_effects` to be revisited.

use super::declaration::Declaration;
use super::symbol::SymbolId;
use super::types::TypeRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of an operation within a compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub u32);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op{}", self.0)
    }
}

/// Half-open source range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both
    pub fn cover(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Compile-time constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum ConstantValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Target of a direct invocation or method-group reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    /// Fully qualified containing type, e.g. `System.Threading.Interlocked`
    pub containing_type: String,
    pub name: String,
    #[serde(default)]
    pub is_static: bool,
}

impl MethodRef {
    pub fn new(containing_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            containing_type: containing_type.into(),
            name: name.into(),
            is_static: false,
        }
    }

    pub fn new_static(containing_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            is_static: true,
            ..Self::new(containing_type, name)
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.containing_type, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncrementKind {
    PreIncrement,
    PostIncrement,
    PreDecrement,
    PostDecrement,
}

/// How an argument is passed to its parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentPassing {
    #[default]
    Value,
    In,
    Ref,
    Out,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum OperationKind {
    Block {
        operations: Vec<Operation>,
    },
    ExpressionStatement {
        expression: Box<Operation>,
    },
    /// `T local = initializer;` (a declarator without initializer is not a write)
    VariableDeclarator {
        local: SymbolId,
        initializer: Option<Box<Operation>>,
    },
    Literal {
        value: ConstantValue,
    },
    LocalReference {
        local: SymbolId,
    },
    ParameterReference {
        parameter: SymbolId,
    },
    /// `this`
    InstanceReference,
    FieldReference {
        field: String,
        instance: Option<Box<Operation>>,
    },
    PropertyReference {
        property: String,
        instance: Option<Box<Operation>>,
    },
    /// `_` as an assignment target
    Discard,
    SimpleAssignment {
        target: Box<Operation>,
        value: Box<Operation>,
    },
    CompoundAssignment {
        target: Box<Operation>,
        value: Box<Operation>,
    },
    Increment {
        target: Box<Operation>,
        kind: IncrementKind,
    },
    Binary {
        left: Box<Operation>,
        right: Box<Operation>,
    },
    Unary {
        operand: Box<Operation>,
    },
    /// Source type is the operand's type, target type is the conversion's type
    Conversion {
        operand: Box<Operation>,
    },
    Invocation {
        method: MethodRef,
        instance: Option<Box<Operation>>,
        arguments: Vec<Operation>,
    },
    /// Invocation through a delegate value
    DelegateInvocation {
        target: Box<Operation>,
        arguments: Vec<Operation>,
    },
    Argument {
        value: Box<Operation>,
        #[serde(default)]
        passing: ArgumentPassing,
    },
    /// Lambda or method group converted to a delegate
    DelegateCreation {
        target: Box<Operation>,
    },
    MethodReference {
        method: MethodRef,
        instance: Option<Box<Operation>>,
    },
    AnonymousFunction {
        function: Box<Declaration>,
    },
    LocalFunction {
        function: Box<Declaration>,
    },
    Conditional {
        condition: Box<Operation>,
        when_true: Box<Operation>,
        when_false: Option<Box<Operation>>,
    },
    WhileLoop {
        condition: Box<Operation>,
        body: Box<Operation>,
    },
    Return {
        value: Option<Box<Operation>>,
    },
    /// Erroneous code that failed to bind
    Invalid {
        children: Vec<Operation>,
    },
}

/// One node of the operation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub span: Span,
    /// Static type of the produced value, absent for statements
    #[serde(default)]
    pub ty: Option<TypeRef>,
    pub kind: OperationKind,
}

impl Operation {
    /// Direct children in evaluation order, including the bodies of nested functions
    pub fn children(&self) -> Vec<&Operation> {
        use OperationKind::*;

        match &self.kind {
            Block { operations } | Invalid { children: operations } => operations.iter().collect(),
            ExpressionStatement { expression } => vec![&**expression],
            VariableDeclarator { initializer, .. } => initializer.iter().map(|op| &**op).collect(),
            Literal { .. }
            | LocalReference { .. }
            | ParameterReference { .. }
            | InstanceReference
            | Discard => Vec::new(),
            FieldReference { instance, .. }
            | PropertyReference { instance, .. }
            | MethodReference { instance, .. } => instance.iter().map(|op| &**op).collect(),
            SimpleAssignment { target, value } | CompoundAssignment { target, value } => {
                vec![&**target, &**value]
            }
            Increment { target, .. } => vec![&**target],
            Binary { left, right } => vec![&**left, &**right],
            Unary { operand } | Conversion { operand } => vec![&**operand],
            Invocation {
                instance,
                arguments,
                ..
            } => instance.iter().map(|op| &**op).chain(arguments).collect(),
            DelegateInvocation { target, arguments } => {
                std::iter::once(&**target).chain(arguments).collect()
            }
            Argument { value, .. } => vec![&**value],
            DelegateCreation { target } => vec![&**target],
            AnonymousFunction { function } | LocalFunction { function } => {
                function.code_units.iter().map(|unit| &unit.body).collect()
            }
            Conditional {
                condition,
                when_true,
                when_false,
            } => std::iter::once(&**condition)
                .chain(std::iter::once(&**when_true))
                .chain(when_false.iter().map(|op| &**op))
                .collect(),
            WhileLoop { condition, body } => vec![&**condition, &**body],
            Return { value } => value.iter().map(|op| &**op).collect(),
        }
    }

    /// Symbol named by a local or parameter reference
    pub fn referenced_symbol(&self) -> Option<SymbolId> {
        match self.kind {
            OperationKind::LocalReference { local } => Some(local),
            OperationKind::ParameterReference { parameter } => Some(parameter),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.kind, OperationKind::Invalid { .. })
            || self.ty.as_ref().is_some_and(TypeRef::is_error)
    }

    /// Whether the operation is the body of a nested lambda or local function
    pub fn nested_function(&self) -> Option<&Declaration> {
        match &self.kind {
            OperationKind::AnonymousFunction { function }
            | OperationKind::LocalFunction { function } => Some(&**function),
            _ => None,
        }
    }

    /// Whether the node or anything below it is erroneous
    pub fn contains_invalid(&self) -> bool {
        self.is_invalid() || self.children().into_iter().any(Operation::contains_invalid)
    }

    /// Pre-order iterator over this node and all descendants
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

/// Pre-order traversal produced by `Operation::descendants`
pub struct Descendants<'a> {
    stack: Vec<&'a Operation>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Operation;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children().into_iter().rev());
        Some(next)
    }
}
