//! Programmatic construction of compilations
//!
//! Used by tests, benchmarks and tooling that need IR without a front end.
//! Operation ids are assigned sequentially. Leaves get fresh, increasing
//! source positions and composite operations span their children, so building
//! statements in program order yields spans in source order.

use super::declaration::{CodeUnit, CodeUnitKind, Compilation, Declaration, DeclarationKind};
use super::operation::{
    ArgumentPassing, ConstantValue, IncrementKind, MethodRef, Operation, OperationId,
    OperationKind, Span,
};
use super::symbol::{DeclarationId, ParameterModifier, SymbolId, SymbolKind, SymbolTable};
use super::types::TypeRef;

#[derive(Debug, Default)]
pub struct IrBuilder {
    symbols: SymbolTable,
    declarations: Vec<Declaration>,
    next_operation: u32,
    next_position: u32,
    next_declaration: u32,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Start a declaration with a fresh id
    pub fn declaration(
        &mut self,
        kind: DeclarationKind,
        name: &str,
        return_type: TypeRef,
    ) -> Declaration {
        let id = DeclarationId(self.next_declaration);
        self.next_declaration += 1;
        Declaration::new(id, name, kind, return_type)
    }

    pub fn method(&mut self, name: &str, return_type: TypeRef) -> Declaration {
        self.declaration(DeclarationKind::Method, name, return_type)
    }

    /// Append a parameter to `declaration` and return its symbol
    pub fn parameter(
        &mut self,
        declaration: &mut Declaration,
        name: &str,
        ty: TypeRef,
        modifier: ParameterModifier,
    ) -> SymbolId {
        let span = self.fresh_span();
        let id = self.symbols.push(
            name,
            ty,
            declaration.id,
            SymbolKind::Parameter { modifier },
            span,
        );
        declaration.parameters.push(id);
        id
    }

    pub fn local(&mut self, owner: &Declaration, name: &str, ty: TypeRef) -> SymbolId {
        let span = self.fresh_span();
        self.symbols.push(name, ty, owner.id, SymbolKind::Local, span)
    }

    /// Attach a code unit whose body is a block of `statements`
    pub fn body(
        &mut self,
        declaration: &mut Declaration,
        kind: CodeUnitKind,
        statements: Vec<Operation>,
    ) {
        let body = self.block(statements);
        declaration.code_units.push(CodeUnit::new(kind, body));
    }

    /// Register a finished top-level declaration
    pub fn add(&mut self, declaration: Declaration) {
        self.declarations.push(declaration);
    }

    pub fn finish(self) -> Compilation {
        Compilation {
            symbols: self.symbols,
            declarations: self.declarations,
        }
    }

    fn next_id(&mut self) -> OperationId {
        let id = OperationId(self.next_operation);
        self.next_operation += 1;
        id
    }

    fn fresh_span(&mut self) -> Span {
        let start = self.next_position + 1;
        self.next_position += 2;
        Span::new(start, start + 1)
    }

    fn leaf(&mut self, ty: Option<TypeRef>, kind: OperationKind) -> Operation {
        Operation {
            id: self.next_id(),
            span: self.fresh_span(),
            ty,
            kind,
        }
    }

    fn node(&mut self, ty: Option<TypeRef>, kind: OperationKind) -> Operation {
        let id = self.next_id();
        let mut operation = Operation {
            id,
            span: Span::default(),
            ty,
            kind,
        };
        let span = operation
            .children()
            .into_iter()
            .map(|child| child.span)
            .reduce(Span::cover);
        operation.span = match span {
            Some(span) => span,
            None => self.fresh_span(),
        };
        operation
    }

    fn symbol_type(&self, symbol: SymbolId) -> TypeRef {
        self.symbols
            .get(symbol)
            .map(|s| s.ty.clone())
            .unwrap_or_else(TypeRef::error)
    }

    pub fn int(&mut self, value: i64) -> Operation {
        self.leaf(
            Some(TypeRef::int()),
            OperationKind::Literal {
                value: ConstantValue::Int(value),
            },
        )
    }

    pub fn bool(&mut self, value: bool) -> Operation {
        self.leaf(
            Some(TypeRef::boolean()),
            OperationKind::Literal {
                value: ConstantValue::Bool(value),
            },
        )
    }

    pub fn null(&mut self, ty: TypeRef) -> Operation {
        self.leaf(
            Some(ty),
            OperationKind::Literal {
                value: ConstantValue::Null,
            },
        )
    }

    pub fn local_ref(&mut self, local: SymbolId) -> Operation {
        let ty = self.symbol_type(local);
        self.leaf(Some(ty), OperationKind::LocalReference { local })
    }

    pub fn param_ref(&mut self, parameter: SymbolId) -> Operation {
        let ty = self.symbol_type(parameter);
        self.leaf(Some(ty), OperationKind::ParameterReference { parameter })
    }

    pub fn this_ref(&mut self, ty: TypeRef) -> Operation {
        self.leaf(Some(ty), OperationKind::InstanceReference)
    }

    pub fn discard(&mut self, ty: TypeRef) -> Operation {
        self.leaf(Some(ty), OperationKind::Discard)
    }

    pub fn field(&mut self, name: &str, instance: Option<Operation>, ty: TypeRef) -> Operation {
        self.node(
            Some(ty),
            OperationKind::FieldReference {
                field: name.to_string(),
                instance: instance.map(Box::new),
            },
        )
    }

    pub fn property(&mut self, name: &str, instance: Option<Operation>, ty: TypeRef) -> Operation {
        self.node(
            Some(ty),
            OperationKind::PropertyReference {
                property: name.to_string(),
                instance: instance.map(Box::new),
            },
        )
    }

    pub fn assign(&mut self, target: Operation, value: Operation) -> Operation {
        let ty = target.ty.clone();
        self.node(
            ty,
            OperationKind::SimpleAssignment {
                target: Box::new(target),
                value: Box::new(value),
            },
        )
    }

    pub fn compound_assign(&mut self, target: Operation, value: Operation) -> Operation {
        let ty = target.ty.clone();
        self.node(
            ty,
            OperationKind::CompoundAssignment {
                target: Box::new(target),
                value: Box::new(value),
            },
        )
    }

    pub fn increment(&mut self, target: Operation, kind: IncrementKind) -> Operation {
        let ty = target.ty.clone();
        self.node(
            ty,
            OperationKind::Increment {
                target: Box::new(target),
                kind,
            },
        )
    }

    pub fn binary(&mut self, left: Operation, right: Operation, ty: TypeRef) -> Operation {
        self.node(
            Some(ty),
            OperationKind::Binary {
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }

    pub fn unary(&mut self, operand: Operation, ty: TypeRef) -> Operation {
        self.node(
            Some(ty),
            OperationKind::Unary {
                operand: Box::new(operand),
            },
        )
    }

    pub fn conversion(&mut self, operand: Operation, ty: TypeRef) -> Operation {
        self.node(
            Some(ty),
            OperationKind::Conversion {
                operand: Box::new(operand),
            },
        )
    }

    pub fn call(
        &mut self,
        method: MethodRef,
        instance: Option<Operation>,
        arguments: Vec<Operation>,
        return_type: TypeRef,
    ) -> Operation {
        self.node(
            Some(return_type),
            OperationKind::Invocation {
                method,
                instance: instance.map(Box::new),
                arguments,
            },
        )
    }

    pub fn delegate_call(
        &mut self,
        target: Operation,
        arguments: Vec<Operation>,
        return_type: TypeRef,
    ) -> Operation {
        self.node(
            Some(return_type),
            OperationKind::DelegateInvocation {
                target: Box::new(target),
                arguments,
            },
        )
    }

    pub fn arg(&mut self, value: Operation) -> Operation {
        self.argument(value, ArgumentPassing::Value)
    }

    pub fn ref_arg(&mut self, value: Operation) -> Operation {
        self.argument(value, ArgumentPassing::Ref)
    }

    pub fn out_arg(&mut self, value: Operation) -> Operation {
        self.argument(value, ArgumentPassing::Out)
    }

    pub fn argument(&mut self, value: Operation, passing: ArgumentPassing) -> Operation {
        let ty = value.ty.clone();
        self.node(
            ty,
            OperationKind::Argument {
                value: Box::new(value),
                passing,
            },
        )
    }

    pub fn method_ref(&mut self, method: MethodRef, instance: Option<Operation>) -> Operation {
        self.node(
            None,
            OperationKind::MethodReference {
                method,
                instance: instance.map(Box::new),
            },
        )
    }

    /// Wrap a lambda or method reference into a delegate of type `ty`
    pub fn delegate(&mut self, target: Operation, ty: TypeRef) -> Operation {
        self.node(
            Some(ty),
            OperationKind::DelegateCreation {
                target: Box::new(target),
            },
        )
    }

    pub fn lambda(&mut self, function: Declaration) -> Operation {
        self.node(
            None,
            OperationKind::AnonymousFunction {
                function: Box::new(function),
            },
        )
    }

    pub fn local_function(&mut self, function: Declaration) -> Operation {
        self.node(
            None,
            OperationKind::LocalFunction {
                function: Box::new(function),
            },
        )
    }

    pub fn declare(&mut self, local: SymbolId, initializer: Option<Operation>) -> Operation {
        self.node(
            None,
            OperationKind::VariableDeclarator {
                local,
                initializer: initializer.map(Box::new),
            },
        )
    }

    pub fn expr_stmt(&mut self, expression: Operation) -> Operation {
        self.node(
            None,
            OperationKind::ExpressionStatement {
                expression: Box::new(expression),
            },
        )
    }

    /// Expression statement whose syntax starts before its expression
    pub fn wrapped_expr_stmt(&mut self, expression: Operation) -> Operation {
        let mut statement = self.expr_stmt(expression);
        statement.span.start = statement.span.start.saturating_sub(1);
        statement
    }

    pub fn if_(
        &mut self,
        condition: Operation,
        when_true: Operation,
        when_false: Option<Operation>,
    ) -> Operation {
        self.node(
            None,
            OperationKind::Conditional {
                condition: Box::new(condition),
                when_true: Box::new(when_true),
                when_false: when_false.map(Box::new),
            },
        )
    }

    pub fn while_(&mut self, condition: Operation, body: Operation) -> Operation {
        self.node(
            None,
            OperationKind::WhileLoop {
                condition: Box::new(condition),
                body: Box::new(body),
            },
        )
    }

    pub fn ret(&mut self, value: Option<Operation>) -> Operation {
        self.node(
            None,
            OperationKind::Return {
                value: value.map(Box::new),
            },
        )
    }

    pub fn block(&mut self, operations: Vec<Operation>) -> Operation {
        self.node(None, OperationKind::Block { operations })
    }

    pub fn invalid(&mut self, children: Vec<Operation>) -> Operation {
        self.node(Some(TypeRef::error()), OperationKind::Invalid { children })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_spans_cover_children() {
        let mut b = IrBuilder::new();
        let mut method = b.method("f", TypeRef::void());
        let x = b.local(&method, "x", TypeRef::int());
        let target = b.local_ref(x);
        let value = b.int(1);
        let (target_span, value_span) = (target.span, value.span);
        let assign = b.assign(target, value);
        assert_eq!(assign.span.start, target_span.start);
        assert_eq!(assign.span.end, value_span.end);

        let statement = b.expr_stmt(assign);
        b.body(&mut method, CodeUnitKind::MethodBody, vec![statement]);
        b.add(method);

        let compilation = b.finish();
        assert!(compilation.symbols.validate().is_ok());
        assert_eq!(compilation.declarations.len(), 1);
    }

    #[test]
    fn test_empty_block_gets_a_span() {
        let mut b = IrBuilder::new();
        let first = b.block(vec![]);
        let second = b.block(vec![]);
        assert!(first.span.start < second.span.start);
    }
}
