//! Best-effort delegate escape pre-scan
//!
//! One forward pass over a code unit recording whether delegates are created,
//! whether a delegate is stored into a field or property, and whether a
//! delegate is converted to a non-delegate type. Once set, a flag stays set.
//! The flags decide whether the tree-walk tier may be used and whether the
//! code unit can be analyzed at all.

use crate::cancellation::CancellationToken;
use crate::error::Result;
use crate::ir::{Operation, OperationKind, Span};
use serde::Serialize;

/// Flags produced for one code unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EscapeFlags {
    pub has_delegate_creation: bool,
    pub delegate_escaped_to_field_or_property: bool,
    pub has_delegate_to_non_delegate_conversion: bool,
}

impl EscapeFlags {
    /// No delegate shapes at all, the tree-walk tier is admissible
    pub fn is_clear(&self) -> bool {
        !self.has_delegate_creation
            && !self.delegate_escaped_to_field_or_property
            && !self.has_delegate_to_non_delegate_conversion
    }

    /// A delegate may flow somewhere the analysis cannot follow
    pub fn may_escape(&self) -> bool {
        self.delegate_escaped_to_field_or_property || self.has_delegate_to_non_delegate_conversion
    }
}

/// Why a flag was raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EscapeReason {
    /// Lambda literal or method group converted to a delegate
    DelegateCreated,
    /// Delegate assigned into a field or property
    StoredInFieldOrProperty { member: String },
    /// Delegate converted to a non-delegate type
    ConvertedToNonDelegate { target_type: String },
}

/// Result of scanning one code unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EscapeScan {
    pub flags: EscapeFlags,
    /// Every site that raised a flag, in traversal order
    pub sites: Vec<(Span, EscapeReason)>,
}

/// Accumulator owned by a single scan
#[derive(Debug, Default)]
pub struct EscapeScanner {
    scan: EscapeScan,
}

impl EscapeScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `root` and everything below it, nested function bodies included
    pub fn scan(root: &Operation, cancellation: &CancellationToken) -> Result<EscapeScan> {
        let mut scanner = Self::new();
        let mut stack = vec![root];
        while let Some(operation) = stack.pop() {
            cancellation.check()?;
            scanner.visit(operation);
            stack.extend(operation.children().into_iter().rev());
        }

        log::trace!("Escape scan finished: {:?}", scanner.scan.flags);
        Ok(scanner.scan)
    }

    fn record(&mut self, span: Span, reason: EscapeReason) {
        match reason {
            EscapeReason::DelegateCreated => self.scan.flags.has_delegate_creation = true,
            EscapeReason::StoredInFieldOrProperty { .. } => {
                self.scan.flags.delegate_escaped_to_field_or_property = true
            }
            EscapeReason::ConvertedToNonDelegate { .. } => {
                self.scan.flags.has_delegate_to_non_delegate_conversion = true
            }
        }
        self.scan.sites.push((span, reason));
    }

    fn visit(&mut self, operation: &Operation) {
        use OperationKind::*;

        match &operation.kind {
            DelegateCreation { .. } | AnonymousFunction { .. } => {
                self.record(operation.span, EscapeReason::DelegateCreated)
            }
            Conversion { operand } => {
                let from_delegate = operand.ty.as_ref().is_some_and(|ty| ty.is_delegate());
                if let Some(to) = &operation.ty {
                    if from_delegate && !to.is_delegate() {
                        self.record(
                            operation.span,
                            EscapeReason::ConvertedToNonDelegate {
                                target_type: to.name.clone(),
                            },
                        );
                    }
                }
            }
            SimpleAssignment { target, .. } => {
                let member = match &target.kind {
                    FieldReference { field, .. } => Some(field),
                    PropertyReference { property, .. } => Some(property),
                    _ => None,
                };
                let is_delegate = target.ty.as_ref().is_some_and(|ty| ty.is_delegate());
                if let (Some(member), true) = (member, is_delegate) {
                    self.record(
                        operation.span,
                        EscapeReason::StoredInFieldOrProperty {
                            member: member.clone(),
                        },
                    );
                }
            }
            Block { .. }
            | ExpressionStatement { .. }
            | VariableDeclarator { .. }
            | Literal { .. }
            | LocalReference { .. }
            | ParameterReference { .. }
            | InstanceReference
            | FieldReference { .. }
            | PropertyReference { .. }
            | Discard
            | CompoundAssignment { .. }
            | Increment { .. }
            | Binary { .. }
            | Unary { .. }
            | Invocation { .. }
            | DelegateInvocation { .. }
            | Argument { .. }
            | MethodReference { .. }
            | LocalFunction { .. }
            | Conditional { .. }
            | WhileLoop { .. }
            | Return { .. }
            | Invalid { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DeclarationKind, IrBuilder, MethodRef, TypeRef};

    fn scan(op: &Operation) -> EscapeFlags {
        EscapeScanner::scan(op, &CancellationToken::none())
            .unwrap()
            .flags
    }

    #[test]
    fn test_empty_block_has_no_flags() {
        let mut b = IrBuilder::new();
        let block = b.block(vec![]);
        assert!(scan(&block).is_clear());
    }

    #[test]
    fn test_method_group_conversion_is_delegate_creation() {
        let mut b = IrBuilder::new();
        let target = b.method_ref(MethodRef::new_static("C", "M"), None);
        let delegate = b.delegate(target, TypeRef::delegate("Action"));
        let statement = b.expr_stmt(delegate);
        let flags = scan(&statement);
        assert!(flags.has_delegate_creation);
        assert!(!flags.may_escape());
    }

    #[test]
    fn test_delegate_stored_into_field() {
        let mut b = IrBuilder::new();
        let mut lambda =
            b.declaration(DeclarationKind::AnonymousFunction, "<lambda>", TypeRef::void());
        b.body(&mut lambda, crate::ir::CodeUnitKind::LambdaBody, vec![]);
        let lambda = b.lambda(lambda);
        let value = b.delegate(lambda, TypeRef::delegate("Action"));
        let this = b.this_ref(TypeRef::object("C"));
        let field = b.field("callback", Some(this), TypeRef::delegate("Action"));
        let assign = b.assign(field, value);
        let statement = b.expr_stmt(assign);

        let result = EscapeScanner::scan(&statement, &CancellationToken::none()).unwrap();
        assert!(result.flags.has_delegate_creation);
        assert!(result.flags.delegate_escaped_to_field_or_property);
        assert!(result.sites.iter().any(|(_, reason)| matches!(
            reason,
            EscapeReason::StoredInFieldOrProperty { member } if member == "callback"
        )));
    }

    #[test]
    fn test_non_delegate_field_assignment_does_not_escape() {
        let mut b = IrBuilder::new();
        let field = b.field("count", None, TypeRef::int());
        let one = b.int(1);
        let assign = b.assign(field, one);
        assert!(scan(&assign).is_clear());
    }

    #[test]
    fn test_delegate_to_object_conversion() {
        let mut b = IrBuilder::new();
        let target = b.method_ref(MethodRef::new_static("C", "M"), None);
        let delegate = b.delegate(target, TypeRef::delegate("Action"));
        let boxed = b.conversion(delegate, TypeRef::object("object"));
        let flags = scan(&boxed);
        assert!(flags.has_delegate_to_non_delegate_conversion);
    }

    #[test]
    fn test_delegate_to_delegate_conversion_is_fine() {
        let mut b = IrBuilder::new();
        let field = b.field("handler", None, TypeRef::delegate("Action"));
        let converted = b.conversion(field, TypeRef::delegate("Delegate"));
        assert!(!scan(&converted).has_delegate_to_non_delegate_conversion);
    }

    #[test]
    fn test_cancelled_scan_fails() {
        let source = crate::cancellation::CancellationSource::new();
        source.cancel();
        let mut b = IrBuilder::new();
        let block = b.block(vec![]);
        assert!(EscapeScanner::scan(&block, &source.token()).is_err());
    }
}
