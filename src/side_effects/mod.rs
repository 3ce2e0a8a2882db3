//! Side-effect classification for unread writes and dropped values
//!
//! Classification never suppresses an unused-value finding. It only decides
//! whether the remediation layer may offer to delete the write outright or
//! must keep the right-hand side (assigning it to a discard instead).

use crate::ir::{MethodRef, Operation, OperationKind};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Calls whose result is the prior value and is routinely ignored
static IGNORABLE_RESULT_APIS: Lazy<HashSet<(&'static str, &'static str)>> = Lazy::new(|| {
    HashSet::from([
        ("System.Threading.Interlocked", "Exchange"),
        ("System.Threading.Interlocked", "CompareExchange"),
    ])
});

pub fn is_constant(operation: &Operation) -> bool {
    match &operation.kind {
        OperationKind::Literal { .. } => true,
        OperationKind::Conversion { operand } => is_constant(operand),
        _ => false,
    }
}

/// Whether evaluating `value` might do something observable
pub fn has_side_effects(value: &Operation) -> bool {
    match &value.kind {
        OperationKind::LocalReference { .. } | OperationKind::ParameterReference { .. } => false,
        OperationKind::FieldReference { instance, .. } => !matches!(
            instance.as_deref().map(|instance| &instance.kind),
            None | Some(OperationKind::InstanceReference)
        ),
        _ => !is_constant(value),
    }
}

/// Whether the write at `site` can be deleted together with its value
pub fn is_removable_write(site: &Operation) -> bool {
    match &site.kind {
        OperationKind::SimpleAssignment { value, .. }
        | OperationKind::CompoundAssignment { value, .. } => !has_side_effects(value),
        OperationKind::VariableDeclarator {
            initializer: Some(initializer),
            ..
        } => !has_side_effects(initializer),
        OperationKind::Increment { .. } => true,
        // ref/out arguments: the write is part of a call
        _ => false,
    }
}

fn is_ignorable_result_api(method: &MethodRef) -> bool {
    IGNORABLE_RESULT_APIS.contains(&(method.containing_type.as_str(), method.name.as_str()))
}

/// Whether the value dropped by an expression statement deserves a finding
pub fn is_reportable_dropped_value(statement: &Operation) -> bool {
    let OperationKind::ExpressionStatement { expression } = &statement.kind else {
        return false;
    };

    let Some(ty) = &expression.ty else {
        return false;
    };
    if ty.is_void() || ty.is_boolean() {
        return false;
    }
    if is_constant(expression) || expression.is_invalid() {
        return false;
    }
    // Explicit discard syntax wraps the expression
    if statement.span.start != expression.span.start {
        return false;
    }

    match &expression.kind {
        OperationKind::SimpleAssignment { .. }
        | OperationKind::CompoundAssignment { .. }
        | OperationKind::Increment { .. } => false,
        OperationKind::Invocation { method, .. } => !is_ignorable_result_api(method),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{IncrementKind, IrBuilder, TypeRef};

    #[test]
    fn test_literal_assignment_is_removable() {
        let mut b = IrBuilder::new();
        let f = b.method("f", TypeRef::void());
        let y = b.local(&f, "y", TypeRef::int());
        let target = b.local_ref(y);
        let one = b.int(1);
        let assign = b.assign(target, one);
        assert!(is_removable_write(&assign));
    }

    #[test]
    fn test_instance_call_is_not_removable() {
        let mut b = IrBuilder::new();
        let f = b.method("f", TypeRef::void());
        let y = b.local(&f, "y", TypeRef::int());
        let target = b.local_ref(y);
        let this = b.this_ref(TypeRef::object("C"));
        let call = b.call(MethodRef::new("C", "Compute"), Some(this), vec![], TypeRef::int());
        let assign = b.assign(target, call);
        assert!(!is_removable_write(&assign));
    }

    #[test]
    fn test_field_reads() {
        let mut b = IrBuilder::new();
        let this = b.this_ref(TypeRef::object("C"));
        let own = b.field("count", Some(this), TypeRef::int());
        assert!(!has_side_effects(&own));

        let shared = b.field("Shared", None, TypeRef::int());
        assert!(!has_side_effects(&shared));

        let other = b.this_ref(TypeRef::object("C"));
        let nested = b.property("Next", Some(other), TypeRef::object("C"));
        let through = b.field("count", Some(nested), TypeRef::int());
        assert!(has_side_effects(&through));
    }

    #[test]
    fn test_increment_is_removable() {
        let mut b = IrBuilder::new();
        let f = b.method("f", TypeRef::void());
        let i = b.local(&f, "i", TypeRef::int());
        let target = b.local_ref(i);
        let bump = b.increment(target, IncrementKind::PostIncrement);
        assert!(is_removable_write(&bump));
    }

    #[test]
    fn test_dropped_value_bail_outs() {
        let mut b = IrBuilder::new();

        let call = b.call(MethodRef::new_static("C", "Parse"), None, vec![], TypeRef::int());
        let statement = b.expr_stmt(call);
        assert!(is_reportable_dropped_value(&statement));

        let check = b.call(MethodRef::new_static("C", "TryIt"), None, vec![], TypeRef::boolean());
        let statement = b.expr_stmt(check);
        assert!(!is_reportable_dropped_value(&statement));

        let action = b.call(MethodRef::new_static("C", "Run"), None, vec![], TypeRef::void());
        let statement = b.expr_stmt(action);
        assert!(!is_reportable_dropped_value(&statement));

        let exchange = b.call(
            MethodRef::new_static("System.Threading.Interlocked", "Exchange"),
            None,
            vec![],
            TypeRef::int(),
        );
        let statement = b.expr_stmt(exchange);
        assert!(!is_reportable_dropped_value(&statement));

        let wrapped = b.call(MethodRef::new_static("C", "Parse"), None, vec![], TypeRef::int());
        let statement = b.wrapped_expr_stmt(wrapped);
        assert!(!is_reportable_dropped_value(&statement));

        let broken = b.invalid(vec![]);
        let statement = b.expr_stmt(broken);
        assert!(!is_reportable_dropped_value(&statement));
    }
}
