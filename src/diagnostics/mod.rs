//! Findings handed to the reporting layer
//!
//! Each finding is (rule, location, severity, properties, message arguments).
//! The property keys are a small fixed set so a code fix can pick the exact
//! remediation without re-deriving the classification.

use crate::ir::Span;
use crate::options::{Severity, UnusedValuePreference};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const UNUSED_VALUE_PREFERENCE_KEY: &str = "unused_value_preference";
pub const IS_UNUSED_LOCAL_ASSIGNMENT_KEY: &str = "is_unused_local_assignment";
pub const IS_REMOVABLE_ASSIGNMENT_KEY: &str = "is_removable_assignment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    UnusedValueAssignment,
    UnusedValueExpressionStatement,
    UnusedParameter,
}

impl RuleKind {
    pub fn code(self) -> &'static str {
        match self {
            RuleKind::UnusedValueAssignment => "UV0001",
            RuleKind::UnusedValueExpressionStatement => "UV0002",
            RuleKind::UnusedParameter => "UV0003",
        }
    }
}

/// Which wording the reporting layer should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageVariant {
    Default,
    /// Parameter is referenced, but its caller-supplied value is never used
    InitialValueNeverUsed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub rule: RuleKind,
    pub span: Span,
    pub severity: Severity,
    pub properties: BTreeMap<String, String>,
    pub message_args: Vec<String>,
    pub variant: MessageVariant,
}

impl Diagnostic {
    pub fn unused_value_assignment(
        span: Span,
        severity: Severity,
        symbol_name: &str,
        preference: UnusedValuePreference,
        is_unused_local: bool,
        is_removable: bool,
    ) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(
            UNUSED_VALUE_PREFERENCE_KEY.to_string(),
            preference.as_str().to_string(),
        );
        if is_unused_local {
            properties.insert(IS_UNUSED_LOCAL_ASSIGNMENT_KEY.to_string(), "true".to_string());
        }
        if is_removable {
            properties.insert(IS_REMOVABLE_ASSIGNMENT_KEY.to_string(), "true".to_string());
        }
        Self {
            rule: RuleKind::UnusedValueAssignment,
            span,
            severity,
            properties,
            message_args: vec![symbol_name.to_string()],
            variant: MessageVariant::Default,
        }
    }

    pub fn unused_value_expression_statement(
        span: Span,
        severity: Severity,
        preference: UnusedValuePreference,
    ) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(
            UNUSED_VALUE_PREFERENCE_KEY.to_string(),
            preference.as_str().to_string(),
        );
        Self {
            rule: RuleKind::UnusedValueExpressionStatement,
            span,
            severity,
            properties,
            message_args: Vec::new(),
            variant: MessageVariant::Default,
        }
    }

    pub fn unused_parameter(
        span: Span,
        severity: Severity,
        parameter_name: &str,
        is_referenced: bool,
    ) -> Self {
        Self {
            rule: RuleKind::UnusedParameter,
            span,
            severity,
            properties: BTreeMap::new(),
            message_args: vec![parameter_name.to_string()],
            variant: if is_referenced {
                MessageVariant::InitialValueNeverUsed
            } else {
                MessageVariant::Default
            },
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn is_removable_assignment(&self) -> bool {
        self.property(IS_REMOVABLE_ASSIGNMENT_KEY) == Some("true")
    }

    pub fn is_unused_local_assignment(&self) -> bool {
        self.property(IS_UNUSED_LOCAL_ASSIGNMENT_KEY) == Some("true")
    }

    /// Rendered message, for tooling that has no localized catalog
    pub fn message(&self) -> String {
        let arg = self.message_args.first().map(String::as_str).unwrap_or("");
        match (self.rule, self.variant) {
            (RuleKind::UnusedValueAssignment, _) => {
                format!("Unnecessary assignment of a value to '{}'", arg)
            }
            (RuleKind::UnusedValueExpressionStatement, _) => {
                "Expression value is never used".to_string()
            }
            (RuleKind::UnusedParameter, MessageVariant::InitialValueNeverUsed) => format!(
                "Parameter '{}' can be removed; its initial value is never used",
                arg
            ),
            (RuleKind::UnusedParameter, MessageVariant::Default) => {
                format!("Remove unused parameter '{}'", arg)
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.span,
            self.rule.code(),
            self.severity,
            self.message()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_properties() {
        let diagnostic = Diagnostic::unused_value_assignment(
            Span::new(3, 9),
            Severity::Info,
            "y",
            UnusedValuePreference::DiscardVariable,
            false,
            true,
        );
        assert!(diagnostic.is_removable_assignment());
        assert!(!diagnostic.is_unused_local_assignment());
        assert_eq!(
            diagnostic.property(UNUSED_VALUE_PREFERENCE_KEY),
            Some("discard_variable")
        );
        assert_eq!(
            diagnostic.to_string(),
            "3..9 [UV0001] info: Unnecessary assignment of a value to 'y'"
        );
    }

    #[test]
    fn test_parameter_message_variants() {
        let ignored = Diagnostic::unused_parameter(Span::new(0, 1), Severity::Info, "p", false);
        assert_eq!(ignored.message(), "Remove unused parameter 'p'");

        let overwritten = Diagnostic::unused_parameter(Span::new(0, 1), Severity::Info, "p", true);
        assert!(overwritten.message().contains("initial value is never used"));
    }
}
