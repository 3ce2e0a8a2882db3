//! Analyzer configuration
//!
//! Severities for the three rules, the remediation preferences the reporting
//! layer needs, and the predicate that decides which declarations take part in
//! unused-parameter analysis.

use crate::error::{Error, Result};
use crate::ir::{Accessibility, Declaration, SymbolTable, TypeKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Rule disabled
    None,
    Hidden,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn is_enabled(self) -> bool {
        self != Severity::None
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::None => "none",
            Severity::Hidden => "hidden",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// How the user prefers an unused value to be made explicit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnusedValuePreference {
    /// `_ = Compute();`
    DiscardVariable,
    /// `var unused = Compute();`
    UnusedLocalVariable,
}

impl UnusedValuePreference {
    pub fn as_str(self) -> &'static str {
        match self {
            UnusedValuePreference::DiscardVariable => "discard_variable",
            UnusedValuePreference::UnusedLocalVariable => "unused_local_variable",
        }
    }
}

/// Which declarations are checked for unused parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnusedParametersScope {
    All,
    NonPublic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerOptions {
    pub unused_value_assignment_severity: Severity,
    pub unused_value_assignment_preference: UnusedValuePreference,
    pub unused_value_expression_statement_severity: Severity,
    pub unused_value_expression_statement_preference: UnusedValuePreference,
    pub unused_parameters_severity: Severity,
    pub unused_parameters_scope: UnusedParametersScope,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            unused_value_assignment_severity: Severity::Info,
            unused_value_assignment_preference: UnusedValuePreference::DiscardVariable,
            unused_value_expression_statement_severity: Severity::Hidden,
            unused_value_expression_statement_preference: UnusedValuePreference::DiscardVariable,
            unused_parameters_severity: Severity::Info,
            unused_parameters_scope: UnusedParametersScope::All,
        }
    }
}

impl AnalyzerOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config {
            message: e.to_string(),
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn reports_unused_parameters(&self) -> bool {
        self.unused_parameters_severity.is_enabled()
    }

    /// Whether `declaration`'s signature is free to change
    pub fn is_in_scope_for_unused_parameters(
        &self,
        declaration: &Declaration,
        symbols: &SymbolTable,
    ) -> bool {
        if declaration.is_override
            || declaration.implements_interface
            || declaration.is_abstract_or_extern
        {
            return false;
        }
        if self.unused_parameters_scope == UnusedParametersScope::NonPublic
            && declaration.accessibility != Accessibility::Private
        {
            return false;
        }
        !has_event_handler_shape(declaration, symbols)
    }
}

/// `void Handler(object sender, SomethingEventArgs e)`
fn has_event_handler_shape(declaration: &Declaration, symbols: &SymbolTable) -> bool {
    let [sender, args] = declaration.parameters.as_slice() else {
        return false;
    };
    let (Some(sender), Some(args)) = (symbols.get(*sender), symbols.get(*args)) else {
        return false;
    };
    declaration.return_type.is_void()
        && sender.ty.kind == TypeKind::Object
        && sender.ty.name == "object"
        && args.ty.name.ends_with("EventArgs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{IrBuilder, ParameterModifier, TypeRef};

    #[test]
    fn test_defaults_enable_every_rule() {
        let options = AnalyzerOptions::default();
        assert!(options.unused_value_assignment_severity.is_enabled());
        assert!(options.unused_value_expression_statement_severity.is_enabled());
        assert!(options.reports_unused_parameters());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = AnalyzerOptions::from_json(
            r#"{ "unused_parameters_severity": "none", "unused_value_assignment_preference": "unused_local_variable" }"#,
        )
        .unwrap();
        assert!(!options.reports_unused_parameters());
        assert_eq!(
            options.unused_value_assignment_preference,
            UnusedValuePreference::UnusedLocalVariable
        );
        assert_eq!(options.unused_value_assignment_severity, Severity::Info);
    }

    #[test]
    fn test_malformed_json_is_a_config_error() {
        let err = AnalyzerOptions::from_json("{ nope").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_scope_predicate() {
        let mut b = IrBuilder::new();
        let options = AnalyzerOptions::default();

        let mut handler = b.method("OnClick", TypeRef::void());
        b.parameter(&mut handler, "sender", TypeRef::object("object"), ParameterModifier::None);
        b.parameter(&mut handler, "e", TypeRef::object("ClickEventArgs"), ParameterModifier::None);
        assert!(!options.is_in_scope_for_unused_parameters(&handler, b.symbols()));

        let mut plain = b.method("Compute", TypeRef::int());
        b.parameter(&mut plain, "x", TypeRef::int(), ParameterModifier::None);
        assert!(options.is_in_scope_for_unused_parameters(&plain, b.symbols()));

        plain.is_override = true;
        assert!(!options.is_in_scope_for_unused_parameters(&plain, b.symbols()));

        let non_public = AnalyzerOptions {
            unused_parameters_scope: UnusedParametersScope::NonPublic,
            ..AnalyzerOptions::default()
        };
        let mut public = b.method("Api", TypeRef::void());
        public.accessibility = Accessibility::Public;
        assert!(!non_public.is_in_scope_for_unused_parameters(&public, b.symbols()));
    }
}
