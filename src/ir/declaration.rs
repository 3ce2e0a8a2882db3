//! Owning declarations, their code units, and the compilation that holds them

use super::operation::{Operation, OperationKind};
use super::symbol::{DeclarationId, Symbol, SymbolId, SymbolTable};
use super::types::TypeRef;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Classification of an owning declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    /// Method, constructor, accessor, operator
    Method,
    LocalFunction,
    AnonymousFunction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessibility {
    #[default]
    Private,
    Protected,
    Internal,
    Public,
}

/// What region of a declaration a code unit covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeUnitKind {
    MethodBody,
    ConstructorInitializer,
    ConstructorBody,
    LambdaBody,
    LocalFunctionBody,
    FieldInitializer,
    PropertyInitializer,
    AttributeArgument,
}

impl CodeUnitKind {
    /// Initializers and attribute arguments are never analyzed
    pub fn is_analyzable(self) -> bool {
        !matches!(
            self,
            CodeUnitKind::FieldInitializer
                | CodeUnitKind::PropertyInitializer
                | CodeUnitKind::AttributeArgument
        )
    }
}

/// One executable region of a declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub kind: CodeUnitKind,
    pub body: Operation,
    /// Unresolved syntax errors inside the unit's span
    #[serde(default)]
    pub has_syntax_errors: bool,
}

impl CodeUnit {
    pub fn new(kind: CodeUnitKind, body: Operation) -> Self {
        Self {
            kind,
            body,
            has_syntax_errors: false,
        }
    }

    /// A unit with no operations to analyze
    pub fn is_empty(&self) -> bool {
        match &self.body.kind {
            OperationKind::Block { operations } => operations.is_empty(),
            _ => false,
        }
    }

    /// Symbols referenced anywhere in the unit, nested function bodies included
    pub fn referenced_symbols(&self) -> HashSet<SymbolId> {
        self.body
            .descendants()
            .filter_map(Operation::referenced_symbol)
            .collect()
    }
}

/// Method, local function, or anonymous function owning one or more code units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub id: DeclarationId,
    pub name: String,
    pub kind: DeclarationKind,
    /// Ordered parameter list
    #[serde(default)]
    pub parameters: Vec<SymbolId>,
    pub return_type: TypeRef,
    pub code_units: Vec<CodeUnit>,
    #[serde(default)]
    pub accessibility: Accessibility,
    #[serde(default)]
    pub is_override: bool,
    #[serde(default)]
    pub implements_interface: bool,
    #[serde(default)]
    pub is_abstract_or_extern: bool,
}

impl Declaration {
    pub fn new(
        id: DeclarationId,
        name: impl Into<String>,
        kind: DeclarationKind,
        return_type: TypeRef,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            parameters: Vec::new(),
            return_type,
            code_units: Vec::new(),
            accessibility: Accessibility::default(),
            is_override: false,
            implements_interface: false,
            is_abstract_or_extern: false,
        }
    }

    pub fn is_local_function(&self) -> bool {
        self.kind == DeclarationKind::LocalFunction
    }

    pub fn is_ordinary_method(&self) -> bool {
        self.kind == DeclarationKind::Method
    }

    /// Resolve the parameter list against the symbol table
    pub fn parameter_symbols<'a>(&self, symbols: &'a SymbolTable) -> Result<Vec<&'a Symbol>> {
        self.parameters
            .iter()
            .map(|id| {
                let symbol = symbols.resolve(*id)?;
                if !symbol.is_parameter() {
                    return Err(Error::invalid_input(format!(
                        "'{}' is listed as a parameter of '{}' but is not a parameter",
                        symbol.name, self.name
                    )));
                }
                Ok(symbol)
            })
            .collect()
    }

    /// Declarations nested directly or transitively inside this one
    pub fn nested_declarations(&self) -> Vec<&Declaration> {
        self.code_units
            .iter()
            .flat_map(|unit| unit.body.descendants())
            .filter_map(Operation::nested_function)
            .collect()
    }
}

/// Everything one analysis pass reads: symbols plus top-level declarations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Compilation {
    pub symbols: SymbolTable,
    pub declarations: Vec<Declaration>,
}

impl Compilation {
    pub fn from_json(json: &str) -> Result<Self> {
        let compilation: Compilation = serde_json::from_str(json)?;
        compilation.symbols.validate()?;
        Ok(compilation)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::internal(e.to_string()))
    }

    /// Top-level declarations followed by every nested one
    pub fn all_declarations(&self) -> Vec<&Declaration> {
        let mut all = Vec::new();
        for declaration in &self.declarations {
            all.push(declaration);
            all.extend(declaration.nested_declarations());
        }
        all
    }

    pub fn find_declaration(&self, name: &str) -> Option<&Declaration> {
        self.all_declarations()
            .into_iter()
            .find(|declaration| declaration.name == name)
    }
}
