//! Locals, parameters and the table that owns them

use super::operation::Span;
use super::types::TypeRef;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a symbol in its `SymbolTable`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Identity of an owning declaration (method, local function, lambda)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclarationId(pub u32);

impl fmt::Display for DeclarationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// Parameter passing modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterModifier {
    #[default]
    None,
    Ref,
    Out,
    In,
    /// Variadic parameter
    Params,
}

impl ParameterModifier {
    /// Whether writes to the parameter flow back to the caller
    pub fn is_ref_or_out(self) -> bool {
        matches!(self, ParameterModifier::Ref | ParameterModifier::Out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SymbolKind {
    Local,
    Parameter {
        #[serde(default)]
        modifier: ParameterModifier,
    },
}

/// A local variable or a parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub ty: TypeRef,
    /// Declaration whose body declares the symbol
    pub owner: DeclarationId,
    #[serde(flatten)]
    pub kind: SymbolKind,
    /// Declaration site
    #[serde(default)]
    pub span: Span,
}

impl Symbol {
    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, SymbolKind::Parameter { .. })
    }

    pub fn is_local(&self) -> bool {
        matches!(self.kind, SymbolKind::Local)
    }

    pub fn modifier(&self) -> Option<ParameterModifier> {
        match self.kind {
            SymbolKind::Parameter { modifier } => Some(modifier),
            SymbolKind::Local => None,
        }
    }

    pub fn is_ref_or_out_parameter(&self) -> bool {
        self.modifier().is_some_and(ParameterModifier::is_ref_or_out)
    }

    /// `_`, `_1`, `_23`: names that opt out of unused-value reporting
    pub fn has_discard_name(&self) -> bool {
        match self.name.strip_prefix('_') {
            Some(rest) => rest.chars().all(|c| c.is_ascii_digit()),
            None => false,
        }
    }
}

/// Every symbol of one compilation, indexed by `SymbolId`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbol, assigning it the next id
    pub fn push(
        &mut self,
        name: impl Into<String>,
        ty: TypeRef,
        owner: DeclarationId,
        kind: SymbolKind,
        span: Span,
    ) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            id,
            name: name.into(),
            ty,
            owner,
            kind,
            span,
        });
        id
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    /// Look up a symbol, failing on dangling ids
    pub fn resolve(&self, id: SymbolId) -> Result<&Symbol> {
        self.get(id)
            .ok_or_else(|| Error::invalid_input(format!("unknown symbol {}", id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Check that every symbol sits at the index its id names
    pub fn validate(&self) -> Result<()> {
        for (index, symbol) in self.symbols.iter().enumerate() {
            if symbol.id.index() != index {
                return Err(Error::invalid_input(format!(
                    "symbol '{}' has id {} but is stored at index {}",
                    symbol.name, symbol.id, index
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str) -> Symbol {
        Symbol {
            id: SymbolId(0),
            name: name.to_string(),
            ty: TypeRef::int(),
            owner: DeclarationId(0),
            kind: SymbolKind::Local,
            span: Span::default(),
        }
    }

    #[test]
    fn test_discard_names() {
        assert!(local("_").has_discard_name());
        assert!(local("_1").has_discard_name());
        assert!(local("_42").has_discard_name());
        assert!(!local("_value").has_discard_name());
        assert!(!local("x").has_discard_name());
    }

    #[test]
    fn test_validate_rejects_misplaced_ids() {
        let mut table = SymbolTable::new();
        table.push(
            "a",
            TypeRef::int(),
            DeclarationId(0),
            SymbolKind::Local,
            Span::default(),
        );
        assert!(table.validate().is_ok());

        table.symbols[0].id = SymbolId(7);
        assert!(matches!(table.validate(), Err(Error::InvalidInput { .. })));
    }

    #[test]
    fn test_ref_or_out() {
        let mut table = SymbolTable::new();
        let p = table.push(
            "p",
            TypeRef::int(),
            DeclarationId(0),
            SymbolKind::Parameter {
                modifier: ParameterModifier::Ref,
            },
            Span::default(),
        );
        assert!(table.get(p).unwrap().is_ref_or_out_parameter());
        assert!(!ParameterModifier::In.is_ref_or_out());
    }
}
