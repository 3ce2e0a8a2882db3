//! Type references attached to operations and symbols

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of a type, enough for the analyses in this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Void,
    Boolean,
    Numeric,
    String,
    /// Delegate / function-pointer-like type
    Delegate,
    Object,
    /// Type could not be bound
    Error,
}

/// A named type with its classification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    pub kind: TypeKind,
}

impl TypeRef {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn void() -> Self {
        Self::new("void", TypeKind::Void)
    }

    pub fn boolean() -> Self {
        Self::new("bool", TypeKind::Boolean)
    }

    pub fn int() -> Self {
        Self::new("int", TypeKind::Numeric)
    }

    pub fn string() -> Self {
        Self::new("string", TypeKind::String)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Object)
    }

    pub fn delegate(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Delegate)
    }

    pub fn error() -> Self {
        Self::new("?", TypeKind::Error)
    }

    pub fn is_delegate(&self) -> bool {
        self.kind == TypeKind::Delegate
    }

    pub fn is_void(&self) -> bool {
        self.kind == TypeKind::Void
    }

    pub fn is_boolean(&self) -> bool {
        self.kind == TypeKind::Boolean
    }

    pub fn is_error(&self) -> bool {
        self.kind == TypeKind::Error
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
