//! Read-only views over the semantic IR consumed by the analyzer
//!
//! A `Compilation` holds the symbol table and the top-level declarations.
//! Each declaration owns one or more code units whose bodies are operation
//! trees; lambdas and local functions embed their own declarations.

pub mod builder;
pub mod declaration;
pub mod operation;
pub mod symbol;
pub mod types;

pub use builder::IrBuilder;
pub use declaration::{
    Accessibility, CodeUnit, CodeUnitKind, Compilation, Declaration, DeclarationKind,
};
pub use operation::{
    ArgumentPassing, ConstantValue, IncrementKind, MethodRef, Operation, OperationId,
    OperationKind, Span,
};
pub use symbol::{DeclarationId, ParameterModifier, Symbol, SymbolId, SymbolKind, SymbolTable};
pub use types::{TypeKind, TypeRef};
