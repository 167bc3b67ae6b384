//! Error types for the document model and the pattern compiler.

use thiserror::Error;

use crate::{ExtKind, SpanRef};

/// Errors raised while reading or mutating an [`LLDoc`](crate::LLDoc).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocError {
    /// The extension slot was never declared in the document's schema.
    #[error("unknown extension '{name}'")]
    UnknownExtension { name: String },

    /// A value of the wrong kind was written to an extension slot.
    #[error("extension '{name}' expects {expected:?}, got {found:?}")]
    KindMismatch {
        name: String,
        expected: ExtKind,
        found: ExtKind,
    },

    /// The same extension name was declared twice with different kinds.
    #[error("extension '{name}' already declared as {existing:?}, cannot redeclare as {requested:?}")]
    ConflictingDeclaration {
        name: String,
        existing: ExtKind,
        requested: ExtKind,
    },

    /// A span reaches past the end of the token sequence.
    #[error("span {span} is out of bounds for a document of {len} tokens")]
    SpanOutOfBounds { span: SpanRef, len: usize },

    /// Two spans submitted to the same merge overlap.
    #[error("merge spans {first} and {second} overlap")]
    OverlappingMerge { first: SpanRef, second: SpanRef },

    /// A component reads an extension that no component of its pipeline declares.
    #[error("component '{component}' reads undeclared extension '{name}'")]
    UnresolvedExtension { component: String, name: String },
}

/// Errors raised while compiling declarative token patterns.
#[derive(Debug, Clone, Error)]
pub enum PatternError {
    /// The token attribute is not understood by the matcher.
    #[error("unsupported token attribute '{0}'")]
    UnsupportedAttribute(String),

    /// The value operator (e.g. `FUZZY`) is not understood by the matcher.
    #[error("unsupported operator '{op}' for attribute '{attr}'")]
    UnsupportedOperator { attr: String, op: String },

    /// The `OP` quantifier is not one of `!`, `?`, `*`, `+`.
    #[error("invalid quantifier '{0}'")]
    InvalidQuantifier(String),

    #[error("invalid regex '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The JSON does not have the shape of a token pattern.
    #[error("malformed token pattern: {0}")]
    Malformed(String),
}
