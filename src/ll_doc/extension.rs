//! Extension slots: named, typed per-token values declared before any
//! document is created.
//!
//! Components declare the slots they read and write. A [`Pipeline`](crate::Pipeline)
//! folds every declaration into one [`ExtensionSchema`], and documents built by
//! that pipeline share it behind an `Arc`. Writes at runtime are lookups that
//! validate name and kind; they never add slots.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DocError;

/// A value stored in an extension slot, a span group or a span attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ExtValue {
    pub fn kind(&self) -> ExtKind {
        match self {
            ExtValue::Null => ExtKind::Any,
            ExtValue::Bool(_) => ExtKind::Bool,
            ExtValue::Int(_) => ExtKind::Int,
            ExtValue::Float(_) => ExtKind::Float,
            ExtValue::Str(_) => ExtKind::Str,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ExtValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ExtValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ExtValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ExtValue::Int(i) => Some(*i as f64),
            ExtValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON scalar. Arrays and objects have no extension form.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => Some(ExtValue::Null),
            Value::Bool(b) => Some(ExtValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(ExtValue::Int)
                .or_else(|| n.as_f64().map(ExtValue::Float)),
            Value::String(s) => Some(ExtValue::Str(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for ExtValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtValue::Null => f.write_str("null"),
            ExtValue::Bool(b) => write!(f, "{}", b),
            ExtValue::Int(i) => write!(f, "{}", i),
            ExtValue::Float(x) => write!(f, "{:?}", x),
            ExtValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ExtValue {
    fn from(b: bool) -> Self {
        ExtValue::Bool(b)
    }
}

impl From<i64> for ExtValue {
    fn from(i: i64) -> Self {
        ExtValue::Int(i)
    }
}

impl From<f64> for ExtValue {
    fn from(x: f64) -> Self {
        ExtValue::Float(x)
    }
}

impl From<&str> for ExtValue {
    fn from(s: &str) -> Self {
        ExtValue::Str(s.to_string())
    }
}

impl From<String> for ExtValue {
    fn from(s: String) -> Self {
        ExtValue::Str(s)
    }
}

/// The kind fixed for a slot at declaration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtKind {
    Bool,
    Int,
    Float,
    Str,
    /// Accepts every value; used for extracted values that may be numeric or textual.
    Any,
}

impl ExtKind {
    /// `Null` is accepted by every kind and means "unset".
    pub fn accepts(&self, value: &ExtValue) -> bool {
        match (self, value) {
            (ExtKind::Any, _) | (_, ExtValue::Null) => true,
            (ExtKind::Bool, ExtValue::Bool(_)) => true,
            (ExtKind::Int, ExtValue::Int(_)) => true,
            (ExtKind::Float, ExtValue::Float(_)) => true,
            (ExtKind::Str, ExtValue::Str(_)) => true,
            _ => false,
        }
    }
}

/// Declaration of a single extension slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionDecl {
    pub name: String,
    pub kind: ExtKind,
    pub default: ExtValue,
}

impl ExtensionDecl {
    pub fn new(name: impl Into<String>, kind: ExtKind, default: ExtValue) -> Self {
        Self {
            name: name.into(),
            kind,
            default,
        }
    }

    /// A boolean flag defaulting to `false`.
    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, ExtKind::Bool, ExtValue::Bool(false))
    }

    /// An untyped value slot with the given default.
    pub fn value(name: impl Into<String>, default: ExtValue) -> Self {
        Self::new(name, ExtKind::Any, default)
    }
}

/// Pre-declared table of extension slots shared by every document of a pipeline.
#[derive(Debug, Clone, Default)]
pub struct ExtensionSchema {
    slots: Vec<ExtensionDecl>,
    index: HashMap<String, usize>,
    version: u32,
}

impl ExtensionSchema {
    /// A schema with no slots.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> ExtensionSchemaBuilder {
        ExtensionSchemaBuilder {
            schema: Self::default(),
        }
    }

    /// Incremented once for every distinct slot declared.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.name.as_str())
    }

    pub fn lookup(&self, name: &str) -> Result<usize, DocError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| DocError::UnknownExtension {
                name: name.to_string(),
            })
    }

    pub fn slot(&self, idx: usize) -> &ExtensionDecl {
        &self.slots[idx]
    }

    /// Look the slot up and check that `value` fits its kind.
    pub fn validate(&self, name: &str, value: &ExtValue) -> Result<usize, DocError> {
        let idx = self.lookup(name)?;
        let slot = &self.slots[idx];
        if slot.kind.accepts(value) {
            Ok(idx)
        } else {
            Err(DocError::KindMismatch {
                name: name.to_string(),
                expected: slot.kind,
                found: value.kind(),
            })
        }
    }

    pub(crate) fn defaults(&self) -> Vec<ExtValue> {
        self.slots.iter().map(|slot| slot.default.clone()).collect()
    }
}

/// Accumulates declarations; duplicate declarations of the same kind are idempotent.
#[derive(Debug)]
pub struct ExtensionSchemaBuilder {
    schema: ExtensionSchema,
}

impl ExtensionSchemaBuilder {
    pub fn declare(&mut self, decl: ExtensionDecl) -> Result<&mut Self, DocError> {
        if !decl.kind.accepts(&decl.default) {
            return Err(DocError::KindMismatch {
                name: decl.name,
                expected: decl.kind,
                found: decl.default.kind(),
            });
        }

        if let Some(&idx) = self.schema.index.get(&decl.name) {
            let existing = self.schema.slots[idx].kind;
            if existing != decl.kind {
                return Err(DocError::ConflictingDeclaration {
                    name: decl.name,
                    existing,
                    requested: decl.kind,
                });
            }
            return Ok(self);
        }

        self.schema
            .index
            .insert(decl.name.clone(), self.schema.slots.len());
        self.schema.slots.push(decl);
        self.schema.version += 1;
        Ok(self)
    }

    pub fn declare_all(
        &mut self,
        decls: impl IntoIterator<Item = ExtensionDecl>,
    ) -> Result<&mut Self, DocError> {
        for decl in decls {
            self.declare(decl)?;
        }
        Ok(self)
    }

    pub fn build(self) -> ExtensionSchema {
        self.schema
    }
}
