//! # Types
//!
//! A [`Type`] converts a raw value (a query-string or argv string, or an
//! already decoded JSON value) into a validated value, or fails with a
//! [`TypeError`]. Parameter annotations carrying a type are run during the
//! validate step; failures are accumulated per parameter rather than aborting.
//!
//! ## Composition
//!
//! - [`TypeExt::then`] chains a refinement after a base type.
//! - [`with_context`] builds a type that also reads the per-call [`Context`].
//! - [`accept`] wraps a type with an exception remapping table.
//! - [`nullable`] short-circuits `null` without running the wrapped type.
//!
//! ```rust
//! use hugroute::context::Context;
//! use hugroute::types::{self, TypeExt};
//! use serde_json::json;
//!
//! let short_name = types::text().then(types::shorter_than(5));
//! let ctx = Context::default();
//! assert_eq!(short_name.convert(json!("bob"), &ctx).unwrap(), json!("bob"));
//! assert!(short_name.convert(json!("robert"), &ctx).is_err());
//! ```

mod primitives;
mod schema;

pub use primitives::*;
pub use schema::{schema, JsonSchema, Schema, SchemaRef, SchemaType};

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::Context;

/// Shared handle to a type.
pub type TypeRef = Arc<dyn Type>;

/// How a type wants to be exposed on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliBehaviour {
    /// `--name value`
    Value,
    /// `--name` with no value sets it to true.
    Flag,
    /// Repeatable; values are collected into a list.
    Append,
    /// `--name value` restricted to these choices.
    Choices(Vec<String>),
}

/// A value converter.
pub trait Type: Send + Sync {
    /// Convert `value`, failing with a human-readable error.
    ///
    /// # Errors
    ///
    /// Returns a [`TypeError`] when the value is not acceptable.
    fn convert(&self, value: Value, context: &Context) -> Result<Value, TypeError>;

    /// Short description used in documentation and CLI help.
    fn doc(&self) -> String;

    fn cli(&self) -> CliBehaviour {
        CliBehaviour::Value
    }

    /// True when `value` is already of this type, so a return-value transform
    /// can skip converting it again.
    fn is_instance(&self, _value: &Value) -> bool {
        false
    }
}

/// The class of a conversion failure, matched by remapping tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The value has the right shape but an unacceptable content.
    Value,
    /// The value is not one of a set of accepted keys.
    Key,
    /// The value has the wrong shape entirely.
    Type,
    Custom(&'static str),
}

/// A conversion failure.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeError {
    kind: FailureKind,
    message: String,
    reasons: Option<Value>,
}

impl TypeError {
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            reasons: None,
        }
    }

    #[must_use]
    pub fn value(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Value, message)
    }

    #[must_use]
    pub fn key(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Key, message)
    }

    #[must_use]
    pub fn wrong_type(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Type, message)
    }

    /// A failure carrying structured reasons, reported instead of the message.
    #[must_use]
    pub fn invalid_data(message: impl Into<String>, reasons: Value) -> Self {
        Self {
            kind: FailureKind::Value,
            message: message.into(),
            reasons: Some(reasons),
        }
    }

    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn reasons(&self) -> Option<&Value> {
        self.reasons.as_ref()
    }

    /// What goes into the `errors` map for the failing parameter.
    #[must_use]
    pub fn report(&self) -> Value {
        self.reasons
            .clone()
            .unwrap_or_else(|| Value::String(self.message.clone()))
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TypeError {}

/// Composition helpers available on every [`TypeRef`].
pub trait TypeExt {
    /// Run `refine` on the output of `self`.
    #[must_use]
    fn then(self, refine: TypeRef) -> TypeRef;

    /// Remap failures of `self` (at any chain depth) through `table`.
    #[must_use]
    fn remap(self, table: Vec<(FailureKind, Remap)>) -> TypeRef;
}

impl TypeExt for TypeRef {
    fn then(self, refine: TypeRef) -> TypeRef {
        Arc::new(Chain {
            base: self,
            refine,
        })
    }

    fn remap(self, table: Vec<(FailureKind, Remap)>) -> TypeRef {
        let doc = self.doc();
        Arc::new(Accept {
            inner: self,
            doc,
            error_text: None,
            table,
        })
    }
}

struct Chain {
    base: TypeRef,
    refine: TypeRef,
}

impl Type for Chain {
    fn convert(&self, value: Value, context: &Context) -> Result<Value, TypeError> {
        let value = self.base.convert(value, context)?;
        self.refine.convert(value, context)
    }

    fn doc(&self) -> String {
        format!("{} and {}", self.base.doc(), self.refine.doc())
    }

    fn cli(&self) -> CliBehaviour {
        self.base.cli()
    }

    fn is_instance(&self, value: &Value) -> bool {
        self.base.is_instance(value) && self.refine.is_instance(value)
    }
}

/// Replacement applied to a failure by [`accept`] or [`TypeExt::remap`].
#[derive(Clone)]
pub enum Remap {
    /// Replace the message, keeping the failure kind.
    Message(String),
    /// Build a replacement error from the original one.
    With(Arc<dyn Fn(&TypeError) -> TypeError + Send + Sync>),
}

impl Remap {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Remap::Message(message.into())
    }

    pub fn with<F>(f: F) -> Self
    where
        F: Fn(&TypeError) -> TypeError + Send + Sync + 'static,
    {
        Remap::With(Arc::new(f))
    }

    fn apply(&self, err: &TypeError) -> TypeError {
        match self {
            Remap::Message(message) => TypeError::new(err.kind, message.clone()),
            Remap::With(build) => build(err),
        }
    }
}

struct Accept {
    inner: TypeRef,
    doc: String,
    error_text: Option<String>,
    table: Vec<(FailureKind, Remap)>,
}

impl Type for Accept {
    fn convert(&self, value: Value, context: &Context) -> Result<Value, TypeError> {
        self.inner.convert(value, context).map_err(|err| {
            if let Some((_, remap)) = self.table.iter().find(|(kind, _)| *kind == err.kind) {
                remap.apply(&err)
            } else if let Some(text) = &self.error_text {
                TypeError::value(text.clone())
            } else {
                err
            }
        })
    }

    fn doc(&self) -> String {
        self.doc.clone()
    }

    fn cli(&self) -> CliBehaviour {
        self.inner.cli()
    }

    fn is_instance(&self, value: &Value) -> bool {
        self.inner.is_instance(value)
    }
}

/// Wrap `inner` with a new doc string, a fallback error text and a remapping
/// table. Table entries win over `error_text`; unmatched failures without an
/// `error_text` pass through unchanged.
#[must_use]
pub fn accept(
    inner: TypeRef,
    doc: impl Into<String>,
    error_text: Option<&str>,
    table: Vec<(FailureKind, Remap)>,
) -> TypeRef {
    Arc::new(Accept {
        inner,
        doc: doc.into(),
        error_text: error_text.map(str::to_string),
        table,
    })
}

struct FnType<F> {
    doc: String,
    convert: F,
}

impl<F> Type for FnType<F>
where
    F: Fn(Value, &Context) -> Result<Value, TypeError> + Send + Sync,
{
    fn convert(&self, value: Value, context: &Context) -> Result<Value, TypeError> {
        (self.convert)(value, context)
    }

    fn doc(&self) -> String {
        self.doc.clone()
    }
}

/// A type from a plain conversion function.
pub fn from_fn<F>(doc: impl Into<String>, convert: F) -> TypeRef
where
    F: Fn(Value) -> Result<Value, TypeError> + Send + Sync + 'static,
{
    Arc::new(FnType {
        doc: doc.into(),
        convert: move |value, _: &Context| convert(value),
    })
}

/// A type whose conversion also reads the per-call [`Context`].
pub fn with_context<F>(doc: impl Into<String>, convert: F) -> TypeRef
where
    F: Fn(Value, &Context) -> Result<Value, TypeError> + Send + Sync + 'static,
{
    Arc::new(FnType {
        doc: doc.into(),
        convert,
    })
}

struct Nullable {
    inner: TypeRef,
}

impl Type for Nullable {
    fn convert(&self, value: Value, context: &Context) -> Result<Value, TypeError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        self.inner.convert(value, context)
    }

    fn doc(&self) -> String {
        format!("{} (nullable)", self.inner.doc())
    }

    fn cli(&self) -> CliBehaviour {
        self.inner.cli()
    }

    fn is_instance(&self, value: &Value) -> bool {
        value.is_null() || self.inner.is_instance(value)
    }
}

/// Accept `null` as-is; run `inner` on anything else.
#[must_use]
pub fn nullable(inner: TypeRef) -> TypeRef {
    Arc::new(Nullable { inner })
}

/// Render a value the way error messages quote it: strings bare, the rest as JSON.
pub(crate) fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
