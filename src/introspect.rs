//! # Introspection
//!
//! Rust closures carry no runtime-inspectable parameter list, so every routed
//! function travels with a [`Signature`]: the ordered parameter names, their
//! defaults and annotations, and the var-args / var-kwargs flags. The
//! `#[endpoint]` attribute derives one from a plain `fn`; hand-built
//! signatures use the builder methods.
//!
//! The free functions in this module answer the questions the dispatcher asks
//! of a callable. They accept `Option<&Signature>`; `None` stands for an
//! opaque callable and yields "accepts everything" answers instead of failing.

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value};

use crate::directives::DirectiveRef;
use crate::transform::Transform;
use crate::types::{SchemaRef, TypeRef};

/// What a parameter annotation says about the parameter.
#[derive(Clone)]
pub enum Annotation {
    /// Documentation only; the value is passed through untouched.
    Doc(String),
    /// Convert and validate the raw value.
    Type(TypeRef),
    /// Load the raw value through a schema.
    Schema(SchemaRef),
    /// Inject a computed value instead of reading it from the caller.
    Directive(DirectiveRef),
}

impl fmt::Debug for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::Doc(doc) => f.debug_tuple("Doc").field(doc).finish(),
            Annotation::Type(ty) => f.debug_tuple("Type").field(&ty.doc()).finish(),
            Annotation::Schema(schema) => f.debug_tuple("Schema").field(&schema.doc()).finish(),
            Annotation::Directive(directive) => {
                f.debug_tuple("Directive").field(&directive.name()).finish()
            }
        }
    }
}

impl From<&str> for Annotation {
    fn from(doc: &str) -> Self {
        Annotation::Doc(doc.to_string())
    }
}

impl From<TypeRef> for Annotation {
    fn from(ty: TypeRef) -> Self {
        Annotation::Type(ty)
    }
}

impl From<SchemaRef> for Annotation {
    fn from(schema: SchemaRef) -> Self {
        Annotation::Schema(schema)
    }
}

impl From<DirectiveRef> for Annotation {
    fn from(directive: DirectiveRef) -> Self {
        Annotation::Directive(directive)
    }
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<Value>,
    pub annotation: Option<Annotation>,
}

impl Param {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            annotation: None,
        }
    }

    #[must_use]
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub fn annotate(mut self, annotation: impl Into<Annotation>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// The introspectable shape of a routed function.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    name: String,
    params: Vec<Param>,
    var_args: Option<String>,
    var_kwargs: Option<String>,
    receiver: bool,
    returns: Option<Transform>,
    doc: Option<String>,
    without_directives: bool,
}

impl Signature {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A required, unannotated parameter.
    #[must_use]
    pub fn param(self, name: impl Into<String>) -> Self {
        self.push(Param::new(name))
    }

    /// A required parameter with an annotation.
    #[must_use]
    pub fn param_with(self, name: impl Into<String>, annotation: impl Into<Annotation>) -> Self {
        self.push(Param::new(name).annotate(annotation))
    }

    /// A parameter with a default value.
    #[must_use]
    pub fn optional(self, name: impl Into<String>, default: Value) -> Self {
        self.push(Param::new(name).default(default))
    }

    #[must_use]
    pub fn optional_with(
        self,
        name: impl Into<String>,
        default: Value,
        annotation: impl Into<Annotation>,
    ) -> Self {
        self.push(Param::new(name).default(default).annotate(annotation))
    }

    #[must_use]
    pub fn push(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Accept extra positional arguments, collected under `name`.
    #[must_use]
    pub fn var_args(mut self, name: impl Into<String>) -> Self {
        self.var_args = Some(name.into());
        self
    }

    /// Accept arbitrary keyword arguments.
    #[must_use]
    pub fn var_kwargs(mut self, name: impl Into<String>) -> Self {
        self.var_kwargs = Some(name.into());
        self
    }

    /// Mark the first parameter as the bound receiver.
    #[must_use]
    pub fn method(mut self) -> Self {
        self.receiver = true;
        self
    }

    /// Return annotation, used as the default transform.
    #[must_use]
    pub fn returns(mut self, transform: impl Into<Transform>) -> Self {
        self.returns = Some(transform.into());
        self
    }

    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Opt out of directive injection when the function is invoked.
    #[must_use]
    pub fn without_directives(mut self) -> Self {
        self.without_directives = true;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    #[must_use]
    pub fn return_transform(&self) -> Option<&Transform> {
        self.returns.as_ref()
    }

    #[must_use]
    pub fn documentation(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    #[must_use]
    pub fn var_args_name(&self) -> Option<&str> {
        self.var_args.as_deref()
    }

    #[must_use]
    pub fn injects_directives(&self) -> bool {
        !self.without_directives
    }

    /// Parameters as seen by callers: the bound receiver is skipped.
    pub fn visible_params(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().skip(usize::from(self.receiver))
    }

    /// Parameter defaults, keyed by name.
    #[must_use]
    pub fn defaults(&self) -> Map<String, Value> {
        self.visible_params()
            .filter_map(|param| param.default.clone().map(|value| (param.name.clone(), value)))
            .collect()
    }

    /// Parameters without defaults, in declaration order.
    #[must_use]
    pub fn required(&self) -> Vec<String> {
        self.visible_params()
            .filter(|param| param.is_required())
            .map(|param| param.name.clone())
            .collect()
    }
}

/// Ordered parameter names, excluding a bound receiver.
#[must_use]
pub fn arguments(signature: Option<&Signature>) -> Vec<String> {
    signature
        .map(|sig| sig.visible_params().map(|param| param.name.clone()).collect())
        .unwrap_or_default()
}

/// Whether the callable accepts extra positional arguments.
#[must_use]
pub fn takes_args(signature: Option<&Signature>) -> bool {
    signature.map_or(true, |sig| sig.var_args.is_some())
}

/// Whether the callable accepts arbitrary keyword arguments.
#[must_use]
pub fn takes_kwargs(signature: Option<&Signature>) -> bool {
    signature.map_or(true, |sig| sig.var_kwargs.is_some())
}

/// Whether the first declared parameter is a bound receiver.
#[must_use]
pub fn is_method(signature: Option<&Signature>) -> bool {
    signature.is_some_and(|sig| sig.receiver)
}

/// The subset of `candidates` the callable accepts by name.
///
/// An opaque callable, or one taking arbitrary keyword arguments, accepts all
/// of them.
#[must_use]
pub fn takes_arguments<'a>(
    signature: Option<&Signature>,
    candidates: &[&'a str],
) -> HashSet<&'a str> {
    if takes_kwargs(signature) {
        return candidates.iter().copied().collect();
    }
    let declared = arguments(signature);
    candidates
        .iter()
        .copied()
        .filter(|candidate| declared.iter().any(|name| name == candidate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn greet() -> Signature {
        Signature::new("greet")
            .param("name")
            .optional("greeting", json!("hello"))
    }

    #[test]
    fn test_arguments_and_defaults() {
        let sig = greet();
        assert_eq!(arguments(Some(&sig)), vec!["name", "greeting"]);
        assert_eq!(sig.required(), vec!["name"]);
        assert_eq!(sig.defaults().get("greeting"), Some(&json!("hello")));
        assert!(!takes_kwargs(Some(&sig)));
        assert!(!takes_args(Some(&sig)));
    }

    #[test]
    fn test_method_skips_receiver() {
        let sig = Signature::new("area").param("self").param("scale").method();
        assert!(is_method(Some(&sig)));
        assert_eq!(arguments(Some(&sig)), vec!["scale"]);
        assert_eq!(sig.required(), vec!["scale"]);
    }

    #[test]
    fn test_takes_arguments_intersection() {
        let sig = greet().param("request");
        let wanted = takes_arguments(Some(&sig), &["request", "response", "api_version"]);
        assert_eq!(wanted, HashSet::from(["request"]));
    }

    #[test]
    fn test_opaque_accepts_everything() {
        assert!(arguments(None).is_empty());
        assert!(takes_kwargs(None));
        assert!(takes_args(None));
        let wanted = takes_arguments(None, &["request", "response"]);
        assert_eq!(wanted.len(), 2);
    }
}
