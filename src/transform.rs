//! Return-value transforms.
//!
//! A [`Transform`] maps a handler's return value before it is serialized. It
//! comes from the route (`transform`), or from the function's return
//! annotation. Transforms see data results only: streamed content
//! ([`Content::Stream`](crate::Content::Stream)) is rendered as is. The helpers here pick a transform per request, keyed on the
//! request content type, path suffix or path prefix.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::Context;
use crate::error::ApiError;
use crate::format::parse_content_type;
use crate::http::Request;
use crate::types::{SchemaRef, TypeRef};

/// What a transform can see besides the value.
pub struct TransformContext<'a> {
    pub request: Option<&'a Request>,
    pub context: &'a Context,
}

type TransformFn = dyn Fn(Value, &TransformContext<'_>) -> Result<Value, ApiError> + Send + Sync;

/// A post-invocation mapping. Streamed results bypass it.
#[derive(Clone)]
pub enum Transform {
    Function(Arc<TransformFn>),
    /// A type used as a transform; values already of the type are left alone.
    Type(TypeRef),
    /// A schema used as a transform; applies its dump.
    Schema(SchemaRef),
}

impl Transform {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(Value, &TransformContext<'_>) -> Result<Value, ApiError> + Send + Sync + 'static,
    {
        Transform::Function(Arc::new(f))
    }

    /// A transform that only looks at the value.
    pub fn map<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Transform::function(move |value, _: &TransformContext<'_>| Ok(f(value)))
    }

    /// Apply to `value`.
    ///
    /// # Errors
    ///
    /// Propagates failures from the underlying function or type.
    pub fn apply(&self, value: Value, ctx: &TransformContext<'_>) -> Result<Value, ApiError> {
        match self {
            Transform::Function(f) => f(value, ctx),
            Transform::Type(ty) if ty.is_instance(&value) => Ok(value),
            Transform::Type(ty) => ty
                .convert(value, ctx.context)
                .map_err(|err| ApiError::invalid(err.message()).with_detail(err.report())),
            Transform::Schema(schema) => Ok(schema.dump(value)),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Function(_) => f.write_str("Transform::Function"),
            Transform::Type(ty) => write!(f, "Transform::Type({})", ty.doc()),
            Transform::Schema(schema) => write!(f, "Transform::Schema({})", schema.doc()),
        }
    }
}

impl From<TypeRef> for Transform {
    fn from(ty: TypeRef) -> Self {
        Transform::Type(ty)
    }
}

impl From<SchemaRef> for Transform {
    fn from(schema: SchemaRef) -> Self {
        Transform::Schema(schema)
    }
}

fn select(
    table: Vec<(String, Transform)>,
    default: Option<Transform>,
    key: impl Fn(&Request, &str) -> bool + Send + Sync + 'static,
) -> Transform {
    Transform::function(move |value, ctx| {
        let chosen = ctx
            .request
            .and_then(|request| {
                table
                    .iter()
                    .find(|(candidate, _)| key(request, candidate))
                    .map(|(_, transform)| transform)
            })
            .or(default.as_ref());
        match chosen {
            Some(transform) => transform.apply(value, ctx),
            None => Ok(value),
        }
    })
}

/// Pick a transform by the request's content type.
#[must_use]
pub fn content_type(table: Vec<(String, Transform)>, default: Option<Transform>) -> Transform {
    select(table, default, |request, candidate| {
        request
            .content_type()
            .map(|raw| parse_content_type(raw).0)
            .is_some_and(|mime| mime == candidate)
    })
}

/// Pick a transform by the request path's suffix.
#[must_use]
pub fn suffix(table: Vec<(String, Transform)>, default: Option<Transform>) -> Transform {
    select(table, default, |request, candidate| {
        request.path.ends_with(candidate)
    })
}

/// Pick a transform by the request path's prefix.
#[must_use]
pub fn prefix(table: Vec<(String, Transform)>, default: Option<Transform>) -> Transform {
    select(table, default, |request, candidate| {
        request.path.starts_with(candidate)
    })
}

/// Apply every transform in order.
#[must_use]
pub fn all(transforms: Vec<Transform>) -> Transform {
    Transform::function(move |value, ctx| {
        transforms
            .iter()
            .try_fold(value, |value, transform| transform.apply(value, ctx))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types;
    use serde_json::json;

    fn upper() -> Transform {
        Transform::map(|value| json!(value.as_str().unwrap_or_default().to_uppercase()))
    }

    #[test]
    fn test_type_transform_skips_instances() {
        let ctx = Context::default();
        let tctx = TransformContext {
            request: None,
            context: &ctx,
        };
        let transform = Transform::from(types::number());
        assert_eq!(transform.apply(json!(5), &tctx).unwrap(), json!(5));
        assert_eq!(transform.apply(json!("5"), &tctx).unwrap(), json!(5));
        assert!(transform.apply(json!("five"), &tctx).is_err());
    }

    #[test]
    fn test_suffix_selects_by_path() {
        let ctx = Context::default();
        let request = Request::get("/data.upper");
        let tctx = TransformContext {
            request: Some(&request),
            context: &ctx,
        };
        let transform = suffix(vec![(".upper".to_string(), upper())], None);
        assert_eq!(transform.apply(json!("hi"), &tctx).unwrap(), json!("HI"));

        let other = Request::get("/data");
        let tctx = TransformContext {
            request: Some(&other),
            context: &ctx,
        };
        assert_eq!(transform.apply(json!("hi"), &tctx).unwrap(), json!("hi"));
    }

    #[test]
    fn test_content_type_selects_by_mime() {
        let ctx = Context::default();
        let request = Request::post("/data").with_header("Content-Type", "text/plain; charset=utf-8");
        let tctx = TransformContext {
            request: Some(&request),
            context: &ctx,
        };
        let transform = content_type(vec![("text/plain".to_string(), upper())], None);
        assert_eq!(transform.apply(json!("hi"), &tctx).unwrap(), json!("HI"));
    }

    #[test]
    fn test_all_chains() {
        let ctx = Context::default();
        let tctx = TransformContext {
            request: None,
            context: &ctx,
        };
        let exclaim = Transform::map(|value| json!(format!("{}!", value.as_str().unwrap_or_default())));
        assert_eq!(all(vec![upper(), exclaim]).apply(json!("hi"), &tctx).unwrap(), json!("HI!"));
    }
}
