//! Schema capability.
//!
//! A [`Schema`] loads raw input into a value (collecting every problem rather
//! than stopping at the first) and dumps a value back into its wire form.
//! As a parameter annotation it validates input; as a return annotation its
//! `dump` becomes the transform.

use std::sync::Arc;

use serde_json::Value;

use super::{Type, TypeError, TypeRef};
use crate::context::Context;
use crate::error::ApiError;

/// Shared handle to a schema.
pub type SchemaRef = Arc<dyn Schema>;

pub trait Schema: Send + Sync {
    /// Load `raw`, returning the loaded value and every problem found.
    fn load(&self, raw: Value) -> (Value, Vec<String>);

    /// Convert a loaded value back into its wire form.
    fn dump(&self, value: Value) -> Value {
        value
    }

    fn doc(&self) -> String;
}

/// Adapter exposing a [`Schema`] as a [`Type`].
pub struct SchemaType {
    schema: SchemaRef,
}

impl SchemaType {
    #[must_use]
    pub fn new(schema: SchemaRef) -> Self {
        Self { schema }
    }
}

impl Type for SchemaType {
    fn convert(&self, value: Value, _: &Context) -> Result<Value, TypeError> {
        let (loaded, errors) = self.schema.load(value);
        if errors.is_empty() {
            Ok(loaded)
        } else {
            Err(TypeError::invalid_data(
                "Invalid data",
                Value::Array(errors.into_iter().map(Value::String).collect()),
            ))
        }
    }

    fn doc(&self) -> String {
        self.schema.doc()
    }
}

/// Use a schema where a type is expected.
#[must_use]
pub fn schema(schema: SchemaRef) -> TypeRef {
    Arc::new(SchemaType::new(schema))
}

/// A JSON Schema document backed by the `jsonschema` validator.
pub struct JsonSchema {
    document: Value,
    validator: jsonschema::Validator,
}

impl JsonSchema {
    /// Compile `document`.
    ///
    /// # Errors
    ///
    /// Returns an error when `document` is not a valid JSON Schema.
    pub fn new(document: Value) -> Result<Self, ApiError> {
        let validator = jsonschema::validator_for(&document)
            .map_err(|err| ApiError::invalid(format!("Invalid JSON schema: {err}")))?;
        Ok(Self {
            document,
            validator,
        })
    }

    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }
}

impl Schema for JsonSchema {
    fn load(&self, raw: Value) -> (Value, Vec<String>) {
        let errors = self
            .validator
            .iter_errors(&raw)
            .map(|err| err.to_string())
            .collect();
        (raw, errors)
    }

    fn doc(&self) -> String {
        self.document
            .get("description")
            .or_else(|| self.document.get("title"))
            .and_then(Value::as_str)
            .map_or_else(|| "JSON Schema validated data".to_string(), str::to_string)
    }
}
