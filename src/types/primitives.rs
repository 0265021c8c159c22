//! Built-in types.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};

use super::{display, CliBehaviour, Type, TypeError, TypeRef};
use crate::context::Context;

static DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("valid decimal regex")
});

/// `truncated` as an exact integer, or `None` outside the i64/u64 range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole(truncated: f64) -> Option<Value> {
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
    const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;
    if (-I64_BOUND..I64_BOUND).contains(&truncated) {
        Some(Value::from(truncated as i64))
    } else if (0.0..U64_BOUND).contains(&truncated) {
        Some(Value::from(truncated as u64))
    } else {
        None
    }
}

struct WholeNumber;

impl Type for WholeNumber {
    fn convert(&self, value: Value, _: &Context) -> Result<Value, TypeError> {
        let invalid = || TypeError::value("Invalid whole number provided");
        if self.is_instance(&value) {
            return Ok(value);
        }
        match value {
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .and_then(|f| whole(f.trunc()))
                .ok_or_else(invalid),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Value::from)
                    .or_else(|_| s.parse::<u64>().map(Value::from))
                    .map_err(|_| invalid())
            }
            Value::Bool(b) => Ok(Value::from(i64::from(b))),
            _ => Err(invalid()),
        }
    }

    fn doc(&self) -> String {
        "A whole number".to_string()
    }

    fn is_instance(&self, value: &Value) -> bool {
        value.is_i64() || value.is_u64()
    }
}

/// A whole number.
#[must_use]
pub fn number() -> TypeRef {
    Arc::new(WholeNumber)
}

struct FloatNumber;

impl Type for FloatNumber {
    fn convert(&self, value: Value, _: &Context) -> Result<Value, TypeError> {
        let invalid = || TypeError::value("Invalid float number provided");
        let parsed = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid)
    }

    fn doc(&self) -> String {
        "A float number".to_string()
    }

    fn is_instance(&self, value: &Value) -> bool {
        value.is_f64()
    }
}

/// A floating point number.
#[must_use]
pub fn float_number() -> TypeRef {
    Arc::new(FloatNumber)
}

struct Decimal;

impl Type for Decimal {
    fn convert(&self, value: Value, _: &Context) -> Result<Value, TypeError> {
        let raw = match &value {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.trim().to_string(),
            _ => String::new(),
        };
        if DECIMAL.is_match(&raw) {
            Ok(Value::String(raw))
        } else {
            Err(TypeError::value("Invalid decimal number provided"))
        }
    }

    fn doc(&self) -> String {
        "A decimal number".to_string()
    }
}

/// An exact decimal, kept as its canonical string form to avoid float rounding.
#[must_use]
pub fn decimal() -> TypeRef {
    Arc::new(Decimal)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

struct Boolean;

impl Type for Boolean {
    fn convert(&self, value: Value, _: &Context) -> Result<Value, TypeError> {
        Ok(Value::Bool(truthy(&value)))
    }

    fn doc(&self) -> String {
        "Providing any value will set this to true".to_string()
    }

    fn cli(&self) -> CliBehaviour {
        CliBehaviour::Flag
    }

    fn is_instance(&self, value: &Value) -> bool {
        value.is_boolean()
    }
}

/// Any non-empty value is true.
#[must_use]
pub fn boolean() -> TypeRef {
    Arc::new(Boolean)
}

struct SmartBoolean;

impl Type for SmartBoolean {
    fn convert(&self, value: Value, _: &Context) -> Result<Value, TypeError> {
        let invalid = || TypeError::key("Invalid value passed in for true/false field");
        match &value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Null => Ok(Value::Bool(false)),
            Value::Number(n) => match n.as_i64() {
                Some(1) => Ok(Value::Bool(true)),
                Some(0) => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "0" | "" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        }
    }

    fn doc(&self) -> String {
        "True or False".to_string()
    }

    fn cli(&self) -> CliBehaviour {
        CliBehaviour::Flag
    }

    fn is_instance(&self, value: &Value) -> bool {
        value.is_boolean()
    }
}

/// `true/t/1` and `false/f/0`, case-insensitive; anything else is rejected.
#[must_use]
pub fn smart_boolean() -> TypeRef {
    Arc::new(SmartBoolean)
}

struct UuidText;

impl Type for UuidText {
    fn convert(&self, value: Value, _: &Context) -> Result<Value, TypeError> {
        value
            .as_str()
            .and_then(|s| uuid::Uuid::parse_str(s.trim()).ok())
            .map(|id| Value::String(id.hyphenated().to_string()))
            .ok_or_else(|| TypeError::value("Invalid UUID provided"))
    }

    fn doc(&self) -> String {
        "A Universally Unique IDentifier inputted as a string".to_string()
    }
}

/// A UUID, normalised to lowercase hyphenated form.
#[must_use]
pub fn uuid() -> TypeRef {
    Arc::new(UuidText)
}

struct Text;

impl Type for Text {
    fn convert(&self, value: Value, _: &Context) -> Result<Value, TypeError> {
        match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(TypeError::wrong_type("Invalid text value provided")),
        }
    }

    fn doc(&self) -> String {
        "Basic text / string value".to_string()
    }

    fn is_instance(&self, value: &Value) -> bool {
        value.is_string()
    }
}

/// Plain text. Scalars are stringified; lists and objects are rejected.
#[must_use]
pub fn text() -> TypeRef {
    Arc::new(Text)
}

fn measure(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

fn measured(value: &Value) -> Result<usize, TypeError> {
    measure(value).ok_or_else(|| TypeError::wrong_type("Value has no length"))
}

struct Length {
    lower: usize,
    upper: usize,
    convert: TypeRef,
}

impl Type for Length {
    fn convert(&self, value: Value, context: &Context) -> Result<Value, TypeError> {
        let value = self.convert.convert(value, context)?;
        let length = measured(&value)?;
        if length < self.lower {
            return Err(TypeError::value(format!(
                "'{}' is shorter than the lower limit of {}",
                display(&value),
                self.lower
            )));
        }
        if length >= self.upper {
            return Err(TypeError::value(format!(
                "'{}' is longer than the allowed limit of {}",
                display(&value),
                self.upper
            )));
        }
        Ok(value)
    }

    fn doc(&self) -> String {
        format!(
            "{} that has a length longer or equal to {} and less than {}",
            self.convert.doc(),
            self.lower,
            self.upper
        )
    }
}

/// Text whose length is in `lower..upper`.
#[must_use]
pub fn length(lower: usize, upper: usize) -> TypeRef {
    length_of(lower, upper, text())
}

/// Any measurable value (after `convert`) whose length is in `lower..upper`.
#[must_use]
pub fn length_of(lower: usize, upper: usize, convert: TypeRef) -> TypeRef {
    Arc::new(Length {
        lower,
        upper,
        convert,
    })
}

struct ShorterThan {
    limit: usize,
}

impl Type for ShorterThan {
    fn convert(&self, value: Value, _: &Context) -> Result<Value, TypeError> {
        if measured(&value)? < self.limit {
            Ok(value)
        } else {
            Err(TypeError::value(format!(
                "'{}' is longer than the allowed limit of {}",
                display(&value),
                self.limit
            )))
        }
    }

    fn doc(&self) -> String {
        format!("Shorter than {}", self.limit)
    }
}

#[must_use]
pub fn shorter_than(limit: usize) -> TypeRef {
    Arc::new(ShorterThan { limit })
}

struct LongerThan {
    limit: usize,
}

impl Type for LongerThan {
    fn convert(&self, value: Value, _: &Context) -> Result<Value, TypeError> {
        if measured(&value)? > self.limit {
            Ok(value)
        } else {
            Err(TypeError::value(format!(
                "'{}' must be longer than {}",
                display(&value),
                self.limit
            )))
        }
    }

    fn doc(&self) -> String {
        format!("Longer than {}", self.limit)
    }
}

#[must_use]
pub fn longer_than(limit: usize) -> TypeRef {
    Arc::new(LongerThan { limit })
}

struct CutOff {
    limit: usize,
}

impl Type for CutOff {
    fn convert(&self, value: Value, _: &Context) -> Result<Value, TypeError> {
        match value {
            Value::String(s) => Ok(Value::String(s.chars().take(self.limit).collect())),
            Value::Array(items) => Ok(Value::Array(items.into_iter().take(self.limit).collect())),
            Value::Number(n) => Ok(Value::String(n.to_string().chars().take(self.limit).collect())),
            _ => Err(TypeError::wrong_type("Value can not be cut off")),
        }
    }

    fn doc(&self) -> String {
        format!("Text cut off at {} characters", self.limit)
    }
}

/// Truncate to at most `limit` characters instead of failing.
#[must_use]
pub fn cut_off(limit: usize) -> TypeRef {
    Arc::new(CutOff { limit })
}

fn same_value(candidate: &Value, value: &Value) -> bool {
    candidate == value || (value.is_string() && display(candidate) == display(value))
}

struct OneOf {
    accepted: Vec<(Value, Value)>,
}

impl OneOf {
    fn choices(&self) -> Vec<String> {
        self.accepted.iter().map(|(key, _)| display(key)).collect()
    }
}

impl Type for OneOf {
    fn convert(&self, value: Value, _: &Context) -> Result<Value, TypeError> {
        self.accepted
            .iter()
            .find(|(key, _)| same_value(key, &value))
            .map(|(_, mapped)| mapped.clone())
            .ok_or_else(|| {
                TypeError::key(format!(
                    "Invalid value passed. The accepted values are: ({})",
                    self.choices().join("|")
                ))
            })
    }

    fn doc(&self) -> String {
        format!("Accepts one of the following values: ({})", self.choices().join("|"))
    }

    fn cli(&self) -> CliBehaviour {
        CliBehaviour::Choices(self.choices())
    }
}

/// Must equal one of `values`.
#[must_use]
pub fn one_of<I>(values: I) -> TypeRef
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    Arc::new(OneOf {
        accepted: values
            .into_iter()
            .map(|value| {
                let value = value.into();
                (value.clone(), value)
            })
            .collect(),
    })
}

/// Must equal one of the keys; converts to the mapped value.
#[must_use]
pub fn mapping<I, K, V>(pairs: I) -> TypeRef
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<Value>,
    V: Into<Value>,
{
    Arc::new(OneOf {
        accepted: pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect(),
    })
}

struct DelimitedList {
    using: String,
    convert: Option<TypeRef>,
}

impl Type for DelimitedList {
    fn convert(&self, value: Value, context: &Context) -> Result<Value, TypeError> {
        let items: Vec<Value> = match value {
            Value::Array(items) => items,
            Value::String(s) => s
                .split(self.using.as_str())
                .map(|item| Value::String(item.to_string()))
                .collect(),
            Value::Number(n) => vec![Value::String(n.to_string())],
            _ => return Err(TypeError::wrong_type("Invalid delimited list provided")),
        };
        match &self.convert {
            Some(convert) => items
                .into_iter()
                .map(|item| convert.convert(item, context))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            None => Ok(Value::Array(items)),
        }
    }

    fn doc(&self) -> String {
        format!(
            "Multiple values, separated by \"{}\"{}",
            self.using,
            self.convert
                .as_ref()
                .map(|ty| format!(" each being: {}", ty.doc()))
                .unwrap_or_default()
        )
    }

    fn is_instance(&self, value: &Value) -> bool {
        value.is_array()
    }
}

/// Split a string on `using`. Lists pass through.
#[must_use]
pub fn delimited_list(using: &str) -> TypeRef {
    Arc::new(DelimitedList {
        using: using.to_string(),
        convert: None,
    })
}

/// Split a string on `using` and convert every element.
#[must_use]
pub fn delimited_list_of(using: &str, convert: TypeRef) -> TypeRef {
    Arc::new(DelimitedList {
        using: using.to_string(),
        convert: Some(convert),
    })
}

#[must_use]
pub fn comma_separated_list() -> TypeRef {
    delimited_list(",")
}

struct Multiple;

impl Type for Multiple {
    fn convert(&self, value: Value, _: &Context) -> Result<Value, TypeError> {
        match value {
            Value::Array(_) => Ok(value),
            other => Ok(Value::Array(vec![other])),
        }
    }

    fn doc(&self) -> String {
        "Multiple Values".to_string()
    }

    fn cli(&self) -> CliBehaviour {
        CliBehaviour::Append
    }

    fn is_instance(&self, value: &Value) -> bool {
        value.is_array()
    }
}

/// Always a list; a single value is wrapped.
#[must_use]
pub fn multiple() -> TypeRef {
    Arc::new(Multiple)
}

struct InlineDictionary {
    convert: Option<TypeRef>,
}

impl Type for InlineDictionary {
    fn convert(&self, value: Value, context: &Context) -> Result<Value, TypeError> {
        let raw = match value {
            Value::Object(_) => return Ok(value),
            Value::String(s) => s,
            _ => return Err(TypeError::wrong_type("Invalid inline dictionary provided")),
        };
        let mut dictionary = Map::new();
        for item in raw.split('|') {
            let (key, entry) = item.split_once(':').ok_or_else(|| {
                TypeError::value(format!(
                    "Invalid inline dictionary item '{item}', expected key:value"
                ))
            })?;
            let entry = Value::String(entry.trim().to_string());
            let entry = match &self.convert {
                Some(convert) => convert.convert(entry, context)?,
                None => entry,
            };
            dictionary.insert(key.trim().to_string(), entry);
        }
        Ok(Value::Object(dictionary))
    }

    fn doc(&self) -> String {
        "A single line dictionary, where items are separated by a pipe and key:value are separated by a colon".to_string()
    }

    fn is_instance(&self, value: &Value) -> bool {
        value.is_object()
    }
}

/// `key:value|key:value` into an object.
#[must_use]
pub fn inline_dictionary() -> TypeRef {
    Arc::new(InlineDictionary { convert: None })
}

/// `key:value|key:value` with every value converted.
#[must_use]
pub fn inline_dictionary_of(convert: TypeRef) -> TypeRef {
    Arc::new(InlineDictionary {
        convert: Some(convert),
    })
}

fn numeric(value: &Value) -> Result<f64, TypeError> {
    value
        .as_f64()
        .ok_or_else(|| TypeError::wrong_type(format!("'{}' is not a number", display(value))))
}

fn limit(value: f64) -> String {
    Value::from(value).to_string().trim_end_matches(".0").to_string()
}

struct InRange {
    lower: f64,
    upper: f64,
    convert: TypeRef,
}

impl Type for InRange {
    fn convert(&self, value: Value, context: &Context) -> Result<Value, TypeError> {
        let value = self.convert.convert(value, context)?;
        let n = numeric(&value)?;
        if n < self.lower {
            return Err(TypeError::value(format!(
                "'{}' is less than the lower limit {}",
                display(&value),
                limit(self.lower)
            )));
        }
        if n >= self.upper {
            return Err(TypeError::value(format!(
                "'{}' reaches the limit of {}",
                display(&value),
                limit(self.upper)
            )));
        }
        Ok(value)
    }

    fn doc(&self) -> String {
        format!(
            "{} that is greater or equal to {} and less than {}",
            self.convert.doc(),
            limit(self.lower),
            limit(self.upper)
        )
    }

    fn is_instance(&self, value: &Value) -> bool {
        self.convert.is_instance(value)
    }
}

/// A whole number in `lower..upper`.
#[must_use]
pub fn in_range(lower: f64, upper: f64) -> TypeRef {
    in_range_of(lower, upper, number())
}

#[must_use]
pub fn in_range_of(lower: f64, upper: f64, convert: TypeRef) -> TypeRef {
    Arc::new(InRange {
        lower,
        upper,
        convert,
    })
}

struct LessThan {
    limit: f64,
    convert: TypeRef,
}

impl Type for LessThan {
    fn convert(&self, value: Value, context: &Context) -> Result<Value, TypeError> {
        let value = self.convert.convert(value, context)?;
        if numeric(&value)? < self.limit {
            Ok(value)
        } else {
            Err(TypeError::value(format!(
                "'{}' must be less than {}",
                display(&value),
                limit(self.limit)
            )))
        }
    }

    fn doc(&self) -> String {
        format!("{} less than {}", self.convert.doc(), limit(self.limit))
    }
}

/// A whole number strictly below `limit`.
#[must_use]
pub fn less_than(limit: f64) -> TypeRef {
    Arc::new(LessThan {
        limit,
        convert: number(),
    })
}

#[must_use]
pub fn less_than_of(limit: f64, convert: TypeRef) -> TypeRef {
    Arc::new(LessThan { limit, convert })
}

struct GreaterThan {
    minimum: f64,
    convert: TypeRef,
}

impl Type for GreaterThan {
    fn convert(&self, value: Value, context: &Context) -> Result<Value, TypeError> {
        let value = self.convert.convert(value, context)?;
        if numeric(&value)? > self.minimum {
            Ok(value)
        } else {
            Err(TypeError::value(format!(
                "'{}' must be greater than {}",
                display(&value),
                limit(self.minimum)
            )))
        }
    }

    fn doc(&self) -> String {
        format!("{} greater than {}", self.convert.doc(), limit(self.minimum))
    }
}

/// A whole number strictly above `minimum`.
#[must_use]
pub fn greater_than(minimum: f64) -> TypeRef {
    Arc::new(GreaterThan {
        minimum,
        convert: number(),
    })
}

#[must_use]
pub fn greater_than_of(minimum: f64, convert: TypeRef) -> TypeRef {
    Arc::new(GreaterThan { minimum, convert })
}

struct Json;

impl Type for Json {
    fn convert(&self, value: Value, _: &Context) -> Result<Value, TypeError> {
        match value {
            Value::String(s) => serde_json::from_str(&s)
                .map_err(|_| TypeError::value("Incorrectly formatted JSON provided")),
            other => Ok(other),
        }
    }

    fn doc(&self) -> String {
        "JSON formatted data".to_string()
    }
}

/// A JSON document, either already decoded or as a string.
#[must_use]
pub fn json() -> TypeRef {
    Arc::new(Json)
}

struct Multi {
    types: Vec<TypeRef>,
}

impl Type for Multi {
    fn convert(&self, value: Value, context: &Context) -> Result<Value, TypeError> {
        self.types
            .iter()
            .find_map(|ty| ty.convert(value.clone(), context).ok())
            .ok_or_else(|| TypeError::value(self.doc()))
    }

    fn doc(&self) -> String {
        let docs: Vec<String> = self.types.iter().map(|ty| ty.doc()).collect();
        format!("Accepts any of the following value types: {}", docs.join(", "))
    }

    fn is_instance(&self, value: &Value) -> bool {
        self.types.iter().any(|ty| ty.is_instance(value))
    }
}

/// The first of `types` that accepts the value wins.
#[must_use]
pub fn multi(types: Vec<TypeRef>) -> TypeRef {
    Arc::new(Multi { types })
}
