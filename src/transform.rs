//! Value coercion
//!
//! Transformers convert a value between runtime types. They only run as a
//! fallback, when a value fails its schema's type check and the schema
//! declares a `transform` directive. The walker re-checks the coerced value
//! and decides whether it is usable.
//!
//! A directive is one of:
//! - `true`: infer candidates from the built-ins whose output type is in the
//!   declared `type` and whose accepted input types include the value's type
//! - a single transformer, an ordered list, or a named group
//!
//! In JSON schema documents transformers are referenced by built-in name
//! (`"number"`, `"string"`, `"integer"`, `"boolean"`, `"array"`); custom
//! transformers are attached in code through [`FnTransformer`] or any
//! [`Transformer`] implementation.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::schema::{PropertyType, TypeSpec};

/// A transformer refused or failed to convert a value
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct TransformError {
    pub transformer: String,
    pub message: String,
}

impl TransformError {
    pub fn new(transformer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            transformer: transformer.into(),
            message: message.into(),
        }
    }
}

/// What a transformer sees
#[derive(Debug, Clone, Copy)]
pub struct TransformInput<'a> {
    pub value: &'a Value,
    /// The schema's declared type, if any
    pub target: Option<&'a TypeSpec>,
}

/// A coercion rule
pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    /// Type produced on success
    fn output(&self) -> PropertyType;

    /// Input types this transformer is willing to convert; `None` means all
    fn accepts(&self) -> Option<&[PropertyType]> {
        None
    }

    /// `Ok(None)` declines without error (the value needs no conversion)
    fn transform(&self, input: &TransformInput<'_>) -> Result<Option<Value>, TransformError>;
}

pub type TransformerRef = Arc<dyn Transformer>;

// =============================================================================
// Built-in transformers
// =============================================================================

/// Numeric parse of strings, booleans and null
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberTransformer;

/// String concatenation coercion; never fails
#[derive(Debug, Clone, Copy, Default)]
pub struct StringTransformer;

/// Numeric parse, then truncation toward zero
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerTransformer;

/// Truthiness; never fails
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanTransformer;

/// Wraps a non-array value into a one-element array
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayTransformer;

impl Transformer for NumberTransformer {
    fn name(&self) -> &str {
        "number"
    }

    fn output(&self) -> PropertyType {
        PropertyType::Number
    }

    fn accepts(&self) -> Option<&[PropertyType]> {
        Some(&[PropertyType::String, PropertyType::Boolean, PropertyType::Null])
    }

    fn transform(&self, input: &TransformInput<'_>) -> Result<Option<Value>, TransformError> {
        if input.value.is_number() {
            return Ok(None);
        }
        coerce_number(input.value)
            .map(|n| Some(number_value(n)))
            .ok_or_else(|| TransformError::new(self.name(), "Cannot convert to number"))
    }
}

impl Transformer for StringTransformer {
    fn name(&self) -> &str {
        "string"
    }

    fn output(&self) -> PropertyType {
        PropertyType::String
    }

    fn transform(&self, input: &TransformInput<'_>) -> Result<Option<Value>, TransformError> {
        Ok(Some(Value::String(display_value(input.value))))
    }
}

impl Transformer for IntegerTransformer {
    fn name(&self) -> &str {
        "integer"
    }

    fn output(&self) -> PropertyType {
        PropertyType::Integer
    }

    fn accepts(&self) -> Option<&[PropertyType]> {
        Some(&[PropertyType::String, PropertyType::Number])
    }

    fn transform(&self, input: &TransformInput<'_>) -> Result<Option<Value>, TransformError> {
        let truncated = coerce_number(input.value)
            .map(f64::trunc)
            .filter(|n| (i64::MIN as f64..=i64::MAX as f64).contains(n))
            .ok_or_else(|| TransformError::new(self.name(), "Cannot convert to integer"))?;
        Ok(Some(Value::from(truncated as i64)))
    }
}

impl Transformer for BooleanTransformer {
    fn name(&self) -> &str {
        "boolean"
    }

    fn output(&self) -> PropertyType {
        PropertyType::Boolean
    }

    fn transform(&self, input: &TransformInput<'_>) -> Result<Option<Value>, TransformError> {
        Ok(Some(Value::Bool(is_truthy(input.value))))
    }
}

impl Transformer for ArrayTransformer {
    fn name(&self) -> &str {
        "array"
    }

    fn output(&self) -> PropertyType {
        PropertyType::Array
    }

    fn transform(&self, input: &TransformInput<'_>) -> Result<Option<Value>, TransformError> {
        if input.value.is_array() {
            return Ok(None);
        }
        Ok(Some(Value::Array(vec![input.value.clone()])))
    }
}

/// Built-ins in inference priority order
pub fn builtins() -> Vec<TransformerRef> {
    vec![
        Arc::new(NumberTransformer),
        Arc::new(StringTransformer),
        Arc::new(IntegerTransformer),
        Arc::new(BooleanTransformer),
        Arc::new(ArrayTransformer),
    ]
}

/// Look up a built-in transformer by name
pub fn builtin(name: &str) -> Option<TransformerRef> {
    builtins().into_iter().find(|t| t.name() == name)
}

/// A transformer backed by a closure
pub struct FnTransformer<F> {
    name: String,
    output: PropertyType,
    func: F,
}

impl<F> FnTransformer<F>
where
    F: Fn(&TransformInput<'_>) -> Result<Option<Value>, TransformError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, output: PropertyType, func: F) -> Self {
        Self {
            name: name.into(),
            output,
            func,
        }
    }
}

impl<F> Transformer for FnTransformer<F>
where
    F: Fn(&TransformInput<'_>) -> Result<Option<Value>, TransformError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn output(&self) -> PropertyType {
        self.output
    }

    fn transform(&self, input: &TransformInput<'_>) -> Result<Option<Value>, TransformError> {
        (self.func)(input)
    }
}

// =============================================================================
// Directives
// =============================================================================

/// A named, ordered set of transformers
#[derive(Clone)]
pub struct TransformerGroup {
    pub name: Option<String>,
    pub transformers: Vec<TransformerRef>,
    /// Skip each transformer's `accepts` gate
    pub ignore_check: bool,
}

/// The `transform` keyword
#[derive(Clone)]
pub enum TransformSpec {
    /// `transform: true`
    Infer,
    Single(TransformerRef),
    List(Vec<TransformerRef>),
    Group(TransformerGroup),
}

fn names(transformers: &[TransformerRef]) -> Vec<&str> {
    transformers.iter().map(|t| t.name()).collect()
}

impl fmt::Debug for TransformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformSpec::Infer => f.write_str("Infer"),
            TransformSpec::Single(t) => f.debug_tuple("Single").field(&t.name()).finish(),
            TransformSpec::List(ts) => f.debug_tuple("List").field(&names(ts)).finish(),
            TransformSpec::Group(g) => f
                .debug_struct("Group")
                .field("name", &g.name)
                .field("transformers", &names(&g.transformers))
                .field("ignore_check", &g.ignore_check)
                .finish(),
        }
    }
}

impl PartialEq for TransformSpec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TransformSpec::Infer, TransformSpec::Infer) => true,
            (TransformSpec::Single(a), TransformSpec::Single(b)) => a.name() == b.name(),
            (TransformSpec::List(a), TransformSpec::List(b)) => names(a) == names(b),
            (TransformSpec::Group(a), TransformSpec::Group(b)) => {
                a.name == b.name
                    && a.ignore_check == b.ignore_check
                    && names(&a.transformers) == names(&b.transformers)
            }
            _ => false,
        }
    }
}

impl Serialize for TransformSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TransformSpec::Infer => serializer.serialize_bool(true),
            TransformSpec::Single(t) => serializer.serialize_str(t.name()),
            TransformSpec::List(ts) => names(ts).serialize(serializer),
            TransformSpec::Group(g) => serde_json::json!({
                "name": g.name,
                "transformers": names(&g.transformers),
                "ignoreCheck": g.ignore_check,
            })
            .serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDirective {
    Flag(bool),
    Name(String),
    Names(Vec<String>),
    Group {
        #[serde(default)]
        name: Option<String>,
        transformers: Vec<String>,
        #[serde(default, rename = "ignoreCheck")]
        ignore_check: bool,
    },
}

fn resolve_all(names: Vec<String>) -> Result<Vec<TransformerRef>, String> {
    names
        .into_iter()
        .map(|name| builtin(&name).ok_or_else(|| format!("unknown transformer \"{name}\"")))
        .collect()
}

/// `transform: false` deserializes to no directive
pub(crate) fn deserialize_directive<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<TransformSpec>, D::Error> {
    let spec = match RawDirective::deserialize(deserializer)? {
        RawDirective::Flag(false) => None,
        RawDirective::Flag(true) => Some(TransformSpec::Infer),
        RawDirective::Name(name) => Some(TransformSpec::Single(
            builtin(&name).ok_or_else(|| serde::de::Error::custom(format!("unknown transformer \"{name}\"")))?,
        )),
        RawDirective::Names(names) => Some(TransformSpec::List(
            resolve_all(names).map_err(serde::de::Error::custom)?,
        )),
        RawDirective::Group {
            name,
            transformers,
            ignore_check,
        } => Some(TransformSpec::Group(TransformerGroup {
            name,
            transformers: resolve_all(transformers).map_err(serde::de::Error::custom)?,
            ignore_check,
        })),
    };
    Ok(spec)
}

// =============================================================================
// Engine
// =============================================================================

/// Result of running a directive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutcome {
    /// Replacement produced by the first successful transformer
    pub value: Option<Value>,
    /// Failures of the transformers tried before it (or of all of them)
    pub errors: Vec<TransformError>,
}

impl TransformOutcome {
    pub fn transformed(&self) -> bool {
        self.value.is_some()
    }
}

/// Run `directive` against `value`. Never fails: transformer errors are
/// collected in the outcome.
pub fn transform(value: &Value, target: Option<&TypeSpec>, directive: &TransformSpec) -> TransformOutcome {
    let input = TransformInput { value, target };
    let runtime = PropertyType::of(value);

    match directive {
        TransformSpec::Infer => {
            let candidates = infer_candidates(target, runtime);
            run(&input, &candidates, runtime, false)
        }
        TransformSpec::Single(transformer) => run(&input, std::slice::from_ref(transformer), runtime, true),
        TransformSpec::List(transformers) => run(&input, transformers, runtime, true),
        TransformSpec::Group(group) => run(&input, &group.transformers, runtime, !group.ignore_check),
    }
}

fn infer_candidates(target: Option<&TypeSpec>, runtime: PropertyType) -> Vec<TransformerRef> {
    let Some(target) = target else {
        return Vec::new();
    };
    builtins()
        .into_iter()
        .filter(|t| target.contains(t.output()))
        .filter(|t| t.accepts().map_or(true, |accepted| accepted.contains(&runtime)))
        .collect()
}

fn run(
    input: &TransformInput<'_>,
    transformers: &[TransformerRef],
    runtime: PropertyType,
    gated: bool,
) -> TransformOutcome {
    let mut outcome = TransformOutcome::default();

    for transformer in transformers {
        if gated && transformer.accepts().is_some_and(|accepted| !accepted.contains(&runtime)) {
            continue;
        }
        match transformer.transform(input) {
            Ok(Some(value)) => {
                outcome.value = Some(value);
                break;
            }
            Ok(None) => {}
            Err(e) => outcome.errors.push(e),
        }
    }

    outcome
}

// =============================================================================
// Coercion helpers
// =============================================================================

/// Numeric reading of a scalar: trimmed decimal or `0x`/`0o`/`0b` strings,
/// the empty string as zero, booleans as 1/0 and null as zero.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::String(s) => parse_numeric(s),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_numeric(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return Some(0.0);
    }

    let radix = match s.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&s[2..], radix).ok().map(|n| n as f64);
    }

    let lowered = s.to_ascii_lowercase();
    if lowered.contains("inf") || lowered.contains("nan") {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// JSON number for `n`, as an integer when it is whole and exactly representable
pub fn number_value(n: f64) -> Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

/// String form of a value: scalars as written, arrays joined with commas,
/// objects as compact JSON
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map_or_else(|| n.to_string(), |f| f.to_string()),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => display_value(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// `false`, `null`, `0`, `NaN` and `""` are falsy; everything else is truthy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn integer() -> TypeSpec {
        TypeSpec::Single(PropertyType::Integer)
    }

    #[test]
    fn test_infer_integer_from_string() {
        let outcome = transform(&json!("3000"), Some(&integer()), &TransformSpec::Infer);
        assert_eq!(outcome.value, Some(json!(3000)));
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_infer_truncates_floats() {
        let outcome = transform(&json!(" 12.9 "), Some(&integer()), &TransformSpec::Infer);
        assert_eq!(outcome.value, Some(json!(12)));
    }

    #[test]
    fn test_infer_reports_parse_failure() {
        let outcome = transform(&json!("abc"), Some(&integer()), &TransformSpec::Infer);
        assert!(!outcome.transformed());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].message, "Cannot convert to integer");
    }

    #[test]
    fn test_infer_without_target_does_nothing() {
        let outcome = transform(&json!("1"), None, &TransformSpec::Infer);
        assert_eq!(outcome, TransformOutcome::default());
    }

    #[test]
    fn test_infer_skips_transformers_that_reject_input_type() {
        // number accepts string/boolean/null only, so an object gets nothing
        let target = TypeSpec::Single(PropertyType::Number);
        let outcome = transform(&json!({"a": 1}), Some(&target), &TransformSpec::Infer);
        assert_eq!(outcome, TransformOutcome::default());
    }

    #[test]
    fn test_infer_prefers_number_over_string() {
        let target = TypeSpec::Many(vec![PropertyType::String, PropertyType::Number]);
        let outcome = transform(&json!(true), Some(&target), &TransformSpec::Infer);
        assert_eq!(outcome.value, Some(json!(1)));
    }

    #[test]
    fn test_array_only_when_target_includes_array() {
        let target = TypeSpec::Single(PropertyType::Array);
        let outcome = transform(&json!("a"), Some(&target), &TransformSpec::Infer);
        assert_eq!(outcome.value, Some(json!(["a"])));

        let target = TypeSpec::Single(PropertyType::String);
        let outcome = transform(&json!(["a", "b"]), Some(&target), &TransformSpec::Infer);
        assert_eq!(outcome.value, Some(json!("a,b")));
    }

    #[test]
    fn test_transform_is_idempotent_once_target_reached() {
        let target = TypeSpec::Single(PropertyType::Number);
        let first = transform(&json!("4"), Some(&target), &TransformSpec::Infer);
        let value = first.value.unwrap();
        let second = transform(&value, Some(&target), &TransformSpec::Infer);
        assert!(!second.transformed());
    }

    #[test]
    fn test_list_honors_accept_gate() {
        let list = TransformSpec::List(vec![Arc::new(NumberTransformer), Arc::new(StringTransformer)]);
        // number does not accept arrays, string does
        let outcome = transform(&json!([1, 2]), None, &list);
        assert_eq!(outcome.value, Some(json!("1,2")));
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_group_ignore_check() {
        let group = |ignore_check| {
            TransformSpec::Group(TransformerGroup {
                name: Some("strict-int".to_string()),
                transformers: vec![Arc::new(IntegerTransformer)],
                ignore_check,
            })
        };
        assert!(!transform(&json!(true), None, &group(false)).transformed());
        assert_eq!(transform(&json!(true), None, &group(true)).value, Some(json!(1)));
    }

    #[test]
    fn test_function_transformer_errors_are_collected() {
        let failing = FnTransformer::new("never", PropertyType::String, |_: &TransformInput<'_>| {
            Err(TransformError::new("never", "refused"))
        });
        let spec = TransformSpec::List(vec![Arc::new(failing), Arc::new(BooleanTransformer)]);
        let outcome = transform(&json!(""), None, &spec);
        assert_eq!(outcome.value, Some(json!(false)));
        assert_eq!(outcome.errors, vec![TransformError::new("never", "refused")]);
    }

    #[test]
    fn test_directive_from_json() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "deserialize_directive")]
            transform: Option<TransformSpec>,
        }
        let parse = |v: Value| serde_json::from_value::<Holder>(v).map(|h| h.transform);

        assert_eq!(parse(json!({ "transform": true })).unwrap(), Some(TransformSpec::Infer));
        assert_eq!(parse(json!({ "transform": false })).unwrap(), None);
        assert!(matches!(
            parse(json!({ "transform": ["number", "string"] })).unwrap(),
            Some(TransformSpec::List(ref ts)) if ts.len() == 2
        ));
        assert!(matches!(
            parse(json!({ "transform": { "transformers": ["integer"], "ignoreCheck": true } })).unwrap(),
            Some(TransformSpec::Group(ref g)) if g.ignore_check
        ));
        assert!(parse(json!({ "transform": "date" })).is_err());
    }

    #[test]
    fn test_numeric_parsing() {
        assert_eq!(coerce_number(&json!("")), Some(0.0));
        assert_eq!(coerce_number(&json!("0x1F")), Some(31.0));
        assert_eq!(coerce_number(&json!("1e3")), Some(1000.0));
        assert_eq!(coerce_number(&json!("Infinity")), None);
        assert_eq!(coerce_number(&json!("12px")), None);
        assert_eq!(coerce_number(&json!(null)), Some(0.0));
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!("false")));
        assert!(is_truthy(&json!([])));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!(2)), "2");
        assert_eq!(display_value(&json!(2.5)), "2.5");
        assert_eq!(display_value(&json!([1, null, "a"])), "1,,a");
        assert_eq!(display_value(&json!({"a": 1})), "{\"a\":1}");
    }
}
