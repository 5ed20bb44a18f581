//! Recursive validation and normalization of values against a schema
//!
//! The walker fills defaults, runs interceptors, checks types (falling back to
//! the transform engine), applies keyword constraints and evaluates the
//! composite operators. Every violation is recorded in the caller's
//! [`ErrorCollection`]; the walk always completes unless that collection is
//! strict or an interceptor fails.

use serde_json::Value;

use crate::collection::{ErrorCollection, Keyword, ValidationError};
use crate::error::Result;
use crate::hook::{InterceptorChain, NodeMeta};
use crate::transform::{display_value, transform};

use super::{is_whole_number, AdditionalProperties, PropertyType, Required, Schema, SchemaNode, TypeSpec};

/// Property path of the root value
pub const ROOT_PROPERTY: &str = "$ROOT";

/// Schema path of the root node
pub const ROOT_SCHEMA: &str = "#";

/// A position in the value tree and the matching position in the schema tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// e.g. `$ROOT.app.ports[0]`
    pub property_path: String,
    /// e.g. `#/properties/app/properties/ports/items`
    pub schema_path: String,
    pub property_name: Option<String>,
}

impl Location {
    pub fn root() -> Self {
        Self::new(ROOT_PROPERTY, ROOT_SCHEMA)
    }

    pub fn new(property_path: impl Into<String>, schema_path: impl Into<String>) -> Self {
        Self {
            property_path: property_path.into(),
            schema_path: schema_path.into(),
            property_name: None,
        }
    }

    /// A named property, reached through `properties` or `additionalProperties`
    pub fn property(&self, name: &str, via: &str) -> Self {
        Self {
            property_path: format!("{}.{}", self.property_path, name),
            schema_path: format!("{}/{}/{}", self.schema_path, via, name),
            property_name: Some(name.to_string()),
        }
    }

    /// An array element
    pub fn index(&self, index: usize) -> Self {
        Self {
            property_path: format!("{}[{}]", self.property_path, index),
            schema_path: format!("{}/items", self.schema_path),
            property_name: None,
        }
    }

    /// A composite-operator branch: same value, nested schema
    pub fn branch(&self, keyword: Keyword, index: usize) -> Self {
        Self {
            property_path: self.property_path.clone(),
            schema_path: format!("{}/{}/{}", self.schema_path, keyword, index),
            property_name: self.property_name.clone(),
        }
    }

    /// Where an error for `keyword` at this node is reported
    pub fn keyword_path(&self, keyword: Keyword) -> String {
        format!("{}/{}", self.schema_path, keyword)
    }
}

/// Walks values against schema nodes
#[derive(Debug, Clone, Copy)]
pub struct SchemaWalker<'a> {
    interceptors: &'a InterceptorChain,
}

impl<'a> SchemaWalker<'a> {
    pub fn new(interceptors: &'a InterceptorChain) -> Self {
        Self { interceptors }
    }

    /// Walk a whole value from the root. Returns the normalized value, or
    /// `None` when the value is absent and the schema supplies no default.
    pub fn walk(&self, schema: &Schema, value: Option<Value>, errors: &mut ErrorCollection) -> Result<Option<Value>> {
        self.walk_at(schema.root(), value, &Location::root(), errors)
    }

    /// Walk `value` against one node at a given location
    pub fn walk_at(
        &self,
        node: &SchemaNode,
        origin: Option<Value>,
        at: &Location,
        errors: &mut ErrorCollection,
    ) -> Result<Option<Value>> {
        let defaulted = origin.is_none() && node.default.is_some();
        let mut value = origin.or_else(|| node.default.clone());

        if !self.interceptors.is_empty() {
            let origin_value = if defaulted { None } else { value.clone() };
            let meta = NodeMeta {
                schema: node,
                schema_path: &at.schema_path,
                property_path: &at.property_path,
                property_name: at.property_name.as_deref(),
                origin_value: origin_value.as_ref(),
            };
            value = self.interceptors.apply(value, &meta)?;
        }

        let Some(mut value) = value else {
            if node.requires_value() {
                errors.add(node_error(node, at, Keyword::Required, "Missing required value"))?;
            }
            return Ok(None);
        };

        let inspected = match inspect_type(node, &value) {
            Ok(ty) => ty,
            Err(mismatch) => match self.coerce(node, &mut value, at) {
                Ok(ty) => ty,
                Err(reasons) => {
                    let error = node_error(node, at, Keyword::Type, format!("Type invalid: {mismatch}"));
                    errors.add(error.with_reasons(reasons))?;
                    return Ok(Some(value));
                }
            },
        };

        match inspected {
            PropertyType::Object => self.check_object(node, &mut value, at, errors)?,
            PropertyType::Array => self.check_array(node, &mut value, at, errors)?,
            _ => check_scalar(node, &value, at, errors)?,
        }

        let untyped = node.kind.as_ref().map_or(true, TypeSpec::accepts_any);
        if untyped || inspected != PropertyType::Array {
            self.check_composites(node, &value, at, errors)?;
        }

        Ok(Some(value))
    }

    /// Try the node's transform directive. On success the value is replaced
    /// and its new type returned; otherwise the transformer failures are
    /// returned as error reasons.
    fn coerce(
        &self,
        node: &SchemaNode,
        value: &mut Value,
        at: &Location,
    ) -> std::result::Result<PropertyType, Vec<ValidationError>> {
        let Some(directive) = &node.transform else {
            return Err(Vec::new());
        };

        let outcome = transform(value, node.kind.as_ref(), directive);
        if let Some(candidate) = outcome.value {
            if let Ok(ty) = inspect_type(node, &candidate) {
                *value = candidate;
                return Ok(ty);
            }
        }

        Err(outcome
            .errors
            .into_iter()
            .map(|e| {
                node_error(node, at, Keyword::Transform, format!("Transformer \"{}\" failed: {}", e.transformer, e.message))
            })
            .collect())
    }

    fn check_object(
        &self,
        node: &SchemaNode,
        value: &mut Value,
        at: &Location,
        errors: &mut ErrorCollection,
    ) -> Result<()> {
        let Value::Object(map) = value else {
            return Ok(());
        };

        // Checked against the input, before children fill defaults
        if let Some(Required::Names(names)) = &node.required {
            let missing: Vec<&str> = names
                .iter()
                .filter(|name| !map.contains_key(name.as_str()))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                let message = format!("Missing required properties, missing : [{}]", missing.join(","));
                errors.add(node_error(node, at, Keyword::Required, message))?;
            }
        }

        if let Some(properties) = &node.properties {
            for (name, child) in properties {
                let current = map.get_mut(name).map(Value::take);
                let walked = self.walk_at(child, current, &at.property(name, "properties"), errors)?;
                if let Some(walked) = walked {
                    map.insert(name.clone(), walked);
                }
            }
        }

        match &node.additional_properties {
            Some(AdditionalProperties::Allowed(false)) => {
                let extra: Vec<ValidationError> = map
                    .keys()
                    .filter(|key| !node.declares(key))
                    .map(|key| {
                        let message = format!("No additional properties, got additional properties \"{key}\"");
                        node_error(node, at, Keyword::AdditionalProperties, message)
                    })
                    .collect();
                errors.extend(extra)?;
            }
            Some(AdditionalProperties::Schema(extra_schema)) => {
                let keys: Vec<String> = map.keys().filter(|key| !node.declares(key)).cloned().collect();
                for key in keys {
                    let current = map.get_mut(&key).map(Value::take);
                    let walked = self.walk_at(extra_schema, current, &at.property(&key, "additionalProperties"), errors)?;
                    if let Some(walked) = walked {
                        map.insert(key, walked);
                    }
                }
            }
            Some(AdditionalProperties::Allowed(true)) | None => {}
        }

        Ok(())
    }

    fn check_array(
        &self,
        node: &SchemaNode,
        value: &mut Value,
        at: &Location,
        errors: &mut ErrorCollection,
    ) -> Result<()> {
        let Value::Array(elements) = value else {
            return Ok(());
        };

        if let Some(items) = &node.items {
            for (i, element) in elements.iter_mut().enumerate() {
                let current = Some(element.take());
                if let Some(walked) = self.walk_at(items, current, &at.index(i), errors)? {
                    *element = walked;
                }
            }
        }

        let len = elements.len() as u64;
        if let Some(min) = node.min_items.filter(|min| len < *min) {
            let message = format!("There must be a minimum of {min} in the array");
            errors.add(node_error(node, at, Keyword::MinItems, message))?;
        }
        if let Some(max) = node.max_items.filter(|max| len > *max) {
            let message = format!("There must be a maximum of {max} in the array");
            errors.add(node_error(node, at, Keyword::MaxItems, message))?;
        }
        if node.unique_items {
            let duplicates = duplicated(elements);
            if !duplicates.is_empty() {
                let message = format!("Duplicates items, duplicated items: {}", Value::Array(duplicates));
                errors.add(node_error(node, at, Keyword::UniqueItems, message))?;
            }
        }

        Ok(())
    }

    fn check_composites(
        &self,
        node: &SchemaNode,
        value: &Value,
        at: &Location,
        errors: &mut ErrorCollection,
    ) -> Result<()> {
        if let Some(branches) = node.any_of.as_deref().filter(|b| !b.is_empty()) {
            let mut matched = false;
            for (i, branch) in branches.iter().enumerate() {
                if self.trial(branch, value, &at.branch(Keyword::AnyOf, i))? {
                    matched = true;
                    break;
                }
            }
            if !matched {
                let message = "The value must match at least one of the specified schemas.";
                errors.add(node_error(node, at, Keyword::AnyOf, message))?;
            }
        }

        if let Some(branches) = node.not.as_deref().filter(|b| !b.is_empty()) {
            let mut forbidden = false;
            for (i, branch) in branches.iter().enumerate() {
                if self.trial(branch, value, &at.branch(Keyword::Not, i))? {
                    forbidden = true;
                    break;
                }
            }
            if forbidden {
                let message = "The value must not match the specified schema.";
                errors.add(node_error(node, at, Keyword::Not, message))?;
            }
        }

        if let Some(branches) = node.all_of.as_deref().filter(|b| !b.is_empty()) {
            let mut all = true;
            for (i, branch) in branches.iter().enumerate() {
                if !self.trial(branch, value, &at.branch(Keyword::AllOf, i))? {
                    all = false;
                    break;
                }
            }
            if !all {
                let message = "The value must match all of the specified schemas.";
                errors.add(node_error(node, at, Keyword::AllOf, message))?;
            }
        }

        if let Some(branches) = node.one_of.as_deref().filter(|b| !b.is_empty()) {
            let mut passed = 0;
            for (i, branch) in branches.iter().enumerate() {
                if self.trial(branch, value, &at.branch(Keyword::OneOf, i))? {
                    passed += 1;
                }
                if passed > 1 {
                    break;
                }
            }
            if passed != 1 {
                let message = if passed == 0 {
                    "The value must match exactly one of the specified schemas, but matched none."
                } else {
                    "The value must match exactly one of the specified schemas, but matched more than one."
                };
                errors.add(node_error(node, at, Keyword::OneOf, message))?;
            }
        }

        Ok(())
    }

    /// Walk a copy of `value` against `branch` with a private collection.
    /// True when the branch produced no errors.
    fn trial(&self, branch: &SchemaNode, value: &Value, at: &Location) -> Result<bool> {
        let mut scratch = ErrorCollection::new();
        self.walk_at(branch, Some(value.clone()), at, &mut scratch)?;
        Ok(scratch.is_empty())
    }
}

fn node_error(node: &SchemaNode, at: &Location, keyword: Keyword, message: impl Into<String>) -> ValidationError {
    ValidationError::new(keyword, message, &at.property_path, at.keyword_path(keyword), node)
}

/// Established type of `value` under `node`, or the mismatch message.
///
/// A node without `type`, or with `any`, accepts every value under its
/// runtime type. `integer` matches whole numbers only.
fn inspect_type(node: &SchemaNode, value: &Value) -> std::result::Result<PropertyType, String> {
    let runtime = PropertyType::of(value);
    let Some(kind) = node.kind.as_ref().filter(|k| !k.accepts_any()) else {
        return Ok(runtime);
    };

    match kind {
        TypeSpec::Single(expected) => {
            let actual = if *expected == PropertyType::Integer && is_whole_number(value) {
                PropertyType::Integer
            } else {
                runtime
            };
            if actual == *expected {
                Ok(actual)
            } else {
                Err(format!("Invalid type, must be a {expected} type, got {actual}"))
            }
        }
        TypeSpec::Many(types) => {
            if types.contains(&runtime) {
                Ok(runtime)
            } else if runtime == PropertyType::Number
                && types.contains(&PropertyType::Integer)
                && is_whole_number(value)
            {
                Ok(PropertyType::Integer)
            } else {
                Err(format!("Invalid type, must be one of the types {kind}, got {runtime}"))
            }
        }
    }
}

fn check_scalar(node: &SchemaNode, value: &Value, at: &Location, errors: &mut ErrorCollection) -> Result<()> {
    let mut found = Vec::new();
    let mut fail = |keyword: Keyword, message: String| found.push(node_error(node, at, keyword, message));

    if let Value::String(s) = value {
        let len = s.chars().count() as u64;
        if let Some(max) = node.max_length.filter(|max| len > *max) {
            fail(
                Keyword::MaxLength,
                format!("Invalid characters length, may only be {max} characters long, got {len}"),
            );
        }
        if let Some(min) = node.min_length.filter(|min| len < *min) {
            fail(
                Keyword::MinLength,
                format!("Invalid characters length, must be at least {min} characters long, got {len}"),
            );
        }
    }

    if let Some(min) = &node.minimum {
        if compare(value, min) == Some(std::cmp::Ordering::Less) {
            fail(
                Keyword::Minimum,
                format!(
                    "Invalid range, must have a minimum value of {}, got {}",
                    display_value(min),
                    display_value(value)
                ),
            );
        }
    }
    if let Some(max) = &node.maximum {
        if compare(value, max) == Some(std::cmp::Ordering::Greater) {
            fail(
                Keyword::Maximum,
                format!(
                    "Invalid range, must have a maximum value of {}, got {}",
                    display_value(max),
                    display_value(value)
                ),
            );
        }
    }

    if let (Some(pattern), Value::String(s)) = (&node.pattern, value) {
        if !pattern.is_match(s) {
            fail(
                Keyword::Pattern,
                format!("Pattern not match, string \"{s}\" not match the regex pattern {pattern}"),
            );
        }
    }

    if let Some(members) = &node.enumeration {
        if !members.iter().any(|member| strict_equals(member, value)) {
            let listed: Vec<String> = members.iter().map(display_value).collect();
            fail(
                Keyword::Enum,
                format!("Invalid value, {value} not one of the enumeration {}", listed.join(",")),
            );
        }
    }

    errors.extend(found)
}

/// Ordering of two values of the same runtime type; `None` across types
fn compare(value: &Value, bound: &Value) -> Option<std::cmp::Ordering> {
    match (value, bound) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Equality without coercion; numbers compare by value so `1` equals `1.0`
fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Values occurring more than once, each listed once, in order of first repeat
fn duplicated(elements: &[Value]) -> Vec<Value> {
    let mut duplicates: Vec<Value> = Vec::new();
    for (i, element) in elements.iter().enumerate() {
        let repeated = elements[..i].iter().any(|earlier| strict_equals(earlier, element));
        if repeated && !duplicates.iter().any(|d| strict_equals(d, element)) {
            duplicates.push(element.clone());
        }
    }
    duplicates
}
