//! Schema types and normalization
//!
//! A [`SchemaNode`] is a JSON-Schema-like description of a configuration
//! value: its acceptable types, nested `properties`/`items`, a `default`,
//! keyword constraints, the composite operators `anyOf`/`allOf`/`oneOf`/`not`
//! and an optional `transform` coercion directive.
//!
//! Nodes are normalized once, when a [`Schema`] is built. Normalization
//! produces a new tree in which every node without a `type` has one inferred
//! from `properties` (object), `items` (array) and the runtime type of its
//! `default`, and empty `required` lists are dropped. The walker only ever
//! sees normalized trees, so shared or repeated nodes are never normalized
//! twice.

mod lookup;
pub mod walker;

pub use lookup::{find_schema_node, resolve_schema_path, NodeMatch};
pub use walker::{Location, SchemaWalker, ROOT_PROPERTY, ROOT_SCHEMA};

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use crate::error::{ConfigError, Result};
use crate::transform::TransformSpec;

/// Value types a schema can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Object,
    Array,
    String,
    Boolean,
    Number,
    Integer,
    Null,
    Any,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Object => "object",
            PropertyType::Array => "array",
            PropertyType::String => "string",
            PropertyType::Boolean => "boolean",
            PropertyType::Number => "number",
            PropertyType::Integer => "integer",
            PropertyType::Null => "null",
            PropertyType::Any => "any",
        }
    }

    /// Runtime type of a value. Never `Integer` or `Any`: whole numbers are
    /// still `Number` here, the walker decides whether they count as integers.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => PropertyType::Null,
            Value::Bool(_) => PropertyType::Boolean,
            Value::Number(_) => PropertyType::Number,
            Value::String(_) => PropertyType::String,
            Value::Array(_) => PropertyType::Array,
            Value::Object(_) => PropertyType::Object,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a JSON number has no fractional part
pub fn is_whole_number(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => true,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0),
        _ => false,
    }
}

/// The `type` keyword: one type or a set of acceptable types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSpec {
    Single(PropertyType),
    Many(Vec<PropertyType>),
}

impl TypeSpec {
    fn from_types(mut types: Vec<PropertyType>) -> Option<Self> {
        let mut seen = Vec::with_capacity(types.len());
        types.retain(|t| {
            if seen.contains(t) {
                false
            } else {
                seen.push(*t);
                true
            }
        });
        match types.len() {
            0 => None,
            1 => Some(TypeSpec::Single(types[0])),
            _ => Some(TypeSpec::Many(types)),
        }
    }

    pub fn as_slice(&self) -> &[PropertyType] {
        match self {
            TypeSpec::Single(t) => std::slice::from_ref(t),
            TypeSpec::Many(types) => types,
        }
    }

    pub fn contains(&self, ty: PropertyType) -> bool {
        self.as_slice().contains(&ty)
    }

    /// Any value is acceptable
    pub fn accepts_any(&self) -> bool {
        self.contains(PropertyType::Any)
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.as_slice().iter().map(PropertyType::as_str).collect();
        f.write_str(&names.join(","))
    }
}

impl From<PropertyType> for TypeSpec {
    fn from(ty: PropertyType) -> Self {
        TypeSpec::Single(ty)
    }
}

/// The `required` keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Required {
    /// `true`: a missing value at this node is an error
    Flag(bool),
    /// Property names an object value must contain
    Names(Vec<String>),
}

/// The `additionalProperties` keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaNode>),
}

/// A compiled `pattern` keyword
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self)
            .map_err(|e| ConfigError::InvalidSchema(format!("invalid pattern {pattern:?}: {e}")))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Unanchored search, like a JavaScript `String.prototype.match`
    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Regex::new(&source).map(Self).map_err(serde::de::Error::custom)
    }
}

/// A node of the schema tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TypeSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, SchemaNode>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Required>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,

    /// `Some(Value::Null)` for an explicit `"default": null`
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique_items: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,

    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<SchemaNode>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<SchemaNode>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<SchemaNode>>,

    /// Accepts a single schema or a list; stored as a list
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub not: Option<Vec<SchemaNode>>,

    #[serde(
        default,
        deserialize_with = "crate::transform::deserialize_directive",
        skip_serializing_if = "Option::is_none"
    )]
    pub transform: Option<TransformSpec>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

fn one_or_many<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<SchemaNode>>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<SchemaNode>),
        One(Box<SchemaNode>),
    }

    Ok(Some(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(nodes) => nodes,
        OneOrMany::One(node) => vec![*node],
    }))
}

impl SchemaNode {
    /// Deserialize a single node, without the root shorthand of [`Schema::from_value`]
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidSchema(e.to_string()))
    }

    /// A missing value at this node is an error
    pub fn requires_value(&self) -> bool {
        match &self.required {
            Some(Required::Flag(flag)) => *flag,
            Some(Required::Names(names)) => !names.is_empty(),
            None => false,
        }
    }

    /// The declared property names, if any
    pub fn declares(&self, name: &str) -> bool {
        self.properties.as_ref().is_some_and(|p| p.contains_key(name))
    }

    /// Normalize this node and all of its children
    pub fn normalize(mut self) -> Self {
        self.normalize_node();

        if let Some(properties) = self.properties.take() {
            self.properties = Some(
                properties
                    .into_iter()
                    .map(|(name, child)| (name, child.normalize()))
                    .collect(),
            );
        }
        self.items = self.items.take().map(|items| Box::new(items.normalize()));
        self.additional_properties = match self.additional_properties.take() {
            Some(AdditionalProperties::Schema(node)) => {
                Some(AdditionalProperties::Schema(Box::new(node.normalize())))
            }
            other => other,
        };
        for branches in [&mut self.any_of, &mut self.all_of, &mut self.one_of, &mut self.not] {
            if let Some(nodes) = branches.take() {
                *branches = Some(nodes.into_iter().map(SchemaNode::normalize).collect());
            }
        }

        self
    }

    fn normalize_node(&mut self) {
        if self.kind.is_none() {
            let mut types = Vec::new();
            if self.properties.is_some() {
                types.push(PropertyType::Object);
            }
            if self.items.is_some() {
                types.push(PropertyType::Array);
            }
            if let Some(default) = &self.default {
                match PropertyType::of(default) {
                    PropertyType::Null => {
                        warn!("Invalid default value type: null, the default has been discarded");
                        self.default = None;
                    }
                    ty => types.push(ty),
                }
            }
            self.kind = TypeSpec::from_types(types);
        }

        if matches!(&self.required, Some(Required::Names(names)) if names.is_empty()) {
            warn!("object schema \"required\" field is an empty array, it has been ignored");
            self.required = None;
        }
    }
}

/// A normalized schema tree, ready to be walked
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    root: SchemaNode,
}

impl Schema {
    /// Normalize `root` into a schema
    pub fn new(root: SchemaNode) -> Self {
        Self { root: root.normalize() }
    }

    /// Build a schema from a JSON document.
    ///
    /// An object without `type`, `items` or `properties` at the top level is
    /// shorthand for a map of root properties:
    /// `{"port": {"type": "integer"}}` means
    /// `{"properties": {"port": {"type": "integer"}}}`.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(ConfigError::InvalidSchema(
                "schema root must be an object".to_string(),
            ));
        };

        let is_node = ["type", "items", "properties"].iter().any(|k| map.contains_key(*k));
        let document = if is_node {
            Value::Object(map)
        } else {
            serde_json::json!({ "properties": Value::Object(map) })
        };

        SchemaNode::from_value(document).map(Self::new)
    }

    /// Read a schema document from a `.json`, `.json5`, `.yaml` or `.yml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        match crate::parser::parse_str(&content, &ext)? {
            Some(value) => Self::from_value(value),
            None => Err(ConfigError::InvalidSchema(format!(
                "unsupported schema file extension: {}",
                path.display()
            ))),
        }
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }
}

impl From<SchemaNode> for Schema {
    fn from(root: SchemaNode) -> Self {
        Self::new(root)
    }
}
