//! Parsers turn loaded text into configuration values
//!
//! The built-in parsers dispatch on the candidate's extension only and do
//! nothing for extensions they do not own.

use std::fmt;

use serde_json::Value;

use crate::error::Result;
use crate::loader::LoadedContent;
use crate::source::SourceMeta;

/// A configuration format.
///
/// Parsers run in registration order. The first one returning a value wins
/// for the candidate; later parsers receive it as `previous`.
pub trait Parser: Send + Sync {
    fn name(&self) -> &str;

    fn parse(
        &self,
        content: Option<&LoadedContent>,
        previous: Option<&Value>,
        meta: &SourceMeta,
    ) -> Result<Option<Value>>;
}

impl fmt::Debug for dyn Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parser({})", self.name())
    }
}

/// Parse `content` by extension; `None` for unknown extensions
pub fn parse_str(content: &str, ext: &str) -> Result<Option<Value>> {
    let value = match ext {
        ".json" => serde_json::from_str(content)?,
        ".json5" => json5::from_str(content)?,
        ".yaml" | ".yml" => serde_yaml::from_str(content)?,
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn owned_content<'a>(
    exts: &[&str],
    content: Option<&'a LoadedContent>,
    previous: Option<&Value>,
    meta: &SourceMeta,
) -> Option<&'a str> {
    if previous.is_some() || !exts.contains(&meta.ext.as_str()) {
        return None;
    }
    content.map(|c| c.content.as_str())
}

/// `.json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

/// `.yaml` and `.yml`
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

/// `.json5`
#[derive(Debug, Clone, Copy, Default)]
pub struct Json5Parser;

impl Parser for JsonParser {
    fn name(&self) -> &str {
        "json"
    }

    fn parse(&self, content: Option<&LoadedContent>, previous: Option<&Value>, meta: &SourceMeta) -> Result<Option<Value>> {
        match owned_content(&[".json"], content, previous, meta) {
            Some(text) => Ok(Some(serde_json::from_str(text)?)),
            None => Ok(None),
        }
    }
}

impl Parser for YamlParser {
    fn name(&self) -> &str {
        "yaml"
    }

    fn parse(&self, content: Option<&LoadedContent>, previous: Option<&Value>, meta: &SourceMeta) -> Result<Option<Value>> {
        match owned_content(&[".yaml", ".yml"], content, previous, meta) {
            Some(text) => Ok(Some(serde_yaml::from_str(text)?)),
            None => Ok(None),
        }
    }
}

impl Parser for Json5Parser {
    fn name(&self) -> &str {
        "json5"
    }

    fn parse(&self, content: Option<&LoadedContent>, previous: Option<&Value>, meta: &SourceMeta) -> Result<Option<Value>> {
        match owned_content(&[".json5"], content, previous, meta) {
            Some(text) => Ok(Some(json5::from_str(text)?)),
            None => Ok(None),
        }
    }
}
