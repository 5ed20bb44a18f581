//! Locating schema nodes for value paths

use crate::error::{ConfigError, Result};

use super::{AdditionalProperties, PropertyType, SchemaNode, ROOT_SCHEMA};

/// A schema node together with its slash-separated location
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMatch<'a> {
    pub node: &'a SchemaNode,
    pub schema_path: String,
}

fn accepts(node: &SchemaNode, ty: PropertyType) -> bool {
    node.kind
        .as_ref()
        .is_some_and(|kind| kind.contains(ty) || kind.accepts_any())
}

/// Find the node governing the value at `segments` (already split on dots).
///
/// Object segments match `properties` first, then an `additionalProperties`
/// schema. Numeric segments match `items` on array nodes. Returns `None` when
/// the path leaves the schema, e.g. into keys merely allowed by
/// `additionalProperties: true`.
pub fn find_schema_node<'a>(root: &'a SchemaNode, segments: &[&str]) -> Option<NodeMatch<'a>> {
    find(root, segments, ROOT_SCHEMA.to_string())
}

fn find<'a>(node: &'a SchemaNode, segments: &[&str], path: String) -> Option<NodeMatch<'a>> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(NodeMatch { node, schema_path: path });
    };

    if accepts(node, PropertyType::Object) {
        if let Some(child) = node.properties.as_ref().and_then(|p| p.get(*head)) {
            if let Some(found) = find(child, rest, format!("{path}/properties/{head}")) {
                return Some(found);
            }
        }
        if let Some(AdditionalProperties::Schema(extra)) = &node.additional_properties {
            if !node.declares(head) {
                if let Some(found) = find(extra, rest, format!("{path}/additionalProperties/{head}")) {
                    return Some(found);
                }
            }
        }
    }

    let is_index = !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit());
    if is_index && accepts(node, PropertyType::Array) {
        if let Some(items) = &node.items {
            return find(items, rest, format!("{path}/items"));
        }
    }

    None
}

/// Resolve an explicit schema path such as `#/properties/app/properties/port`.
///
/// Understands `properties/<name>`, `items`, `additionalProperties/<key>` (the
/// key is ignored) and `anyOf|allOf|oneOf|not/<index>`.
pub fn resolve_schema_path<'a>(root: &'a SchemaNode, schema_path: &str) -> Result<NodeMatch<'a>> {
    let invalid = || ConfigError::InvalidPath(format!("schema path \"{schema_path}\" does not resolve"));

    let trimmed = schema_path.strip_prefix(ROOT_SCHEMA).unwrap_or(schema_path);
    let mut segments = trimmed.split('/').filter(|s| !s.is_empty());
    let mut node = root;

    while let Some(segment) = segments.next() {
        node = match segment {
            "properties" => {
                let name = segments.next().ok_or_else(invalid)?;
                node.properties.as_ref().and_then(|p| p.get(name)).ok_or_else(invalid)?
            }
            "items" => node.items.as_deref().ok_or_else(invalid)?,
            "additionalProperties" => {
                segments.next();
                match &node.additional_properties {
                    Some(AdditionalProperties::Schema(extra)) => &**extra,
                    _ => return Err(invalid()),
                }
            }
            "anyOf" | "allOf" | "oneOf" | "not" => {
                let branches = match segment {
                    "anyOf" => &node.any_of,
                    "allOf" => &node.all_of,
                    "oneOf" => &node.one_of,
                    _ => &node.not,
                };
                let index: usize = segments.next().and_then(|i| i.parse().ok()).ok_or_else(invalid)?;
                branches.as_ref().and_then(|b| b.get(index)).ok_or_else(invalid)?
            }
            _ => return Err(invalid()),
        };
    }

    let schema_path = format!("{ROOT_SCHEMA}/{}", trimmed.trim_start_matches('/'));
    Ok(NodeMatch {
        node,
        schema_path: schema_path.trim_end_matches('/').to_string(),
    })
}
