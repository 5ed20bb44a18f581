//! Dotted-path access into configuration values
//!
//! `app.ports.0` addresses key `app`, then key `ports`, then index 0.
//! A key containing dots that exists verbatim on the root object wins over
//! the split reading.

use serde_json::{Map, Value};

use crate::error::{ConfigError, Result};

/// Split a dotted path; the empty path has no segments
pub fn split(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('.').collect()
    }
}

fn index_of(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Look up a dotted path
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(verbatim) = root.as_object().and_then(|map| map.get(path)) {
        return Some(verbatim);
    }
    lookup_segments(root, &split(path))
}

pub fn lookup_segments<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => index_of(segment).and_then(|i| items.get(i)),
        _ => None,
    })
}

pub fn lookup_segments_mut<'a>(root: &'a mut Value, segments: &[&str]) -> Option<&'a mut Value> {
    segments.iter().try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get_mut(*segment),
        Value::Array(items) => index_of(segment).and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

/// Store `value` at `segments` inside an existing parent container. An
/// array index may replace an element or append at the end.
pub fn write(root: &mut Value, segments: &[&str], value: Value) -> Result<()> {
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return Ok(());
    };

    let joined = || segments.join(".");
    let parent = lookup_segments_mut(root, parents).ok_or_else(|| ConfigError::MissingParent {
        parent: parents.join("."),
        path: joined(),
    })?;

    match parent {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        Value::Array(items) => match index_of(last) {
            Some(i) if i < items.len() => {
                items[i] = value;
                Ok(())
            }
            Some(i) if i == items.len() => {
                items.push(value);
                Ok(())
            }
            _ => Err(ConfigError::InvalidPath(format!(
                "\"{last}\" is not a valid index into the array at \"{}\"",
                parents.join(".")
            ))),
        },
        _ => Err(ConfigError::InvalidPath(format!(
            "\"{}\" is not a container, so \"{}\" cannot be set",
            parents.join("."),
            joined()
        ))),
    }
}

/// Insert into nested objects, creating (or replacing non-object)
/// intermediate values along the way
pub fn insert_nested(root: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> Value {
        json!({
            "app": { "foo": "bar", "ports": [80, 443] },
            "log.level": "debug"
        })
    }

    #[test]
    fn test_lookup() {
        let config = config();
        assert_eq!(lookup(&config, "app.foo"), Some(&json!("bar")));
        assert_eq!(lookup(&config, "app.ports.1"), Some(&json!(443)));
        assert_eq!(lookup(&config, "app.ports.2"), None);
        assert_eq!(lookup(&config, "app.foo.bar"), None);
        assert_eq!(lookup(&config, ""), Some(&config));
    }

    #[test]
    fn test_verbatim_key_wins() {
        let config = config();
        assert_eq!(lookup(&config, "log.level"), Some(&json!("debug")));
    }

    #[test]
    fn test_write_into_existing_parent() {
        let mut config = config();
        write(&mut config, &["app", "foo"], json!("new value")).unwrap();
        write(&mut config, &["app", "ports", "0"], json!(8080)).unwrap();
        write(&mut config, &["app", "ports", "2"], json!(9090)).unwrap();
        assert_eq!(lookup(&config, "app.foo"), Some(&json!("new value")));
        assert_eq!(lookup(&config, "app.ports"), Some(&json!([8080, 443, 9090])));
    }

    #[test]
    fn test_write_without_parent() {
        let mut config = config();
        let err = write(&mut config, &["db", "host"], json!("x")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingParent { ref parent, .. } if parent == "db"));

        let err = write(&mut config, &["app", "ports", "7"], json!(1)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPath(_)));
    }

    #[test]
    fn test_insert_nested() {
        let mut map = Map::new();
        insert_nested(&mut map, &["db", "pool", "size"], json!(4));
        insert_nested(&mut map, &["db", "host"], json!("localhost"));
        assert_eq!(Value::Object(map), json!({ "db": { "pool": { "size": 4 }, "host": "localhost" } }));
    }
}
