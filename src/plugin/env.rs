//! `$NAME` substitution in string values

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::Value;
use tracing::error;

use crate::conf::SchemaConf;
use crate::error::{ConfigError, Result};
use crate::hook::{NodeMeta, ValueInterceptor};

use super::Plugin;

/// Key-value lookup for environment variables
pub trait EnvProvider: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvProvider for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvProvider for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

fn env_reference() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$[A-Za-z_]+").expect("static pattern compiles"))
}

struct Substitution {
    result: String,
    referenced: usize,
    missing: Vec<String>,
}

fn substitute(input: &str, env: &dyn EnvProvider) -> Substitution {
    let mut referenced = 0;
    let mut missing = Vec::new();

    let result = env_reference()
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let name = &caps[0][1..];
            referenced += 1;
            env.var(name).unwrap_or_else(|| {
                missing.push(name.to_string());
                String::new()
            })
        })
        .into_owned();

    Substitution {
        result,
        referenced,
        missing,
    }
}

/// Replaces `$NAME` references in string values with environment variables
#[derive(Clone)]
pub struct EnvReplace {
    env: Arc<dyn EnvProvider>,
}

impl EnvReplace {
    pub fn new(env: Arc<dyn EnvProvider>) -> Self {
        Self { env }
    }

    pub fn from_process() -> Self {
        Self::new(Arc::new(ProcessEnv))
    }
}

impl Default for EnvReplace {
    fn default() -> Self {
        Self::from_process()
    }
}

impl Plugin for EnvReplace {
    fn name(&self) -> &str {
        "env-replace"
    }

    fn setup(&self, conf: &mut SchemaConf) {
        conf.add_interceptor(Arc::new(EnvInterceptor {
            env: Arc::clone(&self.env),
            strict: conf.options().strict,
        }));
    }
}

struct EnvInterceptor {
    env: Arc<dyn EnvProvider>,
    strict: bool,
}

impl ValueInterceptor for EnvInterceptor {
    fn name(&self) -> &str {
        "env-replace"
    }

    fn intercept(&self, value: Option<&Value>, meta: &NodeMeta<'_>) -> Result<Option<Value>> {
        let Some(Value::String(text)) = value else {
            return Ok(None);
        };
        if !text.contains('$') {
            return Ok(None);
        }

        let substitution = substitute(text, self.env.as_ref());
        if !substitution.missing.is_empty() {
            if substitution.referenced == 1 {
                if let Some(default) = &meta.schema.default {
                    return Ok(Some(default.clone()));
                }
            } else if self.strict {
                let names = substitution.missing.join(",");
                error!("Missing environment variables {} at {}", names, meta.property_path);
                return Err(ConfigError::MissingEnv {
                    names,
                    path: meta.property_path.to_string(),
                });
            }
        }

        Ok(Some(Value::String(substitution.result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaNode;
    use serde_json::json;

    fn env() -> Arc<dyn EnvProvider> {
        let mut vars = HashMap::new();
        vars.insert("HOST".to_string(), "db.internal".to_string());
        vars.insert("PORT".to_string(), "5432".to_string());
        Arc::new(vars)
    }

    fn intercept(strict: bool, schema: &SchemaNode, value: Value) -> Result<Option<Value>> {
        let interceptor = EnvInterceptor { env: env(), strict };
        let meta = NodeMeta {
            schema,
            schema_path: "#/properties/url",
            property_path: "$ROOT.url",
            property_name: Some("url"),
            origin_value: Some(&value),
        };
        interceptor.intercept(Some(&value), &meta)
    }

    #[test]
    fn test_replaces_known_variables() {
        let schema = SchemaNode::default();
        let out = intercept(false, &schema, json!("postgres://$HOST:$PORT/app")).unwrap();
        assert_eq!(out, Some(json!("postgres://db.internal:5432/app")));
    }

    #[test]
    fn test_ignores_non_strings_and_plain_strings() {
        let schema = SchemaNode::default();
        assert_eq!(intercept(false, &schema, json!(42)).unwrap(), None);
        assert_eq!(intercept(false, &schema, json!("plain")).unwrap(), None);
    }

    #[test]
    fn test_single_missing_variable_falls_back_to_default() {
        let schema = SchemaNode::from_value(json!({ "default": "fallback" })).unwrap();
        let out = intercept(true, &schema, json!("$UNSET")).unwrap();
        assert_eq!(out, Some(json!("fallback")));
    }

    #[test]
    fn test_single_missing_variable_without_default_is_empty_even_when_strict() {
        let schema = SchemaNode::default();
        let out = intercept(true, &schema, json!("$UNSET")).unwrap();
        assert_eq!(out, Some(json!("")));
    }

    #[test]
    fn test_missing_variables_become_empty() {
        let schema = SchemaNode::default();
        let out = intercept(false, &schema, json!("$HOST-$UNSET-$ALSO_UNSET")).unwrap();
        assert_eq!(out, Some(json!("db.internal--")));
    }

    #[test]
    fn test_strict_missing_variables_are_fatal() {
        let schema = SchemaNode::default();
        let err = intercept(true, &schema, json!("$HOST:$UNSET")).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ConfigError::MissingEnv { ref names, .. } if names == "UNSET"));
    }
}
