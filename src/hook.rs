//! Value interceptors
//!
//! Interceptors see every node the walker visits, after default substitution
//! and before type inspection, and may replace the value. They run in
//! registration order; each one sees the value produced by the previous one.

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::schema::SchemaNode;

/// Where the walker currently is
#[derive(Debug, Clone, Copy)]
pub struct NodeMeta<'a> {
    pub schema: &'a SchemaNode,
    pub schema_path: &'a str,
    pub property_path: &'a str,
    /// `None` at the root and for array items
    pub property_name: Option<&'a str>,
    /// The value before defaults or earlier interceptors touched it
    pub origin_value: Option<&'a Value>,
}

/// A hook that may rewrite values during a walk
pub trait ValueInterceptor: Send + Sync {
    fn name(&self) -> &str;

    /// Return `Some` to replace the value, `None` to keep it. Errors abort
    /// the walk.
    fn intercept(&self, value: Option<&Value>, meta: &NodeMeta<'_>) -> Result<Option<Value>>;
}

pub type InterceptorRef = Arc<dyn ValueInterceptor>;

/// Ordered interceptor registry
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<InterceptorRef>,
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.interceptors.iter().map(|i| i.name()).collect();
        f.debug_struct("InterceptorChain").field("interceptors", &names).finish()
    }
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, interceptor: InterceptorRef) {
        self.interceptors.push(interceptor);
    }

    /// Drop every interceptor registered under `name`
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.interceptors.len();
        self.interceptors.retain(|i| i.name() != name);
        self.interceptors.len() != before
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run every interceptor over `value`
    pub fn apply(&self, value: Option<Value>, meta: &NodeMeta<'_>) -> Result<Option<Value>> {
        let mut current = value;
        for interceptor in &self.interceptors {
            if let Some(replaced) = interceptor.intercept(current.as_ref(), meta)? {
                current = Some(replaced);
            }
        }
        Ok(current)
    }
}

/// An interceptor backed by a closure
pub struct FnInterceptor<F> {
    name: String,
    func: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(Option<&Value>, &NodeMeta<'_>) -> Result<Option<Value>> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> ValueInterceptor for FnInterceptor<F>
where
    F: Fn(Option<&Value>, &NodeMeta<'_>) -> Result<Option<Value>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn intercept(&self, value: Option<&Value>, meta: &NodeMeta<'_>) -> Result<Option<Value>> {
        (self.func)(value, meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(schema: &SchemaNode) -> NodeMeta<'_> {
        NodeMeta {
            schema,
            schema_path: "#",
            property_path: "$ROOT",
            property_name: None,
            origin_value: None,
        }
    }

    #[test]
    fn test_interceptors_chain_in_order() {
        let mut chain = InterceptorChain::new();
        chain.add(Arc::new(FnInterceptor::new("double", |v: Option<&Value>, _: &NodeMeta<'_>| {
            Ok(v.and_then(Value::as_i64).map(|n| json!(n * 2)))
        })));
        chain.add(Arc::new(FnInterceptor::new("inc", |v: Option<&Value>, _: &NodeMeta<'_>| {
            Ok(v.and_then(Value::as_i64).map(|n| json!(n + 1)))
        })));

        let schema = SchemaNode::default();
        assert_eq!(chain.apply(Some(json!(5)), &meta(&schema)).unwrap(), Some(json!(11)));
    }

    #[test]
    fn test_none_keeps_value() {
        let mut chain = InterceptorChain::new();
        chain.add(Arc::new(FnInterceptor::new("noop", |_: Option<&Value>, _: &NodeMeta<'_>| Ok(None))));

        let schema = SchemaNode::default();
        assert_eq!(chain.apply(Some(json!("x")), &meta(&schema)).unwrap(), Some(json!("x")));
        assert_eq!(chain.apply(None, &meta(&schema)).unwrap(), None);
    }

    #[test]
    fn test_remove_by_name() {
        let mut chain = InterceptorChain::new();
        chain.add(Arc::new(FnInterceptor::new("a", |_: Option<&Value>, _: &NodeMeta<'_>| Ok(None))));
        chain.add(Arc::new(FnInterceptor::new("b", |_: Option<&Value>, _: &NodeMeta<'_>| Ok(None))));

        assert!(chain.remove("a"));
        assert!(!chain.remove("a"));
        assert_eq!(chain.len(), 1);
    }
}
