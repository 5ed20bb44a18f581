//! Schema walk scenarios
//!
//! End-to-end walks of values against schemas: defaults, coercion,
//! keyword checks and composite operators.

use rstest::rstest;
use serde_json::{json, Value};

use schemaconf::hook::InterceptorChain;
use schemaconf::{ConfigError, ErrorCollection, Keyword, Schema, SchemaNode, SchemaWalker, ValidationError};

fn walk(schema: Value, value: Option<Value>) -> (Option<Value>, Vec<ValidationError>) {
    let schema = Schema::new(SchemaNode::from_value(schema).unwrap());
    let chain = InterceptorChain::new();
    let mut errors = ErrorCollection::new();
    let result = SchemaWalker::new(&chain).walk(&schema, value, &mut errors).unwrap();
    (result, errors.into_error_list())
}

fn keywords(errors: &[ValidationError]) -> Vec<Keyword> {
    errors.iter().map(|e| e.keyword).collect()
}

// =============================================================================
// Defaults
// =============================================================================

#[test]
fn test_default_fills_nested_object() {
    let schema = json!({
        "properties": { "app": { "properties": { "missed": { "default": "miss" } } } }
    });
    let (result, errors) = walk(schema, Some(json!({ "app": {} })));
    assert_eq!(result, Some(json!({ "app": { "missed": "miss" } })));
    assert!(errors.is_empty());
}

#[test]
fn test_default_satisfies_required() {
    let (result, errors) = walk(json!({ "type": "number", "default": 3, "required": true }), None);
    assert_eq!(result, Some(json!(3)));
    assert!(errors.is_empty());
}

#[test]
fn test_missing_required_value_stops_subtree() {
    let schema = json!({
        "type": "object",
        "properties": { "db": { "type": "object", "required": true, "properties": { "host": { "default": "x" } } } }
    });
    let (result, errors) = walk(schema, Some(json!({})));
    assert_eq!(result, Some(json!({})));
    assert_eq!(keywords(&errors), vec![Keyword::Required]);
    assert_eq!(errors[0].path, "$ROOT.db");
    assert_eq!(errors[0].message, "Missing required value");
}

#[test]
fn test_required_names_ignore_child_defaults() {
    let schema = json!({ "properties": { "a": { "default": 1 } }, "required": ["a"] });
    let (result, errors) = walk(schema, Some(json!({})));
    assert_eq!(result, Some(json!({ "a": 1 })));
    assert_eq!(keywords(&errors), vec![Keyword::Required]);
    assert_eq!(errors[0].message, "Missing required properties, missing : [a]");
}

#[test]
fn test_conformant_value_round_trips() {
    let schema = json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "minLength": 1 },
            "ports": { "type": "array", "items": { "type": "integer", "minimum": 1 } },
            "mode": { "enum": ["dev", "prod"] }
        },
        "required": ["name"],
        "additionalProperties": false
    });
    let value = json!({ "name": "api", "ports": [80, 443], "mode": "prod" });
    let (result, errors) = walk(schema, Some(value.clone()));
    assert_eq!(result, Some(value));
    assert!(errors.is_empty());
}

// =============================================================================
// Coercion
// =============================================================================

#[test]
fn test_inferred_transform_coerces_string_to_integer() {
    let (result, errors) = walk(json!({ "type": "integer", "transform": true }), Some(json!("3000")));
    assert_eq!(result, Some(json!(3000)));
    assert!(errors.is_empty());
}

#[test]
fn test_transform_reaches_a_fixed_point() {
    let schema = json!({ "type": "integer", "transform": true });
    let (once, _) = walk(schema.clone(), Some(json!("42")));
    let (twice, errors) = walk(schema, once.clone());
    assert_eq!(once, twice);
    assert!(errors.is_empty());
}

#[test]
fn test_failed_transform_reports_type_error_with_reasons() {
    let (result, errors) = walk(json!({ "type": "number", "transform": "number" }), Some(json!("abc")));
    assert_eq!(result, Some(json!("abc")));
    assert_eq!(keywords(&errors), vec![Keyword::Type]);
    assert_eq!(errors[0].message, "Type invalid: Invalid type, must be a number type, got string");
    assert_eq!(errors[0].reasons.len(), 1);
    assert_eq!(errors[0].reasons[0].keyword, Keyword::Transform);
}

#[test]
fn test_array_transform_wraps_scalar() {
    let schema = json!({ "type": "array", "transform": true, "items": { "type": "string" } });
    let (result, errors) = walk(schema, Some(json!("solo")));
    assert_eq!(result, Some(json!(["solo"])));
    assert!(errors.is_empty());
}

// =============================================================================
// Keywords
// =============================================================================

#[test]
fn test_unique_items_lists_duplicates() {
    let schema = json!({ "items": { "type": "number" }, "uniqueItems": true });
    let (_, errors) = walk(schema, Some(json!([1, 2, 2])));
    assert_eq!(keywords(&errors), vec![Keyword::UniqueItems]);
    assert_eq!(errors[0].message, "Duplicates items, duplicated items: [2]");
    assert_eq!(errors[0].schema_path, "#/uniqueItems");
}

#[rstest]
#[case(json!({ "type": "string", "maxLength": 3 }), json!("abcd"), Keyword::MaxLength)]
#[case(json!({ "type": "string", "minLength": 2 }), json!("a"), Keyword::MinLength)]
#[case(json!({ "type": "number", "minimum": 0 }), json!(-1), Keyword::Minimum)]
#[case(json!({ "type": "number", "maximum": 10 }), json!(11), Keyword::Maximum)]
#[case(json!({ "type": "string", "pattern": "^v\\d+$" }), json!("x1"), Keyword::Pattern)]
#[case(json!({ "enum": [1, 2] }), json!(3), Keyword::Enum)]
#[case(json!({ "type": "array", "minItems": 1 }), json!([]), Keyword::MinItems)]
#[case(json!({ "type": "array", "maxItems": 1 }), json!([1, 2]), Keyword::MaxItems)]
#[case(json!({ "type": "boolean" }), json!("yes"), Keyword::Type)]
fn test_single_keyword_violation(#[case] schema: Value, #[case] value: Value, #[case] expected: Keyword) {
    let (_, errors) = walk(schema, Some(value));
    assert_eq!(keywords(&errors), vec![expected]);
}

#[test]
fn test_zero_bound_is_enforced() {
    let (_, errors) = walk(json!({ "type": "array", "maxItems": 0 }), Some(json!([1])));
    assert_eq!(keywords(&errors), vec![Keyword::MaxItems]);
}

#[test]
fn test_all_violations_are_collected() {
    let schema = json!({
        "type": "object",
        "properties": {
            "a": { "type": "string" },
            "b": { "type": "number", "maximum": 1 }
        },
        "additionalProperties": false
    });
    let (_, errors) = walk(schema, Some(json!({ "a": 1, "b": 5, "c": true })));
    assert_eq!(
        keywords(&errors),
        vec![Keyword::Type, Keyword::Maximum, Keyword::AdditionalProperties]
    );
    assert_eq!(errors[2].message, "No additional properties, got additional properties \"c\"");
}

// =============================================================================
// Composite operators
// =============================================================================

#[test]
fn test_one_of_matching_none() {
    let schema = json!({
        "oneOf": [
            { "type": "string", "maxLength": 3 },
            { "type": "number", "maximum": 10 }
        ]
    });
    let (result, errors) = walk(schema, Some(json!("abcd")));
    assert_eq!(result, Some(json!("abcd")));
    assert_eq!(keywords(&errors), vec![Keyword::OneOf]);
    assert_eq!(errors[0].schema_path, "#/oneOf");
    assert!(errors[0].message.ends_with("but matched none."));
}

#[rstest]
#[case(json!("ab"), 0)]
#[case(json!(5), 0)]
#[case(json!(50), 1)]
fn test_one_of_exactly_one(#[case] value: Value, #[case] expected: usize) {
    let schema = json!({
        "oneOf": [
            { "type": "string", "maxLength": 3 },
            { "type": "number", "maximum": 10 }
        ]
    });
    let (_, errors) = walk(schema, Some(value));
    assert_eq!(errors.len(), expected);
}

#[test]
fn test_one_of_matching_several() {
    let schema = json!({ "oneOf": [{ "type": "number" }, { "minimum": 0 }] });
    let (_, errors) = walk(schema, Some(json!(5)));
    assert_eq!(keywords(&errors), vec![Keyword::OneOf]);
    assert!(errors[0].message.ends_with("but matched more than one."));
}

#[rstest]
#[case(json!("text"), 0)]
#[case(json!(3), 0)]
#[case(json!(true), 1)]
fn test_any_of(#[case] value: Value, #[case] expected: usize) {
    let schema = json!({ "anyOf": [{ "type": "string" }, { "type": "number" }] });
    let (_, errors) = walk(schema, Some(value));
    assert_eq!(errors.len(), expected);
    if expected == 1 {
        assert_eq!(errors[0].keyword, Keyword::AnyOf);
        assert_eq!(errors[0].schema_path, "#/anyOf");
    }
}

#[test]
fn test_not_fails_on_any_forbidden_match() {
    let schema = json!({ "not": [{ "type": "boolean" }, { "type": "number", "maximum": 0 }] });
    let (_, ok) = walk(schema.clone(), Some(json!(5)));
    assert!(ok.is_empty());

    let (_, errors) = walk(schema, Some(json!(-1)));
    assert_eq!(keywords(&errors), vec![Keyword::Not]);
}

#[test]
fn test_all_of() {
    let schema = json!({ "allOf": [{ "type": "string" }, { "minLength": 3 }] });
    let (_, ok) = walk(schema.clone(), Some(json!("abc")));
    assert!(ok.is_empty());

    let (_, errors) = walk(schema, Some(json!("ab")));
    assert_eq!(keywords(&errors), vec![Keyword::AllOf]);
    assert_eq!(errors[0].message, "The value must match all of the specified schemas.");
}

#[rstest]
#[case(json!({ "not": [{ "type": "array" }] }), Keyword::Not)]
#[case(json!({ "anyOf": [{ "type": "string" }, { "type": "number" }] }), Keyword::AnyOf)]
#[case(json!({ "oneOf": [{ "type": "string" }] }), Keyword::OneOf)]
#[case(json!({ "type": "any", "allOf": [{ "type": "object" }] }), Keyword::AllOf)]
fn test_untyped_composites_apply_to_arrays(#[case] schema: Value, #[case] expected: Keyword) {
    let (result, errors) = walk(schema, Some(json!([1])));
    assert_eq!(result, Some(json!([1])));
    assert_eq!(keywords(&errors), vec![expected]);
}

#[test]
fn test_typed_array_skips_composites() {
    let schema = json!({ "type": "array", "not": [{ "type": "array" }] });
    let (_, errors) = walk(schema, Some(json!([1])));
    assert!(errors.is_empty());
}

#[test]
fn test_branch_defaults_do_not_leak() {
    let schema = json!({
        "type": "object",
        "anyOf": [{ "properties": { "extra": { "default": 1 } } }]
    });
    let (result, errors) = walk(schema, Some(json!({})));
    assert_eq!(result, Some(json!({})));
    assert!(errors.is_empty());
}

// =============================================================================
// Strict mode
// =============================================================================

#[test]
fn test_strict_collection_aborts_on_first_error() {
    let schema = Schema::new(
        SchemaNode::from_value(json!({
            "type": "object",
            "properties": { "a": { "type": "string" }, "b": { "type": "string" } }
        }))
        .unwrap(),
    );
    let chain = InterceptorChain::new();
    let mut errors = ErrorCollection::with_strict(true);
    let err = SchemaWalker::new(&chain)
        .walk(&schema, Some(json!({ "a": 1, "b": 2 })), &mut errors)
        .unwrap_err();

    match err {
        ConfigError::StrictViolation { count, errors } => {
            assert_eq!(count, 1);
            assert_eq!(errors[0].path, "$ROOT.a");
        }
        other => panic!("Expected StrictViolation, got {:?}", other),
    }
}
