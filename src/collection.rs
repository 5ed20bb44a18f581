//! Validation error collection
//!
//! Errors are grouped by the property path they occurred at, in insertion
//! order. A strict collection refuses its first error: it logs the report and
//! returns [`ConfigError::StrictViolation`] so the walk unwinds immediately.

use std::fmt;
use std::sync::Arc;

use colored::Colorize;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::error;

use crate::error::{ConfigError, Result};
use crate::schema::SchemaNode;

/// The schema keyword a validation error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Keyword {
    Required,
    Type,
    Transform,
    AdditionalProperties,
    MinItems,
    MaxItems,
    UniqueItems,
    MaxLength,
    MinLength,
    Minimum,
    Maximum,
    Pattern,
    Enum,
    AnyOf,
    AllOf,
    OneOf,
    Not,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Required => "required",
            Keyword::Type => "type",
            Keyword::Transform => "transform",
            Keyword::AdditionalProperties => "additionalProperties",
            Keyword::MinItems => "minItems",
            Keyword::MaxItems => "maxItems",
            Keyword::UniqueItems => "uniqueItems",
            Keyword::MaxLength => "maxLength",
            Keyword::MinLength => "minLength",
            Keyword::Minimum => "minimum",
            Keyword::Maximum => "maximum",
            Keyword::Pattern => "pattern",
            Keyword::Enum => "enum",
            Keyword::AnyOf => "anyOf",
            Keyword::AllOf => "allOf",
            Keyword::OneOf => "oneOf",
            Keyword::Not => "not",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed constraint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub message: String,
    /// Dotted property path, rooted at `$ROOT`
    pub path: String,
    pub keyword: Keyword,
    /// The schema node that failed
    pub schema: SchemaNode,
    /// Slash-separated schema location, rooted at `#`
    pub schema_path: String,
    /// Underlying causes, e.g. transformer failures behind a type error
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<ValidationError>,
}

impl ValidationError {
    pub fn new(
        keyword: Keyword,
        message: impl Into<String>,
        path: impl Into<String>,
        schema_path: impl Into<String>,
        schema: &SchemaNode,
    ) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
            keyword,
            schema: schema.clone(),
            schema_path: schema_path.into(),
            reasons: Vec::new(),
        }
    }

    pub fn with_reasons(mut self, reasons: Vec<ValidationError>) -> Self {
        self.reasons = reasons;
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: <{}> {}", self.path, self.keyword, self.message)
    }
}

/// Renders a collection into a human-readable report
pub type ReportFormatter = Arc<dyn Fn(&ErrorCollection) -> String + Send + Sync>;

/// Validation errors grouped by property path
#[derive(Clone, Default)]
pub struct ErrorCollection {
    errors: IndexMap<String, Vec<ValidationError>>,
    size: usize,
    strict: bool,
    formatter: Option<ReportFormatter>,
}

impl fmt::Debug for ErrorCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorCollection")
            .field("errors", &self.errors)
            .field("size", &self.size)
            .field("strict", &self.strict)
            .finish()
    }
}

impl ErrorCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(strict: bool) -> Self {
        Self {
            strict,
            ..Self::default()
        }
    }

    /// Replace the default colored report
    pub fn with_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Record one error
    pub fn add(&mut self, error: ValidationError) -> Result<()> {
        self.extend(vec![error])
    }

    /// Record a batch of errors. An empty batch is a no-op.
    pub fn extend(&mut self, errors: Vec<ValidationError>) -> Result<()> {
        if errors.is_empty() {
            return Ok(());
        }

        for e in errors {
            self.size += 1;
            self.errors.entry(e.path.clone()).or_default().push(e);
        }

        if self.strict {
            self.log();
            return Err(ConfigError::StrictViolation {
                count: self.size,
                errors: self.error_list(),
            });
        }
        Ok(())
    }

    /// Total number of errors across all paths
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Errors recorded at one property path
    pub fn get(&self, path: &str) -> Option<&[ValidationError]> {
        self.errors.get(path).map(Vec::as_slice)
    }

    /// Property paths in first-seen order, with their errors
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[ValidationError])> {
        self.errors.iter().map(|(path, errors)| (path.as_str(), errors.as_slice()))
    }

    /// All errors, flattened in group order
    pub fn error_list(&self) -> Vec<ValidationError> {
        self.errors.values().flatten().cloned().collect()
    }

    pub fn into_error_list(self) -> Vec<ValidationError> {
        self.errors.into_values().flatten().collect()
    }

    /// The report text, through the custom formatter when one is set
    pub fn render(&self) -> String {
        match &self.formatter {
            Some(formatter) => formatter(self),
            None => self.default_report(),
        }
    }

    fn default_report(&self) -> String {
        let mut out = format!("[schemaconf] got {} errors:\n", self.size);
        for (path, errors) in &self.errors {
            out.push_str(&format!("Got {} errors on {}:\n", errors.len(), path.cyan()));
            for e in errors {
                out.push_str(&format!(
                    "  <{}> at {} {}\n",
                    e.keyword.as_str().yellow(),
                    e.schema_path.cyan(),
                    e.message
                ));
            }
        }
        out
    }

    /// Emit the report at error level
    pub fn log(&self) {
        if !self.is_empty() {
            error!("{}", self.render());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(path: &str, keyword: Keyword) -> ValidationError {
        ValidationError::new(keyword, "broken", path, "#/properties/x", &SchemaNode::default())
    }

    #[test]
    fn test_groups_by_path_in_order() {
        let mut errors = ErrorCollection::new();
        errors.add(sample("$ROOT.b", Keyword::Type)).unwrap();
        errors.add(sample("$ROOT.a", Keyword::Enum)).unwrap();
        errors.add(sample("$ROOT.b", Keyword::Pattern)).unwrap();

        assert_eq!(errors.size(), 3);
        let paths: Vec<&str> = errors.groups().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["$ROOT.b", "$ROOT.a"]);
        assert_eq!(errors.get("$ROOT.b").map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_empty_batch_is_noop_even_when_strict() {
        let mut errors = ErrorCollection::with_strict(true);
        assert!(errors.extend(Vec::new()).is_ok());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_strict_aborts_on_first_error() {
        let mut errors = ErrorCollection::with_strict(true);
        let err = errors.add(sample("$ROOT.port", Keyword::Type)).unwrap_err();
        match err {
            ConfigError::StrictViolation { count, errors } => {
                assert_eq!(count, 1);
                assert_eq!(errors[0].path, "$ROOT.port");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_formatter() {
        let mut errors = ErrorCollection::new()
            .with_formatter(Arc::new(|c: &ErrorCollection| format!("{} problems", c.size())));
        errors.add(sample("$ROOT", Keyword::Required)).unwrap();
        assert_eq!(errors.render(), "1 problems");
    }

    #[test]
    fn test_default_report_mentions_every_error() {
        colored::control::set_override(false);
        let mut errors = ErrorCollection::new();
        errors.add(sample("$ROOT.name", Keyword::MinLength)).unwrap();

        let report = errors.render();
        assert!(report.starts_with("[schemaconf] got 1 errors:"));
        assert!(report.contains("Got 1 errors on $ROOT.name:"));
        assert!(report.contains("<minLength> at #/properties/x broken"));
    }

    #[test]
    fn test_display() {
        let e = sample("$ROOT.port", Keyword::Type);
        assert_eq!(e.to_string(), "$ROOT.port: <type> broken");
    }
}
