//! Configuration source descriptors
//!
//! A source descriptor names a path stem, the extensions to try and the
//! groups it belongs to. At load time descriptors are ordered by the group
//! selector and expanded into concrete candidate paths.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::checksum::Checksum;

/// Where a source's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Read from the file system
    Fs,
    /// Produced by schema defaults when no file matched
    Default,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Fs => "fs",
            SourceType::Default => "default",
        }
    }
}

/// Per-source settings accepted by `add_config`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceOptions {
    /// Overrides the facade's extension list
    pub ext: Option<Vec<String>>,
    pub groups: Vec<String>,
    /// Try `stem.<group><ext>` before `stem<ext>`; defaults to true
    pub group_suffix: Option<bool>,
}

impl SourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn ext<I, S>(mut self, ext: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ext = Some(ext.into_iter().map(Into::into).collect());
        self
    }

    pub fn group_suffix(mut self, enabled: bool) -> Self {
        self.group_suffix = Some(enabled);
        self
    }
}

impl From<&str> for SourceOptions {
    fn from(group: &str) -> Self {
        Self::new().group(group)
    }
}

impl From<Vec<&str>> for SourceOptions {
    fn from(groups: Vec<&str>) -> Self {
        Self::new().groups(groups)
    }
}

impl<const N: usize> From<[&str; N]> for SourceOptions {
    fn from(groups: [&str; N]) -> Self {
        Self::new().groups(groups)
    }
}

/// A registered source, with defaults resolved
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    pub path: PathBuf,
    pub ext: Vec<String>,
    pub groups: Vec<String>,
    pub group_suffix: bool,
}

/// Leading-dot form of an extension
pub fn normalize_ext(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

fn explicit_ext(path: &Path) -> Option<String> {
    path.extension().map(|e| format!(".{}", e.to_string_lossy()))
}

impl SourceDescriptor {
    pub fn new(path: impl Into<PathBuf>, options: SourceOptions, default_ext: &[String]) -> Self {
        let ext = options.ext.unwrap_or_else(|| default_ext.to_vec());
        Self {
            path: path.into(),
            ext: ext.iter().map(|e| normalize_ext(e)).collect(),
            groups: options.groups,
            group_suffix: options.group_suffix.unwrap_or(true),
        }
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Concrete paths to try, in order.
    ///
    /// A path with an extension is tried as is. Otherwise, with suffixing on,
    /// every group yields `stem.<group><ext>` (selector groups first) ahead
    /// of the bare `stem<ext>`; extensions vary fastest.
    pub fn candidates(&self, selector: &[String], group_suffix: Option<bool>) -> Vec<SourceMeta> {
        if let Some(ext) = explicit_ext(&self.path) {
            return vec![SourceMeta::fs(self.path.clone(), ext, self.groups.first().cloned())];
        }

        let mut stems: Vec<(String, Option<String>)> = Vec::new();
        if group_suffix.unwrap_or(self.group_suffix) {
            let selected = selector.iter().filter(|g| self.in_group(g));
            let remaining = self.groups.iter().filter(|g| !selector.contains(*g));
            for group in selected.chain(remaining) {
                stems.push((format!("{}.{group}", self.path.display()), Some(group.clone())));
            }
        }
        stems.push((self.path.display().to_string(), None));

        stems
            .into_iter()
            .flat_map(|(stem, group)| {
                self.ext.iter().map(move |ext| {
                    let group = group.clone().or_else(|| self.groups.first().cloned());
                    SourceMeta::fs(PathBuf::from(format!("{stem}{ext}")), ext.clone(), group)
                })
            })
            .collect()
    }
}

/// Order sources for a group selector: sources matching each selector group
/// in selector order, then ungrouped sources. Grouped sources matching no
/// selected group are dropped. An empty selector keeps registration order.
pub fn order_sources<'a>(sources: &'a [SourceDescriptor], selector: &[String]) -> Vec<&'a SourceDescriptor> {
    if selector.is_empty() {
        return sources.iter().collect();
    }

    let mut buckets: Vec<Vec<&SourceDescriptor>> = vec![Vec::new(); selector.len()];
    let mut ungrouped = Vec::new();

    for source in sources {
        if source.groups.is_empty() {
            ungrouped.push(source);
        } else if let Some(i) = selector.iter().position(|g| source.in_group(g)) {
            buckets[i].push(source);
        }
    }

    buckets.into_iter().flatten().chain(ungrouped).collect()
}

/// Metadata handed to loaders and parsers for one candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMeta {
    pub path: PathBuf,
    pub ext: String,
    pub group: Option<String>,
    pub source_type: SourceType,
}

impl SourceMeta {
    pub fn fs(path: PathBuf, ext: String, group: Option<String>) -> Self {
        Self {
            path,
            ext,
            group,
            source_type: SourceType::Fs,
        }
    }

    /// Metadata of the schema-default source
    pub fn defaults() -> Self {
        Self {
            path: PathBuf::new(),
            ext: String::new(),
            group: None,
            source_type: SourceType::Default,
        }
    }
}

/// A loaded and parsed source
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSource {
    pub config: Value,
    pub meta: SourceMeta,
    /// Checksum of the loaded text; absent for the default source
    pub checksum: Option<Checksum>,
    pub loaded_at: DateTime<Utc>,
}

impl ConfigSource {
    pub fn new(config: Value, meta: SourceMeta, checksum: Option<Checksum>) -> Self {
        Self {
            config,
            meta,
            checksum,
            loaded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext() -> Vec<String> {
        vec![".json".to_string(), ".yaml".to_string()]
    }

    fn selector(groups: &[&str]) -> Vec<String> {
        groups.iter().map(|g| g.to_string()).collect()
    }

    fn paths(metas: &[SourceMeta]) -> Vec<String> {
        metas.iter().map(|m| m.path.display().to_string()).collect()
    }

    #[test]
    fn test_explicit_extension_wins() {
        let source = SourceDescriptor::new("conf/app.yml", SourceOptions::from("prod"), &ext());
        let candidates = source.candidates(&[], None);
        assert_eq!(paths(&candidates), vec!["conf/app.yml"]);
        assert_eq!(candidates[0].ext, ".yml");
    }

    #[test]
    fn test_extensions_without_groups() {
        let source = SourceDescriptor::new("conf/app", SourceOptions::new(), &ext());
        assert_eq!(paths(&source.candidates(&[], None)), vec!["conf/app.json", "conf/app.yaml"]);
    }

    #[test]
    fn test_group_suffix_candidates() {
        let source = SourceDescriptor::new("conf/app", SourceOptions::from(["prod", "default"]).ext(["json"]), &ext());

        assert_eq!(
            paths(&source.candidates(&[], None)),
            vec!["conf/app.prod.json", "conf/app.default.json", "conf/app.json"]
        );
        assert_eq!(
            paths(&source.candidates(&selector(&["default"]), None)),
            vec!["conf/app.default.json", "conf/app.prod.json", "conf/app.json"]
        );
        assert_eq!(paths(&source.candidates(&[], Some(false))), vec!["conf/app.json"]);
    }

    #[test]
    fn test_order_by_selector() {
        let sources = vec![
            SourceDescriptor::new("a", SourceOptions::from(["prod", "default"]), &ext()),
            SourceDescriptor::new("b", SourceOptions::from("dev"), &ext()),
            SourceDescriptor::new("c", SourceOptions::new(), &ext()),
            SourceDescriptor::new("d", SourceOptions::from("test"), &ext()),
        ];

        let ordered: Vec<_> = order_sources(&sources, &selector(&["dev", "prod"]))
            .iter()
            .map(|s| s.path.display().to_string())
            .collect();
        assert_eq!(ordered, vec!["b", "a", "c"]);

        assert_eq!(order_sources(&sources, &[]).len(), 4);
    }

    #[test]
    fn test_normalize_ext() {
        assert_eq!(normalize_ext("json5"), ".json5");
        assert_eq!(normalize_ext(".yml"), ".yml");
    }
}
