//! The configuration facade
//!
//! [`SchemaConf`] owns the registered sources, loaders, parsers, plugins and
//! schema. `load` scans the sources in group order and keeps the first
//! candidate that parses; the schema walk then validates it, fills defaults
//! and coerces values in place.
//!
//! ```no_run
//! use schemaconf::{SchemaConf, Schema, DefaultFormats, LoadOptions};
//! use std::sync::Arc;
//!
//! # fn main() -> schemaconf::Result<()> {
//! let mut conf = SchemaConf::default();
//! conf.add_plugin(Arc::new(DefaultFormats));
//! conf.add_config("config/app", ["production", "default"]);
//! conf.set_schema(Schema::from_file("config/schema.json")?);
//!
//! let result = conf.load(LoadOptions::groups(["production"]))?;
//! for error in &result.errors {
//!     eprintln!("{error}");
//! }
//! let port = conf.get_as::<u16>("server.port")?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::args::CommandArgs;
use crate::checksum::Checksum;
use crate::collection::{ErrorCollection, ReportFormatter, ValidationError};
use crate::config::{ConfOptions, OptionsPatch};
use crate::dot_path;
use crate::error::{ConfigError, Result};
use crate::hook::{InterceptorChain, InterceptorRef};
use crate::loader::{LoadedContent, Loader};
use crate::parser::Parser;
use crate::plugin::PluginRef;
use crate::schema::{find_schema_node, resolve_schema_path, Location, PropertyType, Schema, SchemaWalker};
use crate::source::{normalize_ext, order_sources, ConfigSource, SourceDescriptor, SourceMeta, SourceOptions};

/// Group selection for `load`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Preferred groups, most preferred first
    pub groups: Vec<String>,
    /// Overrides every source's own group-suffix flag
    pub group_suffix: Option<bool>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
            group_suffix: None,
        }
    }

    pub fn group_suffix(mut self, enabled: bool) -> Self {
        self.group_suffix = Some(enabled);
        self
    }
}

impl From<&str> for LoadOptions {
    fn from(group: &str) -> Self {
        Self::groups([group])
    }
}

impl From<Option<&str>> for LoadOptions {
    fn from(group: Option<&str>) -> Self {
        Self::groups(group)
    }
}

impl From<Vec<String>> for LoadOptions {
    fn from(groups: Vec<String>) -> Self {
        Self::groups(groups)
    }
}

/// Options for `set`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Validate against this schema node (e.g. `#/properties/app`) instead
    /// of the one matched by the value path
    pub schema_path: Option<String>,
}

impl SetOptions {
    pub fn schema_path(path: impl Into<String>) -> Self {
        Self {
            schema_path: Some(path.into()),
        }
    }
}

/// Options attached to a schema
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Abort the load on the first schema error, whatever the facade options say
    pub strict: bool,
}

/// Outcome of a load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    /// Schema errors of the active configuration
    pub errors: Vec<ValidationError>,
    /// The candidate that matched, if any file did
    pub matched: Option<SourceMeta>,
}

/// Outcome of a set
#[derive(Debug, Clone, PartialEq)]
pub struct SetResult {
    /// The value as written, after defaults and coercion; `None` if rejected
    pub value: Option<Value>,
    pub errors: Vec<ValidationError>,
}

impl SetResult {
    pub fn committed(&self) -> bool {
        self.errors.is_empty() && self.value.is_some()
    }
}

/// Configuration facade
pub struct SchemaConf {
    options: ConfOptions,
    loaders: IndexMap<String, Arc<dyn Loader>>,
    parsers: IndexMap<String, Arc<dyn Parser>>,
    plugins: IndexMap<String, PluginRef>,
    interceptors: InterceptorChain,
    sources: Vec<SourceDescriptor>,
    schema: Option<Schema>,
    schema_options: SchemaOptions,
    formatter: Option<ReportFormatter>,
    args: CommandArgs,
    loaded: Option<LoadResult>,
    config_sources: Vec<ConfigSource>,
}

impl fmt::Debug for SchemaConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaConf")
            .field("options", &self.options)
            .field("loaders", &self.loaders.keys().collect::<Vec<_>>())
            .field("parsers", &self.parsers.keys().collect::<Vec<_>>())
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .field("interceptors", &self.interceptors)
            .field("sources", &self.sources)
            .field("has_schema", &self.schema.is_some())
            .field("loaded", &self.loaded.is_some())
            .finish()
    }
}

impl Default for SchemaConf {
    fn default() -> Self {
        Self::new(ConfOptions::default())
    }
}

impl SchemaConf {
    pub fn new(options: ConfOptions) -> Self {
        Self {
            options: options.normalized(),
            loaders: IndexMap::new(),
            parsers: IndexMap::new(),
            plugins: IndexMap::new(),
            interceptors: InterceptorChain::new(),
            sources: Vec::new(),
            schema: None,
            schema_options: SchemaOptions::default(),
            formatter: None,
            args: CommandArgs::default(),
            loaded: None,
            config_sources: Vec::new(),
        }
    }

    fn warn_if_loaded(&self, method: &str) {
        if self.loaded.is_some() {
            warn!("{}() was called after load(), it will not take effect", method);
        }
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Merge `patch` into the current options, or into the defaults when
    /// `replace` is set
    pub fn set_options(&mut self, patch: impl Into<OptionsPatch>, replace: bool) -> &ConfOptions {
        self.warn_if_loaded("set_options");
        let base = if replace {
            ConfOptions::default()
        } else {
            self.options.clone()
        };
        self.options = base.apply(patch.into());
        &self.options
    }

    pub fn options(&self) -> &ConfOptions {
        &self.options
    }

    /// Append extensions to the default extension list
    pub fn add_extension<I, S>(&mut self, ext: I) -> &[String]
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.warn_if_loaded("add_extension");
        self.options.ext.extend(ext.into_iter().map(|e| normalize_ext(e.as_ref())));
        &self.options.ext
    }

    /// Register a loader; a loader with the same name is replaced
    pub fn add_loader(&mut self, loader: Arc<dyn Loader>) {
        self.warn_if_loaded("add_loader");
        self.loaders.insert(loader.name().to_string(), loader);
    }

    /// Register a parser; a parser with the same name is replaced
    pub fn add_parser(&mut self, parser: Arc<dyn Parser>) {
        self.warn_if_loaded("add_parser");
        self.parsers.insert(parser.name().to_string(), parser);
    }

    /// Register a plugin; a plugin with the same name is replaced
    pub fn add_plugin(&mut self, plugin: PluginRef) {
        self.warn_if_loaded("add_plugin");
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn add_interceptor(&mut self, interceptor: InterceptorRef) {
        self.interceptors.add(interceptor);
    }

    pub fn remove_interceptor(&mut self, name: &str) -> bool {
        self.interceptors.remove(name)
    }

    /// Register a source: a path (with or without extension) plus groups or
    /// full [`SourceOptions`]
    pub fn add_config(&mut self, path: impl Into<PathBuf>, options: impl Into<SourceOptions>) -> &mut Self {
        let descriptor = SourceDescriptor::new(path, options.into(), &self.options.ext);
        self.sources.push(descriptor);
        self
    }

    pub fn set_schema(&mut self, schema: Schema) {
        self.set_schema_with(schema, SchemaOptions::default());
    }

    pub fn set_schema_with(&mut self, schema: Schema, options: SchemaOptions) {
        self.warn_if_loaded("set_schema");
        self.schema = Some(schema);
        self.schema_options = options;
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Replace the colored error report
    pub fn set_formatter(&mut self, formatter: ReportFormatter) {
        self.formatter = Some(formatter);
    }

    // =========================================================================
    // Command-line arguments
    // =========================================================================

    pub fn set_args(&mut self, args: CommandArgs) {
        self.args = args;
    }

    pub fn args(&self) -> &CommandArgs {
        &self.args
    }

    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    pub fn has_arg(&self, name: &str) -> bool {
        self.args.has(name)
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load the configuration. Only the first call does any work; later
    /// calls return the cached result whatever their options.
    pub fn load(&mut self, options: impl Into<LoadOptions>) -> Result<&LoadResult> {
        let result = match self.loaded.take() {
            Some(result) => result,
            None => self.load_sources(options.into())?,
        };
        Ok(self.loaded.insert(result))
    }

    /// The cached load result, if loaded
    pub fn load_result(&self) -> Option<&LoadResult> {
        self.loaded.as_ref()
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if self.loaded.is_none() {
            self.load(LoadOptions::default())?;
        }
        Ok(())
    }

    fn setup_plugins(&mut self) {
        let plugins: Vec<PluginRef> = self.plugins.values().cloned().collect();
        for plugin in plugins {
            debug!("Setting up plugin {}", plugin.name());
            plugin.setup(self);
        }
    }

    fn load_sources(&mut self, options: LoadOptions) -> Result<LoadResult> {
        self.setup_plugins();

        let mut sources = self.scan(&options);
        let matched = sources.first().map(|s| s.meta.clone());

        if sources.is_empty() {
            warn!("No config sources matched");
        }

        let mut errors = Vec::new();
        if let Some(schema) = &self.schema {
            let strict = self.options.strict || self.schema_options.strict;
            let mut collection = ErrorCollection::with_strict(strict);
            if let Some(formatter) = &self.formatter {
                collection = collection.with_formatter(Arc::clone(formatter));
            }

            let current = match sources.first_mut() {
                Some(source) => Some(source.config.take()),
                None if accepts_object(schema) => Some(Value::Object(Map::new())),
                None => None,
            };
            let walked = SchemaWalker::new(&self.interceptors).walk(schema, current, &mut collection)?;

            if !collection.is_empty() {
                if self.options.log {
                    collection.log();
                }
                errors = collection.into_error_list();
            }

            let walked = walked.unwrap_or(Value::Null);
            match sources.first_mut() {
                Some(source) => source.config = walked,
                None => sources.push(ConfigSource::new(walked, SourceMeta::defaults(), None)),
            }
        }

        if sources.is_empty() {
            if self.options.no_config_exit || self.options.strict {
                error!("No config sources found");
                return Err(ConfigError::NoSources);
            }
            error!("No config sources found, continuing without configuration");
        }

        self.config_sources = sources;
        Ok(LoadResult { errors, matched })
    }

    /// First candidate that loads and parses, across all sources in group order
    fn scan(&self, options: &LoadOptions) -> Vec<ConfigSource> {
        let mut visited: Vec<&SourceDescriptor> = Vec::new();

        for source in order_sources(&self.sources, &options.groups) {
            if visited.contains(&source) {
                continue;
            }
            visited.push(source);

            for meta in source.candidates(&options.groups, options.group_suffix) {
                debug!("Trying config candidate {}", meta.path.display());

                let Some(content) = self.load_candidate(&meta) else {
                    continue;
                };
                if let Some(config) = self.parse_candidate(&content, &meta) {
                    info!("Loaded configuration from {}", meta.path.display());
                    let checksum = Checksum::of(&content.content);
                    return vec![ConfigSource::new(config, meta, Some(checksum))];
                }
            }
        }

        Vec::new()
    }

    fn load_candidate(&self, meta: &SourceMeta) -> Option<LoadedContent> {
        let mut content: Option<LoadedContent> = None;
        for loader in self.loaders.values() {
            match loader.load(content.as_ref(), meta) {
                Ok(Some(loaded)) => content = Some(loaded),
                Ok(None) => {}
                Err(e) => error!("{} load error for {}: {}", loader.name(), meta.path.display(), e),
            }
        }
        content
    }

    fn parse_candidate(&self, content: &LoadedContent, meta: &SourceMeta) -> Option<Value> {
        for parser in self.parsers.values() {
            match parser.parse(Some(content), None, meta) {
                Ok(Some(config)) => return Some(config),
                Ok(None) => {}
                Err(e) => error!("{} parse error for {}: {}", parser.name(), meta.path.display(), e),
            }
        }
        None
    }

    /// All configuration sources; the first one is active
    pub fn sources(&self) -> &[ConfigSource] {
        &self.config_sources
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Value at a dotted path of the active configuration, loading first if
    /// needed
    pub fn get(&mut self, path: &str) -> Result<Option<&Value>> {
        self.ensure_loaded()?;
        Ok(self
            .config_sources
            .first()
            .and_then(|source| dot_path::lookup(&source.config, path)))
    }

    /// Typed variant of [`get`](Self::get)
    pub fn get_as<T: DeserializeOwned>(&mut self, path: &str) -> Result<Option<T>> {
        match self.get(path)? {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn has(&mut self, path: &str) -> Result<bool> {
        Ok(self.get(path)?.is_some())
    }

    /// Write a value at a dotted path whose parent already exists.
    ///
    /// With a schema, the value is first walked against the node governing
    /// the path (or `options.schema_path`) and only written when that walk
    /// produces no errors. Without a matching node the value is written as is.
    pub fn set(&mut self, path: &str, value: Value, options: SetOptions) -> Result<SetResult> {
        self.ensure_loaded()?;

        let segments = dot_path::split(path);
        let Some((_, parents)) = segments.split_last() else {
            return Err(ConfigError::InvalidPath("cannot set an empty path".to_string()));
        };

        let parent_exists = self
            .config_sources
            .first()
            .and_then(|source| dot_path::lookup_segments(&source.config, parents))
            .is_some_and(|parent| parent.is_object() || parent.is_array());
        if !parent_exists {
            return Err(ConfigError::MissingParent {
                parent: parents.join("."),
                path: path.to_string(),
            });
        }

        let validated = match &self.schema {
            Some(schema) => {
                let target = match &options.schema_path {
                    Some(schema_path) => Some(resolve_schema_path(schema.root(), schema_path)?),
                    None => find_schema_node(schema.root(), &segments),
                };
                match target {
                    Some(found) => {
                        let mut location = self
                            .config_sources
                            .first()
                            .map_or_else(Location::root, |source| value_location(&source.config, &segments));
                        location.schema_path = found.schema_path;

                        let mut collection = ErrorCollection::new();
                        if let Some(formatter) = &self.formatter {
                            collection = collection.with_formatter(Arc::clone(formatter));
                        }
                        let walked = SchemaWalker::new(&self.interceptors).walk_at(
                            found.node,
                            Some(value),
                            &location,
                            &mut collection,
                        )?;
                        if !collection.is_empty() {
                            debug!("Rejected set of {}: {} errors", path, collection.size());
                            return Ok(SetResult {
                                value: None,
                                errors: collection.into_error_list(),
                            });
                        }
                        walked.unwrap_or(Value::Null)
                    }
                    None => value,
                }
            }
            None => value,
        };

        let Some(source) = self.config_sources.first_mut() else {
            return Err(ConfigError::MissingParent {
                parent: parents.join("."),
                path: path.to_string(),
            });
        };
        dot_path::write(&mut source.config, &segments, validated.clone())?;

        Ok(SetResult {
            value: Some(validated),
            errors: Vec::new(),
        })
    }

    /// A fresh, unloaded instance with the same options, parsers and plugins,
    /// with `patch` applied on top of the options
    pub fn create(&self, patch: impl Into<OptionsPatch>) -> SchemaConf {
        let mut instance = SchemaConf::new(self.options.clone());
        instance.set_options(patch, false);
        for parser in self.parsers.values() {
            instance.add_parser(Arc::clone(parser));
        }
        for plugin in self.plugins.values() {
            instance.add_plugin(Arc::clone(plugin));
        }
        instance
    }
}

/// Property path of `segments`, with brackets for indices into arrays of `config`
fn value_location(config: &Value, segments: &[&str]) -> Location {
    let mut at = Location::root();
    let mut current = Some(config);
    for segment in segments {
        let index = current
            .filter(|value| value.is_array())
            .and_then(|_| segment.parse::<usize>().ok());
        at = match index {
            Some(i) => at.index(i),
            None => at.property(segment, "properties"),
        };
        current = current.and_then(|value| dot_path::lookup_segments(value, &[*segment]));
    }
    at
}

fn accepts_object(schema: &Schema) -> bool {
    schema
        .root()
        .kind
        .as_ref()
        .is_some_and(|kind| kind.contains(PropertyType::Object))
}
