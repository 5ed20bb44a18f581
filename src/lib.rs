//! schemaconf
//!
//! Configuration loading with schema validation, defaults and coercion.
//!
//! ## Features
//!
//! - **Grouped Sources**: Register config paths under groups (`production`,
//!   `default`, ...) and load the first candidate that exists and parses
//! - **Schema Walking**: JSON-Schema-like validation that fills in defaults
//!   and coerces mistyped values through transformers
//! - **Error Collection**: Errors grouped by property path, with a colored
//!   report and an optional strict mode that aborts on the first one
//! - **Plugins**: Loaders, parsers and value interceptors, including
//!   `$VAR` environment substitution
//! - **Checksums**: SHA256 of every loaded source for provenance
//!
//! ## Architecture
//!
//! ```text
//! SchemaConf
//! ├── sources      add_config("config/app", ["production", "default"])
//! ├── loaders      path  -> raw text        (FsLoader)
//! ├── parsers      text  -> serde_json::Value (json, yaml, json5)
//! ├── interceptors value -> value           (EnvReplace)
//! └── schema       SchemaWalker + ErrorCollection + transformers
//! ```

pub mod args;
pub mod checksum;
pub mod collection;
pub mod conf;
pub mod config;
pub mod dot_path;
pub mod error;
pub mod hook;
pub mod loader;
pub mod parser;
pub mod plugin;
pub mod schema;
pub mod source;
pub mod transform;

pub use args::CommandArgs;
pub use checksum::Checksum;
pub use collection::{ErrorCollection, Keyword, ReportFormatter, ValidationError};
pub use conf::{LoadOptions, LoadResult, SchemaConf, SchemaOptions, SetOptions, SetResult};
pub use config::{ConfOptions, OptionsPatch};
pub use error::{ConfigError, Result};
pub use hook::{FnInterceptor, InterceptorChain, NodeMeta, ValueInterceptor};
pub use loader::{FsLoader, LoadedContent, Loader};
pub use parser::{Json5Parser, JsonParser, Parser, YamlParser};
pub use plugin::{DefaultFormats, EnvReplace, Plugin};
pub use schema::{PropertyType, Schema, SchemaNode, SchemaWalker};
pub use source::{ConfigSource, SourceMeta, SourceOptions, SourceType};
pub use transform::{FnTransformer, TransformSpec, Transformer, TransformerGroup};
