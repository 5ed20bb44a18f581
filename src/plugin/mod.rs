//! Plugins
//!
//! A plugin is a named bundle of loaders, parsers and interceptors. Plugins
//! are registered by name and set up once, at the start of the first load.

mod env;

pub use env::{EnvProvider, EnvReplace, ProcessEnv};

use std::sync::Arc;

use crate::conf::SchemaConf;
use crate::loader::FsLoader;
use crate::parser::{Json5Parser, JsonParser, YamlParser};

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn setup(&self, conf: &mut SchemaConf);
}

pub type PluginRef = Arc<dyn Plugin>;

/// Registers the file-system loader and the JSON, YAML and JSON5 parsers
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormats;

impl Plugin for DefaultFormats {
    fn name(&self) -> &str {
        "default-formats"
    }

    fn setup(&self, conf: &mut SchemaConf) {
        conf.add_loader(Arc::new(FsLoader));
        conf.add_parser(Arc::new(JsonParser));
        conf.add_parser(Arc::new(YamlParser));
        conf.add_parser(Arc::new(Json5Parser));
    }
}
