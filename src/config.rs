//! Options of the configuration facade itself
//!
//! Options are layered from:
//! - Default values
//! - Config file (schemaconf.toml, .schemaconf.toml, config/schemaconf.toml)
//! - The platform config directory (e.g. `~/.config/schemaconf/schemaconf.toml`)
//! - An explicit file
//! - Environment variables (SCHEMACONF__*)
//!
//! ## Example config file (schemaconf.toml):
//! ```toml
//! ext = [".json", ".yaml"]
//! no_config_exit = true
//! log = true
//! strict = false
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::source::normalize_ext;

/// Facade options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfOptions {
    /// Extensions tried for sources registered without one, in order
    #[serde(default = "default_ext")]
    pub ext: Vec<String>,

    /// Treat "no configuration source found" as fatal
    #[serde(default)]
    pub no_config_exit: bool,

    /// Log the schema error report when a load produces errors
    #[serde(default = "default_true")]
    pub log: bool,

    /// Abort on the first schema error or missing environment variable
    #[serde(default)]
    pub strict: bool,
}

fn default_ext() -> Vec<String> {
    [".json", ".yaml", ".yml", ".json5"].iter().map(|e| e.to_string()).collect()
}

fn default_true() -> bool {
    true
}

impl Default for ConfOptions {
    fn default() -> Self {
        Self {
            ext: default_ext(),
            no_config_exit: false,
            log: true,
            strict: false,
        }
    }
}

/// A partial update of [`ConfOptions`]; `None` fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsPatch {
    pub ext: Option<Vec<String>>,
    pub no_config_exit: Option<bool>,
    pub log: Option<bool>,
    pub strict: Option<bool>,
}

impl OptionsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ext<I, S>(mut self, ext: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ext = Some(ext.into_iter().map(Into::into).collect());
        self
    }

    pub fn no_config_exit(mut self, enabled: bool) -> Self {
        self.no_config_exit = Some(enabled);
        self
    }

    pub fn log(mut self, enabled: bool) -> Self {
        self.log = Some(enabled);
        self
    }

    pub fn strict(mut self, enabled: bool) -> Self {
        self.strict = Some(enabled);
        self
    }
}

impl From<ConfOptions> for OptionsPatch {
    fn from(options: ConfOptions) -> Self {
        Self {
            ext: Some(options.ext),
            no_config_exit: Some(options.no_config_exit),
            log: Some(options.log),
            strict: Some(options.strict),
        }
    }
}

impl ConfOptions {
    /// Overlay the fields set in `patch`
    pub fn apply(mut self, patch: OptionsPatch) -> Self {
        if let Some(ext) = patch.ext {
            self.ext = ext;
        }
        if let Some(no_config_exit) = patch.no_config_exit {
            self.no_config_exit = no_config_exit;
        }
        if let Some(log) = patch.log {
            self.log = log;
        }
        if let Some(strict) = patch.strict {
            self.strict = strict;
        }
        self.normalized()
    }

    /// Load options from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load options, adding a required explicit file
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        for location in ["schemaconf.toml", ".schemaconf.toml", "config/schemaconf.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "schemaconf", "schemaconf") {
            let xdg_config = dirs.config_dir().join("schemaconf.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("SCHEMACONF")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("ext")
                .try_parsing(true),
        );

        let options: Self = builder.build()?.try_deserialize()?;
        Ok(options.normalized())
    }

    /// Extensions with a leading dot
    pub fn normalized(mut self) -> Self {
        self.ext = self.ext.iter().map(|e| normalize_ext(e)).collect();
        self
    }

    /// Save options to a TOML file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
