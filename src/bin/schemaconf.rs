//! schemaconf CLI
//!
//! Loads configuration sources against a schema and reports the result.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use schemaconf::{
    ConfOptions, DefaultFormats, EnvReplace, ErrorCollection, LoadOptions, OptionsPatch, Schema, SchemaConf,
    SourceOptions,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemaconf")]
#[command(about = "Load and validate grouped configuration files")]
struct Cli {
    /// Config source, optionally with groups: `config/app@production,default`
    #[arg(short, long = "source", required = true)]
    sources: Vec<String>,

    /// Schema file (JSON, YAML or JSON5)
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Preferred group, most preferred first (repeatable)
    #[arg(short, long = "group")]
    groups: Vec<String>,

    /// Abort on the first schema error
    #[arg(long)]
    strict: bool,

    /// Substitute `$VAR` references from the environment
    #[arg(long)]
    env: bool,

    /// Options file (schemaconf.toml)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the configuration and report schema errors
    Check {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the value at a dotted path
    Get {
        /// e.g. `server.port`; empty for the whole configuration
        #[arg(default_value = "")]
        key: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn source_arg(raw: &str) -> (&str, SourceOptions) {
    match raw.rsplit_once('@') {
        Some((path, groups)) => (path, SourceOptions::new().groups(groups.split(',').filter(|g| !g.is_empty()))),
        None => (raw, SourceOptions::new()),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let options = ConfOptions::load_from(cli.config.as_deref()).context("Failed to load schemaconf options")?;

    let mut conf = SchemaConf::new(options);
    if cli.strict {
        conf.set_options(OptionsPatch::new().strict(true), false);
    }
    conf.add_plugin(Arc::new(DefaultFormats));
    if cli.env {
        conf.add_plugin(Arc::new(EnvReplace::from_process()));
    }

    for raw in &cli.sources {
        let (path, source_options) = source_arg(raw);
        conf.add_config(path, source_options);
    }

    if let Some(path) = &cli.schema {
        let schema = Schema::from_file(path).with_context(|| format!("Failed to read schema {}", path.display()))?;
        conf.set_schema(schema);
    }

    let result = conf.load(LoadOptions::groups(cli.groups.clone()))?.clone();

    match cli.command {
        Commands::Check { json } => {
            let source = conf.sources().first();

            if json {
                let report = serde_json::json!({
                    "source": source.map(|s| &s.meta),
                    "checksum": source.and_then(|s| s.checksum.as_ref()).map(|c| c.as_str()),
                    "errors": &result.errors,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                match &result.matched {
                    Some(meta) => println!("Loaded {}", meta.path.display()),
                    None => println!("No config file matched"),
                }
                if let Some(checksum) = source.and_then(|s| s.checksum.as_ref()) {
                    println!("  checksum {}", checksum.short());
                }
                if result.errors.is_empty() {
                    println!("  no schema errors");
                } else {
                    let mut collection = ErrorCollection::new();
                    collection.extend(result.errors.clone())?;
                    print!("{}", collection.render());
                }
            }

            if !result.errors.is_empty() {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Get { key } => match conf.get(&key)? {
            Some(value) => {
                println!("{}", serde_json::to_string_pretty(value)?);
                Ok(())
            }
            None => bail!("No configuration value at \"{}\"", key),
        },
    }
}
