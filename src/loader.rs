//! Loaders turn a candidate path into raw text

use std::fmt;

use tracing::debug;

use crate::error::Result;
use crate::source::{SourceMeta, SourceType};

/// Raw text produced by a loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedContent {
    pub content: String,
}

impl LoadedContent {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// A source of raw configuration text.
///
/// Loaders run in registration order; each sees the latest result of the
/// ones before it. Returning `None` keeps that result.
pub trait Loader: Send + Sync {
    fn name(&self) -> &str;

    fn load(&self, previous: Option<&LoadedContent>, meta: &SourceMeta) -> Result<Option<LoadedContent>>;
}

impl fmt::Debug for dyn Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loader({})", self.name())
    }
}

/// Reads existing files from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl Loader for FsLoader {
    fn name(&self) -> &str {
        "fs"
    }

    fn load(&self, previous: Option<&LoadedContent>, meta: &SourceMeta) -> Result<Option<LoadedContent>> {
        if previous.is_some() || meta.source_type != SourceType::Fs {
            return Ok(None);
        }
        if !meta.path.is_file() {
            debug!("No file at {}", meta.path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(&meta.path)?;
        debug!("Loaded {} ({} bytes)", meta.path.display(), content.len());
        Ok(Some(LoadedContent { content }))
    }
}
