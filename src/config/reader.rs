// src/config/reader.rs

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::ConfigDocument;
use crate::errors::{Result, TasksmithError};
use crate::fs::FileSystem;

/// Collaborator that resolves and loads configuration documents.
///
/// `segments` is the active position in the include tree (empty at the root);
/// the implementation decides how that maps onto actual storage. A remote
/// implementation may transparently fetch documents from a config server;
/// the engine only sees parsed documents or `Config` errors.
pub trait ConfigReader: Debug {
    fn read(&self, segments: &[String], filename: &str) -> Result<ConfigDocument>;
}

/// Reads documents from a directory tree on the local filesystem, rooted at
/// `base`.
#[derive(Debug)]
pub struct FileConfigReader<'a> {
    base: PathBuf,
    fs: &'a dyn FileSystem,
}

impl<'a> FileConfigReader<'a> {
    pub fn new(base: impl Into<PathBuf>, fs: &'a dyn FileSystem) -> Self {
        Self { base: base.into(), fs }
    }

    fn resolve(&self, segments: &[String], filename: &str) -> PathBuf {
        let mut path = self.base.clone();
        for segment in segments {
            // Leading slashes in config paths are cosmetic.
            path.push(segment.trim_start_matches('/'));
        }
        path.push(filename);
        path
    }
}

impl ConfigReader for FileConfigReader<'_> {
    fn read(&self, segments: &[String], filename: &str) -> Result<ConfigDocument> {
        let path = self.resolve(segments, filename);
        debug!(?path, "loading config document");

        let contents = self
            .fs
            .read_to_string(&path)
            .map_err(|e| TasksmithError::Config(format!("reading {path:?}: {e}")))?;

        parse_document(&contents, &path)
    }
}

fn parse_document(contents: &str, path: &Path) -> Result<ConfigDocument> {
    serde_yaml::from_str(contents)
        .map_err(|e| TasksmithError::Config(format!("parsing {path:?}: {e}")))
}
