//! Dataset selection service
//!
//! Datasets are `*.json` files in the data directory, addressed by file name.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::infrastructure::traits::FileSystem;

pub const DATASET_EXTENSION: &str = "json";

/// Service for listing and loading named datasets.
pub struct DatasetService {
    fs: Arc<dyn FileSystem>,
    data_dir: PathBuf,
}

impl DatasetService {
    pub fn new(fs: Arc<dyn FileSystem>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Dataset names in the data directory, sorted.
    pub fn list(&self) -> ApplicationResult<Vec<String>> {
        if !self.fs.is_dir(&self.data_dir) {
            return Err(ApplicationError::DatasetNotFound(self.data_dir.clone()));
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&self.data_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| ApplicationError::OperationFailed {
                context: format!("scan {}", self.data_dir.display()),
                source: Box::new(e),
            })?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().is_some_and(|ext| ext == DATASET_EXTENSION)
            {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        debug!("list: {} datasets in {}", names.len(), self.data_dir.display());
        Ok(names)
    }

    /// Resolve a dataset name to a file.
    ///
    /// An existing file path is used as is; otherwise the name is looked up in
    /// the data directory, with `.json` appended when it has no extension.
    pub fn resolve(&self, name: &str) -> PathBuf {
        let direct = Path::new(name);
        if self.fs.is_file(direct) {
            return direct.to_path_buf();
        }
        let mut path = self.data_dir.join(name);
        if path.extension().is_none() {
            path.set_extension(DATASET_EXTENSION);
        }
        path
    }

    /// Load and parse a dataset.
    pub fn load(&self, name: &str) -> ApplicationResult<Value> {
        let path = self.resolve(name);
        if !self.fs.is_file(&path) {
            return Err(ApplicationError::DatasetNotFound(path));
        }
        debug!("load: {}", path.display());

        let content = self
            .fs
            .read_to_string(&path)
            .with_path_context("read dataset", &path)?;
        parse_dataset(&content).map_err(|e| ApplicationError::InvalidDataset {
            path,
            message: e.to_string(),
        })
    }
}

/// Parse JSON without a nesting limit; deep input grows the stack on the heap.
fn parse_dataset(content: &str) -> serde_json::Result<Value> {
    let mut deserializer = serde_json::Deserializer::from_str(content);
    deserializer.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
    deserializer.end()?;
    Ok(value)
}
