//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::{DatasetService, Palette, TreeRenderer, TreeService};
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};

/// Container holding settings and I/O dependencies, handing out services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            settings: Arc::new(settings),
            fs,
        }
    }

    pub fn dataset_service(&self) -> DatasetService {
        DatasetService::new(Arc::clone(&self.fs), self.settings.data_dir.clone())
    }

    pub fn tree_service(&self) -> TreeService {
        TreeService::new(self.settings.min_query_len)
    }

    pub fn renderer(&self, debug: bool) -> ApplicationResult<TreeRenderer> {
        let palette = Palette::from_appearance(&self.settings.appearance)?;
        Ok(TreeRenderer::new(palette, debug))
    }
}
