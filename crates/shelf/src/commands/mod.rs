//! Run modes.

pub(crate) mod download;
pub(crate) mod site;

use std::path::Path;
use std::sync::Arc;

use shelf_cache::{Cache, FileCache};
use shelf_config::Config;

/// Page, image and snippet cache, shared by every book.
///
/// The cache is wiped when the binary version changes.
pub(crate) fn open_cache(config: &Config, version: &str) -> Arc<dyn Cache> {
    let dir = &config.cache_resolved.dir;
    tracing::info!(dir = %dir.display(), policy = config.cache_resolved.policy.as_str(), "Opening cache");
    Arc::new(FileCache::new(dir.clone(), version))
}

pub(crate) fn display(path: &Path) -> String {
    path.display().to_string()
}
