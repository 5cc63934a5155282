//! Directory subtree served under a URI prefix.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::ContentHandler;
use crate::Producer;

/// Include predicate over paths relative to the handler root.
pub type PathFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Mirrors a directory on disk at `{prefix}{relative path}`.
///
/// The tree is walked on every [`uris`](ContentHandler::uris) call, so files
/// written after construction show up. Hidden entries are skipped.
pub struct DirHandler {
    root: PathBuf,
    prefix: String,
    filter: Option<PathFilter>,
}

impl DirHandler {
    /// Serve `root` under `prefix`, e.g. `"/covers/"`.
    pub fn new(root: PathBuf, prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        let prefix = if trimmed.is_empty() {
            "/".to_owned()
        } else {
            format!("/{trimmed}/")
        };
        Self {
            root,
            prefix,
            filter: None,
        }
    }

    /// Only serve files for which `filter(relative_path)` is true.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    fn accepts(&self, rel: &Path) -> bool {
        self.filter.as_ref().is_none_or(|f| f(rel))
    }

    fn walk(&self, dir: &Path, rel: &Path, out: &mut Vec<String>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                if dir != self.root || e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(dir = %dir.display(), "failed to list directory: {e}");
                }
                return;
            }
        };

        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            let child_rel = rel.join(&name);
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            if is_dir {
                self.walk(&entry.path(), &child_rel, out);
            } else if self.accepts(&child_rel) {
                let uri_path: Vec<String> = child_rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(format!("{}{}", self.prefix, uri_path.join("/")));
            }
        }
    }
}

impl ContentHandler for DirHandler {
    fn resolve(&self, uri: &str) -> Option<Producer> {
        let rest = uri.strip_prefix(&self.prefix)?;
        let rel = Path::new(rest);
        let plain = rel.components().all(|c| matches!(c, Component::Normal(_)));
        if rest.is_empty() || !plain || !self.accepts(rel) {
            return None;
        }
        let path = self.root.join(rel);
        if !path.is_file() {
            return None;
        }
        Some(Producer::from_file(path))
    }

    fn uris(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.walk(&self.root, Path::new(""), &mut out);
        out.sort();
        out
    }
}
