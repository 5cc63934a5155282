use serde::{Deserialize, Serialize};

/// One page as delivered by a remote.
///
/// Remotes serve pages as `<id>.json`:
///
/// ```json
/// {"id": "a1", "title": "Getting started", "markdown": "# Hi", "children": ["b2"]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePage {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub markdown: String,
    /// Child page ids, in display order.
    #[serde(default)]
    pub children: Vec<String>,
}

/// Outcome of a page-tree walk.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Pages in breadth-first order, root first.
    pub pages: Vec<RemotePage>,
    /// Pages fetched from the remote.
    pub downloaded: usize,
    /// Pages served from the cache.
    pub from_cache: usize,
    /// Pages that could not be fetched and were left out of the tree.
    pub failures: Vec<crate::FetchError>,
}
