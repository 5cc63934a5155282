//! In-memory remote for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{FetchError, FetchErrorKind, Remote, RemotePage};

/// Remote holding pages and images in memory.
///
/// # Example
///
/// ```ignore
/// use shelf_source::MockRemote;
///
/// let remote = MockRemote::new()
///     .with_page("root", "Book", "intro", &["a"])
///     .with_page("a", "Chapter", "# Chapter", &[]);
/// ```
#[derive(Debug, Default)]
pub struct MockRemote {
    pages: HashMap<String, RemotePage>,
    versions: HashMap<String, String>,
    images: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    downloads: AtomicUsize,
}

impl MockRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page at version "1".
    #[must_use]
    pub fn with_page(mut self, id: &str, title: &str, markdown: &str, children: &[&str]) -> Self {
        self.pages.insert(
            id.to_owned(),
            RemotePage {
                id: id.to_owned(),
                title: title.to_owned(),
                markdown: markdown.to_owned(),
                children: children.iter().map(|c| (*c).to_owned()).collect(),
            },
        );
        self.versions.insert(id.to_owned(), "1".to_owned());
        self
    }

    /// Change the version reported for a page.
    #[must_use]
    pub fn with_version(mut self, id: &str, version: &str) -> Self {
        self.versions.insert(id.to_owned(), version.to_owned());
        self
    }

    #[must_use]
    pub fn with_image(mut self, name: &str, bytes: &[u8]) -> Self {
        self.images.insert(name.to_owned(), bytes.to_vec());
        self
    }

    /// Make every request for `id` fail as unavailable.
    #[must_use]
    pub fn with_failure(mut self, id: &str) -> Self {
        self.failing.insert(id.to_owned());
        self
    }

    /// Number of page and image downloads served so far.
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    fn check(&self, item: &str) -> Result<(), FetchError> {
        if self.failing.contains(item) {
            return Err(FetchError::new(FetchErrorKind::Unavailable)
                .with_status(crate::ErrorStatus::Persistent)
                .with_item(item)
                .with_remote("Mock"));
        }
        Ok(())
    }
}

impl Remote for MockRemote {
    fn name(&self) -> &'static str {
        "Mock"
    }

    fn version(&self, id: &str) -> Result<String, FetchError> {
        self.check(id)?;
        self.versions
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::not_found(id).with_remote("Mock"))
    }

    fn download(&self, id: &str) -> Result<RemotePage, FetchError> {
        self.check(id)?;
        let page = self
            .pages
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::not_found(id).with_remote("Mock"))?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(page)
    }

    fn download_image(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        self.check(name)?;
        let bytes = self
            .images
            .get(name)
            .cloned()
            .ok_or_else(|| FetchError::not_found(name).with_remote("Mock"))?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(bytes)
    }
}
