//! Page-tree walking with an on-disk cache in front of a [`Remote`].

use std::collections::{HashSet, VecDeque};

use shelf_cache::{Cache, CacheBucket, CacheBucketExt};
use shelf_config::CachePolicy;

use crate::{FetchError, FetchReport, Remote, RemotePage};

/// Fetches a book's page tree.
pub trait PageSource: Send + Sync {
    /// Walk the tree below `root_id`, breadth first.
    ///
    /// `on_page` runs inline for every page as it arrives, before its
    /// children are fetched. A page whose fetch or callback fails is left out
    /// of the tree together with its subtree, unless the source is fail-fast,
    /// in which case the walk stops with that error. A failing root is always
    /// an error.
    fn fetch_page_tree(
        &self,
        root_id: &str,
        on_page: &mut dyn FnMut(&RemotePage) -> Result<(), FetchError>,
    ) -> Result<FetchReport, FetchError>;

    /// Fetch an image referenced by a page.
    fn fetch_image(&self, name: &str) -> Result<Vec<u8>, FetchError>;
}

/// [`PageSource`] caching pages and images of one book.
pub struct CachingSource<R: Remote> {
    remote: R,
    pages: Box<dyn CacheBucket>,
    images: Box<dyn CacheBucket>,
    policy: CachePolicy,
    fail_fast: bool,
}

/// Where a page came from.
enum Origin {
    Cache,
    Remote,
}

impl<R: Remote> CachingSource<R> {
    /// Create a source whose cache buckets live under `{book}/`.
    pub fn new(remote: R, cache: &dyn Cache, book: &str, policy: CachePolicy) -> Self {
        Self {
            remote,
            pages: cache.bucket(&format!("{book}/pages")),
            images: cache.bucket(&format!("{book}/img")),
            policy,
            fail_fast: false,
        }
    }

    #[must_use]
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    fn fetch_page(&self, id: &str) -> Result<(RemotePage, Origin), FetchError> {
        match self.policy {
            CachePolicy::CacheOnly => self
                .pages
                .get_json::<RemotePage>(id, "")
                .map(|page| (page, Origin::Cache))
                .ok_or_else(|| FetchError::not_cached(id)),
            CachePolicy::DownloadIfNewer => {
                let version = self.remote.version(id)?;
                if !version.is_empty()
                    && let Some(page) = self.pages.get_json::<RemotePage>(id, &version)
                {
                    return Ok((page, Origin::Cache));
                }
                let page = self.remote.download(id)?;
                self.pages.set_json(id, &version, &page);
                Ok((page, Origin::Remote))
            }
            CachePolicy::AlwaysDownload => {
                let version = self.remote.version(id).unwrap_or_default();
                let page = self.remote.download(id)?;
                self.pages.set_json(id, &version, &page);
                Ok((page, Origin::Remote))
            }
        }
    }
}

impl<R: Remote> PageSource for CachingSource<R> {
    fn fetch_page_tree(
        &self,
        root_id: &str,
        on_page: &mut dyn FnMut(&RemotePage) -> Result<(), FetchError>,
    ) -> Result<FetchReport, FetchError> {
        let mut report = FetchReport::default();
        let mut seen = HashSet::from([root_id.to_owned()]);
        let mut queue = VecDeque::from([root_id.to_owned()]);

        while let Some(id) = queue.pop_front() {
            let fetched = self
                .fetch_page(&id)
                .and_then(|(page, origin)| on_page(&page).map(|()| (page, origin)));

            let (page, origin) = match fetched {
                Ok(fetched) => fetched,
                Err(e) if self.fail_fast || id == root_id => return Err(e),
                Err(e) => {
                    tracing::warn!(page = %id, remote = self.remote.name(), "omitting page: {e}");
                    report.failures.push(e);
                    continue;
                }
            };

            match origin {
                Origin::Cache => report.from_cache += 1,
                Origin::Remote => report.downloaded += 1,
            }
            for child in &page.children {
                if seen.insert(child.clone()) {
                    queue.push_back(child.clone());
                }
            }
            report.pages.push(page);
        }

        tracing::debug!(
            root = root_id,
            pages = report.pages.len(),
            downloaded = report.downloaded,
            from_cache = report.from_cache,
            failed = report.failures.len(),
            "fetched page tree"
        );
        Ok(report)
    }

    fn fetch_image(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        // Images are immutable once published; any cached copy is current.
        if self.policy != CachePolicy::AlwaysDownload
            && let Some(bytes) = self.images.get(name, "")
        {
            return Ok(bytes);
        }
        if self.policy == CachePolicy::CacheOnly {
            return Err(FetchError::not_cached(name));
        }
        let bytes = self.remote.download_image(name)?;
        self.images.set(name, "", &bytes);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;
    use shelf_cache::{FileCache, NullCache};
    use tempfile::TempDir;

    use super::*;
    use crate::{DirRemote, FetchErrorKind};

    fn write_page(dir: &Path, id: &str, title: &str, children: &[&str]) {
        let page = RemotePage {
            id: id.to_owned(),
            title: title.to_owned(),
            markdown: format!("# {title}"),
            children: children.iter().map(|c| (*c).to_owned()).collect(),
        };
        std::fs::write(
            dir.join(format!("{id}.json")),
            serde_json::to_vec(&page).unwrap(),
        )
        .unwrap();
    }

    fn tree(dir: &Path) {
        write_page(dir, "root", "Book", &["ch1", "ch2"]);
        write_page(dir, "ch1", "Chapter 1", &["art1"]);
        write_page(dir, "ch2", "Chapter 2", &[]);
        write_page(dir, "art1", "Article 1", &["ch1"]);
    }

    fn ids(report: &FetchReport) -> Vec<&str> {
        report.pages.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_walk_is_breadth_first_and_visits_once() {
        let tmp = TempDir::new().unwrap();
        tree(tmp.path());
        let source = CachingSource::new(
            DirRemote::new(tmp.path().to_path_buf()),
            &NullCache,
            "go",
            CachePolicy::DownloadIfNewer,
        );

        let mut seen = Vec::new();
        let report = source
            .fetch_page_tree("root", &mut |p| {
                seen.push(p.id.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(ids(&report), vec!["root", "ch1", "ch2", "art1"]);
        assert_eq!(seen, vec!["root", "ch1", "ch2", "art1"]);
        assert_eq!(report.downloaded, 4);
        assert_eq!(report.from_cache, 0);
    }

    #[test]
    fn test_second_walk_served_from_cache() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        std::fs::create_dir(&content).unwrap();
        tree(&content);
        let cache = FileCache::new(tmp.path().join("cache"), "v1");

        let source = CachingSource::new(
            DirRemote::new(content.clone()),
            &cache,
            "go",
            CachePolicy::DownloadIfNewer,
        );
        source.fetch_page_tree("root", &mut |_| Ok(())).unwrap();
        let report = source.fetch_page_tree("root", &mut |_| Ok(())).unwrap();

        assert_eq!(report.from_cache, 4);
        assert_eq!(report.downloaded, 0);
    }

    #[test]
    fn test_always_download_ignores_cache() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        std::fs::create_dir(&content).unwrap();
        tree(&content);
        let cache = FileCache::new(tmp.path().join("cache"), "v1");

        let remote = || DirRemote::new(content.clone());
        CachingSource::new(remote(), &cache, "go", CachePolicy::DownloadIfNewer)
            .fetch_page_tree("root", &mut |_| Ok(()))
            .unwrap();
        let report = CachingSource::new(remote(), &cache, "go", CachePolicy::AlwaysDownload)
            .fetch_page_tree("root", &mut |_| Ok(()))
            .unwrap();

        assert_eq!(report.downloaded, 4);
    }

    #[test]
    fn test_cache_only_works_without_remote() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        std::fs::create_dir(&content).unwrap();
        tree(&content);
        let cache = FileCache::new(tmp.path().join("cache"), "v1");

        CachingSource::new(
            DirRemote::new(content.clone()),
            &cache,
            "go",
            CachePolicy::DownloadIfNewer,
        )
        .fetch_page_tree("root", &mut |_| Ok(()))
        .unwrap();
        std::fs::remove_dir_all(&content).unwrap();

        let report = CachingSource::new(
            DirRemote::new(content),
            &cache,
            "go",
            CachePolicy::CacheOnly,
        )
        .fetch_page_tree("root", &mut |_| Ok(()))
        .unwrap();
        assert_eq!(report.from_cache, 4);
    }

    #[test]
    fn test_cache_only_uncached_root_fails() {
        let tmp = TempDir::new().unwrap();
        let source = CachingSource::new(
            DirRemote::new(tmp.path().to_path_buf()),
            &NullCache,
            "go",
            CachePolicy::CacheOnly,
        );
        let err = source.fetch_page_tree("root", &mut |_| Ok(())).unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::NotCached);
    }

    #[test]
    fn test_missing_child_is_omitted() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "root", "Book", &["ch1", "gone"]);
        write_page(tmp.path(), "ch1", "Chapter 1", &[]);
        let source = CachingSource::new(
            DirRemote::new(tmp.path().to_path_buf()),
            &NullCache,
            "go",
            CachePolicy::DownloadIfNewer,
        );

        let report = source.fetch_page_tree("root", &mut |_| Ok(())).unwrap();
        assert_eq!(ids(&report), vec!["root", "ch1"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].item.as_deref(), Some("gone"));
    }

    #[test]
    fn test_fail_fast_aborts_walk() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "root", "Book", &["gone", "ch1"]);
        write_page(tmp.path(), "ch1", "Chapter 1", &[]);
        let source = CachingSource::new(
            DirRemote::new(tmp.path().to_path_buf()),
            &NullCache,
            "go",
            CachePolicy::DownloadIfNewer,
        )
        .fail_fast(true);

        let err = source.fetch_page_tree("root", &mut |_| Ok(())).unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::NotFound);
    }

    #[test]
    fn test_callback_error_omits_page() {
        let tmp = TempDir::new().unwrap();
        tree(tmp.path());
        let source = CachingSource::new(
            DirRemote::new(tmp.path().to_path_buf()),
            &NullCache,
            "go",
            CachePolicy::DownloadIfNewer,
        );

        let report = source
            .fetch_page_tree("root", &mut |p| {
                if p.id == "ch1" {
                    Err(FetchError::new(FetchErrorKind::Other).with_item("ch1"))
                } else {
                    Ok(())
                }
            })
            .unwrap();
        // ch1's subtree is never reached.
        assert_eq!(ids(&report), vec!["root", "ch2"]);
    }

    #[test]
    fn test_images_cached() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        std::fs::create_dir_all(content.join("img")).unwrap();
        std::fs::write(content.join("img/a.png"), b"png").unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");

        let source = CachingSource::new(
            DirRemote::new(content.clone()),
            &cache,
            "go",
            CachePolicy::DownloadIfNewer,
        );
        assert_eq!(source.fetch_image("a.png").unwrap(), b"png");
        std::fs::remove_dir_all(&content).unwrap();

        let offline = CachingSource::new(
            DirRemote::new(content),
            &cache,
            "go",
            CachePolicy::CacheOnly,
        );
        assert_eq!(offline.fetch_image("a.png").unwrap(), b"png");
        assert!(offline.fetch_image("b.png").is_err());
    }
}
