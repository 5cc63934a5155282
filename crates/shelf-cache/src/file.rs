//! Directory-backed cache.
//!
//! Each entry is one file holding a small header and the payload:
//!
//! ```text
//! [etag_len: u32 LE][etag bytes][payload bytes]
//! ```
//!
//! Lookups read the header first and stop on an etag mismatch, so a stale page
//! costs one small read.
//!
//! The cache root carries a `VERSION` file. A missing or different version
//! wipes the whole tree on construction; page JSON written by an older
//! binary is never parsed by a newer one.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use crate::{Cache, CacheBucket};

const VERSION_FILE: &str = "VERSION";

/// [`Cache`] rooted at a directory.
///
/// ```text
/// {root}/
/// +-- VERSION
/// +-- go/
/// |   +-- pages/       # bucket "go/pages", one file per page id
/// |   +-- snippets/    # bucket "go/snippets"
/// +-- python/
///     +-- ...
/// ```
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Open the cache at `root`, wiping it if it was written by another version.
    ///
    /// Failures while validating are logged; the cache then behaves as empty.
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        if !holds_version(&root, version) {
            reset(&root, version);
        }
        Self { root }
    }
}

impl Cache for FileCache {
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket> {
        Box::new(FileCacheBucket {
            dir: self.root.join(name),
        })
    }
}

struct FileCacheBucket {
    dir: PathBuf,
}

impl FileCacheBucket {
    /// Map a key to its entry file, refusing keys that would leave the bucket.
    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        let rel = Path::new(key);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            tracing::debug!(key, "rejected cache key");
            return None;
        }
        Some(self.dir.join(rel))
    }
}

impl CacheBucket for FileCacheBucket {
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>> {
        let mut file = File::open(self.entry_path(key)?).ok()?;
        let stored = read_etag(&mut file).ok()?;
        if !etag.is_empty() && stored != etag.as_bytes() {
            return None;
        }
        let mut data = Vec::new();
        file.read_to_end(&mut data).ok()?;
        Some(data)
    }

    fn set(&self, key: &str, etag: &str, value: &[u8]) {
        let Some(path) = self.entry_path(key) else {
            return;
        };
        if let Err(e) = write_entry(&path, etag, value) {
            tracing::warn!(path = %path.display(), "failed to write cache entry: {e}");
        }
    }
}

fn read_etag(file: &mut File) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    file.read_exact(&mut len_buf)?;
    let mut etag = vec![0u8; u32::from_le_bytes(len_buf) as usize];
    file.read_exact(&mut etag)?;
    Ok(etag)
}

/// Write one entry through a uniquely named sibling, then move it over `path`.
///
/// Concurrent writers of the same key each get their own temporary file, so
/// the last rename wins and readers never see a torn entry.
fn write_entry(path: &Path, etag: &str, value: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "entry has no parent"))?;
    fs::create_dir_all(parent)?;

    let etag_len = u32::try_from(etag.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "etag too long"))?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(&etag_len.to_le_bytes())?;
    tmp.write_all(etag.as_bytes())?;
    tmp.write_all(value)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn holds_version(root: &Path, version: &str) -> bool {
    match fs::read_to_string(root.join(VERSION_FILE)) {
        Ok(stored) if stored == version => {
            tracing::debug!(root = %root.display(), "cache version matches: {version}");
            true
        }
        Ok(stored) => {
            tracing::info!(
                root = %root.display(),
                "cache version changed ({stored} -> {version}), wiping cache"
            );
            false
        }
        Err(_) => {
            tracing::info!(root = %root.display(), "initializing cache");
            false
        }
    }
}

fn reset(root: &Path, version: &str) {
    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!("failed to remove cache directory: {e}");
    }
    let created =
        fs::create_dir_all(root).and_then(|()| fs::write(root.join(VERSION_FILE), version));
    if let Err(e) = created {
        tracing::warn!(root = %root.display(), "failed to initialize cache: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_page_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let pages = cache.bucket("go/pages");

        pages.set("4f1c9a", "1700000000", br#"{"id":"4f1c9a"}"#);
        assert_eq!(
            pages.get("4f1c9a", "1700000000"),
            Some(br#"{"id":"4f1c9a"}"#.to_vec())
        );
    }

    #[test]
    fn test_newer_remote_version_misses() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let pages = cache.bucket("go/pages");

        pages.set("4f1c9a", "1700000000", b"old");
        assert_eq!(pages.get("4f1c9a", "1700000555"), None);
    }

    #[test]
    fn test_empty_etag_reads_any_version() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let pages = cache.bucket("go/pages");

        pages.set("4f1c9a", "1700000000", b"cached");
        assert_eq!(pages.get("4f1c9a", ""), Some(b"cached".to_vec()));
    }

    #[test]
    fn test_overwrite_replaces_version() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let pages = cache.bucket("go/pages");

        pages.set("p", "1", b"first");
        pages.set("p", "2", b"second");

        assert_eq!(pages.get("p", "1"), None);
        assert_eq!(pages.get("p", "2"), Some(b"second".to_vec()));
    }

    #[test]
    fn test_books_do_not_share_buckets() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");

        cache.bucket("go/pages").set("p", "e", b"go");
        cache.bucket("python/pages").set("p", "e", b"python");

        assert_eq!(cache.bucket("go/pages").get("p", "e"), Some(b"go".to_vec()));
        assert_eq!(
            cache.bucket("python/pages").get("p", "e"),
            Some(b"python".to_vec())
        );
    }

    #[test]
    fn test_keys_cannot_escape_bucket() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let pages = cache.bucket("go/pages");

        pages.set("../../outside", "e", b"nope");
        assert!(!tmp.path().join("outside").exists());
        assert_eq!(pages.get("../../outside", "e"), None);
        assert_eq!(pages.get("", ""), None);
    }

    #[test]
    fn test_same_version_keeps_entries() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");

        FileCache::new(root.clone(), "v1")
            .bucket("go/pages")
            .set("p", "e", b"kept");

        let reopened = FileCache::new(root, "v1");
        assert_eq!(reopened.bucket("go/pages").get("p", "e"), Some(b"kept".to_vec()));
    }

    #[test]
    fn test_concurrent_writers_of_one_key() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let writes: Vec<Vec<u8>> = (0..8)
            .map(|i| format!("output {i}\n").repeat(512).into_bytes())
            .collect();

        std::thread::scope(|scope| {
            for value in &writes {
                let bucket = cache.bucket("snippets");
                scope.spawn(move || {
                    for _ in 0..20 {
                        bucket.set("3b9e", "sha", value);
                    }
                });
            }
        });

        let stored = cache.bucket("snippets").get("3b9e", "sha").unwrap();
        assert!(writes.contains(&stored));
        let leftovers: Vec<_> = fs::read_dir(tmp.path().join("cache/snippets"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("3b9e")]);
    }

    #[test]
    fn test_version_change_wipes_entries() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");

        FileCache::new(root.clone(), "v1")
            .bucket("go/pages")
            .set("p", "e", b"stale");

        let reopened = FileCache::new(root.clone(), "v2");
        assert_eq!(reopened.bucket("go/pages").get("p", "e"), None);
        assert_eq!(fs::read_to_string(root.join("VERSION")).unwrap(), "v2");
    }
}
