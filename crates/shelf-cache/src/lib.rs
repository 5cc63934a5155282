//! Cache layer for shelf.
//!
//! Fetched page trees and evaluated code snippets outlive a single run so that
//! `cache-only` builds work offline and unchanged snippets are not re-run.
//! Consumers talk to two traits:
//!
//! - [`Cache`]: opens named buckets (one per book and concern)
//! - [`CacheBucket`]: byte values addressed by key and validated by an etag
//!
//! # Implementations
//!
//! - [`NullCache`]: caching disabled, every lookup misses
//! - [`FileCache`]: one directory per bucket, wiped when the cache version changes
//!
//! # Example
//!
//! ```
//! use shelf_cache::{Cache, NullCache};
//!
//! let cache = NullCache;
//! let pages = cache.bucket("go/pages");
//! pages.set("4f1c9a", "1700000000", br#"{"id":"4f1c9a"}"#);
//! assert_eq!(pages.get("4f1c9a", "1700000000"), None);
//! ```

mod ext;
mod file;

pub use ext::CacheBucketExt;
pub use file::FileCache;

/// A named partition of a [`Cache`].
///
/// The etag is whatever the producer considers the version of a value: the
/// remote page version for fetched pages, a content hash for snippet output.
/// A lookup hits only when key and etag both match.
pub trait CacheBucket: Send + Sync {
    /// Look up `key`.
    ///
    /// An empty `etag` accepts whatever version is stored; this is how
    /// `cache-only` fetches read pages without asking the remote.
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>>;

    /// Store `value` under `key`, replacing any previous version.
    fn set(&self, key: &str, etag: &str, value: &[u8]);
}

/// Factory for isolated [`CacheBucket`]s.
pub trait Cache: Send + Sync {
    /// Open (or lazily create) the bucket called `name`.
    ///
    /// Names may contain `/` to nest buckets, e.g. `"go/pages"`.
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket>;
}

/// Bucket that stores nothing.
pub struct NullCacheBucket;

impl CacheBucket for NullCacheBucket {
    fn get(&self, _key: &str, _etag: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _etag: &str, _value: &[u8]) {}
}

/// [`Cache`] used when caching is disabled.
pub struct NullCache;

impl Cache for NullCache {
    fn bucket(&self, _name: &str) -> Box<dyn CacheBucket> {
        Box::new(NullCacheBucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_cache_never_hits() {
        let cache = NullCache;
        let bucket = cache.bucket("go/pages");

        bucket.set("page-1", "v1", b"{}");
        assert_eq!(bucket.get("page-1", "v1"), None);
        assert_eq!(bucket.get("page-1", ""), None);
    }

    #[test]
    fn test_null_cache_nested_bucket_names() {
        let cache = NullCache;

        for name in &["go/pages", "go/snippets", "python/pages"] {
            let bucket = cache.bucket(name);
            bucket.set("k", "e", b"data");
            assert_eq!(bucket.get("k", "e"), None, "bucket {name} should miss");
        }
    }
}
