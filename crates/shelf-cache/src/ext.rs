//! Typed helpers on top of [`CacheBucket`].

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CacheBucket;

/// JSON and string access for any [`CacheBucket`].
///
/// Kept as a blanket extension trait so that [`CacheBucket`] stays object-safe.
pub trait CacheBucketExt: CacheBucket {
    /// Deserialize a cached JSON value. Decode failures count as misses.
    fn get_json<T: DeserializeOwned>(&self, key: &str, etag: &str) -> Option<T> {
        let bytes = self.get(key, etag)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, "discarding undecodable cache entry: {e}");
                None
            }
        }
    }

    /// Store `value` as JSON.
    fn set_json<T: Serialize>(&self, key: &str, etag: &str, value: &T) {
        if let Ok(bytes) = serde_json::to_vec(value) {
            self.set(key, etag, &bytes);
        }
    }

    fn get_string(&self, key: &str, etag: &str) -> Option<String> {
        let bytes = self.get(key, etag)?;
        String::from_utf8(bytes).ok()
    }

    fn set_string(&self, key: &str, etag: &str, value: &str) {
        self.set(key, etag, value.as_bytes());
    }
}

impl<B: CacheBucket + ?Sized> CacheBucketExt for B {}
