//! Page-tree fetch client for shelf.
//!
//! Books are trees of pages held by a remote. This crate walks such a tree
//! from its root id, consulting an on-disk cache according to a
//! [`CachePolicy`](shelf_config::CachePolicy), and reports how many pages
//! were downloaded versus served from the cache.
//!
//! # Architecture
//!
//! - [`Remote`] trait: `version()`, `download()`, `download_image()`
//! - [`DirRemote`] and [`HttpRemote`] backends
//! - [`PageSource`] trait with [`CachingSource`] as the implementation
//! - [`MockRemote`] for testing (behind `mock` feature flag)
//!
//! # Example
//!
//! ```ignore
//! use shelf_cache::NullCache;
//! use shelf_config::CachePolicy;
//! use shelf_source::{CachingSource, DirRemote, PageSource};
//!
//! let source = CachingSource::new(
//!     DirRemote::new("content".into()),
//!     &NullCache,
//!     "go",
//!     CachePolicy::DownloadIfNewer,
//! );
//! let report = source.fetch_page_tree("a1", &mut |_| Ok(()))?;
//! ```

mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod page;
mod remote;
mod source;

pub use error::{ErrorStatus, FetchError, FetchErrorKind};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockRemote;
pub use page::{FetchReport, RemotePage};
pub use remote::{DirRemote, HttpRemote, Remote};
pub use source::{CachingSource, PageSource};
