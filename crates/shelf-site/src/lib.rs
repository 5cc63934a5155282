//! URI-addressed content for shelf.
//!
//! This crate provides:
//! - [`ContentHandler`]: resolve a URI to a [`Producer`], list owned URIs
//! - Handler variants: [`StaticContent`], [`FilesHandler`], [`DirHandler`],
//!   [`DynamicHandler`]
//! - [`Site`]: first-match router over handlers, shared by the HTTP server
//!   and the exporters
//! - [`Barrier`]: awaitable counter of outstanding background tasks
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use shelf_site::{Site, StaticContent};
//!
//! let site = Site::new();
//! site.push(Arc::new(StaticContent::new().with("/robots.txt", b"User-agent: *\n".to_vec())));
//!
//! let producer = site.resolve("/robots.txt").unwrap();
//! assert_eq!(producer.to_bytes().unwrap(), b"User-agent: *\n");
//! ```

mod barrier;
mod handler;
mod mime;
mod producer;
mod site;

pub use barrier::{Barrier, BarrierGuard, BarrierTimeout};
pub use handler::{
    ContentHandler, DirHandler, DynamicHandler, FilesHandler, PathFilter, StaticContent,
    normalize_uri,
};
pub use mime::content_type_for;
pub use producer::{ContentError, Producer};
pub use site::Site;
