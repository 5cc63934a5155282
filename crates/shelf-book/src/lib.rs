//! Books, page decoration and site assembly for shelf.
//!
//! This crate turns configured books into content handlers:
//!
//! - [`Page`] and [`PageTree`]: fetched pages with headings, images, snippet
//!   output and rendered HTML, arranged under the book's root page
//! - [`Book`]: owns a book's page map and serves it through a dynamic handler
//! - [`build_book`] / [`spawn_build`]: fetch and publish one book, in the
//!   background under a concurrency limit
//! - [`SiteBuild`]: registers every handler on a [`Site`](shelf_site::Site),
//!   launches the builds and adds the sitemap when they are done
//! - [`Templates`]: minijinja templates, builtin or overridden per site
//!
//! # Example
//!
//! ```ignore
//! let ctx = Arc::new(SiteContext::from_config(&config, cache.as_ref(), true)?);
//! let sources = caching_sources(&config, cache);
//! let build = SiteBuild::start(&config, config.select_books("all")?, ctx, &sources)?;
//!
//! let summary = build.wait().await?;
//! for uri in build.site().all_uris() {
//!     // ...
//! }
//! ```

mod book;
mod builder;
mod context;
mod driver;
mod error;
mod markdown;
mod page;
mod sitemap;
mod snippet;
mod templates;
pub mod toplevel;
mod tree;
mod view;

pub use book::{Book, FIXED_PAGES};
pub use builder::{BuildReport, Download, build_book, download_book, spawn_build};
pub use context::SiteContext;
pub use driver::{BuildSummary, SiteBuild, SourceFactory, caching_sources, download_books};
pub use error::{BuildError, TemplateError};
pub use markdown::{Heading, slugify};
pub use page::Page;
pub use sitemap::{robots_txt, sitemap_handler, sitemap_txt};
pub use snippet::SnippetRunner;
pub use templates::{REQUIRED as REQUIRED_TEMPLATES, Templates};
pub use tree::PageTree;
pub use view::{BookView, LinkView, OverviewEntry, PageView};
