//! `robots.txt` and `sitemap.txt`.

use std::collections::BTreeSet;
use std::sync::Arc;

use shelf_site::StaticContent;

use crate::book::Book;
use crate::context::SiteContext;

pub fn robots_txt(ctx: &SiteContext) -> String {
    format!(
        "User-agent: *\nDisallow:\n\nSitemap: {}\n",
        ctx.absolute_url("/sitemap.txt")
    )
}

/// One absolute URL per line, sorted, no trailing newline.
///
/// Only meaningful once every book has finished building.
pub fn sitemap_txt(books: &[Arc<Book>]) -> String {
    let urls: BTreeSet<String> = books.iter().flat_map(|b| b.sitemap_urls()).collect();
    urls.into_iter().collect::<Vec<_>>().join("\n")
}

/// Handler serving both files.
pub fn sitemap_handler(ctx: &SiteContext, books: &[Arc<Book>]) -> StaticContent {
    StaticContent::new()
        .with("/robots.txt", robots_txt(ctx).into_bytes())
        .with("/sitemap.txt", sitemap_txt(books).into_bytes())
}
