//! Book builds.
//!
//! A build fetches the page tree, decorates every page as it arrives
//! (snippets, images, headings) and publishes the finished tree to the
//! [`Book`]. Builds run on the blocking pool, at most `concurrency` at a
//! time, and each one holds the "books done" barrier until it exits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use shelf_site::Barrier;
use shelf_source::{FetchError, PageSource};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::book::Book;
use crate::context::SiteContext;
use crate::error::BuildError;
use crate::page::Page;
use crate::snippet::SnippetRunner;
use crate::tree::PageTree;

/// What a finished build did.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub book: String,
    /// Pages in the published tree, root included.
    pub pages: usize,
    pub downloaded: usize,
    pub from_cache: usize,
    /// Pages left out because they could not be fetched.
    pub failed_pages: usize,
    pub images: usize,
    pub elapsed: Duration,
}

/// Pages of a book after the fetch phase.
pub struct Download {
    /// Decorated pages by id.
    pub pages: HashMap<String, Page>,
    pub downloaded: usize,
    pub from_cache: usize,
    pub failed_pages: usize,
    pub images: usize,
}

/// Fetch a book's pages and images without publishing anything.
///
/// Snippets run only when `snippets` is given. Image failures are logged and
/// otherwise ignored; the page simply shows a broken image.
pub fn download_book(
    book: &Book,
    source: &dyn PageSource,
    snippets: Option<&SnippetRunner>,
) -> Result<Download, BuildError> {
    let short = book.short();
    std::fs::create_dir_all(book.image_dir()).map_err(|e| BuildError::io(book.image_dir(), e))?;

    let image_prefix = book.image_prefix();
    let mut pages: HashMap<String, Page> = HashMap::new();
    let mut images = 0;

    let mut on_page = |remote: &shelf_source::RemotePage| -> Result<(), FetchError> {
        let page = Page::decorate(remote, &image_prefix, snippets);
        for name in &page.images {
            match source.fetch_image(name) {
                Ok(bytes) => {
                    let path = book.image_dir().join(name);
                    if let Err(e) = std::fs::write(&path, bytes) {
                        tracing::warn!(book = short, path = %path.display(), "Failed to save image: {e}");
                    } else {
                        images += 1;
                    }
                }
                Err(e) => tracing::warn!(book = short, page = %page.id, image = %name, "Failed to fetch image: {e}"),
            }
        }
        pages.insert(page.id.clone(), page);
        Ok(())
    };

    let report = source
        .fetch_page_tree(&book.config().start_page_id, &mut on_page)
        .map_err(|source| BuildError::Fetch {
            book: short.to_owned(),
            source,
        })?;

    tracing::info!(
        book = short,
        "Got {} pages, downloaded: {}, from cache: {}",
        report.pages.len(),
        report.downloaded,
        report.from_cache
    );

    Ok(Download {
        pages,
        downloaded: report.downloaded,
        from_cache: report.from_cache,
        failed_pages: report.failures.len(),
        images,
    })
}

/// Fetch, decorate and publish one book.
pub fn build_book(
    book: &Book,
    source: &dyn PageSource,
    ctx: &SiteContext,
) -> Result<BuildReport, BuildError> {
    let started = Instant::now();
    let download = download_book(book, source, ctx.snippets.as_ref())?;

    let root_id = &book.config().start_page_id;
    let tree = PageTree::build(root_id, download.pages.into_values().collect()).ok_or_else(|| {
        BuildError::Fetch {
            book: book.short().to_owned(),
            source: FetchError::not_found(root_id.as_str()),
        }
    })?;

    let report = BuildReport {
        book: book.short().to_owned(),
        pages: tree.len(),
        downloaded: download.downloaded,
        from_cache: download.from_cache,
        failed_pages: download.failed_pages,
        images: download.images,
        elapsed: started.elapsed(),
    };
    book.register(tree, ctx);

    tracing::info!(
        book = %report.book,
        pages = report.pages,
        failed = report.failed_pages,
        elapsed = ?report.elapsed,
        "Finished building book"
    );
    Ok(report)
}

/// Launch the build of `book` in the background.
///
/// The book is registered on `books_done` before this returns, and released
/// when the task exits however it exits. The build waits for a slot on
/// `limiter` first.
pub fn spawn_build(
    book: Arc<Book>,
    source: Box<dyn PageSource>,
    ctx: Arc<SiteContext>,
    limiter: Arc<Semaphore>,
    books_done: &Barrier,
) -> JoinHandle<Result<BuildReport, BuildError>> {
    let guard = books_done.add();
    tokio::spawn(async move {
        // Declared first, dropped last: the slot is free before waiters wake.
        let _guard = guard;
        let short = book.short().to_owned();
        let _permit = limiter
            .acquire_owned()
            .await
            .map_err(|_| BuildError::Cancelled(short.clone()))?;

        tracing::debug!(book = %short, "Starting build");
        match tokio::task::spawn_blocking(move || build_book(&book, source.as_ref(), &ctx)).await {
            Ok(result) => {
                if let Err(e) = &result {
                    tracing::error!(book = %short, "Build failed: {e}");
                }
                result
            }
            Err(e) => {
                tracing::error!(book = %short, "Build task panicked: {e}");
                Err(BuildError::Panicked(short))
            }
        }
    })
}
