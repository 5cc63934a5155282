//! Site assembly.
//!
//! [`SiteBuild::start`] registers every handler on a fresh [`Site`] and
//! launches the book builds. The site can be served right away; exporters
//! call [`SiteBuild::wait`] first, which returns once every book has been
//! built and the sitemap is in place.
//!
//! Handler order matters for the first-match router:
//!
//! 1. builtin stylesheet (unless `static_dir` has its own)
//! 2. `static_dir` under `/s/`
//! 3. top-level pages
//! 4. covers under `/covers/` and `/covers_small/`
//! 5. one handler per book
//! 6. `robots.txt` and `sitemap.txt`, added once all books are done

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use shelf_cache::Cache;
use shelf_config::{BookConfig, Config, SourceLocation};
use shelf_site::{Barrier, DirHandler, Site, StaticContent};
use shelf_source::{CachingSource, DirRemote, HttpRemote, PageSource};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::book::Book;
use crate::builder::{self, BuildReport, Download};
use crate::context::{SiteContext, skip_retina};
use crate::error::BuildError;
use crate::{sitemap, toplevel};

/// Builds the page source of a book.
pub type SourceFactory = Arc<dyn Fn(&BookConfig) -> Box<dyn PageSource> + Send + Sync>;

const BUILTIN_CSS: (&str, &[u8]) = ("shelf.css", include_bytes!("../assets/shelf.css"));

/// Page sources as configured: a cached walk over the directory or HTTP
/// remote, one cache namespace per book.
pub fn caching_sources(config: &Config, cache: Arc<dyn Cache>) -> SourceFactory {
    let location = config.source_resolved.location.clone();
    let fail_fast = config.source_resolved.fail_fast;
    let policy = config.cache_resolved.policy;

    Arc::new(move |book: &BookConfig| -> Box<dyn PageSource> {
        match &location {
            SourceLocation::Dir(root) => Box::new(
                CachingSource::new(DirRemote::new(root.clone()), cache.as_ref(), &book.short, policy)
                    .fail_fast(fail_fast),
            ),
            SourceLocation::Http(url) => Box::new(
                CachingSource::new(HttpRemote::new(url), cache.as_ref(), &book.short, policy)
                    .fail_fast(fail_fast),
            ),
        }
    })
}

/// Outcome of all book builds.
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub reports: Vec<BuildReport>,
    pub failures: Vec<BuildError>,
}

impl BuildSummary {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A site whose books are being built in the background.
pub struct SiteBuild {
    site: Arc<Site>,
    ctx: Arc<SiteContext>,
    books: Vec<Arc<Book>>,
    books_done: Barrier,
    server_done: Barrier,
    builds: Mutex<Vec<(String, JoinHandle<Result<BuildReport, BuildError>>)>>,
    timeout: Duration,
}

impl SiteBuild {
    /// Register handlers and launch one build per book.
    ///
    /// Must run inside a Tokio runtime. Broken required templates are
    /// reported here, before anything is spawned.
    pub fn start(
        config: &Config,
        selected: Vec<BookConfig>,
        ctx: Arc<SiteContext>,
        sources: &SourceFactory,
    ) -> Result<Self, BuildError> {
        let books: Vec<Arc<Book>> = selected
            .into_iter()
            .map(|b| Arc::new(Book::new(b, &ctx)))
            .collect();
        toplevel::check_required(&ctx, &books)?;

        let site_config = &config.site_resolved;
        let site = Arc::new(Site::new());

        let (css_name, css) = BUILTIN_CSS;
        if !site_config.static_dir.join(css_name).is_file() {
            site.push(Arc::new(
                StaticContent::new().with(&format!("/s/{css_name}"), css),
            ));
        }
        site.push(Arc::new(DirHandler::new(site_config.static_dir.clone(), "/s/")));
        site.push(Arc::new(toplevel::handler(&ctx, books.clone())));
        site.push(Arc::new(
            DirHandler::new(site_config.covers_dir.clone(), "/covers/").with_filter(skip_retina),
        ));
        site.push(Arc::new(
            DirHandler::new(site_config.covers_small_dir.clone(), "/covers_small/")
                .with_filter(skip_retina),
        ));

        let limiter = Arc::new(Semaphore::new(config.build.concurrency()));
        let books_done = Barrier::new("books done");
        let server_done = Barrier::new("server setup");

        let mut builds = Vec::with_capacity(books.len());
        for book in &books {
            site.push(Arc::new(book.handler(&ctx)));
            let handle = builder::spawn_build(
                Arc::clone(book),
                sources(book.config()),
                Arc::clone(&ctx),
                Arc::clone(&limiter),
                &books_done,
            );
            builds.push((book.short().to_owned(), handle));
        }
        tracing::info!(
            books = books.len(),
            concurrency = config.build.concurrency(),
            "Started book builds"
        );

        spawn_sitemap(&site, &ctx, &books, &books_done, &server_done);

        Ok(Self {
            site,
            ctx,
            books,
            books_done,
            server_done,
            builds: Mutex::new(builds),
            timeout: config.build.barrier_timeout(),
        })
    }

    /// The router. Safe to query at any time.
    pub fn site(&self) -> Arc<Site> {
        Arc::clone(&self.site)
    }

    pub fn context(&self) -> &Arc<SiteContext> {
        &self.ctx
    }

    pub fn books(&self) -> &[Arc<Book>] {
        &self.books
    }

    pub fn books_done(&self) -> &Barrier {
        &self.books_done
    }

    pub fn server_done(&self) -> &Barrier {
        &self.server_done
    }

    /// Wait for every book and the sitemap, then report per-book outcomes.
    ///
    /// Outcomes are handed out once; later calls only wait.
    pub async fn wait(&self) -> Result<BuildSummary, BuildError> {
        self.books_done.wait_timeout(self.timeout).await?;
        self.server_done.wait_timeout(self.timeout).await?;

        let builds = std::mem::take(&mut *self.builds.lock().unwrap_or_else(PoisonError::into_inner));
        let mut summary = BuildSummary::default();
        for (short, handle) in builds {
            match handle.await {
                Ok(Ok(report)) => summary.reports.push(report),
                Ok(Err(e)) => summary.failures.push(e),
                Err(_) => summary.failures.push(BuildError::Panicked(short)),
            }
        }
        Ok(summary)
    }
}

/// Add the sitemap handler once every book is done.
fn spawn_sitemap(
    site: &Arc<Site>,
    ctx: &Arc<SiteContext>,
    books: &[Arc<Book>],
    books_done: &Barrier,
    server_done: &Barrier,
) {
    let guard = server_done.add();
    let (site, ctx, books, books_done) = (
        Arc::clone(site),
        Arc::clone(ctx),
        books.to_vec(),
        books_done.clone(),
    );
    tokio::spawn(async move {
        let _guard = guard;
        books_done.wait().await;
        let handler = sitemap::sitemap_handler(&ctx, &books);
        site.push(Arc::new(handler));
        tracing::info!("Sitemap ready");
    });
}

/// Fetch phase only: download every book's pages and images into the cache
/// without building pages or running snippets.
pub async fn download_books(
    selected: Vec<BookConfig>,
    ctx: &Arc<SiteContext>,
    sources: &SourceFactory,
    concurrency: usize,
) -> Vec<Result<Download, BuildError>> {
    let limiter = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(selected.len());

    for config in selected {
        let book = Book::new(config, ctx);
        let source = sources(book.config());
        let limiter = Arc::clone(&limiter);
        let short = book.short().to_owned();
        handles.push((short.clone(), tokio::spawn(async move {
            let _permit = limiter
                .acquire_owned()
                .await
                .map_err(|_| BuildError::Cancelled(short.clone()))?;
            tokio::task::spawn_blocking(move || builder::download_book(&book, source.as_ref(), None))
                .await
                .map_err(|_| BuildError::Panicked(short))?
        })));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (short, handle) in handles {
        results.push(match handle.await {
            Ok(result) => result,
            Err(_) => Err(BuildError::Panicked(short)),
        });
    }
    results
}
