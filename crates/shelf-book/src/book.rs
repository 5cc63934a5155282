//! Books and their content handlers.
//!
//! A [`Book`] owns the URI map of its pages. The builder fills it in once the
//! page tree is complete; the handler returned by [`Book::handler`] reads it
//! on every request. Both sides go through the same lock, and the map itself
//! never leaves this module.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use minijinja::context;
use shelf_config::BookConfig;
use shelf_site::{ContentHandler, DynamicHandler, FilesHandler, Producer};

use crate::context::{SiteContext, skip_retina};
use crate::templates::html_producer;
use crate::tree::PageTree;
use crate::view::{self, BookView, PageView};

/// Book pages served by a fixed switch rather than the page map.
pub const FIXED_PAGES: &[&str] = &["index.html", "404.html", "overview.html", "toc.js"];

#[derive(Default)]
struct BookState {
    tree: Option<Arc<PageTree>>,
    /// Page URI to tree index.
    uris: BTreeMap<String, usize>,
    /// Absolute URLs for the sitemap.
    sitemap: BTreeSet<String>,
}

/// One book of the site.
pub struct Book {
    config: BookConfig,
    url: String,
    image_dir: PathBuf,
    cover_uri: Option<String>,
    cover_small_uri: Option<String>,
    /// Downloaded images and the cover.
    files: FilesHandler,
    state: Mutex<BookState>,
}

impl Book {
    pub fn new(config: BookConfig, ctx: &SiteContext) -> Self {
        let url = format!("{}{}/", ctx.book_prefix, config.short);
        let image_dir = ctx.cache_dir.join(&config.short).join("images");
        let files = FilesHandler::new();

        let cover_uri = config.cover_image.as_deref().and_then(|name| {
            let path = ctx.covers_dir.join(name);
            if !path.is_file() {
                tracing::warn!(book = %config.short, path = %path.display(), "Cover image not found");
                return None;
            }
            let ext = Path::new(name)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("png");
            let uri = format!("{url}cover.{ext}");
            files.add_file(&uri, path);
            Some(uri)
        });
        let cover_small_uri = config
            .cover_image
            .as_deref()
            .filter(|name| skip_retina(Path::new(name)))
            .filter(|name| ctx.covers_small_dir.join(name).is_file())
            .map(|name| format!("/covers_small/{name}"));

        Self {
            config,
            url,
            image_dir,
            cover_uri,
            cover_small_uri,
            files,
            state: Mutex::new(BookState::default()),
        }
    }

    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    pub fn short(&self) -> &str {
        &self.config.short
    }

    /// Root URI of the book, e.g. `/go/`.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn index_uri(&self) -> String {
        format!("{}index.html", self.url)
    }

    /// Where downloaded images are kept.
    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// URI prefix of the book's images.
    pub fn image_prefix(&self) -> String {
        format!("{}img/", self.url)
    }

    pub fn cover_uri(&self) -> Option<String> {
        self.cover_uri.clone()
    }

    /// Thumbnail URI, only when the site serves one for this cover.
    pub fn cover_small_uri(&self) -> Option<String> {
        self.cover_small_uri.clone()
    }

    /// URI of page `idx`. The root page is the book index.
    pub fn page_uri(&self, tree: &PageTree, idx: usize) -> Option<String> {
        let page = tree.page(idx)?;
        if idx == 0 {
            Some(self.index_uri())
        } else {
            Some(format!("{}{}", self.url, page.file_name()))
        }
    }

    fn lock(&self) -> MutexGuard<'_, BookState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a finished page tree.
    ///
    /// Page URIs, image files and sitemap URLs all become visible at once.
    pub fn register(&self, tree: PageTree, ctx: &SiteContext) {
        let tree = Arc::new(tree);
        let mut state = self.lock();

        state.uris.clear();
        state.sitemap.clear();
        state.sitemap.insert(ctx.absolute_url(&self.url));
        state.sitemap.insert(ctx.absolute_url(&self.index_uri()));

        for idx in tree.descendants() {
            let Some(uri) = self.page_uri(&tree, idx) else {
                continue;
            };
            state.sitemap.insert(ctx.absolute_url(&uri));
            state.uris.insert(uri, idx);
        }

        let prefix = self.image_prefix();
        for (_, page) in tree.iter() {
            for name in &page.images {
                let path = self.image_dir.join(name);
                if path.is_file() {
                    self.files.add_file(&format!("{prefix}{name}"), path);
                }
            }
        }

        tracing::debug!(book = %self.config.short, pages = state.uris.len(), "Registered pages");
        state.tree = Some(tree);
    }

    /// Page tree, once the build has finished.
    pub fn tree(&self) -> Option<Arc<PageTree>> {
        self.lock().tree.clone()
    }

    pub fn is_built(&self) -> bool {
        self.lock().tree.is_some()
    }

    /// Absolute URLs of the book for the sitemap, sorted. Empty until built.
    pub fn sitemap_urls(&self) -> Vec<String> {
        self.lock().sitemap.iter().cloned().collect()
    }

    /// Every URI the book owns right now.
    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = FIXED_PAGES
            .iter()
            .map(|name| format!("{}{name}", self.url))
            .collect();
        let state = self.lock();
        uris.extend(state.uris.keys().cloned());
        uris.extend(self.files.uris());
        drop(state);
        uris
    }

    /// Resolve a URI of this book.
    pub fn resolve(self: &Arc<Self>, uri: &str, ctx: &Arc<SiteContext>) -> Option<Producer> {
        let rel = uri.strip_prefix(self.url.as_str())?;
        match rel {
            "index.html" => return Some(self.index_producer(ctx)),
            "404.html" => return Some(self.not_found_producer(ctx)),
            "overview.html" => return Some(self.overview_producer(ctx)),
            "toc.js" => return Some(self.toc_producer()),
            _ => {}
        }

        // Images go through the same guard as pages so a request never sees a
        // half-registered tree.
        let state = self.lock();
        let page = state
            .uris
            .get(uri)
            .and_then(|&idx| Some((Arc::clone(state.tree.as_ref()?), idx)));
        let Some((tree, idx)) = page else {
            return self.files.resolve(uri);
        };
        drop(state);

        let (book, ctx) = (Arc::clone(self), Arc::clone(ctx));
        Some(html_producer(move || {
            let page = PageView::new(&book, &tree, idx, &ctx);
            ctx.templates.render(
                "page.html",
                context! { book => BookView::new(&book, &ctx), page => page },
            )
        }))
    }

    /// Content handler serving this book.
    pub fn handler(self: &Arc<Self>, ctx: &Arc<SiteContext>) -> DynamicHandler {
        let (book, ctx) = (Arc::clone(self), Arc::clone(ctx));
        let listed = Arc::clone(self);
        DynamicHandler::new(move |uri| book.resolve(uri, &ctx), move || listed.uris())
    }

    fn index_producer(self: &Arc<Self>, ctx: &Arc<SiteContext>) -> Producer {
        let (book, ctx) = (Arc::clone(self), Arc::clone(ctx));
        html_producer(move || {
            let tree = book.tree();
            let root = tree.as_ref().and_then(|t| PageView::new(&book, t, 0, &ctx));
            let chapters = tree
                .as_ref()
                .map(|t| view::chapters(&book, t))
                .unwrap_or_default();
            ctx.templates.render(
                "book_index.html",
                context! { book => BookView::new(&book, &ctx), root => root, chapters => chapters },
            )
        })
    }

    fn not_found_producer(self: &Arc<Self>, ctx: &Arc<SiteContext>) -> Producer {
        let (book, ctx) = (Arc::clone(self), Arc::clone(ctx));
        html_producer(move || {
            ctx.templates.render(
                "book_404.html",
                context! { book => BookView::new(&book, &ctx) },
            )
        })
    }

    fn overview_producer(self: &Arc<Self>, ctx: &Arc<SiteContext>) -> Producer {
        let (book, ctx) = (Arc::clone(self), Arc::clone(ctx));
        html_producer(move || {
            let entries = book
                .tree()
                .map(|t| view::overview(&book, &t))
                .unwrap_or_default();
            ctx.templates.render(
                "overview.html",
                context! { book => BookView::new(&book, &ctx), entries => entries },
            )
        })
    }

    fn toc_producer(self: &Arc<Self>) -> Producer {
        let book = Arc::clone(self);
        Producer::new(shelf_site::content_type_for("toc.js"), move |w| {
            let js = book.tree().map_or_else(
                || "window.gTocItems = [];\n".to_owned(),
                |t| view::toc_js(&book, &t),
            );
            w.write_all(js.as_bytes())?;
            Ok(())
        })
    }
}

impl std::fmt::Debug for Book {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Book")
            .field("short", &self.config.short)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;
    use crate::templates::Templates;
    use pretty_assertions::assert_eq;
    use shelf_source::RemotePage;
    use tempfile::TempDir;

    fn ctx(dir: &Path) -> Arc<SiteContext> {
        Arc::new(SiteContext {
            base_url: "https://example.com".to_owned(),
            book_prefix: "/".to_owned(),
            cache_dir: dir.join("cache"),
            covers_dir: dir.join("covers"),
            covers_small_dir: dir.join("covers_small"),
            templates: Templates::builtin().unwrap(),
            snippets: None,
        })
    }

    fn config(short: &str) -> BookConfig {
        BookConfig {
            title: "Go".to_owned(),
            title_long: None,
            short: short.to_owned(),
            start_page_id: "root".to_owned(),
            cover_image: Some("go.png".to_owned()),
            summary: None,
        }
    }

    fn page(id: &str, title: &str, markdown: &str, children: &[&str]) -> Page {
        Page::decorate(
            &RemotePage {
                id: id.to_owned(),
                title: title.to_owned(),
                markdown: markdown.to_owned(),
                children: children.iter().map(|c| (*c).to_owned()).collect(),
            },
            "/go/img/",
            None,
        )
    }

    fn built(dir: &Path) -> (Arc<Book>, Arc<SiteContext>) {
        let ctx = ctx(dir);
        let book = Arc::new(Book::new(config("go"), &ctx));
        std::fs::create_dir_all(book.image_dir()).unwrap();
        std::fs::write(book.image_dir().join("chart.png"), b"png").unwrap();

        let tree = PageTree::build(
            "root",
            vec![
                page("root", "Go", "Welcome", &["c1"]),
                page("c1", "Basics", "# Variables\n\n![chart](chart.png)\n![gone](gone.png)", &["a1"]),
                page("a1", "Loops", "for {}", &[]),
            ],
        )
        .unwrap();
        book.register(tree, &ctx);
        (book, ctx)
    }

    #[test]
    fn test_uris_before_build() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(dir.path());
        let book = Book::new(config("go"), &ctx);

        assert!(!book.is_built());
        assert!(book.cover_uri().is_none());
        assert_eq!(
            book.uris(),
            vec!["/go/index.html", "/go/404.html", "/go/overview.html", "/go/toc.js"]
        );
        assert!(book.sitemap_urls().is_empty());
    }

    #[test]
    fn test_cover_thumbnail_needs_file() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(dir.path());
        assert!(Book::new(config("go"), &ctx).cover_small_uri().is_none());

        std::fs::create_dir_all(&ctx.covers_small_dir).unwrap();
        std::fs::write(ctx.covers_small_dir.join("go.png"), b"png").unwrap();
        assert_eq!(
            Book::new(config("go"), &ctx).cover_small_uri().as_deref(),
            Some("/covers_small/go.png")
        );

        std::fs::write(ctx.covers_small_dir.join("go@2x.png"), b"png").unwrap();
        let retina = BookConfig {
            cover_image: Some("go@2x.png".to_owned()),
            ..config("go")
        };
        assert!(Book::new(retina, &ctx).cover_small_uri().is_none());
    }

    #[test]
    fn test_images_wait_for_register() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(dir.path());
        let book = Arc::new(Book::new(config("go"), &ctx));
        std::fs::create_dir_all(book.image_dir()).unwrap();
        std::fs::write(book.image_dir().join("chart.png"), b"png").unwrap();

        assert!(book.resolve("/go/img/chart.png", &ctx).is_none());
        assert!(!book.uris().contains(&"/go/img/chart.png".to_owned()));
    }

    #[test]
    fn test_image_reads_wait_for_state_lock() {
        let dir = TempDir::new().unwrap();
        let (book, ctx) = built(dir.path());

        let state = book.lock();
        let reader = {
            let (book, ctx) = (Arc::clone(&book), Arc::clone(&ctx));
            std::thread::spawn(move || {
                let image = book.resolve("/go/img/chart.png", &ctx).is_some();
                (image, book.uris())
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!reader.is_finished(), "image lookup ran while the book was locked");
        drop(state);

        let (image, uris) = reader.join().unwrap();
        assert!(image);
        assert!(uris.contains(&"/go/img/chart.png".to_owned()));
    }

    #[test]
    fn test_register_pages_and_images() {
        let dir = TempDir::new().unwrap();
        let (book, _) = built(dir.path());

        let uris = book.uris();
        assert!(uris.contains(&"/go/basics-c1.html".to_owned()));
        assert!(uris.contains(&"/go/loops-a1.html".to_owned()));
        assert!(uris.contains(&"/go/img/chart.png".to_owned()));
        assert!(!uris.iter().any(|u| u.ends_with("gone.png")));
        assert!(!uris.iter().any(|u| u.ends_with("root.html")));

        assert_eq!(
            book.sitemap_urls(),
            vec![
                "https://example.com/go/",
                "https://example.com/go/basics-c1.html",
                "https://example.com/go/index.html",
                "https://example.com/go/loops-a1.html",
            ]
        );
    }

    #[test]
    fn test_resolve_pages() {
        let dir = TempDir::new().unwrap();
        let (book, ctx) = built(dir.path());

        let page = book.resolve("/go/loops-a1.html", &ctx).unwrap();
        assert_eq!(page.content_type(), "text/html; charset=utf-8");
        let html = String::from_utf8(page.to_bytes().unwrap()).unwrap();
        assert!(html.contains("Loops"));
        assert!(html.contains("/go/basics-c1.html"), "breadcrumb to chapter");

        let index = String::from_utf8(book.resolve("/go/index.html", &ctx).unwrap().to_bytes().unwrap()).unwrap();
        assert!(index.contains("Basics"));

        let img = book.resolve("/go/img/chart.png", &ctx).unwrap();
        assert_eq!(img.to_bytes().unwrap(), b"png");

        assert!(book.resolve("/go/nope.html", &ctx).is_none());
        assert!(book.resolve("/python/index.html", &ctx).is_none());
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (book, ctx) = built(dir.path());
        for uri in book.uris() {
            let a = book.resolve(&uri, &ctx).unwrap().to_bytes().unwrap();
            let b = book.resolve(&uri, &ctx).unwrap().to_bytes().unwrap();
            assert_eq!(a, b, "{uri}");
        }
    }

    #[test]
    fn test_toc_js() {
        let dir = TempDir::new().unwrap();
        let (book, ctx) = built(dir.path());
        let js = book.resolve("/go/toc.js", &ctx).unwrap().to_bytes().unwrap();
        assert_eq!(
            String::from_utf8(js).unwrap(),
            "window.gTocItems = [[\"Basics\",\"/go/basics-c1.html\",-1],[\"Loops\",\"/go/loops-a1.html\",0]];\n"
        );
    }

    #[test]
    fn test_cover_registered() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(dir.path());
        std::fs::create_dir_all(&ctx.covers_dir).unwrap();
        std::fs::write(ctx.covers_dir.join("go.png"), b"cover").unwrap();

        let book = Book::new(config("go"), &ctx);
        assert_eq!(book.cover_uri().as_deref(), Some("/go/cover.png"));
        assert!(book.uris().contains(&"/go/cover.png".to_owned()));
    }

    #[test]
    fn test_handler_delegates() {
        let dir = TempDir::new().unwrap();
        let (book, ctx) = built(dir.path());
        let handler = book.handler(&ctx);
        assert_eq!(handler.uris(), book.uris());
        assert!(handler.resolve("/go/overview.html").is_some());
    }
}
