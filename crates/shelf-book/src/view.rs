//! Template data.

use serde::Serialize;

use crate::book::Book;
use crate::context::SiteContext;
use crate::markdown::Heading;
use crate::tree::PageTree;

#[derive(Clone, Debug, Serialize)]
pub struct LinkView {
    pub title: String,
    pub url: String,
}

/// A book as shown on index pages and in page headers.
#[derive(Clone, Debug, Serialize)]
pub struct BookView {
    pub title: String,
    pub title_long: String,
    pub short: String,
    pub url: String,
    pub canonical_url: String,
    pub summary: String,
    pub cover_url: Option<String>,
    pub cover_small_url: Option<String>,
    pub chapters_count: usize,
    pub pages_count: usize,
}

impl BookView {
    pub fn new(book: &Book, ctx: &SiteContext) -> Self {
        let config = book.config();
        let (chapters_count, pages_count) = book
            .tree()
            .map_or((0, 0), |tree| (tree.chapters().len(), tree.len().saturating_sub(1)));
        Self {
            title: config.title.clone(),
            title_long: config.title_long(),
            short: config.short.clone(),
            url: book.url().to_owned(),
            canonical_url: ctx.absolute_url(book.url()),
            summary: config.summary(),
            cover_url: book.cover_uri(),
            cover_small_url: book.cover_small_uri(),
            chapters_count,
            pages_count,
        }
    }
}

/// One page with its place in the book.
#[derive(Clone, Debug, Serialize)]
pub struct PageView {
    pub id: String,
    pub title: String,
    pub url: String,
    pub canonical_url: String,
    pub body_html: String,
    pub headings: Vec<Heading>,
    /// Book index first, then ancestor chapters.
    pub breadcrumbs: Vec<LinkView>,
    pub children: Vec<LinkView>,
    pub prev: Option<LinkView>,
    pub next: Option<LinkView>,
}

impl PageView {
    pub fn new(book: &Book, tree: &PageTree, idx: usize, ctx: &SiteContext) -> Option<Self> {
        let page = tree.page(idx)?;
        let url = book.page_uri(tree, idx)?;

        let mut breadcrumbs = vec![LinkView {
            title: book.config().title.clone(),
            url: book.index_uri(),
        }];
        breadcrumbs.extend(tree.ancestors(idx).into_iter().filter_map(|a| link(book, tree, a)));

        let siblings = tree.parent(idx).map_or(&[][..], |p| tree.children(p));
        let pos = siblings.iter().position(|&s| s == idx);
        let prev = pos
            .and_then(|p| p.checked_sub(1))
            .and_then(|p| link(book, tree, siblings[p]));
        let next = pos
            .and_then(|p| siblings.get(p + 1))
            .and_then(|&n| link(book, tree, n));

        Some(Self {
            id: page.id.clone(),
            title: page.title.clone(),
            canonical_url: ctx.absolute_url(&url),
            url,
            body_html: page.body_html.clone(),
            headings: page.headings.clone(),
            breadcrumbs,
            children: tree
                .children(idx)
                .iter()
                .filter_map(|&c| link(book, tree, c))
                .collect(),
            prev,
            next,
        })
    }
}

/// Row of the overview page: every page, indented by depth.
#[derive(Clone, Debug, Serialize)]
pub struct OverviewEntry {
    pub title: String,
    pub url: String,
    pub depth: usize,
}

pub(crate) fn overview(book: &Book, tree: &PageTree) -> Vec<OverviewEntry> {
    // Depth-first, so children follow their parent.
    let mut out = Vec::with_capacity(tree.len());
    let mut stack: Vec<usize> = tree.chapters().iter().rev().copied().collect();
    while let Some(idx) = stack.pop() {
        if let Some(l) = link(book, tree, idx) {
            out.push(OverviewEntry {
                title: l.title,
                url: l.url,
                depth: tree.depth(idx),
            });
        }
        stack.extend(tree.children(idx).iter().rev().copied());
    }
    out
}

pub(crate) fn chapters(book: &Book, tree: &PageTree) -> Vec<LinkView> {
    tree.chapters()
        .iter()
        .filter_map(|&c| link(book, tree, c))
        .collect()
}

/// Body of the book's `toc.js`.
///
/// `gTocItems` is a flat list of `[title, url, parent]` where `parent` is
/// the index of the parent entry in the same list, or -1 for chapters.
pub(crate) fn toc_js(book: &Book, tree: &PageTree) -> String {
    // Descendants are indices 1.., so entry `i` is page `i + 1`.
    let items: Vec<serde_json::Value> = tree
        .descendants()
        .filter_map(|idx| {
            let l = link(book, tree, idx)?;
            let parent = match tree.parent(idx) {
                Some(p) if p > 0 => i64::try_from(p - 1).unwrap_or(-1),
                _ => -1,
            };
            Some(serde_json::json!([l.title, l.url, parent]))
        })
        .collect();

    let json = serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_owned());
    format!("window.gTocItems = {json};\n")
}

fn link(book: &Book, tree: &PageTree, idx: usize) -> Option<LinkView> {
    Some(LinkView {
        title: tree.page(idx)?.title.clone(),
        url: book.page_uri(tree, idx)?,
    })
}
