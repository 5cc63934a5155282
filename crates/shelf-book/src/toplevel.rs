//! Site-wide pages: book list, not-found page and friends.

use std::sync::Arc;

use minijinja::context;
use shelf_site::DynamicHandler;

use crate::book::Book;
use crate::context::SiteContext;
use crate::error::TemplateError;
use crate::templates::{self, html_producer};
use crate::view::BookView;

/// URI and template of every top-level page.
pub const PAGES: &[(&str, &str)] = &[
    ("/index.html", "index.html"),
    ("/index-grid.html", "index-grid.html"),
    ("/404.html", "404.html"),
    ("/about.html", "about.html"),
    ("/feedback.html", "feedback.html"),
];

/// Render one top-level template against the current state of `books`.
pub fn render(
    ctx: &SiteContext,
    books: &[Arc<Book>],
    template: &str,
) -> Result<String, TemplateError> {
    let views: Vec<BookView> = books.iter().map(|b| BookView::new(b, ctx)).collect();
    ctx.templates.render(template, context! { books => views })
}

/// Render the pages a site cannot work without, so that broken templates
/// fail at startup instead of on the first request.
pub fn check_required(ctx: &SiteContext, books: &[Arc<Book>]) -> Result<(), TemplateError> {
    for name in templates::REQUIRED {
        render(ctx, books, name)?;
    }
    Ok(())
}

/// Handler for [`PAGES`]. Pages whose template is missing are left out.
pub fn handler(ctx: &Arc<SiteContext>, books: Vec<Arc<Book>>) -> DynamicHandler {
    let pages: Vec<(&'static str, &'static str)> = PAGES
        .iter()
        .copied()
        .filter(|(_, template)| ctx.templates.has(template))
        .collect();
    let listed: Vec<String> = pages.iter().map(|(uri, _)| (*uri).to_owned()).collect();

    let ctx = Arc::clone(ctx);
    let books = Arc::new(books);
    DynamicHandler::new(
        move |uri| {
            let (_, template) = pages.iter().find(|(u, _)| *u == uri)?;
            let (ctx, books, template) = (Arc::clone(&ctx), Arc::clone(&books), *template);
            Some(html_producer(move || render(&ctx, &books, template)))
        },
        move || listed.clone(),
    )
}
