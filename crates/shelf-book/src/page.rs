//! Decorated pages.

use std::collections::BTreeMap;

use shelf_source::RemotePage;

use crate::markdown::{self, Heading};
use crate::snippet::SnippetRunner;

/// Headings deeper than this stay out of the table of contents.
const TOC_MAX_LEVEL: u8 = 3;

/// A fetched page with everything the templates need precomputed.
#[derive(Clone, Debug)]
pub struct Page {
    pub id: String,
    pub title: String,
    /// Child ids as listed by the remote, before tree construction.
    pub child_ids: Vec<String>,
    /// Table-of-contents headings (levels 1 to 3).
    pub headings: Vec<Heading>,
    /// Local image file names referenced by the body.
    pub images: Vec<String>,
    /// Snippet output per code block index.
    pub snippet_outputs: BTreeMap<usize, String>,
    /// Rendered body.
    pub body_html: String,
}

impl Page {
    /// Decorate a remote page.
    ///
    /// Snippets run only when a runner is given. Images resolve under
    /// `image_prefix`.
    pub fn decorate(
        remote: &RemotePage,
        image_prefix: &str,
        snippets: Option<&SnippetRunner>,
    ) -> Self {
        let snippet_outputs = snippets
            .map(|runner| runner.eval_page(&remote.markdown))
            .unwrap_or_default();

        let headings = markdown::headings(&remote.markdown)
            .into_iter()
            .filter(|h| h.level <= TOC_MAX_LEVEL)
            .collect();

        Self {
            id: remote.id.clone(),
            title: remote.title.clone(),
            child_ids: remote.children.clone(),
            headings,
            images: markdown::image_names(&remote.markdown),
            body_html: markdown::render_html(&remote.markdown, image_prefix, &snippet_outputs),
            snippet_outputs,
        }
    }

    /// File name of the page inside its book, e.g. `getting-started-a1b2.html`.
    pub fn file_name(&self) -> String {
        let slug = markdown::slugify(&self.title);
        if slug.is_empty() {
            format!("{}.html", self.id)
        } else {
            format!("{slug}-{}.html", self.id)
        }
    }
}
