//! Markdown inspection and HTML rendering for page bodies.
//!
//! Pages are walked with `pulldown-cmark` twice: once to collect headings,
//! images and code blocks, once to render. Both walks number headings and
//! code blocks identically so that ids and snippet outputs line up.

use std::collections::{BTreeMap, HashMap};

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use serde::Serialize;

/// Heading of a page, for tables of contents and anchors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub id: String,
}

/// Fenced code block with a language tag.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct CodeBlock {
    /// Position among all code blocks of the page.
    pub index: usize,
    pub lang: String,
    pub code: String,
}

fn parser(markdown: &str) -> Parser<'_> {
    Parser::new_ext(
        markdown,
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS,
    )
}

/// Lowercase ASCII slug with single dashes, e.g. "What's New?" -> "whats-new".
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }
    slug
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn level_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Hands out unique anchor ids: "intro", "intro-1", "intro-2"...
#[derive(Default)]
struct IdGen {
    seen: HashMap<String, usize>,
}

impl IdGen {
    fn next(&mut self, text: &str) -> String {
        let mut base = slugify(text);
        if base.is_empty() {
            base = "section".to_owned();
        }
        let count = self.seen.entry(base.clone()).or_default();
        let id = match *count {
            0 => base,
            n => format!("{base}-{n}"),
        };
        *count += 1;
        id
    }
}

/// Every heading of the page, in order, with unique ids.
pub(crate) fn headings(markdown: &str) -> Vec<Heading> {
    let mut ids = IdGen::default();
    let mut out = Vec::new();
    let mut current: Option<(u8, String)> = None;

    for event in parser(markdown) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some((level_num(level), String::new()));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, buf)) = current.as_mut() {
                    buf.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = current.take() {
                    let text = text.trim().to_owned();
                    let id = ids.next(&text);
                    out.push(Heading { level, text, id });
                }
            }
            _ => {}
        }
    }
    out
}

/// Whether an image reference points into the remote's image store.
fn is_local_image(url: &str) -> bool {
    !(url.is_empty() || url.contains("://") || url.starts_with("//") || url.starts_with("data:"))
}

fn image_file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// File names of local images referenced by the page, first occurrence order.
pub(crate) fn image_names(markdown: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for event in parser(markdown) {
        if let Event::Start(Tag::Image { dest_url, .. }) = event
            && is_local_image(&dest_url)
        {
            let name = image_file_name(&dest_url);
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_owned());
            }
        }
    }
    names
}

/// Fenced code blocks that carry a language tag.
pub(crate) fn code_blocks(markdown: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut index = 0;
    let mut current: Option<(Option<String>, String)> = None;

    for event in parser(markdown) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_owned),
                    CodeBlockKind::Indented => None,
                };
                current = Some((lang, String::new()));
            }
            Event::Text(text) => {
                if let Some((_, code)) = current.as_mut() {
                    code.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((Some(lang), code)) = current.take() {
                    blocks.push(CodeBlock { index, lang, code });
                }
                index += 1;
            }
            _ => {}
        }
    }
    blocks
}

/// Render a page body.
///
/// Headings get the ids from [`headings`], local images are pointed at
/// `image_prefix`, and each snippet output is emitted right after its block.
pub(crate) fn render_html(
    markdown: &str,
    image_prefix: &str,
    outputs: &BTreeMap<usize, String>,
) -> String {
    let mut ids = IdGen::default();
    let mut heading_text: Option<String> = None;
    let mut code_index = 0;
    let mut events: Vec<Event<'_>> = Vec::new();

    // Heading ids depend on the heading text, which follows the start tag;
    // remember where each start tag went and patch it at the end tag.
    let mut heading_start: Option<usize> = None;

    for event in parser(markdown) {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                heading_start = Some(events.len());
                heading_text = Some(String::new());
                events.push(event);
            }
            Event::Text(ref text) | Event::Code(ref text) if heading_text.is_some() => {
                if let Some(buf) = heading_text.as_mut() {
                    buf.push_str(text);
                }
                events.push(event);
            }
            Event::End(TagEnd::Heading(_)) => {
                let text = heading_text.take().unwrap_or_default();
                let id = ids.next(text.trim());
                if let Some(pos) = heading_start.take()
                    && let Event::Start(Tag::Heading { id: slot, .. }) = &mut events[pos]
                {
                    *slot = Some(CowStr::from(id));
                }
                events.push(event);
            }
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                let dest_url = if is_local_image(&dest_url) {
                    CowStr::from(format!("{image_prefix}{}", image_file_name(&dest_url)))
                } else {
                    dest_url
                };
                events.push(Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }));
            }
            Event::End(TagEnd::CodeBlock) => {
                events.push(event);
                if let Some(output) = outputs.get(&code_index) {
                    events.push(Event::Html(CowStr::from(format!(
                        "<pre class=\"snippet-output\"><code>{}</code></pre>\n",
                        escape_html(output)
                    ))));
                }
                code_index += 1;
            }
            other => events.push(other),
        }
    }

    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, events.into_iter());
    out
}
