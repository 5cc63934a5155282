//! Page templates.
//!
//! A builtin template set is compiled into the binary. A site can override
//! any of them, or add new ones, by dropping same-named `.html` files into
//! `site.templates_dir`.

use std::path::Path;

use minijinja::{Environment, ErrorKind};
use serde::Serialize;
use shelf_site::{ContentError, Producer};

use crate::error::TemplateError;

/// Templates a site cannot do without.
pub const REQUIRED: &[&str] = &["index.html", "404.html"];

const BUILTIN: &[(&str, &str)] = &[
    ("_layout.html", include_str!("../templates/_layout.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("index-grid.html", include_str!("../templates/index-grid.html")),
    ("404.html", include_str!("../templates/404.html")),
    ("about.html", include_str!("../templates/about.html")),
    ("feedback.html", include_str!("../templates/feedback.html")),
    ("book_index.html", include_str!("../templates/book_index.html")),
    ("book_404.html", include_str!("../templates/book_404.html")),
    ("overview.html", include_str!("../templates/overview.html")),
    ("page.html", include_str!("../templates/page.html")),
];

/// Compiled template set.
#[derive(Debug)]
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// The builtin set.
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::from_sources(
            BUILTIN
                .iter()
                .map(|(name, source)| ((*name).to_owned(), (*source).to_owned())),
        )
    }

    /// Builtin templates overlaid with the `.html` files of `overrides`.
    pub fn load(overrides: Option<&Path>) -> Result<Self, TemplateError> {
        let mut sources: Vec<(String, String)> = BUILTIN
            .iter()
            .map(|(name, source)| ((*name).to_owned(), (*source).to_owned()))
            .collect();

        if let Some(dir) = overrides {
            let io_err = |source| TemplateError::Io {
                path: dir.to_path_buf(),
                source,
            };
            for entry in std::fs::read_dir(dir).map_err(io_err)? {
                let path = entry.map_err(io_err)?.path();
                if path.extension().is_none_or(|ext| ext != "html") {
                    continue;
                }
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let source = std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
                    path: path.clone(),
                    source,
                })?;
                tracing::debug!(template = name, "Using template override");
                let name = name.to_owned();
                sources.retain(|(n, _)| *n != name);
                sources.push((name, source));
            }
        }

        Self::from_sources(sources)
    }

    /// Compile `(name, source)` pairs. Every [`REQUIRED`] template must be
    /// among them.
    pub fn from_sources(
        sources: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        for (name, source) in sources {
            env.add_template_owned(name.clone(), source)
                .map_err(|source| TemplateError::Syntax { name, source })?;
        }

        if let Some(missing) = REQUIRED.iter().find(|name| env.get_template(name).is_err()) {
            return Err(TemplateError::Missing((*missing).to_owned()));
        }
        Ok(Self { env })
    }

    pub fn has(&self, name: &str) -> bool {
        self.env.get_template(name).is_ok()
    }

    /// Render template `name` with `ctx`.
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, TemplateError> {
        let template = self.env.get_template(name).map_err(|source| {
            if source.kind() == ErrorKind::TemplateNotFound {
                TemplateError::Missing(name.to_owned())
            } else {
                TemplateError::Render {
                    name: name.to_owned(),
                    source,
                }
            }
        })?;
        template.render(ctx).map_err(|source| TemplateError::Render {
            name: name.to_owned(),
            source,
        })
    }
}

/// Producer rendering HTML on demand.
///
/// Rendering happens on every write, so pages reflect the book state at the
/// time they are served or exported.
pub(crate) fn html_producer<F>(render: F) -> Producer
where
    F: Fn() -> Result<String, TemplateError> + Send + Sync + 'static,
{
    Producer::new("text/html; charset=utf-8", move |w| {
        let html = render().map_err(|e| ContentError::Render(e.to_string()))?;
        w.write_all(html.as_bytes())?;
        Ok(())
    })
}
