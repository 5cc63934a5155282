//! Settings shared by every book of one site build.

use std::path::{Path, PathBuf};

use shelf_cache::Cache;
use shelf_config::Config;

use crate::error::BuildError;
use crate::snippet::SnippetRunner;
use crate::templates::Templates;

/// Read-only state handed to builders and handlers.
///
/// Built once at startup from [`Config`]; nothing in here changes while the
/// site is being generated.
pub struct SiteContext {
    /// Absolute site URL without a trailing slash.
    pub base_url: String,
    /// URI prefix of every book, `/`-terminated.
    pub book_prefix: String,
    /// Cache root; books keep downloaded images below it.
    pub cache_dir: PathBuf,
    /// Full-size covers, registered per book as `{book}/cover.{ext}`.
    pub covers_dir: PathBuf,
    /// Thumbnail covers served as `/covers_small/{name}`.
    pub covers_small_dir: PathBuf,
    pub templates: Templates,
    /// Snippet evaluation; `None` when disabled.
    pub snippets: Option<SnippetRunner>,
}

impl SiteContext {
    pub fn new(config: &Config, templates: Templates, snippets: Option<SnippetRunner>) -> Self {
        let site = &config.site_resolved;
        Self {
            base_url: site.base_url.trim_end_matches('/').to_owned(),
            book_prefix: site.book_prefix.clone(),
            cache_dir: config.cache_resolved.dir.clone(),
            covers_dir: site.covers_dir.clone(),
            covers_small_dir: site.covers_small_dir.clone(),
            templates,
            snippets,
        }
    }

    /// Load templates and set up snippet evaluation as configured.
    ///
    /// `eval_snippets` is the effective switch (fetch-only runs never
    /// evaluate). Template problems are fatal here.
    pub fn from_config(
        config: &Config,
        cache: &dyn Cache,
        eval_snippets: bool,
    ) -> Result<Self, BuildError> {
        let templates = Templates::load(config.site_resolved.templates_dir.as_deref())?;
        let snippets = eval_snippets.then(|| {
            SnippetRunner::new(config.build.interpreters.clone(), cache.bucket("snippets"))
        });
        Ok(Self::new(config, templates, snippets))
    }

    /// Absolute URL of a site URI.
    pub fn absolute_url(&self, uri: &str) -> String {
        format!("{}{uri}", self.base_url)
    }
}

/// Retina (`@2x`) cover variants are never served.
pub(crate) fn skip_retina(rel: &Path) -> bool {
    !rel.to_string_lossy().contains("@2x")
}
