//! Configuration management for shelf.
//!
//! Parses `shelf.toml` with serde, auto-discovering it in the current
//! directory and its parents. One [`Config`] is built at startup and passed by
//! reference to everything that needs run-mode settings.
//!
//! CLI flags are applied on top of the file through [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! These string values support `${VAR}` and `${VAR:-default}`:
//!
//! - `server.host`
//! - `site.base_url`
//! - `source.url`
//! - `preview.upload_url`
//!
//! ## Example
//!
//! ```toml
//! [site]
//! base_url = "https://www.programming-books.io"
//!
//! [source]
//! kind = "dir"
//! path = "content"
//!
//! [[books]]
//! title = "Go"
//! short = "go"
//! start_page_id = "a1b2c3"
//! ```

mod expand;

use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "shelf.toml";

/// Book selector meaning "every configured book".
pub const ALL_BOOKS: &str = "all";

/// CLI settings that override configuration file values.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override the fetch cache policy (`--no-cache` forces always-download).
    pub cache_policy: Option<CachePolicy>,
    /// Override snippet evaluation.
    pub eval_snippets: Option<bool>,
}

/// How the fetch client treats its on-disk page cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    /// Ignore the cache and fetch every page.
    AlwaysDownload,
    /// Fetch a page only when the remote version differs from the cached one.
    #[default]
    DownloadIfNewer,
    /// Never contact the remote; uncached pages fail.
    CacheOnly,
}

impl CachePolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlwaysDownload => "always-download",
            Self::DownloadIfNewer => "download-if-newer",
            Self::CacheOnly => "cache-only",
        }
    }
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    site: SiteConfigRaw,
    cache: CacheConfigRaw,
    source: SourceConfigRaw,
    /// Build scheduling configuration.
    pub build: BuildConfig,
    /// Remote preview upload configuration.
    pub preview: PreviewConfig,
    /// Books, in display order.
    pub books: Vec<BookConfig>,

    /// Resolved site configuration (set after loading).
    #[serde(skip)]
    pub site_resolved: SiteConfig,
    /// Resolved cache configuration (set after loading).
    #[serde(skip)]
    pub cache_resolved: CacheConfig,
    /// Resolved content source (set after loading).
    #[serde(skip)]
    pub source_resolved: SourceConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How long in-flight requests may take to drain after a shutdown signal.
    pub shutdown_grace_secs: u64,
}

impl ServerConfig {
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 9003,
            shutdown_grace_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SiteConfigRaw {
    base_url: Option<String>,
    book_prefix: Option<String>,
    static_dir: Option<String>,
    covers_dir: Option<String>,
    covers_small_dir: Option<String>,
    templates_dir: Option<String>,
    dest_dir: Option<String>,
    zip_path: Option<String>,
}

/// Resolved site configuration with absolute paths.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Absolute site URL used for canonical links and the sitemap.
    pub base_url: String,
    /// URI prefix under which every book lives, always `/`-terminated.
    pub book_prefix: String,
    /// Stylesheets, scripts and icons served under `/s/`.
    pub static_dir: PathBuf,
    /// Full-size book covers served under `/covers/`.
    pub covers_dir: PathBuf,
    /// Thumbnail covers served under `/covers_small/`.
    pub covers_small_dir: PathBuf,
    /// Optional directory whose templates override the built-in ones.
    pub templates_dir: Option<PathBuf>,
    /// Default destination for directory export.
    pub dest_dir: PathBuf,
    /// Default destination for zip export.
    pub zip_path: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::with_base(Path::new("."), &SiteConfigRaw::default())
    }
}

impl SiteConfig {
    fn with_base(base: &Path, raw: &SiteConfigRaw) -> Self {
        let resolve = |path: Option<&str>, default: &str| base.join(path.unwrap_or(default));
        Self {
            base_url: raw
                .base_url
                .clone()
                .unwrap_or_else(|| "https://www.programming-books.io".to_owned()),
            book_prefix: normalize_prefix(raw.book_prefix.as_deref().unwrap_or("/")),
            static_dir: resolve(raw.static_dir.as_deref(), "static"),
            covers_dir: resolve(raw.covers_dir.as_deref(), "covers"),
            covers_small_dir: resolve(raw.covers_small_dir.as_deref(), "covers_small"),
            templates_dir: raw.templates_dir.as_deref().map(|d| base.join(d)),
            dest_dir: resolve(raw.dest_dir.as_deref(), "www"),
            zip_path: resolve(raw.zip_path.as_deref(), "www.zip"),
        }
    }
}

/// Force a URI prefix into the `/a/b/` shape.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else {
        format!("/{trimmed}/")
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CacheConfigRaw {
    dir: Option<String>,
    policy: Option<CachePolicy>,
}

/// Resolved cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root of the page and snippet cache.
    pub dir: PathBuf,
    pub policy: CachePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".shelf/cache"),
            policy: CachePolicy::default(),
        }
    }
}

/// Where remote page trees come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A directory of `<id>.json` page files.
    #[default]
    Dir,
    /// An HTTP endpoint serving the same layout.
    Http,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SourceConfigRaw {
    kind: SourceKind,
    path: Option<String>,
    url: Option<String>,
    fail_fast: Option<bool>,
}

/// Resolved content source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Dir(PathBuf),
    Http(String),
}

/// Resolved content source configuration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub location: SourceLocation,
    /// Abort a book on its first page failure instead of omitting the page.
    pub fail_fast: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            location: SourceLocation::Dir(PathBuf::from("content")),
            fail_fast: false,
        }
    }
}

/// Build scheduling configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Maximum number of books built at once (default: host parallelism).
    pub concurrency: Option<usize>,
    /// Run fenced code blocks that have a configured interpreter.
    pub eval_snippets: bool,
    /// Upper bound on waiting for background builds before giving up.
    pub barrier_timeout_secs: u64,
    /// Interpreter command per code block language, e.g. `python = "python3"`.
    pub interpreters: BTreeMap<String, String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            eval_snippets: false,
            barrier_timeout_secs: 600,
            interpreters: BTreeMap::new(),
        }
    }
}

impl BuildConfig {
    /// Number of book builds allowed in flight.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
        })
    }

    #[must_use]
    pub fn barrier_timeout(&self) -> Duration {
        Duration::from_secs(self.barrier_timeout_secs)
    }
}

/// Remote preview upload configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Endpoint accepting a zipped site and answering with its preview URL.
    pub upload_url: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            upload_url: "https://www.instantpreview.dev/upload".to_owned(),
        }
    }
}

/// One book.
#[derive(Debug, Clone, Deserialize)]
pub struct BookConfig {
    /// Short title, e.g. "Go".
    pub title: String,
    /// Display title (default: "Essential {title}").
    pub title_long: Option<String>,
    /// Directory and URI name, e.g. "go".
    pub short: String,
    /// Identifier of the root page in the content source.
    pub start_page_id: String,
    /// File name inside the covers directories, e.g. "Go.png".
    pub cover_image: Option<String>,
    /// Summary shown on the index page (HTML allowed).
    pub summary: Option<String>,
}

impl BookConfig {
    #[must_use]
    pub fn title_long(&self) -> String {
        self.title_long
            .clone()
            .unwrap_or_else(|| format!("Essential {}", self.title))
    }

    #[must_use]
    pub fn summary(&self) -> String {
        self.summary.clone().unwrap_or_else(|| {
            format!(
                "<b>{}</b> is a free book about {} programming language.",
                self.title_long(),
                self.title
            )
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`site.base_url`").
        field: String,
        /// Error message (e.g., "${`SITE_HOST`} not set").
        message: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// With `config_path`, that file must exist. Otherwise `shelf.toml` is
    /// searched in the current directory and its parents, falling back to
    /// defaults relative to the current directory.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Parse a configuration from a TOML string, resolving paths against `base`.
    pub fn from_toml_str(content: &str, base: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars()?;
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(policy) = settings.cache_policy {
            self.cache_resolved.policy = policy;
        }
        if let Some(eval) = settings.eval_snippets {
            self.build.eval_snippets = eval;
        }
    }

    /// Pick books by a comma-separated list of short names, or [`ALL_BOOKS`].
    ///
    /// Order follows the configuration, not the selector.
    pub fn select_books(&self, selector: &str) -> Result<Vec<BookConfig>, ConfigError> {
        if self.books.is_empty() {
            return Err(ConfigError::Validation(
                "no [[books]] configured".to_owned(),
            ));
        }

        let selector = selector.trim();
        if selector.eq_ignore_ascii_case(ALL_BOOKS) {
            return Ok(self.books.clone());
        }

        let wanted: Vec<&str> = selector
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if wanted.is_empty() {
            return Err(ConfigError::Validation(
                "book selection is empty".to_owned(),
            ));
        }
        if let Some(unknown) = wanted
            .iter()
            .find(|w| !self.books.iter().any(|b| b.short == **w))
        {
            return Err(ConfigError::Validation(format!("unknown book '{unknown}'")));
        }

        Ok(self
            .books
            .iter()
            .filter(|b| wanted.contains(&b.short.as_str()))
            .cloned()
            .collect())
    }

    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        let mut config = Self {
            server: ServerConfig::default(),
            site: SiteConfigRaw::default(),
            cache: CacheConfigRaw::default(),
            source: SourceConfigRaw::default(),
            build: BuildConfig::default(),
            preview: PreviewConfig::default(),
            books: Vec::new(),
            site_resolved: SiteConfig::default(),
            cache_resolved: CacheConfig::default(),
            source_resolved: SourceConfig::default(),
            config_path: None,
        };
        config.resolve_paths(base);
        config
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = Self::from_toml_str(&content, config_dir)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Invalid book definitions are fatal: they would otherwise surface as
    /// half-built sites.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_site()?;
        self.validate_build()?;
        self.validate_books()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_site(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.site_resolved.base_url, "site.base_url")?;
        require_http_url(&self.site_resolved.base_url, "site.base_url")?;
        if let SourceLocation::Http(url) = &self.source_resolved.location {
            require_http_url(url, "source.url")?;
        }
        require_http_url(&self.preview.upload_url, "preview.upload_url")?;
        Ok(())
    }

    fn validate_build(&self) -> Result<(), ConfigError> {
        if self.build.concurrency == Some(0) {
            return Err(ConfigError::Validation(
                "build.concurrency must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_books(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (i, book) in self.books.iter().enumerate() {
            require_non_empty(&book.title, &format!("books[{i}].title"))?;
            require_non_empty(&book.start_page_id, &format!("books[{i}].start_page_id"))?;
            require_non_empty(&book.short, &format!("books[{i}].short"))?;
            let valid_short = book
                .short
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
            if !valid_short {
                return Err(ConfigError::Validation(format!(
                    "books[{i}].short '{}' may only contain a-z, 0-9, '-' and '_'",
                    book.short
                )));
            }
            if book.short.eq_ignore_ascii_case(ALL_BOOKS) {
                return Err(ConfigError::Validation(format!(
                    "books[{i}].short cannot be '{ALL_BOOKS}'"
                )));
            }
            if !seen.insert(book.short.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate book short name '{}'",
                    book.short
                )));
            }
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;
        if let Some(url) = &self.site.base_url {
            self.site.base_url = Some(expand::expand_env(url, "site.base_url")?);
        }
        if let Some(url) = &self.source.url {
            self.source.url = Some(expand::expand_env(url, "source.url")?);
        }
        self.preview.upload_url =
            expand::expand_env(&self.preview.upload_url, "preview.upload_url")?;
        Ok(())
    }

    /// Resolve relative paths against the config file directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.site_resolved = SiteConfig::with_base(config_dir, &self.site);

        self.cache_resolved = CacheConfig {
            dir: config_dir.join(self.cache.dir.as_deref().unwrap_or(".shelf/cache")),
            policy: self.cache.policy.unwrap_or_default(),
        };

        let location = match self.source.kind {
            SourceKind::Dir => {
                SourceLocation::Dir(config_dir.join(self.source.path.as_deref().unwrap_or("content")))
            }
            SourceKind::Http => SourceLocation::Http(
                self.source
                    .url
                    .clone()
                    .unwrap_or_default()
                    .trim_end_matches('/')
                    .to_owned(),
            ),
        };
        self.source_resolved = SourceConfig {
            location,
            fail_fast: self.source.fail_fast.unwrap_or(false),
        };
    }
}
