//! shelf CLI - multi-book documentation site generator.
//!
//! Modes (exports may be combined with each other and with `--serve`):
//! - `--serve`: serve the site while books build in the background
//! - `--gen-dir [DIR]`, `--gen-zip [PATH]`: export the finished site
//! - `--preview`: upload a zipped export and print its URL
//! - `--download-only`, `--download-commit`: refresh the page cache

mod commands;
mod error;
mod output;

use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use shelf_config::{ALL_BOOKS, CachePolicy, CliSettings, Config};
use tracing_subscriber::EnvFilter;

use commands::site::SiteModes;
use error::CliError;
use output::Output;

/// Application version from Cargo.toml.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit status when no mode is given.
const USAGE_EXIT: i32 = 2;

/// shelf - build and serve a shelf of books.
#[derive(Parser, Debug)]
#[command(name = "shelf", version, about)]
struct Cli {
    /// Serve the site, building books in the background.
    #[arg(long)]
    serve: bool,

    /// Export the site to a directory (default: site.dest_dir).
    #[arg(long, value_name = "DIR", num_args = 0..=1)]
    gen_dir: Option<Option<PathBuf>>,

    /// Export the site to a zip file (default: site.zip_path).
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    gen_zip: Option<Option<PathBuf>>,

    /// Upload a zipped export to the preview service and print its URL.
    #[arg(long)]
    preview: bool,

    /// Only fetch pages and images into the cache.
    #[arg(long, conflicts_with_all = ["serve", "gen_dir", "gen_zip", "preview", "download_commit"])]
    download_only: bool,

    /// Fetch into the cache, then git-commit the cache directory.
    #[arg(long, conflicts_with_all = ["serve", "gen_dir", "gen_zip", "preview"])]
    download_commit: bool,

    /// Comma-separated short names of the books to process, or "all".
    #[arg(long, default_value = ALL_BOOKS, env = "SHELF_BOOKS")]
    books: String,

    /// Ignore cached pages and download everything.
    #[arg(long)]
    no_cache: bool,

    /// Do not run code snippets.
    #[arg(long)]
    no_snippets: bool,

    /// Path to configuration file (default: auto-discover shelf.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Log build progress.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn has_mode(&self) -> bool {
        self.serve
            || self.gen_dir.is_some()
            || self.gen_zip.is_some()
            || self.preview
            || self.download_only
            || self.download_commit
    }

    fn settings(&self) -> CliSettings {
        CliSettings {
            host: self.host.clone(),
            port: self.port,
            cache_policy: self.no_cache.then_some(CachePolicy::AlwaysDownload),
            eval_snippets: self.no_snippets.then_some(false),
        }
    }

    fn site_modes(&self, config: &Config) -> SiteModes {
        let site = &config.site_resolved;
        SiteModes {
            gen_dir: self
                .gen_dir
                .as_ref()
                .map(|dir| dir.clone().unwrap_or_else(|| site.dest_dir.clone())),
            gen_zip: self
                .gen_zip
                .as_ref()
                .map(|path| path.clone().unwrap_or_else(|| site.zip_path.clone())),
            preview: self.preview,
            serve: self.serve,
        }
    }

    async fn execute(self) -> Result<(), CliError> {
        let config = Config::load(self.config.as_deref(), Some(&self.settings()))?;
        let books = config.select_books(&self.books)?;

        if self.download_only || self.download_commit {
            return commands::download::run(&config, books, self.download_commit, VERSION).await;
        }
        let modes = self.site_modes(&config);
        commands::site::run(&config, books, modes, VERSION).await
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    install_panic_hook();

    if !cli.has_mode() {
        let _ = Cli::command().print_help();
        std::process::exit(USAGE_EXIT);
    }

    let result = tokio::runtime::Runtime::new()
        .map_err(CliError::from)
        .and_then(|rt| rt.block_on(cli.execute()));

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

/// Log panics through tracing, then run the default hook.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("panic: {info}");
        default_hook(info);
    }));
}
