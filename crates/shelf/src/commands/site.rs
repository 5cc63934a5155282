//! Build, export, preview and serve.

use std::path::PathBuf;
use std::sync::Arc;

use shelf_book::{SiteBuild, SiteContext, caching_sources};
use shelf_config::{BookConfig, Config};
use shelf_export::{Exporter, upload_preview};
use shelf_server::{ServerConfig, run_server};

use super::{display, open_cache};
use crate::error::CliError;
use crate::output::Output;

/// What to do with the built site. Exports run before serving.
#[derive(Debug, Default)]
pub(crate) struct SiteModes {
    pub(crate) gen_dir: Option<PathBuf>,
    pub(crate) gen_zip: Option<PathBuf>,
    pub(crate) preview: bool,
    pub(crate) serve: bool,
}

impl SiteModes {
    fn exports(&self) -> bool {
        self.gen_dir.is_some() || self.gen_zip.is_some() || self.preview
    }
}

pub(crate) async fn run(
    config: &Config,
    books: Vec<BookConfig>,
    modes: SiteModes,
    version: &str,
) -> Result<(), CliError> {
    let output = Output::new();

    let cache = open_cache(config, version);
    let ctx = Arc::new(SiteContext::from_config(
        config,
        cache.as_ref(),
        config.build.eval_snippets,
    )?);
    let sources = caching_sources(config, cache);

    output.info(&format!(
        "Building {} book(s), {} at a time",
        books.len(),
        config.build.concurrency()
    ));
    let build = Arc::new(SiteBuild::start(config, books, ctx, &sources)?);

    if modes.exports() {
        let summary = build.wait().await?;
        output.build_summary(&summary);
        export(config, &build, &modes, &output).await?;
    }

    if modes.serve {
        if !modes.exports() {
            spawn_readiness_report(Arc::clone(&build));
        }
        let server = ServerConfig::from_config(config);
        output.highlight(&format!("Serving on http://{}:{}", server.host, server.port));
        run_server(server, build.site()).await?;
    }

    Ok(())
}

async fn export(
    config: &Config,
    build: &SiteBuild,
    modes: &SiteModes,
    output: &Output,
) -> Result<(), CliError> {
    let exporter = Exporter::new(
        build.site(),
        vec![build.books_done().clone(), build.server_done().clone()],
        config.build.barrier_timeout(),
    );

    if let Some(dest) = &modes.gen_dir {
        let report = exporter.to_dir(dest.clone()).await?;
        output.export_report(&display(dest), &report);
    }

    if let Some(path) = &modes.gen_zip {
        let report = exporter.to_zip(path.clone()).await?;
        output.export_report(&display(path), &report);
    }

    if modes.preview {
        let (archive, report) = exporter.to_zip_bytes().await?;
        output.export_report("preview archive", &report);

        let upload_url = config.preview.upload_url.clone();
        let url = tokio::task::spawn_blocking(move || upload_preview(&upload_url, &archive))
            .await
            .map_err(|e| CliError::Validation(format!("preview upload task failed: {e}")))??;
        output.success("Preview uploaded");
        output.highlight(&url);
    }

    Ok(())
}

/// Report once every book is done, while the server is already up.
fn spawn_readiness_report(build: Arc<SiteBuild>) {
    tokio::spawn(async move {
        let output = Output::new();
        match build.wait().await {
            Ok(summary) => output.build_summary(&summary),
            Err(e) => output.warning(&format!("Books not ready: {e}")),
        }
    });
}
