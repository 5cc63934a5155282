//! Static export of a shelf site.
//!
//! An [`Exporter`] waits until every background build has finished, lists
//! every URI of the [`Site`], sorts them and writes each one to a sink:
//!
//! - a directory tree mirroring the URIs ([`Exporter::to_dir`])
//! - a zip archive with the same entry names ([`Exporter::to_zip`],
//!   [`Exporter::to_zip_bytes`])
//!
//! A URI that fails to produce is logged and counted; the export goes on.
//! [`upload_preview`] posts a zipped site to a preview service.

mod dir;
mod error;
mod preview;
mod zip_sink;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use shelf_site::{Barrier, Site};

pub use error::ExportError;
pub use preview::upload_preview;

/// Totals of one export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub files: usize,
    pub bytes: u64,
    /// URIs that could not be written.
    pub failures: usize,
}

impl ExportReport {
    fn record(&mut self, result: Result<u64, ExportError>, uri: &str) {
        match result {
            Ok(bytes) => {
                self.files += 1;
                self.bytes += bytes;
            }
            Err(e) => {
                tracing::error!(uri, "Failed to export: {e}");
                self.failures += 1;
            }
        }
    }
}

/// Writes a finished site to disk or memory.
pub struct Exporter {
    site: Arc<Site>,
    barriers: Vec<Barrier>,
    timeout: Duration,
}

impl Exporter {
    /// Export `site` once every barrier in `barriers` is released, waiting
    /// on them in order and at most `timeout` for each.
    pub fn new(site: Arc<Site>, barriers: Vec<Barrier>, timeout: Duration) -> Self {
        Self {
            site,
            barriers,
            timeout,
        }
    }

    /// Wait for the builds, then list every URI, sorted.
    pub async fn uris(&self) -> Result<Vec<String>, ExportError> {
        for barrier in &self.barriers {
            tracing::debug!(barrier = barrier.name(), "Waiting before export");
            barrier.wait_timeout(self.timeout).await?;
        }

        let mut uris = self.site.all_uris();
        let listed = uris.len();
        uris.sort();
        uris.dedup();
        if uris.len() != listed {
            tracing::warn!(duplicates = listed - uris.len(), "Several handlers list the same URI");
        }
        Ok(uris)
    }

    /// Write the site below `dest`.
    pub async fn to_dir(&self, dest: PathBuf) -> Result<ExportReport, ExportError> {
        let uris = self.uris().await?;
        let site = Arc::clone(&self.site);
        run_blocking(move || dir::write_dir(&site, &uris, &dest)).await
    }

    /// Write the site as a zip archive at `path`.
    pub async fn to_zip(&self, path: PathBuf) -> Result<ExportReport, ExportError> {
        let uris = self.uris().await?;
        let site = Arc::clone(&self.site);
        run_blocking(move || {
            let file = std::fs::File::create(&path).map_err(|e| ExportError::io(&path, e))?;
            let (sink, report) = zip_sink::write_zip(&site, &uris, io::BufWriter::new(file))?;
            sink.into_inner()
                .map_err(|e| ExportError::io(&path, e.into_error()))?
                .sync_all()
                .map_err(|e| ExportError::io(&path, e))?;
            tracing::info!(path = %path.display(), files = report.files, bytes = report.bytes, "Wrote zip archive");
            Ok(report)
        })
        .await
    }

    /// Zip the site in memory.
    pub async fn to_zip_bytes(&self) -> Result<(Vec<u8>, ExportReport), ExportError> {
        let uris = self.uris().await?;
        let site = Arc::clone(&self.site);
        run_blocking(move || {
            let (cursor, report) = zip_sink::write_zip(&site, &uris, io::Cursor::new(Vec::new()))?;
            Ok((cursor.into_inner(), report))
        })
        .await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, ExportError>
where
    F: FnOnce() -> Result<T, ExportError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ExportError::Task(e.to_string()))?
}

/// Map a URI to the relative path it is exported under.
///
/// `None` for URIs that are empty, end in `/` or contain `.`/`..` segments.
pub fn relative_path(uri: &str) -> Option<&str> {
    let rel = uri.trim_start_matches('/');
    let plain = !rel.is_empty()
        && rel
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..");
    plain.then_some(rel)
}

/// Writer that counts what passes through.
struct Counting<W> {
    inner: W,
    bytes: u64,
}

impl<W: Write> Counting<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }
}

impl<W: Write> Write for Counting<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shelf_site::StaticContent;

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("/go/index.html"), Some("go/index.html"));
        assert_eq!(relative_path("robots.txt"), Some("robots.txt"));
        assert_eq!(relative_path("/"), None);
        assert_eq!(relative_path("/go/"), None);
        assert_eq!(relative_path("/go/../etc/passwd"), None);
        assert_eq!(relative_path("/go//x"), None);
    }

    #[tokio::test]
    async fn test_uris_sorted_and_deduplicated() {
        let site = Arc::new(Site::new());
        site.push(Arc::new(StaticContent::new().with("/b.txt", b"b".to_vec())));
        site.push(Arc::new(
            StaticContent::new()
                .with("/a.txt", b"a".to_vec())
                .with("/b.txt", b"shadowed".to_vec()),
        ));

        let exporter = Exporter::new(site, Vec::new(), Duration::from_secs(1));
        assert_eq!(exporter.uris().await.unwrap(), vec!["/a.txt", "/b.txt"]);
    }

    #[tokio::test]
    async fn test_waits_for_barriers() {
        let site = Arc::new(Site::new());
        let books = Barrier::new("books done");
        let guard = books.add();

        let exporter = Exporter::new(Arc::clone(&site), vec![books.clone()], Duration::from_millis(50));
        let err = exporter.uris().await.unwrap_err();
        assert!(matches!(err, ExportError::NotReady(ref t) if t.outstanding == 1));

        // Content added by the last task is seen once it releases.
        site.push(Arc::new(StaticContent::new().with("/late.txt", b"x".to_vec())));
        drop(guard);
        assert_eq!(exporter.uris().await.unwrap(), vec!["/late.txt"]);
    }
}
