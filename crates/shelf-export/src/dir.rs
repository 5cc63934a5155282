//! Directory sink.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use shelf_site::{Producer, Site};

use crate::{Counting, ExportError, ExportReport, relative_path};

/// Progress is logged every this many files.
const LOG_EVERY: usize = 256;

pub(crate) fn write_dir(
    site: &Site,
    uris: &[String],
    dest: &Path,
) -> Result<ExportReport, ExportError> {
    fs::create_dir_all(dest).map_err(|e| ExportError::io(dest, e))?;

    let mut created: HashSet<PathBuf> = HashSet::from([dest.to_path_buf()]);
    let mut report = ExportReport::default();

    for (i, uri) in uris.iter().enumerate() {
        report.record(write_file(site, uri, dest, &mut created), uri);
        if (i + 1) % LOG_EVERY == 0 {
            tracing::info!("Exported {} of {} files", i + 1, uris.len());
        }
    }

    tracing::info!(
        dest = %dest.display(),
        files = report.files,
        bytes = report.bytes,
        failures = report.failures,
        "Exported site to directory"
    );
    Ok(report)
}

fn write_file(
    site: &Site,
    uri: &str,
    dest: &Path,
    created: &mut HashSet<PathBuf>,
) -> Result<u64, ExportError> {
    let rel = relative_path(uri).ok_or_else(|| ExportError::InvalidUri(uri.to_owned()))?;
    let producer = site
        .resolve(uri)
        .ok_or_else(|| ExportError::Unresolved(uri.to_owned()))?;

    let path = dest.join(rel);
    if let Some(parent) = path.parent()
        && !created.contains(parent)
    {
        fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
        created.insert(parent.to_path_buf());
    }

    // Produce into a sibling and rename, so a failed producer leaves nothing.
    let mut part_name = path.file_name().unwrap_or_default().to_owned();
    part_name.push(".part");
    let part = path.with_file_name(part_name);
    let written = write_part(&producer, uri, &part);
    match written {
        Ok(bytes) => {
            fs::rename(&part, &path).map_err(|e| ExportError::io(&path, e))?;
            Ok(bytes)
        }
        Err(e) => {
            let _ = fs::remove_file(&part);
            Err(e)
        }
    }
}

fn write_part(producer: &Producer, uri: &str, part: &Path) -> Result<u64, ExportError> {
    let file = File::create(part).map_err(|e| ExportError::io(part, e))?;
    let mut out = Counting::new(BufWriter::new(file));
    producer
        .write_to(&mut out)
        .map_err(|source| ExportError::Content {
            uri: uri.to_owned(),
            source,
        })?;
    out.flush().map_err(|e| ExportError::io(part, e))?;
    Ok(out.bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shelf_site::{ContentError, DynamicHandler, StaticContent};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_failures_do_not_stop_export() {
        let site = Site::new();
        site.push(Arc::new(
            StaticContent::new()
                .with("/a/b/c.txt", b"deep".to_vec())
                .with("/top.txt", b"top".to_vec()),
        ));
        site.push(Arc::new(DynamicHandler::new(
            |uri| {
                (uri == "/broken.html").then(|| {
                    Producer::new("text/html", |w| {
                        w.write_all(b"<html>half")?;
                        Err(ContentError::Render("boom".to_owned()))
                    })
                })
            },
            || vec!["/broken.html".to_owned()],
        )));

        let tmp = TempDir::new().unwrap();
        let uris: Vec<String> = ["/a/b/c.txt", "/broken.html", "/gone.txt", "/top.txt"]
            .iter()
            .map(|u| (*u).to_owned())
            .collect();
        let report = write_dir(&site, &uris, tmp.path()).unwrap();

        assert_eq!(
            report,
            ExportReport {
                files: 2,
                bytes: 7,
                failures: 2
            }
        );
        assert_eq!(fs::read(tmp.path().join("a/b/c.txt")).unwrap(), b"deep");
        assert_eq!(fs::read(tmp.path().join("top.txt")).unwrap(), b"top");
        assert!(!tmp.path().join("broken.html").exists());

        let mut left: Vec<String> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["a", "top.txt"]);
    }
}
