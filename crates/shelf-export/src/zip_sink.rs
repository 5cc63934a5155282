//! Zip sink.

use std::io::{Seek, Write};

use shelf_site::Site;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::{ExportError, ExportReport, relative_path};

/// Progress is logged every this many files.
const LOG_EVERY: usize = 128;

/// Best deflate compression.
const LEVEL: i64 = 9;

/// Write every URI as a deflated entry and return the finished sink.
///
/// Entries are produced into memory first: a producer that fails halfway
/// would otherwise leave a truncated entry in the archive.
pub(crate) fn write_zip<W: Write + Seek>(
    site: &Site,
    uris: &[String],
    sink: W,
) -> Result<(W, ExportReport), ExportError> {
    let mut zip = ZipWriter::new(sink);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(LEVEL));
    let mut report = ExportReport::default();

    for (i, uri) in uris.iter().enumerate() {
        let entry = produce(site, uri);
        let written = match entry {
            Ok((name, bytes)) => {
                zip.start_file(name, options)?;
                zip.write_all(&bytes)
                    .map_err(|e| ExportError::io(name, e))?;
                Ok(bytes.len() as u64)
            }
            Err(e) => Err(e),
        };
        report.record(written, uri);
        if (i + 1) % LOG_EVERY == 0 {
            tracing::info!("Zipped {} of {} files", i + 1, uris.len());
        }
    }

    let sink = zip.finish()?;
    Ok((sink, report))
}

fn produce<'a>(site: &Site, uri: &'a str) -> Result<(&'a str, Vec<u8>), ExportError> {
    let name = relative_path(uri).ok_or_else(|| ExportError::InvalidUri(uri.to_owned()))?;
    let producer = site
        .resolve(uri)
        .ok_or_else(|| ExportError::Unresolved(uri.to_owned()))?;
    let bytes = producer.to_bytes().map_err(|source| ExportError::Content {
        uri: uri.to_owned(),
        source,
    })?;
    Ok((name, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shelf_site::StaticContent;
    use std::io::{Cursor, Read};
    use std::sync::Arc;

    #[test]
    fn test_entries_named_without_leading_slash() {
        let site = Site::new();
        site.push(Arc::new(
            StaticContent::new()
                .with("/go/index.html", b"<h1>Go</h1>".to_vec())
                .with("/robots.txt", b"User-agent: *\n".to_vec()),
        ));
        let uris = vec![
            "/go/index.html".to_owned(),
            "/missing.txt".to_owned(),
            "/robots.txt".to_owned(),
        ];

        let (cursor, report) = write_zip(&site, &uris, Cursor::new(Vec::new())).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.failures, 1);

        let mut archive = zip::ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_owned).collect();
        names.sort();
        assert_eq!(names, vec!["go/index.html", "robots.txt"]);

        let mut entry = archive.by_name("go/index.html").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut body = String::new();
        entry.read_to_string(&mut body).unwrap();
        assert_eq!(body, "<h1>Go</h1>");
    }
}
